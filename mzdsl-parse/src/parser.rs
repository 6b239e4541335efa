#![forbid(unsafe_code)]

use std::mem;

use mzdsl_ast::{
    join, span_between, AnnAssignStmt, AssertStmt, AssignStmt, AugAssignStmt, BinOp, Block,
    BoolOp, CallArg, CmpOp, Comprehension, ComprehensionKind, Direction, Expr, ExprKind,
    ForStmt, FunctionDef, Ident, IfStmt, Module, ObjectiveStmt, Param, ReturnStmt, Span, Stmt,
    UnaryOp,
};
use mzdsl_lex::{Token, TokenKind};

use crate::error::ParseError;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::Eof) {
                break;
            }
            if self.at(TokenKind::Indent) {
                return Err(self.error_here("unexpected indentation"));
            }
            self.parse_stmt_into(&mut stmts)?;
        }
        Ok(Module { stmts })
    }

    /// Parses one logical statement; a `;`-separated line may yield several.
    fn parse_stmt_into(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwDef) => out.push(Stmt::FunctionDef(self.parse_function_def()?)),
            Some(TokenKind::KwFor) => out.push(Stmt::For(self.parse_for_stmt()?)),
            Some(TokenKind::KwIf) => out.push(Stmt::If(self.parse_if_stmt()?)),
            Some(TokenKind::KwWhile) => {
                return Err(self.error_here("`while` loops are not supported; use a bounded `for` loop"));
            }
            _ => self.parse_simple_stmts(out)?,
        }
        Ok(())
    }

    fn parse_simple_stmts(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        loop {
            out.push(self.parse_simple_stmt()?);
            if self.at(TokenKind::Semicolon) {
                self.next();
                if self.at(TokenKind::Newline) || self.at(TokenKind::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        self.expect_stmt_terminator()
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwPass) => {
                let tok = self.expect(TokenKind::KwPass)?;
                Ok(Stmt::Pass(tok.span))
            }
            Some(TokenKind::KwAssert) => {
                let start = self.expect(TokenKind::KwAssert)?;
                let expr = self.parse_expr()?;
                let mut span = join(start.span, expr.span);
                // An assertion message is accepted and dropped.
                if self.at(TokenKind::Comma) {
                    self.next();
                    let msg = self.parse_expr()?;
                    span = join(span, msg.span);
                }
                Ok(Stmt::Assert(AssertStmt { span, expr }))
            }
            Some(TokenKind::KwReturn) => {
                let start = self.expect(TokenKind::KwReturn)?;
                if self.at_stmt_end() {
                    return Ok(Stmt::Return(ReturnStmt {
                        span: start.span,
                        value: None,
                    }));
                }
                let value = self.parse_expr_list()?;
                let span = join(start.span, value.span);
                Ok(Stmt::Return(ReturnStmt {
                    span,
                    value: Some(value),
                }))
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let target = self.parse_expr_list()?;

        if self.at(TokenKind::Colon) {
            let Some(name) = target.as_name().cloned() else {
                return Err(ParseError {
                    message: "only a plain name can carry a type annotation".to_string(),
                    span: target.span,
                });
            };
            self.next();
            let annotation = self.parse_expr()?;
            let mut span = join(name.span, annotation.span);
            let value = if self.at(TokenKind::Eq) {
                self.next();
                let v = self.parse_expr_list()?;
                span = join(span, v.span);
                Some(v)
            } else {
                None
            };
            return Ok(Stmt::AnnAssign(AnnAssignStmt {
                span,
                target: name,
                annotation,
                value,
            }));
        }

        if self.at(TokenKind::Eq) {
            self.next();
            check_assign_target(&target, true)?;
            let value = self.parse_expr_list()?;
            if self.at(TokenKind::Eq) {
                return Err(self.error_here("chained assignment is not supported"));
            }
            let span = join(target.span, value.span);
            return Ok(Stmt::Assign(AssignStmt {
                span,
                target,
                value,
            }));
        }

        let aug = match self.peek_kind() {
            Some(TokenKind::PlusEq) => Some(BinOp::Add),
            Some(TokenKind::MinusEq) => Some(BinOp::Sub),
            Some(TokenKind::StarEq) => Some(BinOp::Mul),
            _ => None,
        };
        if let Some(op) = aug {
            self.next();
            check_assign_target(&target, false)?;
            let value = self.parse_expr()?;
            let span = join(target.span, value.span);
            return Ok(Stmt::AugAssign(AugAssignStmt {
                span,
                target,
                op,
                value,
            }));
        }

        if let ExprKind::Call { callee, args } = &target.kind {
            let direction = match callee.node.as_str() {
                "minimize" => Some(Direction::Minimize),
                "maximize" => Some(Direction::Maximize),
                _ => None,
            };
            if let Some(direction) = direction {
                let [CallArg::Positional(expr)] = args.as_slice() else {
                    return Err(ParseError {
                        message: format!("`{}` expects exactly one positional argument", callee.node),
                        span: target.span,
                    });
                };
                return Ok(Stmt::Objective(ObjectiveStmt {
                    span: target.span,
                    direction,
                    expr: expr.clone(),
                }));
            }
        }

        Ok(Stmt::ExprStmt(target))
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, ParseError> {
        let start = self.expect(TokenKind::KwDef)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        let ret = if self.at(TokenKind::Arrow) {
            self.next();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Colon)?;
        let body = self.parse_block()?;
        let span = join(start.span, body.span);
        Ok(FunctionDef {
            span,
            name,
            params,
            ret,
            body,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.at(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let name = self.expect_ident()?;
            let annotation = if self.at(TokenKind::Colon) {
                self.next();
                Some(self.parse_expr()?)
            } else {
                None
            };
            if self.at(TokenKind::Eq) {
                return Err(self.error_here("default parameter values are not supported"));
            }
            let span = annotation
                .as_ref()
                .map(|a| join(name.span, a.span))
                .unwrap_or(name.span);
            params.push(Param {
                span,
                name,
                annotation,
            });

            if self.at(TokenKind::Comma) {
                self.next();
                if self.at(TokenKind::RParen) {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(params)
    }

    fn parse_for_stmt(&mut self) -> Result<ForStmt, ParseError> {
        let start = self.expect(TokenKind::KwFor)?;
        let targets = self.parse_targets()?;
        self.expect(TokenKind::KwIn)?;
        let iter = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_block()?;
        let span = join(start.span, body.span);
        Ok(ForStmt {
            span,
            targets,
            iter,
            body,
        })
    }

    /// `i`, `i, w` or `(i, w)`.
    fn parse_targets(&mut self) -> Result<Vec<Ident>, ParseError> {
        let parenthesized = self.at(TokenKind::LParen);
        if parenthesized {
            self.next();
        }
        let mut targets = vec![self.expect_ident()?];
        while self.at(TokenKind::Comma) {
            self.next();
            if !matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
                break;
            }
            targets.push(self.expect_ident()?);
        }
        if parenthesized {
            self.expect(TokenKind::RParen)?;
        }
        Ok(targets)
    }

    fn parse_if_stmt(&mut self) -> Result<IfStmt, ParseError> {
        let start = self.next().ok_or_else(|| self.error_here("expected `if`"))?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let then_block = self.parse_block()?;

        self.skip_newlines();
        let else_block = if self.at(TokenKind::KwElif) {
            let nested = self.parse_if_stmt()?;
            Some(Block {
                span: nested.span,
                stmts: vec![Stmt::If(nested)],
            })
        } else if self.at(TokenKind::KwElse) {
            self.next();
            self.expect(TokenKind::Colon)?;
            Some(self.parse_block()?)
        } else {
            None
        };

        let end_span = else_block
            .as_ref()
            .map(|b| b.span)
            .unwrap_or(then_block.span);
        let span = join(start.span, end_span);
        Ok(IfStmt {
            span,
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        // Inline suite: `if c: assert x`
        if !self.at(TokenKind::Newline) {
            let mut stmts = Vec::new();
            let start = self.peek_span().unwrap_or_else(|| span_between(0, 0));
            self.parse_simple_stmts(&mut stmts)?;
            let span = stmts.last().map(|s| join(start, s.span())).unwrap_or(start);
            return Ok(Block { span, stmts });
        }

        // After ':', require NEWLINE INDENT ... DEDENT
        self.expect(TokenKind::Newline)?;
        let indent_tok = self.expect(TokenKind::Indent)?;

        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::Dedent) {
                let dedent = self.expect(TokenKind::Dedent)?;
                let end = stmts.last().map(Stmt::span).unwrap_or(dedent.span);
                let span = join(indent_tok.span, end);
                return Ok(Block { span, stmts });
            }
            if self.at(TokenKind::Eof) {
                return Err(ParseError {
                    message: "unterminated block; expected dedent".to_string(),
                    span: indent_tok.span,
                });
            }
            self.parse_stmt_into(&mut stmts)?;
        }
    }

    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.skip_newlines();
        if !self.at(TokenKind::Eof) {
            return Err(self.error_here("expected end of input"));
        }
        Ok(expr)
    }

    /// `a, b, c` as a tuple; a single expression stays as is.
    fn parse_expr_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_expr()?;
        if !self.at(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.at(TokenKind::Comma) {
            self.next();
            if self.at_stmt_end() || self.at(TokenKind::Eq) || self.at(TokenKind::Colon) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        let span = join(items[0].span, items[items.len() - 1].span);
        Ok(Expr::new(span, ExprKind::Tuple(items)))
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary_expr()
    }

    fn parse_ternary_expr(&mut self) -> Result<Expr, ParseError> {
        let then = self.parse_or_expr()?;
        if !self.at(TokenKind::KwIf) {
            return Ok(then);
        }
        self.next();
        let cond = self.parse_or_expr()?;
        self.expect(TokenKind::KwElse)?;
        let otherwise = self.parse_ternary_expr()?;
        let span = join(then.span, otherwise.span);
        Ok(Expr::new(
            span,
            ExprKind::IfExp {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        ))
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_bool_chain(TokenKind::KwOr, BoolOp::Or, Self::parse_and_expr)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_bool_chain(TokenKind::KwAnd, BoolOp::And, Self::parse_not_expr)
    }

    fn parse_bool_chain(
        &mut self,
        tok: TokenKind,
        op: BoolOp,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let first = operand(self)?;
        if !self.at(tok.clone()) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at(tok.clone()) {
            self.next();
            values.push(operand(self)?);
        }
        let span = join(values[0].span, values[values.len() - 1].span);
        Ok(Expr::new(span, ExprKind::BoolOp { op, values }))
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::KwNot) {
            let t = self.expect(TokenKind::KwNot)?;
            let expr = self.parse_not_expr()?;
            let span = join(t.span, expr.span);
            return Ok(Expr::new(
                span,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                },
            ));
        }
        self.parse_cmp_expr()
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_add_expr()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::EqEq) => Some(CmpOp::Eq),
                Some(TokenKind::Neq) => Some(CmpOp::Ne),
                Some(TokenKind::Lt) => Some(CmpOp::Lt),
                Some(TokenKind::Gt) => Some(CmpOp::Gt),
                Some(TokenKind::Le) => Some(CmpOp::Le),
                Some(TokenKind::Ge) => Some(CmpOp::Ge),
                _ => None,
            };
            let Some(op) = op else { break };
            self.next();
            rest.push((op, self.parse_add_expr()?));
        }
        let Some((_, last)) = rest.last() else {
            return Ok(first);
        };
        let span = join(first.span, last.span);
        Ok(Expr::new(
            span,
            ExprKind::Compare {
                first: Box::new(first),
                rest,
            },
        ))
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => Some(BinOp::Add),
                Some(TokenKind::Minus) => Some(BinOp::Sub),
                _ => None,
            };
            let Some(op) = op else { break };
            self.next();
            let right = self.parse_mul_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => Some(BinOp::Mul),
                Some(TokenKind::Slash) => Some(BinOp::Div),
                Some(TokenKind::SlashSlash) => Some(BinOp::FloorDiv),
                Some(TokenKind::Percent) => Some(BinOp::Mod),
                _ => None,
            };
            let Some(op) = op else { break };
            self.next();
            let right = self.parse_unary_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Plus) => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            let t = self.expect_any()?;
            let expr = self.parse_unary_expr()?;
            let span = join(t.span, expr.span);
            return Ok(Expr::new(
                span,
                ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
            ));
        }
        self.parse_power_expr()
    }

    fn parse_power_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix_expr()?;
        if !self.at(TokenKind::StarStar) {
            return Ok(base);
        }
        self.next();
        // Right-associative and binds tighter than a unary minus on its left.
        let exp = self.parse_unary_expr()?;
        Ok(binary(base, BinOp::Pow, exp))
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            if self.at(TokenKind::Dot) {
                self.next();
                let field = self.expect_ident()?;
                let span = join(expr.span, field.span);
                expr = Expr::new(
                    span,
                    ExprKind::Attribute {
                        base: Box::new(expr),
                        field,
                    },
                );
                continue;
            }

            if self.at(TokenKind::LBracket) {
                self.next();
                let mut indices = vec![self.parse_expr()?];
                while self.at(TokenKind::Comma) {
                    self.next();
                    if self.at(TokenKind::RBracket) {
                        break;
                    }
                    indices.push(self.parse_expr()?);
                }
                let rb = self.expect(TokenKind::RBracket)?;
                let span = join(expr.span, rb.span);
                expr = Expr::new(
                    span,
                    ExprKind::Index {
                        base: Box::new(expr),
                        indices,
                    },
                );
                continue;
            }

            if self.at(TokenKind::LParen) {
                let Some(callee) = expr.as_name().cloned() else {
                    return Err(ParseError {
                        message: "only named functions can be called".to_string(),
                        span: expr.span,
                    });
                };
                self.next();
                let args = self.parse_args()?;
                let rp = self.expect(TokenKind::RParen)?;
                let span = join(expr.span, rp.span);
                expr = Expr::new(span, ExprKind::Call { callee, args });
                continue;
            }

            break;
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<CallArg>, ParseError> {
        let mut args: Vec<CallArg> = Vec::new();
        if self.at(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            // Named arg: Ident '=' expr
            if matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
                && self.peek_kind_n(1).is_some_and(|k| matches!(k, TokenKind::Eq))
            {
                let name = self.expect_ident()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                args.push(CallArg::Named { name, value });
            } else {
                let expr = self.parse_expr()?;
                if self.at(TokenKind::KwFor) {
                    // `sum(x for x in xs)`: a bare generator must be the only argument.
                    let comp = self.parse_comprehension_tail(expr, ComprehensionKind::Generator)?;
                    if !args.is_empty() || !self.at(TokenKind::RParen) {
                        return Err(ParseError {
                            message: "a generator expression must be the only argument".to_string(),
                            span: comp.span,
                        });
                    }
                    args.push(CallArg::Positional(comp));
                    break;
                }
                if !args.is_empty() && matches!(args.last(), Some(CallArg::Named { .. })) {
                    return Err(ParseError {
                        message: "positional argument follows keyword argument".to_string(),
                        span: expr.span,
                    });
                }
                args.push(CallArg::Positional(expr));
            }

            if self.at(TokenKind::Comma) {
                self.next();
                if self.at(TokenKind::RParen) {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(args)
    }

    fn parse_comprehension_tail(
        &mut self,
        elt: Expr,
        kind: ComprehensionKind,
    ) -> Result<Expr, ParseError> {
        self.expect(TokenKind::KwFor)?;
        let targets = self.parse_targets()?;
        self.expect(TokenKind::KwIn)?;
        let iter = self.parse_or_expr()?;
        let mut filters = Vec::new();
        let mut end = iter.span;
        while self.at(TokenKind::KwIf) {
            self.next();
            let cond = self.parse_or_expr()?;
            end = cond.span;
            filters.push(cond);
        }
        if self.at(TokenKind::KwFor) {
            return Err(self.error_here(
                "comprehensions with more than one `for` clause are not supported; nest them instead",
            ));
        }
        let span = join(elt.span, end);
        Ok(Expr::new(
            span,
            ExprKind::Comprehension(Box::new(Comprehension {
                kind,
                elt,
                targets,
                iter,
                filters,
            })),
        ))
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self.expect_any()?;

        match tok.kind {
            TokenKind::Ident(name) => Ok(Expr::new(
                tok.span,
                ExprKind::Name(Ident {
                    span: tok.span,
                    node: name,
                }),
            )),
            TokenKind::Int(n) => {
                let value = i64::try_from(n).map_err(|_| ParseError {
                    message: "integer literal does not fit in 64 bits".to_string(),
                    span: tok.span,
                })?;
                Ok(Expr::new(tok.span, ExprKind::Int(value)))
            }
            TokenKind::Float(x) => Ok(Expr::new(tok.span, ExprKind::Float(x))),
            TokenKind::String(s) => Ok(Expr::new(tok.span, ExprKind::Str(s))),
            TokenKind::KwTrue => Ok(Expr::new(tok.span, ExprKind::Bool(true))),
            TokenKind::KwFalse => Ok(Expr::new(tok.span, ExprKind::Bool(false))),
            TokenKind::LParen => {
                if self.at(TokenKind::RParen) {
                    let rp = self.expect(TokenKind::RParen)?;
                    return Ok(Expr::new(join(tok.span, rp.span), ExprKind::Tuple(Vec::new())));
                }
                let first = self.parse_expr()?;
                if self.at(TokenKind::KwFor) {
                    let comp = self.parse_comprehension_tail(first, ComprehensionKind::Generator)?;
                    self.expect(TokenKind::RParen)?;
                    return Ok(comp);
                }
                if !self.at(TokenKind::Comma) {
                    self.expect(TokenKind::RParen)?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.at(TokenKind::Comma) {
                    self.next();
                    if self.at(TokenKind::RParen) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                let rp = self.expect(TokenKind::RParen)?;
                Ok(Expr::new(join(tok.span, rp.span), ExprKind::Tuple(items)))
            }
            TokenKind::LBracket => {
                if self.at(TokenKind::RBracket) {
                    let rb = self.expect(TokenKind::RBracket)?;
                    return Ok(Expr::new(join(tok.span, rb.span), ExprKind::List(Vec::new())));
                }
                let first = self.parse_expr()?;
                if self.at(TokenKind::KwFor) {
                    let comp = self.parse_comprehension_tail(first, ComprehensionKind::List)?;
                    let rb = self.expect(TokenKind::RBracket)?;
                    return Ok(Expr::new(join(tok.span, rb.span), comp.kind));
                }
                let mut items = vec![first];
                while self.at(TokenKind::Comma) {
                    self.next();
                    if self.at(TokenKind::RBracket) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                let rb = self.expect(TokenKind::RBracket)?;
                Ok(Expr::new(join(tok.span, rb.span), ExprKind::List(items)))
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.at(TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if self.at(TokenKind::Comma) {
                        self.next();
                        continue;
                    }
                    break;
                }
                let rb = self.expect(TokenKind::RBrace)?;
                Ok(Expr::new(join(tok.span, rb.span), ExprKind::Dict(entries)))
            }
            other => Err(ParseError {
                message: format!("expected an expression, found {}", other.describe()),
                span: tok.span,
            }),
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.next();
        }
    }

    fn at_stmt_end(&self) -> bool {
        self.at(TokenKind::Newline) || self.at(TokenKind::Semicolon) || self.at(TokenKind::Eof)
    }

    fn expect_stmt_terminator(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Newline) {
            self.next();
            Ok(())
        } else if self.at(TokenKind::Eof) || self.at(TokenKind::Dedent) {
            Ok(())
        } else {
            let found = self
                .peek_kind()
                .map(TokenKind::describe)
                .unwrap_or_else(|| "end of input".to_string());
            Err(self.error_here(&format!("expected end of line, found {found}")))
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Ident(name) => Ok(Ident {
                span: tok.span,
                node: name,
            }),
            other => Err(ParseError {
                message: format!("expected identifier, found {}", other.describe()),
                span: tok.span,
            }),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let tok = self.expect_any()?;
        if mem::discriminant(&tok.kind) == mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError {
                message: format!("expected {}, found {}", expected.describe(), tok.kind.describe()),
                span: tok.span,
            })
        }
    }

    fn expect_any(&mut self) -> Result<Token, ParseError> {
        self.next().ok_or_else(|| ParseError {
            message: "unexpected end of input".to_string(),
            span: self.end_span(),
        })
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            span: self.peek_span().unwrap_or_else(|| self.end_span()),
        }
    }

    fn end_span(&self) -> Span {
        self.tokens
            .last()
            .map(|t| t.span)
            .unwrap_or_else(|| span_between(0, 0))
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        Some(tok)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + n).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.idx).map(|t| t.span)
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = join(left.span, right.span);
    Expr::new(
        span,
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
    )
}

/// Names, subscripts and field accesses can be assigned; tuples of names only
/// on the left of a plain `=`.
fn check_assign_target(target: &Expr, allow_tuple: bool) -> Result<(), ParseError> {
    match &target.kind {
        ExprKind::Name(_) => Ok(()),
        ExprKind::Index { base, .. } | ExprKind::Attribute { base, .. } => {
            check_assign_target(base, false)
        }
        ExprKind::Tuple(items) if allow_tuple => {
            for item in items {
                if item.as_name().is_none() {
                    return Err(ParseError {
                        message: "tuple assignment targets must be plain names".to_string(),
                        span: item.span,
                    });
                }
            }
            Ok(())
        }
        _ => Err(ParseError {
            message: "invalid assignment target".to_string(),
            span: target.span,
        }),
    }
}
