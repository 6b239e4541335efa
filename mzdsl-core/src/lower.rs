#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use mzdsl_ast::{
    AnnAssignStmt, AssignStmt, AugAssignStmt, BinOp, Block, Direction, Expr, ExprKind, ForStmt,
    FunctionDef, Ident, IfStmt, Module, ObjectiveStmt, Span, Stmt,
};
use mzdsl_ir::{Constraint, DeclKind, Declaration, Goal, Program, TypeSpec, Value};
use tracing::{debug, info_span, trace};

use crate::error::{TranslationError, mismatch, redeclared, unresolved, unsupported};
use crate::fold;
use crate::operand::{Operand, VarRef};
use crate::render::{self, Prec, Rendered};
use crate::scope::{ScopeKind, Scopes, SymbolKind};
use crate::LowerConfig;

/// Lowers a parsed module to a flat program. `src` is the text `module` was
/// parsed from; it is used to compare repeated function definitions.
pub fn lower_module(module: &Module, src: &str, config: &LowerConfig) -> Result<Program, TranslationError> {
    let _span = info_span!("translate.lower", stmts = module.stmts.len()).entered();
    let mut translator = Translator::new(src, config.clone());
    translator.lower(module)?;
    let program = translator.finish();
    debug!(
        declarations = program.declarations.len(),
        constraints = program.constraints.len(),
        "lowered module"
    );
    Ok(program)
}

/// `name = name + amount` or `name -= amount`.
pub(crate) struct Step {
    pub op: BinOp,
    pub amount: Operand,
}

pub struct Translator<'src> {
    pub(crate) src: &'src str,
    pub(crate) config: LowerConfig,
    pub(crate) program: Program,
    pub(crate) scopes: Scopes,
    /// Conditions of the enclosing symbolic `if` branches, outermost first.
    pub(crate) guards: Vec<Rendered>,
    pub(crate) call_stack: Vec<String>,
    pub(crate) expansions: HashMap<String, usize>,
    pub(crate) executed: usize,
    /// Nonzero while rewriting a target-side comprehension body.
    pub(crate) native_depth: usize,
}

impl<'src> Translator<'src> {
    pub fn new(src: &'src str, config: LowerConfig) -> Self {
        let mut scopes = Scopes::new();
        scopes.define_global(
            &config.objective_name,
            SymbolKind::Local {
                value: Operand::int(0),
                guard_depth: 0,
            },
            mzdsl_ast::span(0, 0),
        );
        Self {
            src,
            config,
            program: Program::new(),
            scopes,
            guards: Vec::new(),
            call_stack: Vec::new(),
            expansions: HashMap::new(),
            executed: 0,
            native_depth: 0,
        }
    }

    pub fn lower(&mut self, module: &Module) -> Result<(), TranslationError> {
        for stmt in &module.stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Program {
        self.program
    }

    pub(crate) fn exec_block(&mut self, block: &Block) -> Result<(), TranslationError> {
        self.scopes.push(ScopeKind::Block);
        let result = self.exec_stmts(&block.stmts);
        self.scopes.pop();
        result
    }

    pub(crate) fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<(), TranslationError> {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), TranslationError> {
        self.executed += 1;
        if self.executed > self.config.max_unrolled_statements {
            return Err(unsupported(
                format!(
                    "unrolling exceeded the limit of {} statements",
                    self.config.max_unrolled_statements
                ),
                stmt.span(),
            ));
        }
        match stmt {
            Stmt::Assign(a) => self.lower_assign(a),
            Stmt::AnnAssign(a) => self.lower_ann_assign(a),
            Stmt::AugAssign(a) => self.lower_aug_assign(a),
            Stmt::For(f) => self.lower_for(f),
            Stmt::If(i) => self.lower_if(i),
            Stmt::Assert(a) => {
                let op = self.eval(&a.expr)?;
                self.assert_operand(op, a.expr.span)
            }
            Stmt::Return(r) => Err(unsupported("`return` outside a function", r.span)),
            Stmt::FunctionDef(def) => self.define_function(def),
            Stmt::Objective(o) => self.lower_objective(o),
            Stmt::Pass(_) => Ok(()),
            Stmt::ExprStmt(e) => {
                if let ExprKind::Call { callee, args } = &e.kind {
                    self.call(callee, args, e.span)?;
                } else {
                    self.eval(e)?;
                }
                Ok(())
            }
        }
    }

    fn lower_assign(&mut self, a: &AssignStmt) -> Result<(), TranslationError> {
        match &a.target.kind {
            ExprKind::Name(id) => {
                if self.is_type_expr(&a.value) {
                    return self.define_type_alias(id, &a.value, a.span);
                }
                if is_constant_name(&id.node) {
                    return self.declare_constant(id, None, &a.value, a.span);
                }
                if let Some((op, amount, commuted)) = step_pattern(&id.node, &a.value) {
                    return self.step_name(id, op, amount, commuted, a.span);
                }
                let value = self.eval(&a.value)?;
                let updates = mentions(&a.value, &id.node);
                self.rebind(id, value, None, updates, a.span)
            }
            ExprKind::Tuple(targets) => {
                let value = self.eval(&a.value)?;
                let parts = self.unpack(value, targets.len(), a.value.span)?;
                for (target, part) in targets.iter().zip(parts) {
                    let Some(id) = target.as_name() else {
                        return Err(unsupported("only names can be unpacked into", target.span));
                    };
                    if is_constant_name(&id.node) {
                        let Operand::Const { value, .. } = part else {
                            return Err(unresolved(
                                format!("constant `{}` must be known at translation time", id.node),
                                a.value.span,
                            ));
                        };
                        self.register_constant(id, None, value, a.span)?;
                    } else {
                        self.bind(id, part, None, a.span)?;
                    }
                }
                Ok(())
            }
            _ => {
                let value = self.eval(&a.value)?;
                self.assign_element(&a.target, value, None, a.span)
            }
        }
    }

    fn lower_aug_assign(&mut self, a: &AugAssignStmt) -> Result<(), TranslationError> {
        let step = matches!(a.op, BinOp::Add | BinOp::Sub);
        match &a.target.kind {
            ExprKind::Name(id) if step => self.step_name(id, a.op, &a.value, false, a.span),
            ExprKind::Name(id) => {
                let old = self.eval(&a.target)?;
                let amount = self.eval(&a.value)?;
                let new = self.binary_operands(old, a.op, amount, a.span)?;
                self.rebind(id, new, None, true, a.span)
            }
            _ => {
                let old = self.eval(&a.target)?;
                let amount = self.eval(&a.value)?;
                let new = self.binary_operands(old, a.op, amount.clone(), a.span)?;
                let step = step.then(|| Step { op: a.op, amount });
                self.assign_element(&a.target, new, step, a.span)
            }
        }
    }

    fn step_name(
        &mut self,
        id: &Ident,
        op: BinOp,
        amount: &Expr,
        commuted: bool,
        span: Span,
    ) -> Result<(), TranslationError> {
        let old = self.eval_name(id)?;
        let amount = self.eval(amount)?;
        let new = if commuted {
            self.binary_operands(amount.clone(), op, old, span)?
        } else {
            self.binary_operands(old, op, amount.clone(), span)?
        };
        // A prepended list is not an accumulation step.
        let step = (!commuted || !new.is_list_like()).then_some(Step { op, amount });
        self.rebind(id, new, step, true, span)
    }

    /// Rebinds `id`: an equality constraint for decision variables, a
    /// guard-aware update for symbolic bindings.
    pub(crate) fn bind(
        &mut self,
        id: &Ident,
        value: Operand,
        step: Option<Step>,
        span: Span,
    ) -> Result<(), TranslationError> {
        let updates = step.is_some();
        self.rebind(id, value, step, updates, span)
    }

    /// As [`Self::bind`]. Inside a function, an outer symbolic binding is
    /// only updated when `updates` is set, i.e. the new value was computed
    /// from the old one; otherwise the assignment starts a fresh local.
    fn rebind(
        &mut self,
        id: &Ident,
        value: Operand,
        step: Option<Step>,
        updates: bool,
        span: Span,
    ) -> Result<(), TranslationError> {
        let name = id.node.as_str();
        let current = match self.scopes.lookup_frame(name) {
            Some(sym) => Some(sym.kind.clone()),
            None => self
                .scopes
                .lookup(name)
                .filter(|sym| updates || !matches!(sym.kind, SymbolKind::Local { .. }))
                .map(|sym| sym.kind.clone()),
        };
        match current {
            Some(SymbolKind::Variable { target, ty }) => self.equate(&VarRef::new(target, ty), value, span),
            Some(SymbolKind::Local { value: old, guard_depth }) => {
                let merged = self.merge(old, value, step, guard_depth, span)?;
                if let Some(sym) = self.scopes.lookup_mut(name) {
                    sym.kind = SymbolKind::Local {
                        value: merged,
                        guard_depth,
                    };
                }
                Ok(())
            }
            Some(SymbolKind::Constant { .. }) => Err(redeclared(
                format!("constant `{name}` cannot be reassigned"),
                id.span,
            )),
            Some(other @ (SymbolKind::Type(_) | SymbolKind::Function { .. })) => {
                let what = if matches!(other, SymbolKind::Type(_)) { "type" } else { "function" };
                Err(redeclared(format!("`{name}` is already defined as a {what}"), id.span))
            }
            None => {
                self.scopes.define(
                    name,
                    SymbolKind::Local {
                        value,
                        guard_depth: self.guards.len(),
                    },
                    id.span,
                );
                Ok(())
            }
        }
    }

    /// Combines the previous and the new value of a binding under the guards
    /// opened since the binding was created.
    fn merge(
        &self,
        old: Operand,
        new: Operand,
        step: Option<Step>,
        guard_depth: usize,
        span: Span,
    ) -> Result<Operand, TranslationError> {
        let guards = &self.guards[guard_depth.min(self.guards.len())..];
        if guards.is_empty() {
            if let Some(Step { op: BinOp::Add, amount }) = &step {
                if old.as_value() == Some(&Value::Int(0)) && !new.is_const() && !amount.is_list_like() {
                    return Ok(Operand::Expr(self.render(amount, span)?.numeric()));
                }
            }
            return Ok(new);
        }
        let cond = render::conjunction(guards.to_vec());
        if let Some(Step { op, amount }) = step {
            if amount.as_value().is_some_and(|v| v.as_f64() == Some(0.0)) {
                return Ok(old);
            }
            let gate = cond.numeric();
            let term = match amount.as_int() {
                Some(1) if matches!(amount.as_value(), Some(Value::Int(_))) => gate,
                _ => render::binary(gate, BinOp::Mul, self.render(&amount, span)?),
            };
            if op == BinOp::Add && old.as_value() == Some(&Value::Int(0)) {
                return Ok(Operand::Expr(term));
            }
            return Ok(Operand::Expr(render::binary(self.render(&old, span)?, op, term)));
        }
        if old == new {
            return Ok(old);
        }
        let scalar = |op: &Operand| !op.is_list_like() && !matches!(op, Operand::Tuple(_) | Operand::Record(_));
        if !scalar(&old) || !scalar(&new) {
            return Err(unsupported(
                "a list or tuple cannot be reassigned under a symbolic condition",
                span,
            ));
        }
        let then = self.render(&new, span)?;
        let otherwise = self.render(&old, span)?;
        Ok(Operand::Expr(render::if_then_else(cond, then, otherwise)))
    }

    fn assign_element(
        &mut self,
        target: &Expr,
        value: Operand,
        step: Option<Step>,
        span: Span,
    ) -> Result<(), TranslationError> {
        let Some(root) = target_root(target) else {
            return Err(unsupported("unsupported assignment target", target.span));
        };
        let name = root.node.as_str();
        let kind = self.scopes.lookup(name).map(|s| s.kind.clone());
        let (container, guard_depth) = match kind {
            Some(SymbolKind::Local { value, guard_depth }) => (value, guard_depth),
            Some(SymbolKind::Variable { .. }) => {
                let Operand::Var(lhs) = self.eval(target)? else {
                    return Err(mismatch("assignment target is not part of a variable", target.span));
                };
                return self.equate(&lhs, value, span);
            }
            Some(SymbolKind::Constant { .. }) => {
                return Err(redeclared(format!("constant `{name}` cannot be modified"), root.span));
            }
            Some(_) => return Err(mismatch(format!("`{name}` cannot be assigned into"), root.span)),
            None => {
                let path = self.element_path(target)?;
                if !self.guards.is_empty() {
                    return Err(mismatch(
                        format!("`{name}` is first assigned under a symbolic condition"),
                        root.span,
                    ));
                }
                let table = set_path(Operand::Table(BTreeMap::new()), &path, value, self.first_index(), span)?;
                self.scopes.define_in_frame(
                    name,
                    SymbolKind::Local {
                        value: table,
                        guard_depth: self.guards.len(),
                    },
                    root.span,
                );
                return Ok(());
            }
        };
        if let Operand::Var(_) = container {
            let Operand::Var(lhs) = self.eval(target)? else {
                return Err(mismatch("assignment target is not part of a variable", target.span));
            };
            return self.equate(&lhs, value, span);
        }
        let path = self.element_path(target)?;
        let new = if self.guards.len() > guard_depth {
            let Some(old) = get_path(&container, &path, self.first_index()) else {
                return Err(mismatch(
                    format!("element of `{name}` is assigned under a symbolic condition without a prior value"),
                    target.span,
                ));
            };
            self.merge(old, value, step, guard_depth, span)?
        } else {
            value
        };
        let updated = set_path(container, &path, new, self.first_index(), span)?;
        if let Some(sym) = self.scopes.lookup_mut(name) {
            sym.kind = SymbolKind::Local {
                value: updated,
                guard_depth,
            };
        }
        Ok(())
    }

    fn element_path(&mut self, target: &Expr) -> Result<Vec<i64>, TranslationError> {
        let mut exprs = Vec::new();
        let mut cur = target;
        loop {
            match &cur.kind {
                ExprKind::Name(_) => break,
                ExprKind::Index { base, indices } => {
                    exprs.extend(indices.iter().rev());
                    cur = base;
                }
                _ => {
                    return Err(unsupported(
                        "only subscripts can be assigned into a local list",
                        cur.span,
                    ));
                }
            }
        }
        exprs.reverse();
        let mut path = Vec::with_capacity(exprs.len());
        for e in exprs {
            let op = self.eval(e)?;
            let Some(i) = op.as_int() else {
                return Err(unresolved("index into a local list must be known at translation time", e.span));
            };
            path.push(i);
        }
        Ok(path)
    }

    /// `lhs = rhs` under the current guards.
    pub(crate) fn equate(&mut self, lhs: &VarRef, rhs: Operand, span: Span) -> Result<(), TranslationError> {
        if lhs.ty.is_list() != rhs.is_list_like() {
            return Err(mismatch(
                format!(
                    "cannot assign a {} to `{}` of type {}",
                    rhs.describe(),
                    lhs.text(),
                    lhs.ty.display()
                ),
                span,
            ));
        }
        if let Some(v) = rhs.as_value() {
            if let (Some(have), want) = (v.dims(), lhs.ty.dims()) {
                if lhs.ty.is_list() && have != want {
                    return Err(mismatch(
                        format!("list of shape {have:?} does not fit `{}` of shape {want:?}", lhs.text()),
                        span,
                    ));
                }
            }
        }
        let kind = if lhs.ty.is_list() { None } else { Some(lhs.ty.shape()) };
        let left = Rendered::atom(lhs.text(), kind);
        let right = self.render(&rhs, span)?;
        self.emit(render::compare(&left, mzdsl_ast::CmpOp::Eq, &right));
        Ok(())
    }

    pub(crate) fn assert_operand(&mut self, op: Operand, span: Span) -> Result<(), TranslationError> {
        if let Some(value) = op.as_value() {
            if fold::truthy(value) {
                trace!("assertion folds to true");
                return Ok(());
            }
            self.emit(Rendered::atom("false", Some(mzdsl_ir::Shape::Bool)));
            return Ok(());
        }
        if op.is_list_like() {
            return Err(mismatch("an assertion must be a boolean expression", span));
        }
        let body = self.render(&op, span)?;
        self.emit(body);
        Ok(())
    }

    pub(crate) fn emit(&mut self, body: Rendered) {
        let body = body.truthy();
        let constraint = if self.guards.is_empty() {
            Constraint::unconditional(body.text)
        } else {
            Constraint {
                guards: self.guards.iter().map(|g| g.clone().truthy().at(Prec::And)).collect(),
                body: body.at(Prec::Or),
            }
        };
        trace!(guards = constraint.guards.len(), body = %constraint.body, "constraint");
        self.program.constrain(constraint);
    }

    fn lower_ann_assign(&mut self, a: &AnnAssignStmt) -> Result<(), TranslationError> {
        let ty = self.resolve_type(&a.annotation)?;
        match &a.value {
            Some(value) if is_constant_name(&a.target.node) => {
                self.declare_constant(&a.target, Some(ty), value, a.span)
            }
            value => self.declare_variable(&a.target, ty, value.as_ref(), a.span),
        }
    }

    fn declare_constant(
        &mut self,
        id: &Ident,
        ty: Option<TypeSpec>,
        expr: &Expr,
        span: Span,
    ) -> Result<(), TranslationError> {
        let Operand::Const { value, .. } = self.eval(expr)? else {
            return Err(unresolved(
                format!("constant `{}` must be known at translation time", id.node),
                expr.span,
            ));
        };
        self.register_constant(id, ty, value, span)
    }

    fn register_constant(
        &mut self,
        id: &Ident,
        ty: Option<TypeSpec>,
        value: Value,
        span: Span,
    ) -> Result<(), TranslationError> {
        let name = id.node.as_str();
        let value = match &ty {
            Some(ty) => {
                let value = crate::types::coerce(value, ty);
                if !value.conforms_to(ty) {
                    return Err(mismatch(
                        format!("value {} of `{name}` does not fit {}", value.render(), ty.display()),
                        span,
                    ));
                }
                value
            }
            None => value,
        };
        if let Some(sym) = self.scopes.lookup(name) {
            if !matches!(sym.kind, SymbolKind::Constant { .. }) {
                return Err(redeclared(
                    format!("`{name}` is already bound as a {}", sym.describe()),
                    id.span,
                ));
            }
        }
        let decl_ty = match &ty {
            Some(ty) => ty.clone(),
            None => crate::types::type_of_value(&value, span)?,
        };
        let decl = Declaration {
            name: name.to_string(),
            kind: DeclKind::Constant,
            ty: decl_ty,
            value: Some(value.clone()),
            span,
        };
        if let Err(existing) = self.program.declare(decl) {
            let msg = match &existing.value {
                Some(old) => format!("`{name}` is already declared as {}", old.render()),
                None => format!("`{name}` is already declared"),
            };
            return Err(redeclared(msg, id.span));
        }
        debug!(name, value = %value.render(), "constant");
        self.scopes.define_global(name, SymbolKind::Constant { ty, value }, id.span);
        Ok(())
    }

    fn declare_variable(
        &mut self,
        id: &Ident,
        ty: TypeSpec,
        value: Option<&Expr>,
        span: Span,
    ) -> Result<(), TranslationError> {
        let name = id.node.as_str();
        if let Some(sym) = self.scopes.lookup_frame(name) {
            let implicit = name == self.config.objective_name && sym.scope == 0;
            if !matches!(sym.kind, SymbolKind::Variable { .. }) && !implicit {
                return Err(redeclared(
                    format!("`{name}` is already bound as a {}", sym.describe()),
                    id.span,
                ));
            }
        }
        let target = self.mangle(name);
        let decl = Declaration {
            name: target.clone(),
            kind: DeclKind::Variable,
            ty: ty.clone(),
            value: None,
            span,
        };
        if let Err(existing) = self.program.declare(decl) {
            let msg = match existing.kind {
                DeclKind::Variable => format!("`{name}` is already declared as {}", existing.ty.display()),
                DeclKind::Constant => format!("`{name}` is already declared as a constant"),
                DeclKind::TypeAlias => format!("`{name}` is already declared as a type"),
            };
            return Err(redeclared(msg, id.span));
        }
        self.scopes.define_in_frame(
            name,
            SymbolKind::Variable {
                target: target.clone(),
                ty: ty.clone(),
            },
            id.span,
        );
        if let Some(expr) = value {
            let rhs = self.eval(expr)?;
            self.equate(&VarRef::new(target, ty), rhs, expr.span)?;
        }
        Ok(())
    }

    /// Program-level name of a variable declared in the current frame.
    fn mangle(&self, name: &str) -> String {
        let mut out = name.to_string();
        for (func, expansion) in self.scopes.expansions() {
            out.push_str(&format!("__{func}__{expansion}"));
        }
        out
    }

    fn define_type_alias(&mut self, id: &Ident, value: &Expr, span: Span) -> Result<(), TranslationError> {
        let name = id.node.as_str();
        let ty = self.resolve_type_as(value, Some(name))?;
        if let Some(sym) = self.scopes.lookup(name) {
            if !matches!(sym.kind, SymbolKind::Type(_)) {
                return Err(redeclared(
                    format!("`{name}` is already bound as a {}", sym.describe()),
                    id.span,
                ));
            }
        }
        let decl = Declaration {
            name: name.to_string(),
            kind: DeclKind::TypeAlias,
            ty: ty.clone(),
            value: None,
            span,
        };
        if self.program.declare(decl).is_err() {
            return Err(redeclared(format!("type `{name}` is already defined differently"), id.span));
        }
        self.scopes.define_global(
            name,
            SymbolKind::Type(TypeSpec::Named {
                name: name.to_string(),
                target: Box::new(ty),
            }),
            id.span,
        );
        Ok(())
    }

    fn define_function(&mut self, def: &FunctionDef) -> Result<(), TranslationError> {
        let name = def.name.node.as_str();
        let start: usize = def.span.offset();
        let source = self
            .src
            .get(start..start + def.span.len())
            .unwrap_or_default()
            .to_string();
        if let Some(sym) = self.scopes.lookup(name) {
            return match &sym.kind {
                SymbolKind::Function { source: existing, .. } if *existing == source => Ok(()),
                _ => Err(redeclared(format!("`{name}` is already defined"), def.name.span)),
            };
        }
        let last = def.body.stmts.len().saturating_sub(1);
        for (i, stmt) in def.body.stmts.iter().enumerate() {
            if let Some(span) = misplaced_return(stmt, i == last) {
                return Err(unsupported("`return` must be the last statement of a function", span));
            }
        }
        self.scopes.define_in_frame(
            name,
            SymbolKind::Function {
                def: Rc::new(def.clone()),
                source,
            },
            def.name.span,
        );
        Ok(())
    }

    fn lower_for(&mut self, f: &ForStmt) -> Result<(), TranslationError> {
        let items = self.iterate(&f.iter)?;
        debug!(iterations = items.len(), "unrolling loop");
        for item in items {
            self.scopes.push(ScopeKind::Block);
            let result = self
                .bind_targets(&f.targets, item, f.iter.span)
                .and_then(|()| self.exec_stmts(&f.body.stmts));
            self.scopes.pop();
            result?;
        }
        Ok(())
    }

    fn lower_if(&mut self, i: &IfStmt) -> Result<(), TranslationError> {
        let cond = self.eval(&i.cond)?;
        if let Some(value) = cond.as_value() {
            return if fold::truthy(value) {
                self.exec_block(&i.then_block)
            } else if let Some(else_block) = &i.else_block {
                self.exec_block(else_block)
            } else {
                Ok(())
            };
        }
        if cond.is_list_like() {
            return Err(mismatch("a condition must be a boolean expression", i.cond.span));
        }
        let cond = self.render(&cond, i.cond.span)?.truthy();
        self.guards.push(cond.clone());
        let result = self.exec_block(&i.then_block);
        self.guards.pop();
        result?;
        if let Some(else_block) = &i.else_block {
            self.guards.push(render::not(cond));
            let result = self.exec_block(else_block);
            self.guards.pop();
            result?;
        }
        Ok(())
    }

    fn lower_objective(&mut self, o: &ObjectiveStmt) -> Result<(), TranslationError> {
        if !self.guards.is_empty() {
            return Err(unsupported("the objective cannot be set under a symbolic condition", o.span));
        }
        if self.program.goal != Goal::Satisfy {
            return Err(redeclared("the objective is already set", o.span));
        }
        let op = self.eval(&o.expr)?;
        if op.is_list_like() {
            return Err(mismatch("the objective must be a number", o.expr.span));
        }
        let text = self.render(&op, o.expr.span)?.numeric().text;
        self.program.goal = match o.direction {
            Direction::Minimize => Goal::Minimize(text),
            Direction::Maximize => Goal::Maximize(text),
        };
        Ok(())
    }
}

/// Names without lowercase letters (`N`, `MAX_LOAD`) denote constants.
pub(crate) fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase()) && !name.chars().any(|c| c.is_ascii_lowercase())
}

/// `name + k`, `name - k` or `k + name`; the flag marks the commuted form.
fn step_pattern<'e>(name: &str, value: &'e Expr) -> Option<(BinOp, &'e Expr, bool)> {
    match &value.kind {
        ExprKind::Binary { left, op: op @ (BinOp::Add | BinOp::Sub), right }
            if left.as_name().is_some_and(|id| id.node == name) =>
        {
            Some((*op, right.as_ref(), false))
        }
        ExprKind::Binary { left, op: BinOp::Add, right } if right.as_name().is_some_and(|id| id.node == name) => {
            Some((BinOp::Add, left.as_ref(), true))
        }
        _ => None,
    }
}

/// Whether `expr` reads the name `name`.
fn mentions(expr: &Expr, name: &str) -> bool {
    match &expr.kind {
        ExprKind::Name(id) => id.node == name,
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Bool(_) | ExprKind::Str(_) => false,
        ExprKind::List(items) | ExprKind::Tuple(items) => items.iter().any(|e| mentions(e, name)),
        ExprKind::Dict(pairs) => pairs.iter().any(|(k, v)| mentions(k, name) || mentions(v, name)),
        ExprKind::Unary { expr, .. } => mentions(expr, name),
        ExprKind::Binary { left, right, .. } => mentions(left, name) || mentions(right, name),
        ExprKind::Compare { first, rest } => mentions(first, name) || rest.iter().any(|(_, e)| mentions(e, name)),
        ExprKind::BoolOp { values, .. } => values.iter().any(|e| mentions(e, name)),
        ExprKind::IfExp { cond, then, otherwise } => {
            mentions(cond, name) || mentions(then, name) || mentions(otherwise, name)
        }
        ExprKind::Call { args, .. } => args.iter().any(|a| mentions(a.value(), name)),
        ExprKind::Attribute { base, .. } => mentions(base, name),
        ExprKind::Index { base, indices } => mentions(base, name) || indices.iter().any(|e| mentions(e, name)),
        ExprKind::Comprehension(c) => {
            mentions(&c.iter, name)
                || (!c.targets.iter().any(|t| t.node == name)
                    && (mentions(&c.elt, name) || c.filters.iter().any(|e| mentions(e, name))))
        }
    }
}

fn target_root(expr: &Expr) -> Option<&Ident> {
    match &expr.kind {
        ExprKind::Name(id) => Some(id),
        ExprKind::Index { base, .. } | ExprKind::Attribute { base, .. } => target_root(base),
        _ => None,
    }
}

fn misplaced_return(stmt: &Stmt, last: bool) -> Option<Span> {
    match stmt {
        Stmt::Return(r) if !last => Some(r.span),
        Stmt::For(f) => f.body.stmts.iter().find_map(|s| misplaced_return(s, false)),
        Stmt::If(i) => i
            .then_block
            .stmts
            .iter()
            .chain(i.else_block.iter().flat_map(|b| b.stmts.iter()))
            .find_map(|s| misplaced_return(s, false)),
        _ => None,
    }
}

fn get_path(container: &Operand, path: &[i64], first: i64) -> Option<Operand> {
    let Some((&head, rest)) = path.split_first() else {
        return Some(container.clone());
    };
    let child = match container {
        Operand::Table(map) => map.get(&head).cloned(),
        Operand::Items(items) => position(head, first, items.len()).map(|p| items[p].clone()),
        Operand::Const { value: Value::List(values), .. } => {
            position(head, first, values.len()).map(|p| Operand::value(values[p].clone()))
        }
        _ => None,
    }?;
    get_path(&child, rest, first)
}

fn set_path(
    container: Operand,
    path: &[i64],
    value: Operand,
    first: i64,
    span: Span,
) -> Result<Operand, TranslationError> {
    let Some((&head, rest)) = path.split_first() else {
        return Ok(value);
    };
    match container {
        Operand::Table(mut map) => {
            let child = map.remove(&head).unwrap_or_else(|| Operand::Table(BTreeMap::new()));
            map.insert(head, set_path(child, rest, value, first, span)?);
            Ok(Operand::Table(map))
        }
        Operand::Items(mut items) => {
            let Some(p) = position(head, first, items.len()) else {
                return Err(out_of_range(head, items.len(), span));
            };
            let child = std::mem::replace(&mut items[p], Operand::int(0));
            items[p] = set_path(child, rest, value, first, span)?;
            Ok(Operand::list(items))
        }
        Operand::Const { value: Value::List(values), .. } => {
            let items = values.into_iter().map(Operand::value).collect();
            set_path(Operand::Items(items), path, value, first, span)
        }
        other => Err(mismatch(format!("cannot assign an element of a {}", other.describe()), span)),
    }
}

pub(crate) fn position(index: i64, first: i64, len: usize) -> Option<usize> {
    let p = usize::try_from(index.checked_sub(first)?).ok()?;
    (p < len).then_some(p)
}

pub(crate) fn out_of_range(index: i64, len: usize, span: Span) -> TranslationError {
    mismatch(format!("index {index} is out of range for a list of length {len}"), span)
}
