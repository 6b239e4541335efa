#![forbid(unsafe_code)]

use std::rc::Rc;

use mzdsl_ast::{CallArg, FunctionDef, Ident, Span, Stmt};
use tracing::debug;

use crate::error::{ErrorKind, TranslationError, mismatch, unsupported};
use crate::lower::Translator;
use crate::operand::Operand;
use crate::scope::{ScopeKind, SymbolKind};

impl Translator<'_> {
    /// Expands a call to a user function in place. Parameters are bound to
    /// the argument operands; a parameter whose argument was a bare local
    /// name hands its final value back to that name.
    pub(crate) fn call_function(
        &mut self,
        def: Rc<FunctionDef>,
        args: &[CallArg],
        span: Span,
    ) -> Result<Option<Operand>, TranslationError> {
        let name = def.name.node.as_str();
        if self.native_depth > 0 {
            return Err(unsupported(
                format!("`{name}` cannot be expanded inside a target-side aggregate"),
                span,
            ));
        }
        if let Some(pos) = self.call_stack.iter().position(|f| f == name) {
            let mut chain = self.call_stack[pos..].to_vec();
            chain.push(name.to_string());
            return Err(TranslationError::new(
                ErrorKind::Recursion,
                format!("recursive call to `{name}` ({})", chain.join(" -> ")),
                span,
            ));
        }

        let names: Vec<&str> = def.params.iter().map(|p| p.name.node.as_str()).collect();
        let bound = crate::types::bind_args(args, &names, &def.name)?;
        let mut values = Vec::with_capacity(bound.len());
        let mut write_back: Vec<(usize, Ident)> = Vec::new();
        for (i, (param, arg)) in def.params.iter().zip(&bound).enumerate() {
            let Some(arg) = arg else {
                return Err(mismatch(
                    format!("`{name}` is missing argument `{}`", param.name.node),
                    span,
                ));
            };
            let value = self.eval(arg)?;
            if let Some(annotation) = &param.annotation {
                let ty = self.resolve_type(annotation)?;
                if ty.is_list() != value.is_list_like() {
                    return Err(mismatch(
                        format!(
                            "argument `{}` of `{name}` expects {}, found a {}",
                            param.name.node,
                            ty.display(),
                            value.describe()
                        ),
                        arg.span,
                    ));
                }
            }
            if let Some(id) = arg.as_name() {
                let local = self
                    .scopes
                    .lookup_frame(&id.node)
                    .is_some_and(|s| matches!(s.kind, SymbolKind::Local { .. }));
                if local {
                    write_back.push((i, id.clone()));
                }
            }
            values.push(value);
        }
        if let Some(ret) = &def.ret {
            self.resolve_type(ret)?;
        }

        let expansion = {
            let n = self.expansions.entry(name.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        debug!(function = name, expansion, depth = self.call_stack.len() + 1, "inlining call");

        self.call_stack.push(name.to_string());
        self.scopes.push(ScopeKind::Function {
            name: name.to_string(),
            expansion,
        });
        let depth = self.guards.len();
        for (param, value) in def.params.iter().zip(&values) {
            self.scopes.define(
                &param.name.node,
                SymbolKind::Local {
                    value: value.clone(),
                    guard_depth: depth,
                },
                param.name.span,
            );
        }
        let result = self.inline_body(&def);
        let finals: Vec<Option<Operand>> = write_back
            .iter()
            .map(|(i, _)| match self.scopes.lookup_frame(&def.params[*i].name.node).map(|s| &s.kind) {
                Some(SymbolKind::Local { value, .. }) => Some(value.clone()),
                _ => None,
            })
            .collect();
        self.scopes.pop();
        self.call_stack.pop();
        let ret = result.map_err(|err| err.with_call_site(span))?;

        for ((i, id), last) in write_back.into_iter().zip(finals) {
            match last {
                Some(last) if last != values[i] => self.bind(&id, last, None, span)?,
                _ => {}
            }
        }
        Ok(ret)
    }

    fn inline_body(&mut self, def: &FunctionDef) -> Result<Option<Operand>, TranslationError> {
        let stmts = &def.body.stmts;
        let (body, ret) = match stmts.split_last() {
            Some((Stmt::Return(ret), body)) => (body, Some(ret)),
            _ => (stmts.as_slice(), None),
        };
        self.exec_stmts(body)?;
        match ret.and_then(|r| r.value.as_ref()) {
            Some(value) => self.eval(value).map(Some),
            None => Ok(None),
        }
    }
}
