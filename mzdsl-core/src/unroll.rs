#![forbid(unsafe_code)]

use mzdsl_ast::{CallArg, Comprehension, Expr, ExprKind, Ident, Span};
use mzdsl_ir::{Shape, Value};
use tracing::debug;

use crate::error::{TranslationError, mismatch, unresolved, unsupported};
use crate::lower::Translator;
use crate::operand::Operand;
use crate::render::{self, Prec, Rendered};
use crate::scope::{ScopeKind, SymbolKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Sum,
    All,
    Any,
    Min,
    Max,
}

impl Aggregate {
    fn target_name(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::All => "forall",
            Aggregate::Any => "exists",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

/// One element produced by a comprehension. `filter` is set when an `if`
/// clause could not be decided at translation time.
pub(crate) struct Item {
    pub value: Operand,
    pub filter: Option<Rendered>,
}

impl Translator<'_> {
    /// Values an iterable takes, in order.
    pub(crate) fn iterate(&mut self, iter: &Expr) -> Result<Vec<Operand>, TranslationError> {
        if let ExprKind::Call { callee, args } = &iter.kind {
            if self.scopes.lookup(&callee.node).is_none() {
                match callee.node.as_str() {
                    "range" => {
                        let (lo, hi) = self.range_bounds(callee, args)?;
                        self.check_iterations(hi.saturating_sub(lo), iter.span)?;
                        return Ok((lo..hi).map(Operand::int).collect());
                    }
                    "enumerate" => return self.enumerate(callee, args, iter.span),
                    _ => {}
                }
            }
        }
        let op = self.eval(iter)?;
        self.elements(&op, iter.span)
    }

    pub(crate) fn check_iterations(&self, n: i64, span: Span) -> Result<(), TranslationError> {
        if usize::try_from(n).is_ok_and(|n| n > self.config.max_unrolled_statements) {
            return Err(unsupported(
                format!(
                    "a loop of {n} iterations exceeds the limit of {} unrolled statements",
                    self.config.max_unrolled_statements
                ),
                span,
            ));
        }
        Ok(())
    }

    /// Half-open `[lo, hi)` of a `range(hi)` or `range(lo, hi)` call.
    fn range_bounds(&mut self, callee: &Ident, args: &[CallArg]) -> Result<(i64, i64), TranslationError> {
        let exprs: Vec<&Expr> = args
            .iter()
            .map(|a| match a {
                CallArg::Positional(e) => Ok(e),
                CallArg::Named { name, .. } => Err(mismatch("`range` takes no keyword arguments", name.span)),
            })
            .collect::<Result<_, _>>()?;
        let mut bounds = Vec::with_capacity(exprs.len());
        for e in &exprs {
            let op = self.eval(e)?;
            match op.as_value() {
                Some(Value::Int(n)) => bounds.push(*n),
                Some(other) => {
                    return Err(mismatch(
                        format!("`range` bounds must be integers, not {}", other.kind_name()),
                        e.span,
                    ));
                }
                None => return Err(unresolved("`range` bounds must be known at translation time", e.span)),
            }
        }
        match bounds.as_slice() {
            [hi] => Ok((0, *hi)),
            [lo, hi] => Ok((*lo, *hi)),
            [_, _, _] => Err(unsupported("`range` with a step is not supported", callee.span)),
            _ => Err(mismatch("`range` takes one or two arguments", callee.span)),
        }
    }

    fn enumerate(&mut self, callee: &Ident, args: &[CallArg], span: Span) -> Result<Vec<Operand>, TranslationError> {
        let bound = crate::types::bind_args(args, &["iterable", "start"], callee)?;
        let Some(iterable) = bound[0] else {
            return Err(mismatch("`enumerate` needs an iterable", span));
        };
        let start = match bound[1] {
            Some(e) => self
                .eval(e)?
                .as_int()
                .ok_or_else(|| unresolved("`enumerate` start must be known at translation time", e.span))?,
            None => self.first_index(),
        };
        let items = self.iterate(iterable)?;
        Ok((start..)
            .zip(items)
            .map(|(i, item)| Operand::Tuple(vec![Operand::int(i), item]))
            .collect())
    }

    /// Binds loop targets in the innermost scope; shadowing is allowed.
    pub(crate) fn bind_targets(&mut self, targets: &[Ident], item: Operand, span: Span) -> Result<(), TranslationError> {
        let depth = self.guards.len();
        if let [target] = targets {
            self.scopes.define(
                &target.node,
                SymbolKind::Local {
                    value: item,
                    guard_depth: depth,
                },
                target.span,
            );
            return Ok(());
        }
        let parts = self.unpack(item, targets.len(), span)?;
        for (target, part) in targets.iter().zip(parts) {
            self.scopes.define(
                &target.node,
                SymbolKind::Local {
                    value: part,
                    guard_depth: depth,
                },
                target.span,
            );
        }
        Ok(())
    }

    /// Unrolled elements of a comprehension, with undecided filters kept.
    pub(crate) fn comprehension_items(&mut self, comp: &Comprehension) -> Result<Vec<Item>, TranslationError> {
        let values = self.iterate(&comp.iter)?;
        debug!(iterations = values.len(), "unrolling comprehension");
        let mut items = Vec::with_capacity(values.len());
        for value in values {
            self.scopes.push(ScopeKind::Block);
            let result = self.comprehension_item(comp, value);
            self.scopes.pop();
            if let Some(item) = result? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn comprehension_item(&mut self, comp: &Comprehension, value: Operand) -> Result<Option<Item>, TranslationError> {
        self.bind_targets(&comp.targets, value, comp.iter.span)?;
        let mut pending = Vec::new();
        for filter in &comp.filters {
            let cond = self.eval(filter)?;
            match cond.as_value() {
                Some(v) if !crate::fold::truthy(v) => return Ok(None),
                Some(_) => {}
                None => pending.push(self.render(&cond, filter.span)?),
            }
        }
        let value = self.eval(&comp.elt)?;
        let filter = (!pending.is_empty()).then(|| render::conjunction(pending));
        Ok(Some(Item { value, filter }))
    }

    pub(crate) fn aggregate(
        &mut self,
        kind: Aggregate,
        callee: &Ident,
        args: &[CallArg],
        span: Span,
    ) -> Result<Operand, TranslationError> {
        if let Some(CallArg::Named { name, .. }) = args.iter().find(|a| matches!(a, CallArg::Named { .. })) {
            return Err(mismatch(
                format!("`{}` takes no keyword arguments", callee.node),
                name.span,
            ));
        }
        match args {
            [] => Err(mismatch(format!("`{}` needs an argument", callee.node), callee.span)),
            [arg] => {
                let arg = arg.value();
                if let ExprKind::Comprehension(comp) = &arg.kind {
                    if let Some(native) = self.try_native(kind, comp)? {
                        return Ok(native);
                    }
                    let items = self.comprehension_items(comp)?;
                    let ops = self.apply_filters(kind, items, arg.span)?;
                    return self.combine(kind, ops, span);
                }
                let op = self.eval(arg)?;
                if let Operand::Var(v) = &op {
                    let bool_sum = kind == Aggregate::Sum && v.ty.shape() == Shape::Bool;
                    if v.ty.is_list() && !bool_sum {
                        let elem = match kind {
                            Aggregate::All | Aggregate::Any => Some(Shape::Bool),
                            _ => Some(v.ty.shape()),
                        };
                        let r = Rendered::atom(v.text(), None);
                        return Ok(Operand::Expr(render::call(kind.target_name(), &[r], elem)));
                    }
                }
                if !op.is_list_like() {
                    return Err(mismatch(
                        format!("`{}` expects a list, found a {}", callee.node, op.describe()),
                        arg.span,
                    ));
                }
                let items = self.elements(&op, arg.span)?;
                self.combine(kind, items, span)
            }
            many => {
                if kind == Aggregate::Sum {
                    return Err(mismatch("`sum` takes a single iterable", callee.span));
                }
                let mut items = Vec::with_capacity(many.len());
                for arg in many {
                    items.push(self.eval(arg.value())?);
                }
                self.combine(kind, items, span)
            }
        }
    }

    /// Folds undecided comprehension filters into the element.
    fn apply_filters(&self, kind: Aggregate, items: Vec<Item>, span: Span) -> Result<Vec<Operand>, TranslationError> {
        let mut out = Vec::with_capacity(items.len());
        for Item { value, filter } in items {
            let Some(cond) = filter else {
                out.push(value);
                continue;
            };
            let v = self.render(&value, span)?;
            out.push(Operand::Expr(match kind {
                Aggregate::Sum => render::binary(cond, mzdsl_ast::BinOp::Mul, v),
                Aggregate::All => Rendered::new(
                    format!("{} -> {}", cond.at(Prec::Or), v.truthy().at(Prec::Or)),
                    Prec::Implies,
                    Some(Shape::Bool),
                ),
                Aggregate::Any => render::conjunction(vec![cond, v]),
                Aggregate::Min | Aggregate::Max => {
                    return Err(unresolved(
                        "a `min`/`max` filter must be known at translation time",
                        span,
                    ));
                }
            }));
        }
        Ok(out)
    }

    /// Renders `kind` over a `range` as a target-side aggregate with a
    /// symbolic induction variable. `None` when the body needs per-element
    /// values, in which case the caller unrolls.
    fn try_native(&mut self, kind: Aggregate, comp: &Comprehension) -> Result<Option<Operand>, TranslationError> {
        if !self.config.native_aggregates || comp.targets.len() != 1 {
            return Ok(None);
        }
        let ExprKind::Call { callee, args } = &comp.iter.kind else {
            return Ok(None);
        };
        if callee.node != "range" || self.scopes.lookup(&callee.node).is_some() {
            return Ok(None);
        }
        let (lo, hi) = self.range_bounds(callee, args)?;
        if hi <= lo {
            return Ok(None);
        }
        let var = &comp.targets[0];
        let constraints = self.program.constraints.len();
        let declarations = self.program.declarations.len();

        self.native_depth += 1;
        self.scopes.push(ScopeKind::Block);
        self.scopes.define(
            &var.node,
            SymbolKind::Local {
                value: Operand::Expr(Rendered::atom(var.node.clone(), Some(Shape::Int))),
                guard_depth: self.guards.len(),
            },
            var.span,
        );
        let result = self.native_parts(comp);
        self.scopes.pop();
        self.native_depth -= 1;

        let touched = self.program.constraints.len() != constraints
            || self.program.declarations.len() != declarations;
        self.program.constraints.truncate(constraints);
        let parts = match result {
            Ok(Some(parts)) if !touched => parts,
            Ok(_) => return Ok(None),
            Err(err) => {
                debug!(reason = %err.message, "unrolling instead of a target-side aggregate");
                return Ok(None);
            }
        };
        let (body, filters) = parts;
        let body = match kind {
            Aggregate::Sum | Aggregate::Min | Aggregate::Max => body.numeric(),
            Aggregate::All | Aggregate::Any => body.truthy(),
        };
        let mut generator = format!("{} in {lo}..{}", var.node, hi - 1);
        if !filters.is_empty() {
            generator.push_str(&format!(" where {}", render::conjunction(filters).text));
        }
        let result_kind = match kind {
            Aggregate::All | Aggregate::Any => Some(Shape::Bool),
            _ => body.kind,
        };
        Ok(Some(Operand::Expr(Rendered::atom(
            format!("{}({generator})({})", kind.target_name(), body.text),
            result_kind,
        ))))
    }

    fn native_parts(&mut self, comp: &Comprehension) -> Result<Option<(Rendered, Vec<Rendered>)>, TranslationError> {
        let mut filters = Vec::with_capacity(comp.filters.len());
        for filter in &comp.filters {
            let cond = self.eval(filter)?;
            if cond.is_const() || cond.is_list_like() {
                return Ok(None);
            }
            filters.push(self.render(&cond, filter.span)?);
        }
        let body = self.eval(&comp.elt)?;
        if body.is_const() || body.is_list_like() || matches!(body, Operand::Tuple(_) | Operand::Record(_)) {
            return Ok(None);
        }
        Ok(Some((self.render(&body, comp.elt.span)?, filters)))
    }
}
