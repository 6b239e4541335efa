#![forbid(unsafe_code)]

use std::cmp::Ordering;

use mzdsl_ast::{BinOp, BoolOp, CallArg, CmpOp, Expr, ExprKind, Ident, Span, UnaryOp};
use mzdsl_ir::{Shape, TypeSpec, Value};

use crate::error::{TranslationError, mismatch, unknown, unresolved, unsupported};
use crate::fold;
use crate::lower::{Translator, out_of_range, position};
use crate::operand::{Operand, VarRef};
use crate::render::{self, Kind, Prec, Rendered};
use crate::scope::SymbolKind;
use crate::unroll::Aggregate;

const TYPE_CONSTRUCTORS: [&str; 5] = ["DSInt", "DSFloat", "DSBool", "DSList", "DSRecord"];

pub(crate) fn value_kind(value: &Value) -> Kind {
    match value {
        Value::Int(_) => Some(Shape::Int),
        Value::Float(_) => Some(Shape::Float),
        Value::Bool(_) => Some(Shape::Bool),
        Value::Record(_) => Some(Shape::Record),
        Value::List(_) => None,
    }
}

fn literal(value: &Value) -> Rendered {
    let negative = match value {
        Value::Int(n) => *n < 0,
        Value::Float(x) => x.is_sign_negative(),
        _ => false,
    };
    let prec = if negative { Prec::Unary } else { Prec::Atom };
    Rendered::new(value.render(), prec, value_kind(value))
}

impl Translator<'_> {
    pub(crate) fn first_index(&self) -> i64 {
        self.config.index_base.first()
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Operand, TranslationError> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Operand::int(*n)),
            ExprKind::Float(x) => Ok(Operand::value(Value::Float(*x))),
            ExprKind::Bool(b) => Ok(Operand::value(Value::Bool(*b))),
            ExprKind::Str(_) => Err(mismatch(
                "string literals are only allowed as record field types",
                expr.span,
            )),
            ExprKind::Name(id) => self.eval_name(id),
            ExprKind::List(items) => {
                let mut ops = Vec::with_capacity(items.len());
                for item in items {
                    ops.push(self.eval(item)?);
                }
                Ok(Operand::list(ops))
            }
            ExprKind::Tuple(items) => {
                let mut ops = Vec::with_capacity(items.len());
                for item in items {
                    ops.push(self.eval(item)?);
                }
                Ok(Operand::Tuple(ops))
            }
            ExprKind::Dict(entries) => {
                let mut fields = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let ExprKind::Str(name) = &key.kind else {
                        return Err(mismatch("record keys must be string literals", key.span));
                    };
                    if fields.iter().any(|(f, _)| f == name) {
                        return Err(mismatch(format!("field `{name}` appears twice"), key.span));
                    }
                    fields.push((name.clone(), self.eval(value)?));
                }
                Ok(record(fields))
            }
            ExprKind::Unary { op, expr: inner } => {
                let operand = self.eval(inner)?;
                self.unary_operand(*op, operand, expr.span)
            }
            ExprKind::Binary { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                self.binary_operands(l, *op, r, expr.span)
            }
            ExprKind::Compare { first, rest } => self.eval_compare(first, rest, expr.span),
            ExprKind::BoolOp { op, values } => self.eval_bool_op(*op, values),
            ExprKind::IfExp { cond, then, otherwise } => {
                let c = self.eval(cond)?;
                if let Some(v) = c.as_value() {
                    return if fold::truthy(v) { self.eval(then) } else { self.eval(otherwise) };
                }
                let c = self.render(&c, cond.span)?;
                let t = self.eval(then)?;
                let t = self.render(&t, then.span)?;
                let o = self.eval(otherwise)?;
                let o = self.render(&o, otherwise.span)?;
                Ok(Operand::Expr(render::if_then_else(c, t, o)))
            }
            ExprKind::Call { callee, args } => match self.call(callee, args, expr.span)? {
                Some(op) => Ok(op),
                None => Err(mismatch(
                    format!("`{}` does not return a value", callee.node),
                    expr.span,
                )),
            },
            ExprKind::Attribute { base, field } => {
                let base = self.eval(base)?;
                self.field(base, field)
            }
            ExprKind::Index { base, indices } => {
                let mut cur = self.eval(base)?;
                for index in indices {
                    let idx = self.eval(index)?;
                    cur = self.subscript(cur, idx, index.span)?;
                }
                Ok(cur)
            }
            ExprKind::Comprehension(comp) => {
                let items = self.comprehension_items(comp)?;
                let mut ops = Vec::with_capacity(items.len());
                for item in items {
                    if item.filter.is_some() {
                        return Err(unresolved(
                            "a list comprehension filter must be known at translation time",
                            expr.span,
                        ));
                    }
                    ops.push(item.value);
                }
                Ok(Operand::list(ops))
            }
        }
    }

    pub(crate) fn eval_name(&mut self, id: &Ident) -> Result<Operand, TranslationError> {
        let name = id.node.as_str();
        let Some(sym) = self.scopes.lookup(name) else {
            if matches!(name, "int" | "float" | "bool") || TYPE_CONSTRUCTORS.contains(&name) {
                return Err(mismatch(format!("type `{name}` used as a value"), id.span));
            }
            return Err(unknown(format!("unknown symbol `{name}`"), id.span));
        };
        match &sym.kind {
            SymbolKind::Constant { value, ty } => {
                let ty = match ty {
                    Some(ty) => ty.clone(),
                    None => crate::types::type_of_value(value, id.span)?,
                };
                Ok(Operand::Const {
                    value: value.clone(),
                    name: Some(VarRef::new(name, ty)),
                })
            }
            SymbolKind::Variable { target, ty } => Ok(Operand::Var(VarRef::new(target.clone(), ty.clone()))),
            SymbolKind::Local { value, .. } => Ok(value.clone()),
            SymbolKind::Type(_) => Err(mismatch(format!("type `{name}` used as a value"), id.span)),
            SymbolKind::Function { .. } => Err(mismatch(
                format!("function `{name}` used as a value"),
                id.span,
            )),
        }
    }

    /// Target text of an operand.
    pub(crate) fn render(&self, op: &Operand, span: Span) -> Result<Rendered, TranslationError> {
        match op {
            Operand::Const { value, name: Some(name) } => Ok(Rendered::atom(name.text(), value_kind(value))),
            Operand::Const { value, name: None } => {
                if let Value::List(_) = value {
                    if value.dims().is_none() {
                        return Err(mismatch("nested lists must be rectangular", span));
                    }
                }
                Ok(literal(value))
            }
            Operand::Expr(r) => Ok(r.clone()),
            Operand::Var(v) => {
                let kind = if v.ty.is_list() { None } else { Some(v.ty.shape()) };
                Ok(Rendered::atom(v.text(), kind))
            }
            Operand::Items(_) | Operand::Table(_) => self.render_list(op, span),
            Operand::Tuple(_) => Err(mismatch("a tuple cannot be used as a value here", span)),
            Operand::Record(fields) => {
                let mut parts = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    parts.push(format!("{name}: {}", self.render(value, span)?.text));
                }
                Ok(Rendered::atom(format!("({})", parts.join(", ")), Some(Shape::Record)))
            }
        }
    }

    fn render_list(&self, op: &Operand, span: Span) -> Result<Rendered, TranslationError> {
        let mut dims = Vec::new();
        let mut leaves = Vec::new();
        self.collect_leaves(op, 0, &mut dims, &mut leaves, span)?;
        let flat = leaves.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(", ");
        if dims.len() < 2 {
            return Ok(Rendered::atom(format!("[{flat}]"), None));
        }
        let ranges = dims.iter().map(|d| format!("1..{d}")).collect::<Vec<_>>().join(", ");
        Ok(Rendered::atom(format!("array{}d({ranges}, [{flat}])", dims.len()), None))
    }

    fn collect_leaves(
        &self,
        op: &Operand,
        depth: usize,
        dims: &mut Vec<usize>,
        leaves: &mut Vec<Rendered>,
        span: Span,
    ) -> Result<(), TranslationError> {
        if !op.is_list_like() {
            if depth < dims.len() {
                return Err(mismatch("nested lists must be rectangular", span));
            }
            leaves.push(self.render(op, span)?);
            return Ok(());
        }
        let items = self.elements(op, span)?;
        match dims.get(depth) {
            Some(&d) if d != items.len() => return Err(mismatch("nested lists must be rectangular", span)),
            Some(_) => {}
            None if leaves.is_empty() => dims.push(items.len()),
            None => return Err(mismatch("nested lists must be rectangular", span)),
        }
        for item in &items {
            self.collect_leaves(item, depth + 1, dims, leaves, span)?;
        }
        Ok(())
    }

    /// Members of a list-like operand in index order.
    pub(crate) fn elements(&self, op: &Operand, span: Span) -> Result<Vec<Operand>, TranslationError> {
        match op {
            Operand::Const { value: Value::List(values), .. } => {
                Ok(values.iter().cloned().map(Operand::value).collect())
            }
            Operand::Items(items) => Ok(items.clone()),
            Operand::Table(map) => {
                let first = self.first_index();
                for (expected, key) in (first..).zip(map.keys()) {
                    if *key != expected {
                        return Err(mismatch(
                            format!("element {expected} of this list was never assigned"),
                            span,
                        ));
                    }
                }
                Ok(map.values().cloned().collect())
            }
            Operand::Var(v) => {
                let TypeSpec::List { length, elem } = v.ty.resolved() else {
                    return Err(mismatch(format!("cannot iterate over {}", v.ty.display()), span));
                };
                self.check_iterations(i64::try_from(*length).unwrap_or(i64::MAX), span)?;
                Ok((1..=*length as i64)
                    .map(|i| {
                        let mut r = v.clone();
                        r.indices.push(Rendered::atom(i.to_string(), Some(Shape::Int)));
                        r.ty = (**elem).clone();
                        Operand::Var(r)
                    })
                    .collect())
            }
            other => Err(mismatch(format!("cannot iterate over a {}", other.describe()), span)),
        }
    }

    pub(crate) fn unpack(&self, value: Operand, n: usize, span: Span) -> Result<Vec<Operand>, TranslationError> {
        let parts = match value {
            Operand::Tuple(parts) => parts,
            list if list.is_list_like() => self.elements(&list, span)?,
            other => {
                return Err(mismatch(format!("cannot unpack a {}", other.describe()), span));
            }
        };
        if parts.len() != n {
            return Err(mismatch(
                format!("cannot unpack {} values into {n} targets", parts.len()),
                span,
            ));
        }
        Ok(parts)
    }

    fn scalar(&self, op: &Operand, span: Span) -> Result<Rendered, TranslationError> {
        if op.is_list_like() || matches!(op, Operand::Tuple(_)) {
            return Err(mismatch(format!("expected a scalar, found a {}", op.describe()), span));
        }
        self.render(op, span)
    }

    pub(crate) fn unary_operand(&mut self, op: UnaryOp, operand: Operand, span: Span) -> Result<Operand, TranslationError> {
        if let Some(v) = operand.as_value() {
            return fold::unary(op, v, span).map(Operand::value);
        }
        let r = self.scalar(&operand, span)?;
        Ok(Operand::Expr(match op {
            UnaryOp::Neg => render::negate(r),
            UnaryOp::Pos => r.numeric(),
            UnaryOp::Not => render::not(r),
        }))
    }

    pub(crate) fn binary_operands(
        &mut self,
        left: Operand,
        op: BinOp,
        right: Operand,
        span: Span,
    ) -> Result<Operand, TranslationError> {
        if let (Some(a), Some(b)) = (left.as_value(), right.as_value()) {
            if op == BinOp::Mul {
                match (a, b) {
                    (Value::List(items), n) | (n, Value::List(items)) => {
                        if let Some(times) = n.as_int() {
                            self.check_repetition(items.len(), times, span)?;
                        }
                    }
                    _ => {}
                }
            }
            return fold::binary(a, op, b, span).map(Operand::value);
        }
        if left.is_list_like() || right.is_list_like() {
            return self.list_arith(left, op, right, span);
        }
        let l = self.scalar(&left, span)?;
        let r = self.scalar(&right, span)?;
        Ok(Operand::Expr(render::binary(l, op, r)))
    }

    /// Rejects a repeated list that could not be unrolled.
    fn check_repetition(&self, len: usize, times: i64, span: Span) -> Result<usize, TranslationError> {
        let total = fold::repeated_len(len, times, span)?;
        if total > self.config.max_unrolled_statements {
            return Err(unsupported(
                format!(
                    "a repeated list of {total} elements exceeds the limit of {} unrolled statements",
                    self.config.max_unrolled_statements
                ),
                span,
            ));
        }
        Ok(total)
    }

    fn list_arith(&self, left: Operand, op: BinOp, right: Operand, span: Span) -> Result<Operand, TranslationError> {
        match op {
            BinOp::Add if left.is_list_like() && right.is_list_like() => {
                let mut items = self.elements(&left, span)?;
                items.extend(self.elements(&right, span)?);
                Ok(Operand::list(items))
            }
            BinOp::Mul if !(left.is_list_like() && right.is_list_like()) => {
                let (list, times) = if left.is_list_like() { (&left, &right) } else { (&right, &left) };
                let Some(times) = times.as_int() else {
                    return Err(unresolved("list repetition count must be known at translation time", span));
                };
                let items = self.elements(list, span)?;
                let mut out = Vec::with_capacity(self.check_repetition(items.len(), times, span)?);
                for _ in 0..times.max(0) {
                    out.extend(items.iter().cloned());
                }
                Ok(Operand::list(out))
            }
            _ => Err(mismatch(
                format!(
                    "unsupported operand types for {}: {} and {}",
                    fold::op_symbol(op),
                    left.describe(),
                    right.describe()
                ),
                span,
            )),
        }
    }

    fn eval_compare(&mut self, first: &Expr, rest: &[(CmpOp, Expr)], span: Span) -> Result<Operand, TranslationError> {
        let mut left = self.eval(first)?;
        let mut terms = Vec::new();
        for (op, expr) in rest {
            let right = self.eval(expr)?;
            match (left.as_value(), right.as_value()) {
                (Some(a), Some(b)) => {
                    if !fold::compare(a, *op, b, span)? {
                        return Ok(Operand::value(Value::Bool(false)));
                    }
                }
                _ => {
                    let l = self.render(&left, span)?;
                    let r = self.render(&right, span)?;
                    terms.push(render::compare(&l, *op, &r));
                }
            }
            left = right;
        }
        if terms.is_empty() {
            return Ok(Operand::value(Value::Bool(true)));
        }
        Ok(Operand::Expr(render::conjunction(terms)))
    }

    /// Known operands are folded away; a deciding constant short-circuits.
    fn eval_bool_op(&mut self, op: BoolOp, values: &[Expr]) -> Result<Operand, TranslationError> {
        let mut terms = Vec::new();
        for expr in values {
            let v = self.eval(expr)?;
            if let Some(value) = v.as_value() {
                let t = fold::truthy(value);
                match (op, t) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => {
                        return Ok(Operand::value(Value::Bool(t)));
                    }
                    _ => continue,
                }
            }
            terms.push(self.scalar(&v, expr.span)?);
        }
        if terms.is_empty() {
            return Ok(Operand::value(Value::Bool(op == BoolOp::And)));
        }
        Ok(Operand::Expr(match op {
            BoolOp::And => render::conjunction(terms),
            BoolOp::Or => render::disjunction(terms),
        }))
    }

    /// Target-side subscript for a source-level index.
    fn target_index(&self, idx: &Operand, span: Span) -> Result<Rendered, TranslationError> {
        let r = self.scalar(idx, span)?;
        if matches!(r.kind, Some(Shape::Float) | Some(Shape::Record)) {
            return Err(mismatch("list indices must be integers", span));
        }
        let shift = 1 - self.first_index();
        if shift == 0 {
            return Ok(r.numeric());
        }
        if let Some(Value::Int(n)) = idx.as_value() {
            return Ok(Rendered::atom(n.saturating_add(shift).to_string(), Some(Shape::Int)));
        }
        Ok(render::binary(r, BinOp::Add, Rendered::atom(shift.to_string(), Some(Shape::Int))))
    }

    pub(crate) fn subscript(&self, base: Operand, idx: Operand, span: Span) -> Result<Operand, TranslationError> {
        let first = self.first_index();
        let concrete = match idx.as_value() {
            Some(Value::Int(n)) => Some(*n),
            Some(Value::Bool(b)) => Some(i64::from(*b)),
            Some(other) => {
                return Err(mismatch(
                    format!("list indices must be integers, not {}", other.kind_name()),
                    span,
                ));
            }
            None => None,
        };
        match base {
            Operand::Const { value: Value::List(mut values), name } => match concrete {
                Some(i) => {
                    let Some(p) = position(i, first, values.len()) else {
                        return Err(out_of_range(i, values.len(), span));
                    };
                    let value = values.swap_remove(p);
                    // A row of a named table keeps its name for later symbolic
                    // subscripts (`COST[2, k]`).
                    let name = match (&value, name) {
                        (Value::List(_), Some(mut row)) => {
                            let Some(elem) = row.ty.indexed(1).cloned() else {
                                return Ok(Operand::value(value));
                            };
                            row.indices.push(self.target_index(&idx, span)?);
                            row.ty = elem;
                            Some(row)
                        }
                        _ => None,
                    };
                    Ok(Operand::Const { value, name })
                }
                None => {
                    let r = match name {
                        Some(name) => name,
                        None => {
                            let value = Value::List(values);
                            let ty = crate::types::type_of_value(&value, span)?;
                            VarRef::new(self.render(&Operand::value(value), span)?.text, ty)
                        }
                    };
                    self.subscript(Operand::Var(r), idx, span)
                }
            },
            Operand::Var(mut v) => {
                let TypeSpec::List { length, elem } = v.ty.resolved().clone() else {
                    return Err(mismatch(format!("`{}` is not a list", v.text()), span));
                };
                if let Some(i) = concrete {
                    if position(i, first, length).is_none() {
                        return Err(out_of_range(i, length, span));
                    }
                }
                v.indices.push(self.target_index(&idx, span)?);
                v.ty = *elem;
                Ok(Operand::Var(v))
            }
            Operand::Items(items) => match concrete {
                Some(i) => match position(i, first, items.len()) {
                    Some(p) => Ok(items[p].clone()),
                    None => Err(out_of_range(i, items.len(), span)),
                },
                None => {
                    let list = Operand::Items(items);
                    self.symbolic_subscript(&list, idx, span)
                }
            },
            Operand::Table(map) => match concrete {
                Some(i) => map
                    .get(&i)
                    .cloned()
                    .ok_or_else(|| unknown(format!("element {i} of this list was never assigned"), span)),
                None => self.symbolic_subscript(&Operand::Table(map), idx, span),
            },
            Operand::Tuple(parts) => {
                let Some(i) = concrete else {
                    return Err(unresolved("tuple indices must be known at translation time", span));
                };
                usize::try_from(i)
                    .ok()
                    .and_then(|p| parts.get(p).cloned())
                    .ok_or_else(|| out_of_range(i, parts.len(), span))
            }
            other => Err(mismatch(format!("a {} cannot be indexed", other.describe()), span)),
        }
    }

    /// Symbolic index into a list literal: the literal is rendered and
    /// subscripted on the target side.
    fn symbolic_subscript(&self, list: &Operand, idx: Operand, span: Span) -> Result<Operand, TranslationError> {
        let items = self.elements(list, span)?;
        let elem = match items.first() {
            Some(first) => self.guess_type(first, span)?,
            None => TypeSpec::int(),
        };
        let ty = TypeSpec::List {
            length: items.len(),
            elem: Box::new(elem),
        };
        let base = self.render(list, span)?.text;
        self.subscript(Operand::Var(VarRef::new(base, ty)), idx, span)
    }

    fn guess_type(&self, op: &Operand, span: Span) -> Result<TypeSpec, TranslationError> {
        Ok(match op {
            Operand::Const { value, .. } => crate::types::type_of_value(value, span)?,
            Operand::Var(v) => v.ty.clone(),
            list if list.is_list_like() => {
                let items = self.elements(list, span)?;
                let elem = match items.first() {
                    Some(first) => self.guess_type(first, span)?,
                    None => TypeSpec::int(),
                };
                TypeSpec::List {
                    length: items.len(),
                    elem: Box::new(elem),
                }
            }
            other => match self.render(other, span)?.kind {
                Some(Shape::Float) => TypeSpec::float(),
                Some(Shape::Bool) => TypeSpec::Bool,
                _ => TypeSpec::int(),
            },
        })
    }

    fn field(&self, base: Operand, field: &Ident) -> Result<Operand, TranslationError> {
        let name = field.node.as_str();
        let missing = || unknown(format!("record has no field `{name}`"), field.span);
        match base {
            Operand::Const { value: Value::Record(fields), .. } => fields
                .into_iter()
                .find(|(f, _)| f == name)
                .map(|(_, v)| Operand::value(v))
                .ok_or_else(missing),
            Operand::Record(fields) => fields
                .into_iter()
                .find(|(f, _)| f == name)
                .map(|(_, v)| v)
                .ok_or_else(missing),
            Operand::Var(v) => {
                let Some(ty) = v.ty.field(name).cloned() else {
                    if v.ty.is_list() || !matches!(v.ty.resolved(), TypeSpec::Record { .. }) {
                        return Err(mismatch(format!("`{}` is not a record", v.text()), field.span));
                    }
                    return Err(missing());
                };
                Ok(Operand::Var(VarRef::new(format!("{}.{name}", v.text()), ty)))
            }
            other => Err(mismatch(format!("a {} has no fields", other.describe()), field.span)),
        }
    }

    /// Calls a user function or a builtin. `None` means the callee produced no
    /// value.
    pub(crate) fn call(&mut self, callee: &Ident, args: &[CallArg], span: Span) -> Result<Option<Operand>, TranslationError> {
        let name = callee.node.as_str();
        if let Some(sym) = self.scopes.lookup(name) {
            return match sym.kind.clone() {
                SymbolKind::Function { def, .. } => self.call_function(def, args, span),
                SymbolKind::Type(ty) => self.construct_record(callee, &ty, args).map(Some),
                _ => Err(mismatch(format!("`{name}` is not callable"), callee.span)),
            };
        }
        let aggregate = match name {
            "sum" => Some(Aggregate::Sum),
            "all" | "forall" => Some(Aggregate::All),
            "any" | "exists" => Some(Aggregate::Any),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            _ => None,
        };
        if let Some(kind) = aggregate {
            return self.aggregate(kind, callee, args, span).map(Some);
        }
        match name {
            "len" => {
                let arg = self.single_arg(callee, args)?;
                let op = self.eval(arg)?;
                let len = match &op {
                    Operand::Var(v) if v.ty.is_list() => v.ty.dims()[0],
                    Operand::Tuple(parts) => parts.len(),
                    list if list.is_list_like() => self.elements(list, arg.span)?.len(),
                    other => {
                        return Err(mismatch(format!("a {} has no length", other.describe()), arg.span));
                    }
                };
                Ok(Some(Operand::int(len as i64)))
            }
            "abs" => {
                let arg = self.single_arg(callee, args)?;
                let op = self.eval(arg)?;
                if let Some(v) = op.as_value() {
                    let negative = fold::compare(v, CmpOp::Lt, &Value::Int(0), arg.span)?;
                    return if negative {
                        fold::unary(UnaryOp::Neg, v, arg.span).map(|v| Some(Operand::value(v)))
                    } else {
                        Ok(Some(op))
                    };
                }
                let r = self.scalar(&op, arg.span)?.numeric();
                let kind = r.kind;
                Ok(Some(Operand::Expr(render::call("abs", &[r], kind))))
            }
            "bool2int" | "int" => {
                let arg = self.single_arg(callee, args)?;
                let op = self.eval(arg)?;
                match op.as_value() {
                    Some(Value::Float(x)) => Ok(Some(Operand::int(x.trunc() as i64))),
                    Some(v) => match v.as_int() {
                        Some(n) => Ok(Some(Operand::int(n))),
                        None => Err(mismatch(format!("cannot convert a {} to int", v.kind_name()), arg.span)),
                    },
                    None => {
                        let r = self.scalar(&op, arg.span)?;
                        Ok(Some(Operand::Expr(r.numeric())))
                    }
                }
            }
            "range" | "enumerate" => Err(unsupported(format!("`{name}` can only be used as a loop iterable"), span)),
            "minimize" | "maximize" => Err(unsupported(format!("`{name}` must be used as a statement"), span)),
            n if TYPE_CONSTRUCTORS.contains(&n) => Err(mismatch(
                format!("type constructor `{n}` used as a value"),
                callee.span,
            )),
            _ => Err(unknown(format!("unknown function `{name}`"), callee.span)),
        }
    }

    pub(crate) fn single_arg<'a>(&self, callee: &Ident, args: &'a [CallArg]) -> Result<&'a Expr, TranslationError> {
        match args {
            [CallArg::Positional(e)] => Ok(e),
            _ => Err(mismatch(
                format!("`{}` takes exactly one positional argument", callee.node),
                callee.span,
            )),
        }
    }

    fn construct_record(&mut self, callee: &Ident, ty: &TypeSpec, args: &[CallArg]) -> Result<Operand, TranslationError> {
        let TypeSpec::Record { fields, .. } = ty.resolved() else {
            return Err(mismatch(format!("type `{}` is not a record", callee.node), callee.span));
        };
        let names: Vec<&str> = fields.iter().map(|(f, _)| f.as_str()).collect();
        let bound = crate::types::bind_args(args, &names, callee)?;
        let mut out = Vec::with_capacity(fields.len());
        for ((fname, fty), arg) in fields.iter().zip(bound) {
            let Some(arg) = arg else {
                return Err(mismatch(format!("missing field `{fname}` for `{}`", callee.node), callee.span));
            };
            let op = self.eval(arg)?;
            let op = match op {
                Operand::Const { value, .. } => Operand::value(crate::types::coerce(value, fty)),
                other => other,
            };
            out.push((fname.clone(), op));
        }
        Ok(record(out))
    }

    /// Folds `items` with `kind`, dropping neutral constants.
    pub(crate) fn combine(&self, kind: Aggregate, items: Vec<Operand>, span: Span) -> Result<Operand, TranslationError> {
        if let Some(bad) = items.iter().find(|op| op.is_list_like()) {
            return Err(mismatch(format!("cannot aggregate a {}", bad.describe()), span));
        }
        if items.iter().all(Operand::is_const) {
            let values: Vec<&Value> = items.iter().filter_map(Operand::as_value).collect();
            return self.combine_values(kind, &values, span).map(Operand::value);
        }
        match kind {
            Aggregate::Sum => {
                let mut terms = Vec::new();
                for op in &items {
                    if op.as_value().is_some_and(|v| v.as_f64() == Some(0.0)) {
                        continue;
                    }
                    terms.push(self.render(op, span)?);
                }
                Ok(Operand::Expr(render::sum(terms)))
            }
            Aggregate::All | Aggregate::Any => {
                let deciding = kind == Aggregate::Any;
                let mut terms = Vec::new();
                for op in &items {
                    if let Some(v) = op.as_value() {
                        if fold::truthy(v) == deciding {
                            return Ok(Operand::value(Value::Bool(deciding)));
                        }
                        continue;
                    }
                    terms.push(self.render(op, span)?);
                }
                Ok(Operand::Expr(if deciding {
                    render::disjunction(terms)
                } else {
                    render::conjunction(terms)
                }))
            }
            Aggregate::Min | Aggregate::Max => {
                let name = if kind == Aggregate::Min { "min" } else { "max" };
                let mut terms = Vec::with_capacity(items.len());
                for op in &items {
                    terms.push(self.render(op, span)?.numeric());
                }
                let kind = if terms.iter().any(|t| t.kind == Some(Shape::Float)) {
                    Some(Shape::Float)
                } else {
                    Some(Shape::Int)
                };
                Ok(Operand::Expr(match terms.len() {
                    1 => terms.remove(0),
                    2 => render::call(name, &terms, kind),
                    _ => {
                        let list = terms.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(", ");
                        Rendered::atom(format!("{name}([{list}])"), kind)
                    }
                }))
            }
        }
    }

    fn combine_values(&self, kind: Aggregate, values: &[&Value], span: Span) -> Result<Value, TranslationError> {
        match kind {
            Aggregate::Sum => values
                .iter()
                .try_fold(Value::Int(0), |acc, v| fold::binary(&acc, BinOp::Add, v, span)),
            Aggregate::All => Ok(Value::Bool(values.iter().all(|v| fold::truthy(v)))),
            Aggregate::Any => Ok(Value::Bool(values.iter().any(|v| fold::truthy(v)))),
            Aggregate::Min | Aggregate::Max => {
                let want = if kind == Aggregate::Min { Ordering::Less } else { Ordering::Greater };
                match fold::extreme(values, want, span)? {
                    Some(v) => Ok(v.clone()),
                    None => Err(mismatch("min() and max() need at least one value", span)),
                }
            }
        }
    }
}

fn record(fields: Vec<(String, Operand)>) -> Operand {
    if fields.iter().all(|(_, op)| op.is_const()) {
        let values = fields
            .into_iter()
            .filter_map(|(name, op)| match op {
                Operand::Const { value, .. } => Some((name, value)),
                _ => None,
            })
            .collect();
        Operand::value(Value::Record(values))
    } else {
        Operand::Record(fields)
    }
}
