#![forbid(unsafe_code)]

//! Resolution of type annotations (`DSInt(1, N)`, `DSList(N, Box)`, record
//! definitions) into [`TypeSpec`]s.

use mzdsl_ast::{CallArg, Expr, ExprKind, Ident, Span};
use mzdsl_ir::{TypeSpec, Value};

use crate::error::{TranslationError, mismatch, redeclared, unknown, unresolved};
use crate::lower::Translator;
use crate::operand::Operand;
use crate::scope::SymbolKind;

/// Matches call arguments to parameter `names`, positionally first and then
/// by keyword.
pub(crate) fn bind_args<'a>(
    args: &'a [CallArg],
    names: &[&str],
    callee: &Ident,
) -> Result<Vec<Option<&'a Expr>>, TranslationError> {
    let mut bound: Vec<Option<&Expr>> = vec![None; names.len()];
    let mut next = 0;
    for arg in args {
        let slot = match arg {
            CallArg::Positional(_) => {
                next += 1;
                next - 1
            }
            CallArg::Named { name, .. } => match names.iter().position(|n| *n == name.node) {
                Some(i) => i,
                None => {
                    return Err(mismatch(
                        format!("`{}` has no parameter `{}`", callee.node, name.node),
                        name.span,
                    ));
                }
            },
        };
        if slot >= names.len() {
            return Err(mismatch(
                format!("`{}` takes at most {} arguments", callee.node, names.len()),
                arg.value().span,
            ));
        }
        if bound[slot].is_some() {
            return Err(mismatch(
                format!("`{}` got `{}` twice", callee.node, names[slot]),
                arg.value().span,
            ));
        }
        bound[slot] = Some(arg.value());
    }
    Ok(bound)
}

/// Adapts a constant to its declared type: integers widen to floats and
/// record fields are put in declaration order.
pub(crate) fn coerce(value: Value, ty: &TypeSpec) -> Value {
    match (value, ty.resolved()) {
        (Value::Int(n), TypeSpec::Float { .. }) => Value::Float(n as f64),
        (Value::List(items), TypeSpec::List { elem, .. }) => {
            Value::List(items.into_iter().map(|v| coerce(v, elem)).collect())
        }
        (Value::Record(mut values), TypeSpec::Record { fields, .. }) => {
            if values.len() != fields.len() || !fields.iter().all(|(f, _)| values.iter().any(|(v, _)| v == f)) {
                return Value::Record(values);
            }
            let mut ordered = Vec::with_capacity(fields.len());
            for (fname, fty) in fields {
                if let Some(pos) = values.iter().position(|(v, _)| v == fname) {
                    let (name, v) = values.remove(pos);
                    ordered.push((name, coerce(v, fty)));
                }
            }
            Value::Record(ordered)
        }
        (value, _) => value,
    }
}

/// Structural type of an untyped constant.
pub(crate) fn type_of_value(value: &Value, span: Span) -> Result<TypeSpec, TranslationError> {
    Ok(match value {
        Value::Int(_) => TypeSpec::int(),
        Value::Float(_) => TypeSpec::float(),
        Value::Bool(_) => TypeSpec::Bool,
        Value::List(items) => {
            if value.dims().is_none() {
                return Err(mismatch("nested lists must be rectangular", span));
            }
            let mut elem = match items.first() {
                Some(first) => type_of_value(first, span)?,
                None => TypeSpec::int(),
            };
            if matches!(elem, TypeSpec::Int { .. }) && items.iter().any(|v| matches!(v, Value::Float(_))) {
                elem = TypeSpec::float();
            }
            TypeSpec::List {
                length: items.len(),
                elem: Box::new(elem),
            }
        }
        Value::Record(fields) => {
            let mut out = Vec::with_capacity(fields.len());
            for (name, v) in fields {
                out.push((name.clone(), type_of_value(v, span)?));
            }
            TypeSpec::Record {
                name: String::new(),
                fields: out,
            }
        }
    })
}

impl Translator<'_> {
    /// Whether `expr`, on the right of `=`, defines a type alias.
    pub(crate) fn is_type_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Call { callee, .. } => {
                matches!(callee.node.as_str(), "DSInt" | "DSFloat" | "DSBool" | "DSList" | "DSRecord")
                    && self.scopes.lookup(&callee.node).is_none()
            }
            ExprKind::Name(id) => matches!(
                self.scopes.lookup(&id.node).map(|s| &s.kind),
                Some(SymbolKind::Type(_))
            ),
            _ => false,
        }
    }

    pub(crate) fn resolve_type(&mut self, expr: &Expr) -> Result<TypeSpec, TranslationError> {
        self.resolve_type_as(expr, None)
    }

    /// `alias` names the record type being defined, if any.
    pub(crate) fn resolve_type_as(&mut self, expr: &Expr, alias: Option<&str>) -> Result<TypeSpec, TranslationError> {
        match &expr.kind {
            ExprKind::Name(id) => self.named_type(&id.node, id.span),
            ExprKind::Str(s) => self.named_type(s, expr.span),
            ExprKind::Call { callee, args } => match callee.node.as_str() {
                "DSInt" => {
                    let [lb, ub] = self.bounds(callee, args)?;
                    match (lb, ub) {
                        (None, None) => Ok(TypeSpec::int()),
                        (Some(lb), Some(ub)) => {
                            let (lb, ub) = (self.int_bound(lb)?, self.int_bound(ub)?);
                            if lb > ub {
                                return Err(mismatch(format!("empty domain {lb}..{ub}"), expr.span));
                            }
                            Ok(TypeSpec::Int { lb: Some(lb), ub: Some(ub) })
                        }
                        _ => Err(mismatch("`DSInt` needs both bounds or neither", callee.span)),
                    }
                }
                "DSFloat" => {
                    let [lb, ub] = self.bounds(callee, args)?;
                    match (lb, ub) {
                        (None, None) => Ok(TypeSpec::float()),
                        (Some(lb), Some(ub)) => {
                            let (lb, ub) = (self.float_bound(lb)?, self.float_bound(ub)?);
                            if lb > ub {
                                return Err(mismatch(format!("empty domain {lb}..{ub}"), expr.span));
                            }
                            Ok(TypeSpec::Float { lb: Some(lb), ub: Some(ub) })
                        }
                        _ => Err(mismatch("`DSFloat` needs both bounds or neither", callee.span)),
                    }
                }
                "DSBool" => {
                    if !args.is_empty() {
                        return Err(mismatch("`DSBool` takes no arguments", callee.span));
                    }
                    Ok(TypeSpec::Bool)
                }
                "DSList" => {
                    let bound = bind_args(args, &["length", "elem_type"], callee)?;
                    let Some(length) = bound[0] else {
                        return Err(mismatch("`DSList` needs a length", callee.span));
                    };
                    let n = self.int_bound(length)?;
                    let length = usize::try_from(n)
                        .map_err(|_| mismatch(format!("list length {n} is negative"), expr.span))?;
                    let elem = match bound[1] {
                        Some(elem) => self.resolve_type(elem)?,
                        None => TypeSpec::int(),
                    };
                    Ok(TypeSpec::List {
                        length,
                        elem: Box::new(elem),
                    })
                }
                "DSRecord" => {
                    let bound = bind_args(args, &["fields"], callee)?;
                    let Some(Expr { kind: ExprKind::Dict(entries), .. }) = bound[0] else {
                        return Err(mismatch("`DSRecord` expects a dictionary of fields", callee.span));
                    };
                    let mut fields: Vec<(String, TypeSpec)> = Vec::with_capacity(entries.len());
                    for (key, value) in entries {
                        let name = match &key.kind {
                            ExprKind::Str(s) => s.clone(),
                            ExprKind::Name(id) => id.node.clone(),
                            _ => return Err(mismatch("record field names must be strings", key.span)),
                        };
                        if fields.iter().any(|(f, _)| *f == name) {
                            return Err(redeclared(format!("field `{name}` is declared twice"), key.span));
                        }
                        let ty = self.resolve_type(value)?;
                        fields.push((name, ty));
                    }
                    Ok(TypeSpec::Record {
                        name: alias.unwrap_or_default().to_string(),
                        fields,
                    })
                }
                other => match self.scopes.lookup(other) {
                    Some(sym) if matches!(sym.kind, SymbolKind::Type(_)) => {
                        Err(mismatch(format!("`{other}` is a type, not a type constructor"), callee.span))
                    }
                    _ => Err(unknown(format!("unknown type constructor `{other}`"), callee.span)),
                },
            },
            _ => Err(mismatch("expected a type", expr.span)),
        }
    }

    fn named_type(&self, name: &str, span: Span) -> Result<TypeSpec, TranslationError> {
        match name {
            "int" | "DSInt" => return Ok(TypeSpec::int()),
            "float" | "DSFloat" => return Ok(TypeSpec::float()),
            "bool" | "DSBool" => return Ok(TypeSpec::Bool),
            _ => {}
        }
        match self.scopes.lookup(name).map(|s| &s.kind) {
            Some(SymbolKind::Type(ty)) => Ok(ty.clone()),
            Some(_) => Err(mismatch(format!("`{name}` is not a type"), span)),
            None => Err(unknown(format!("unknown type `{name}`"), span)),
        }
    }

    fn bounds<'a>(&self, callee: &Ident, args: &'a [CallArg]) -> Result<[Option<&'a Expr>; 2], TranslationError> {
        let bound = bind_args(args, &["lb", "ub"], callee)?;
        Ok([bound[0], bound[1]])
    }

    fn bound_value(&mut self, expr: &Expr) -> Result<Value, TranslationError> {
        match self.eval(expr)? {
            Operand::Const { value, .. } => Ok(value),
            _ => Err(unresolved("type bounds must be known at translation time", expr.span)),
        }
    }

    fn int_bound(&mut self, expr: &Expr) -> Result<i64, TranslationError> {
        match self.bound_value(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch(format!("expected an integer bound, found {}", other.kind_name()), expr.span)),
        }
    }

    fn float_bound(&mut self, expr: &Expr) -> Result<f64, TranslationError> {
        let value = self.bound_value(expr)?;
        match value {
            Value::Int(_) | Value::Float(_) => Ok(value.as_f64().unwrap_or_default()),
            other => Err(mismatch(format!("expected a numeric bound, found {}", other.kind_name()), expr.span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mzdsl_ast::span;

    #[test]
    fn coerce_widens_and_reorders() {
        let ty = TypeSpec::Record {
            name: "P".to_string(),
            fields: vec![("x".to_string(), TypeSpec::float()), ("y".to_string(), TypeSpec::int())],
        };
        let value = Value::Record(vec![("y".to_string(), Value::Int(2)), ("x".to_string(), Value::Int(1))]);
        assert_eq!(
            coerce(value, &ty),
            Value::Record(vec![("x".to_string(), Value::Float(1.0)), ("y".to_string(), Value::Int(2))])
        );
    }

    #[test]
    fn untyped_list_constants_get_list_types() {
        let m = Value::List(vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::List(vec![Value::Int(3), Value::Int(4)]),
        ]);
        let ty = type_of_value(&m, span(0, 1)).unwrap();
        assert_eq!(ty.dims(), vec![2, 2]);
        let ragged = Value::List(vec![Value::List(vec![Value::Int(1)]), Value::List(vec![])]);
        assert!(type_of_value(&ragged, span(0, 1)).is_err());
    }
}
