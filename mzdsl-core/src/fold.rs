#![forbid(unsafe_code)]

//! Constant folding over translation-time values. Integer arithmetic follows
//! the source language: `/` yields a float, `//` floors and `%` takes the
//! sign of the divisor.

use std::cmp::Ordering;

use mzdsl_ast::{BinOp, CmpOp, Span, UnaryOp};
use mzdsl_ir::Value;

use crate::error::{ErrorKind, TranslationError, mismatch};

fn arithmetic(message: impl Into<String>, span: Span) -> TranslationError {
    TranslationError::new(ErrorKind::Arithmetic, message, span)
}

fn overflow(span: Span) -> TranslationError {
    arithmetic("integer overflow while folding a constant", span)
}

pub fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        Value::List(items) => !items.is_empty(),
        Value::Record(_) => true,
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

/// Length of a list of `len` elements repeated `times` times.
pub fn repeated_len(len: usize, times: i64, span: Span) -> Result<usize, TranslationError> {
    let times = usize::try_from(times).unwrap_or(0);
    len.checked_mul(times)
        .ok_or_else(|| arithmetic("list repetition is too large", span))
}

pub fn binary(left: &Value, op: BinOp, right: &Value, span: Span) -> Result<Value, TranslationError> {
    match (left, right) {
        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (Value::List(items), n) | (n, Value::List(items)) if op == BinOp::Mul && !matches!(n, Value::Float(_)) => {
            let Some(times) = n.as_int() else {
                return Err(type_error(left, op, right, span));
            };
            let len = repeated_len(items.len(), times, span)?;
            let mut out = Vec::with_capacity(len);
            for _ in 0..usize::try_from(times).unwrap_or(0) {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        (Value::Float(_), _) | (_, Value::Float(_)) if is_numeric(left) && is_numeric(right) => {
            let a = left.as_f64().unwrap_or_default();
            let b = right.as_f64().unwrap_or_default();
            float_binary(a, op, b, span).map(Value::Float)
        }
        _ => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) if is_numeric(left) && is_numeric(right) => int_binary(a, op, b, span),
            _ => Err(type_error(left, op, right, span)),
        },
    }
}

fn type_error(left: &Value, op: BinOp, right: &Value, span: Span) -> TranslationError {
    mismatch(
        format!(
            "unsupported operand types for {}: {} and {}",
            op_symbol(op),
            left.kind_name(),
            right.kind_name()
        ),
        span,
    )
}

fn int_binary(a: i64, op: BinOp, b: i64, span: Span) -> Result<Value, TranslationError> {
    let zero = || arithmetic("division by zero in a constant expression", span);
    let n = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(|| overflow(span))?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(|| overflow(span))?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(|| overflow(span))?,
        BinOp::Div => {
            if b == 0 {
                return Err(zero());
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(zero());
            }
            let q = a.checked_div(b).ok_or_else(|| overflow(span))?;
            if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(zero());
            }
            let r = a.checked_rem(b).ok_or_else(|| overflow(span))?;
            if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(zero());
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow(span))?;
            a.checked_pow(exp).ok_or_else(|| overflow(span))?
        }
    };
    Ok(Value::Int(n))
}

fn float_binary(a: f64, op: BinOp, b: f64, span: Span) -> Result<f64, TranslationError> {
    let divides = matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod);
    if divides && b == 0.0 {
        return Err(arithmetic("division by zero in a constant expression", span));
    }
    Ok(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => a - b * (a / b).floor(),
        BinOp::Pow => a.powf(b),
    })
}

pub fn unary(op: UnaryOp, value: &Value, span: Span) -> Result<Value, TranslationError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!truthy(v))),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Pos, Value::Float(x)) => Ok(Value::Float(*x)),
        (UnaryOp::Neg, v @ (Value::Int(_) | Value::Bool(_))) => {
            let n = v.as_int().unwrap_or_default();
            n.checked_neg().map(Value::Int).ok_or_else(|| overflow(span))
        }
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Bool(_))) => Ok(Value::Int(v.as_int().unwrap_or_default())),
        (_, v) => Err(mismatch(format!("bad operand type for unary minus: {}", v.kind_name()), span)),
    }
}

pub fn compare(left: &Value, op: CmpOp, right: &Value, span: Span) -> Result<bool, TranslationError> {
    let ordering = if is_numeric(left) && is_numeric(right) {
        match (left, right) {
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                let a = left.as_f64().unwrap_or_default();
                let b = right.as_f64().unwrap_or_default();
                a.partial_cmp(&b)
            }
            _ => left.as_int().zip(right.as_int()).map(|(a, b)| a.cmp(&b)),
        }
    } else if matches!(op, CmpOp::Eq | CmpOp::Ne) {
        let same = left == right;
        return Ok((op == CmpOp::Eq) == same);
    } else {
        return Err(mismatch(
            format!("cannot order {} and {}", left.kind_name(), right.kind_name()),
            span,
        ));
    };
    let Some(ordering) = ordering else {
        return Ok(op == CmpOp::Ne);
    };
    Ok(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    })
}

/// Binary `min`/`max` over comparable values, keeping the first on ties.
pub fn extreme<'v>(
    values: &[&'v Value],
    want: Ordering,
    span: Span,
) -> Result<Option<&'v Value>, TranslationError> {
    let mut best: Option<&Value> = None;
    for v in values {
        best = match best {
            None => Some(v),
            Some(b) => {
                let replace = match want {
                    Ordering::Less => compare(v, CmpOp::Lt, b, span)?,
                    _ => compare(v, CmpOp::Gt, b, span)?,
                };
                if replace { Some(v) } else { Some(b) }
            }
        };
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mzdsl_ast::span;

    fn sp() -> Span {
        span(0, 1)
    }

    fn int(a: i64, op: BinOp, b: i64) -> Value {
        binary(&Value::Int(a), op, &Value::Int(b), sp()).unwrap()
    }

    #[test]
    fn oversized_repetition_is_an_error() {
        let list = Value::List(vec![Value::Int(0), Value::Int(1)]);
        let err = binary(&list, BinOp::Mul, &Value::Int(i64::MAX), sp()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arithmetic);
        assert_eq!(repeated_len(3, -2, sp()).unwrap(), 0);
    }

    #[test]
    fn floor_division_and_modulo_follow_the_divisor() {
        assert_eq!(int(7, BinOp::FloorDiv, 2), Value::Int(3));
        assert_eq!(int(-7, BinOp::FloorDiv, 2), Value::Int(-4));
        assert_eq!(int(-7, BinOp::Mod, 2), Value::Int(1));
        assert_eq!(int(7, BinOp::Mod, -2), Value::Int(-1));
    }

    #[test]
    fn true_division_yields_float() {
        assert_eq!(int(7, BinOp::Div, 2), Value::Float(3.5));
        assert_eq!(int(2, BinOp::Pow, 10), Value::Int(1024));
    }

    #[test]
    fn division_by_zero_and_overflow_are_arithmetic_errors() {
        let err = binary(&Value::Int(1), BinOp::Mod, &Value::Int(0), sp()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arithmetic);
        let err = binary(&Value::Int(i64::MAX), BinOp::Add, &Value::Int(1), sp()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arithmetic);
    }

    #[test]
    fn list_concatenation_and_repetition() {
        let zeros = binary(&Value::List(vec![Value::Int(0)]), BinOp::Mul, &Value::Int(3), sp()).unwrap();
        assert_eq!(zeros, Value::List(vec![Value::Int(0); 3]));
        let both = binary(&zeros, BinOp::Add, &Value::List(vec![Value::Int(1)]), sp()).unwrap();
        assert_eq!(both.flatten().len(), 4);
    }

    #[test]
    fn mixed_comparisons() {
        assert!(compare(&Value::Int(1), CmpOp::Eq, &Value::Float(1.0), sp()).unwrap());
        assert!(compare(&Value::Bool(true), CmpOp::Lt, &Value::Int(2), sp()).unwrap());
        assert!(compare(&Value::List(vec![]), CmpOp::Lt, &Value::Int(2), sp()).is_err());
    }

    #[test]
    fn list_plus_int_is_a_type_error() {
        let err = binary(&Value::List(vec![]), BinOp::Add, &Value::Int(1), sp()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
