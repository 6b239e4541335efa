#![forbid(unsafe_code)]

use crate::types::TypeSpec;

/// A value known at translation time.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    /// Field order is the declaration order of the record type.
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Lengths of a rectangular nested list, outermost first.
    ///
    /// Returns `None` for ragged nesting; scalars have no dimensions.
    pub fn dims(&self) -> Option<Vec<usize>> {
        let Value::List(items) = self else {
            return Some(Vec::new());
        };
        let mut dims = vec![items.len()];
        let Some(first) = items.first() else {
            return Some(dims);
        };
        let inner = first.dims()?;
        for item in &items[1..] {
            if item.dims()? != inner {
                return None;
            }
        }
        if matches!(first, Value::List(_)) {
            dims.extend(inner);
        }
        Some(dims)
    }

    /// Leaves of a nested list in row-major order.
    pub fn flatten(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().flat_map(Value::flatten).collect(),
            other => vec![other],
        }
    }

    /// Target-language literal.
    pub fn render(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(x) => format_float(*x),
            Value::Bool(b) => b.to_string(),
            Value::Record(fields) => {
                let inner = fields
                    .iter()
                    .map(|(name, v)| format!("{name}: {}", v.render()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({inner})")
            }
            Value::List(items) => {
                let dims = self.dims().unwrap_or_else(|| vec![items.len()]);
                if dims.len() < 2 {
                    let inner = items.iter().map(Value::render).collect::<Vec<_>>().join(", ");
                    return format!("[{inner}]");
                }
                let ranges = dims
                    .iter()
                    .map(|d| format!("1..{d}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let flat = self
                    .flatten()
                    .into_iter()
                    .map(Value::render)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("array{}d({ranges}, [{flat}])", dims.len())
            }
        }
    }

    /// Whether this value inhabits `ty` (bounds, lengths and record fields).
    pub fn conforms_to(&self, ty: &TypeSpec) -> bool {
        match (self, ty.resolved()) {
            (Value::Int(n), TypeSpec::Int { lb, ub }) => {
                lb.is_none_or(|lb| *n >= lb) && ub.is_none_or(|ub| *n <= ub)
            }
            (Value::Bool(_), TypeSpec::Int { lb: None, ub: None }) => true,
            (Value::Int(_) | Value::Float(_), TypeSpec::Float { lb, ub }) => {
                let x = self.as_f64().unwrap_or(f64::NAN);
                lb.is_none_or(|lb| x >= lb) && ub.is_none_or(|ub| x <= ub)
            }
            (Value::Bool(_), TypeSpec::Bool) => true,
            (Value::List(items), TypeSpec::List { length, elem }) => {
                items.len() == *length && items.iter().all(|v| v.conforms_to(elem))
            }
            (Value::Record(values), TypeSpec::Record { fields, .. }) => {
                values.len() == fields.len()
                    && values
                        .iter()
                        .zip(fields)
                        .all(|((vn, v), (fname, fty))| vn == fname && v.conforms_to(fty))
            }
            _ => false,
        }
    }
}

/// Floats always carry a fractional part so the target reads them as floats.
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(v: &[i64]) -> Value {
        Value::List(v.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn render_scalars() {
        assert_eq!(Value::Int(-3).render(), "-3");
        assert_eq!(Value::Float(7.0).render(), "7.0");
        assert_eq!(Value::Float(0.25).render(), "0.25");
        assert_eq!(Value::Bool(true).render(), "true");
    }

    #[test]
    fn render_one_and_two_dimensional_lists() {
        assert_eq!(ints(&[5, 5, 5, 5]).render(), "[5, 5, 5, 5]");
        let m = Value::List(vec![ints(&[1, 2, 3]), ints(&[4, 5, 6])]);
        assert_eq!(m.dims(), Some(vec![2, 3]));
        assert_eq!(m.render(), "array2d(1..2, 1..3, [1, 2, 3, 4, 5, 6])");
    }

    #[test]
    fn ragged_lists_have_no_dims() {
        let ragged = Value::List(vec![ints(&[1, 2]), ints(&[3])]);
        assert_eq!(ragged.dims(), None);
    }

    #[test]
    fn render_record() {
        let r = Value::Record(vec![("x".to_string(), Value::Int(0)), ("y".to_string(), Value::Float(1.5))]);
        assert_eq!(r.render(), "(x: 0, y: 1.5)");
    }

    #[test]
    fn conformance_checks_bounds_and_lengths() {
        let small = TypeSpec::Int { lb: Some(1), ub: Some(4) };
        assert!(Value::Int(4).conforms_to(&small));
        assert!(!Value::Int(5).conforms_to(&small));

        let list = TypeSpec::List { length: 3, elem: Box::new(TypeSpec::int()) };
        assert!(ints(&[1, 2, 3]).conforms_to(&list));
        assert!(!ints(&[1, 2]).conforms_to(&list));
        assert!(Value::Int(2).conforms_to(&TypeSpec::float()));
    }
}
