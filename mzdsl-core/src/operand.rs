#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use mzdsl_ir::{TypeSpec, Value};

use crate::render::Rendered;

/// Result of rewriting an expression: either fully known, or a piece of
/// target-language text together with what is known about its structure.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// A translation-time value. `name` is set for a reference to a declared
    /// constant (or a row of one), which renders by name; any operation on it
    /// folds.
    Const { value: Value, name: Option<VarRef> },
    Expr(Rendered),
    Var(VarRef),
    /// A list literal with at least one symbolic member.
    Items(Vec<Operand>),
    /// A list built by element assignment, keyed by source-level index.
    Table(BTreeMap<i64, Operand>),
    Tuple(Vec<Operand>),
    Record(Vec<(String, Operand)>),
}

impl Operand {
    pub fn value(value: Value) -> Self {
        Operand::Const { value, name: None }
    }

    pub fn int(n: i64) -> Self {
        Operand::value(Value::Int(n))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Const { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.as_value()? {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Operand::Const { .. })
    }

    /// Collapses to a constant when every member is known.
    pub fn list(items: Vec<Operand>) -> Self {
        if items.iter().all(Operand::is_const) {
            let values = items
                .into_iter()
                .filter_map(|op| match op {
                    Operand::Const { value, .. } => Some(value),
                    _ => None,
                })
                .collect();
            Operand::value(Value::List(values))
        } else {
            Operand::Items(items)
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Operand::Const { value, .. } => value.kind_name(),
            Operand::Expr(_) => "expression",
            Operand::Var(v) if v.ty.is_list() => "variable array",
            Operand::Var(_) => "variable",
            Operand::Items(_) | Operand::Table(_) => "list",
            Operand::Tuple(_) => "tuple",
            Operand::Record(_) => "record",
        }
    }

    pub fn is_list_like(&self) -> bool {
        match self {
            Operand::Const { value, .. } => matches!(value, Value::List(_)),
            Operand::Var(v) => v.ty.is_list(),
            Operand::Items(_) | Operand::Table(_) => true,
            _ => false,
        }
    }
}

/// A decision variable, or a part of one reached through subscripts and
/// field accesses.
#[derive(Clone, Debug, PartialEq)]
pub struct VarRef {
    pub base: String,
    /// Pending subscripts on `base`, already shifted to the target's base.
    pub indices: Vec<Rendered>,
    /// Type of the referenced part.
    pub ty: TypeSpec,
}

impl VarRef {
    pub fn new(base: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            base: base.into(),
            indices: Vec::new(),
            ty,
        }
    }

    pub fn text(&self) -> String {
        if self.indices.is_empty() {
            return self.base.clone();
        }
        let idx = self.indices.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(", ");
        format!("{}[{idx}]", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Prec;
    use mzdsl_ir::Shape;

    #[test]
    fn subscripts_render_as_one_index_list() {
        let mut v = VarRef::new("x", TypeSpec::int());
        assert_eq!(v.text(), "x");
        v.indices.push(Rendered::atom("1", Some(Shape::Int)));
        v.indices.push(Rendered::new("j + 1", Prec::Add, Some(Shape::Int)));
        assert_eq!(v.text(), "x[1, j + 1]");
    }

    #[test]
    fn all_known_members_fold_to_a_constant_list() {
        let list = Operand::list(vec![Operand::int(1), Operand::int(2)]);
        assert_eq!(list.as_value(), Some(&Value::List(vec![Value::Int(1), Value::Int(2)])));
        let mixed = Operand::list(vec![Operand::int(1), Operand::Expr(Rendered::atom("y", None))]);
        assert!(matches!(mixed, Operand::Items(ref items) if items.len() == 2));
    }
}
