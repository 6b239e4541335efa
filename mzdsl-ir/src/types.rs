#![forbid(unsafe_code)]

/// Resolved domain of a constant, decision variable or type alias.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    Int {
        lb: Option<i64>,
        ub: Option<i64>,
    },
    Float {
        lb: Option<f64>,
        ub: Option<f64>,
    },
    Bool,
    List {
        length: usize,
        elem: Box<TypeSpec>,
    },
    Record {
        name: String,
        fields: Vec<(String, TypeSpec)>,
    },
    /// Reference to a registered alias; rendered by name where the target
    /// grammar allows it.
    Named {
        name: String,
        target: Box<TypeSpec>,
    },
}

/// Scalar category of a type after following aliases and list nesting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Int,
    Float,
    Bool,
    Record,
}

impl TypeSpec {
    pub fn int() -> Self {
        TypeSpec::Int { lb: None, ub: None }
    }

    pub fn float() -> Self {
        TypeSpec::Float { lb: None, ub: None }
    }

    /// Follows alias references to the structural type.
    pub fn resolved(&self) -> &TypeSpec {
        match self {
            TypeSpec::Named { target, .. } => target.resolved(),
            other => other,
        }
    }

    /// Array dimensions, outermost first; empty for scalars and records.
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = Vec::new();
        let mut cur = self.resolved();
        while let TypeSpec::List { length, elem } = cur {
            dims.push(*length);
            cur = elem.resolved();
        }
        dims
    }

    /// Innermost non-list element, keeping its alias name if it has one.
    pub fn element(&self) -> &TypeSpec {
        match self.resolved() {
            TypeSpec::List { elem, .. } => elem.element(),
            _ => self,
        }
    }

    pub fn shape(&self) -> Shape {
        match self.element().resolved() {
            TypeSpec::Int { .. } => Shape::Int,
            TypeSpec::Float { .. } => Shape::Float,
            TypeSpec::Bool => Shape::Bool,
            TypeSpec::Record { .. } | TypeSpec::List { .. } | TypeSpec::Named { .. } => Shape::Record,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.resolved(), TypeSpec::List { .. })
    }

    /// Type after applying `n` subscripts.
    pub fn indexed(&self, n: usize) -> Option<&TypeSpec> {
        let mut cur = self;
        for _ in 0..n {
            match cur.resolved() {
                TypeSpec::List { elem, .. } => cur = elem,
                _ => return None,
            }
        }
        Some(cur)
    }

    pub fn field(&self, name: &str) -> Option<&TypeSpec> {
        match self.resolved() {
            TypeSpec::Record { fields, .. } => fields.iter().find(|(f, _)| f == name).map(|(_, t)| t),
            _ => None,
        }
    }

    /// Compact description for diagnostics.
    pub fn display(&self) -> String {
        match self {
            TypeSpec::Int { lb, ub } => match (lb, ub) {
                (Some(lb), Some(ub)) => format!("DSInt({lb}, {ub})"),
                _ => "int".to_string(),
            },
            TypeSpec::Float { lb, ub } => match (lb, ub) {
                (Some(lb), Some(ub)) => format!("DSFloat({lb}, {ub})"),
                _ => "float".to_string(),
            },
            TypeSpec::Bool => "bool".to_string(),
            TypeSpec::List { length, elem } => format!("DSList({length}, {})", elem.display()),
            TypeSpec::Record { name, .. } => name.clone(),
            TypeSpec::Named { name, .. } => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> TypeSpec {
        TypeSpec::List {
            length: 2,
            elem: Box::new(TypeSpec::Named {
                name: "Row".to_string(),
                target: Box::new(TypeSpec::List {
                    length: 3,
                    elem: Box::new(TypeSpec::Named {
                        name: "Small".to_string(),
                        target: Box::new(TypeSpec::Int { lb: Some(0), ub: Some(9) }),
                    }),
                }),
            }),
        }
    }

    #[test]
    fn dims_follow_aliases() {
        assert_eq!(matrix().dims(), vec![2, 3]);
        assert_eq!(TypeSpec::Bool.dims(), Vec::<usize>::new());
    }

    #[test]
    fn element_keeps_alias_name() {
        let m = matrix();
        assert!(matches!(m.element(), TypeSpec::Named { name, .. } if name == "Small"));
        assert_eq!(m.shape(), Shape::Int);
    }

    #[test]
    fn indexed_and_field_lookup() {
        let m = matrix();
        assert_eq!(m.indexed(2).map(TypeSpec::shape), Some(Shape::Int));
        assert!(m.indexed(3).is_none());

        let point = TypeSpec::Record {
            name: "Point".to_string(),
            fields: vec![("x".to_string(), TypeSpec::int()), ("y".to_string(), TypeSpec::float())],
        };
        assert_eq!(point.field("y"), Some(&TypeSpec::float()));
        assert!(point.field("z").is_none());
    }
}
