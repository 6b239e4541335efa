#![forbid(unsafe_code)]

use mzdsl_ir::{DeclKind, Declaration, Goal, Program, TypeSpec, format_float};
use tracing::debug_span;

/// Renders a lowered program as MiniZinc text: declarations in source order,
/// then constraints, then the solve item.
pub fn emit_program(program: &Program) -> String {
    let _span = debug_span!(
        "emit.minizinc",
        declarations = program.declarations.len(),
        constraints = program.constraints.len()
    )
    .entered();

    let mut out = String::new();
    for decl in program.declarations.values() {
        out.push_str(&emit_declaration(decl));
        out.push('\n');
    }
    if !program.declarations.is_empty() {
        out.push('\n');
    }

    for c in &program.constraints {
        out.push_str("constraint ");
        match c.guards.as_slice() {
            [] => {}
            [guard] => {
                out.push_str(guard);
                out.push_str(" -> ");
            }
            guards => {
                out.push('(');
                out.push_str(&guards.join(" /\\ "));
                out.push_str(") -> ");
            }
        }
        out.push_str(&c.body);
        out.push_str(";\n");
    }
    if !program.constraints.is_empty() {
        out.push('\n');
    }

    match &program.goal {
        Goal::Satisfy => out.push_str("solve satisfy;\n"),
        Goal::Minimize(e) => out.push_str(&format!("solve minimize {e};\n")),
        Goal::Maximize(e) => out.push_str(&format!("solve maximize {e};\n")),
    }
    out
}

fn emit_declaration(decl: &Declaration) -> String {
    match decl.kind {
        DeclKind::TypeAlias => format!("type {} = {};", decl.name, render_type(&decl.ty, false)),
        DeclKind::Constant => {
            let value = decl.value.as_ref().map(|v| v.render()).unwrap_or_default();
            format!("{}: {} = {value};", render_type(&decl.ty, false), decl.name)
        }
        DeclKind::Variable => format!("{}: {};", render_type(&decl.ty, true), decl.name),
    }
}

/// MiniZinc spelling of `ty`. Aliases render by name, except that arrays of
/// decision variables are always spelled out.
pub fn render_type(ty: &TypeSpec, var: bool) -> String {
    let prefix = if var { "var " } else { "" };
    match ty {
        TypeSpec::Named { target, .. } if var && target.is_list() => render_type(target, var),
        TypeSpec::Named { name, .. } => format!("{prefix}{name}"),
        TypeSpec::Int { lb: Some(lb), ub: Some(ub) } => format!("{prefix}{lb}..{ub}"),
        TypeSpec::Int { .. } => format!("{prefix}int"),
        TypeSpec::Float { lb: Some(lb), ub: Some(ub) } => {
            format!("{prefix}{}..{}", format_float(*lb), format_float(*ub))
        }
        TypeSpec::Float { .. } => format!("{prefix}float"),
        TypeSpec::Bool => format!("{prefix}bool"),
        TypeSpec::List { .. } => {
            let ranges = ty
                .dims()
                .iter()
                .map(|d| format!("1..{d}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("array[{ranges}] of {}", render_type(ty.element(), var))
        }
        TypeSpec::Record { fields, .. } => {
            let fields = fields
                .iter()
                .map(|(name, fty)| format!("{}: {name}", render_type(fty, false)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{prefix}record({fields})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mzdsl_ir::{Constraint, Value};

    fn decl(name: &str, kind: DeclKind, ty: TypeSpec, value: Option<Value>) -> Declaration {
        Declaration {
            name: name.to_string(),
            kind,
            ty,
            value,
            span: mzdsl_ast::span(0, 1),
        }
    }

    fn boxes() -> TypeSpec {
        TypeSpec::Named {
            name: "Box".to_string(),
            target: Box::new(TypeSpec::Int { lb: Some(1), ub: Some(4) }),
        }
    }

    #[test]
    fn declarations_render_in_order() {
        let mut p = Program::new();
        p.declare(decl("Box", DeclKind::TypeAlias, TypeSpec::Int { lb: Some(1), ub: Some(4) }, None))
            .unwrap();
        p.declare(decl("N", DeclKind::Constant, TypeSpec::int(), Some(Value::Int(4)))).unwrap();
        let list = TypeSpec::List { length: 5, elem: Box::new(boxes()) };
        p.declare(decl("assignment", DeclKind::Variable, list, None)).unwrap();
        let out = emit_program(&p);
        assert_eq!(
            out,
            "type Box = 1..4;\nint: N = 4;\narray[1..5] of var Box: assignment;\n\nsolve satisfy;\n"
        );
    }

    #[test]
    fn aliased_arrays_of_variables_are_spelled_out() {
        let row = TypeSpec::Named {
            name: "Row".to_string(),
            target: Box::new(TypeSpec::List { length: 3, elem: Box::new(TypeSpec::Bool) }),
        };
        let grid = TypeSpec::List { length: 2, elem: Box::new(row.clone()) };
        assert_eq!(render_type(&grid, true), "array[1..2, 1..3] of var bool");
        assert_eq!(render_type(&row, false), "Row");
    }

    #[test]
    fn records_and_floats() {
        let point = TypeSpec::Record {
            name: "Point".to_string(),
            fields: vec![
                ("x".to_string(), TypeSpec::Float { lb: Some(0.0), ub: Some(1.5) }),
                ("tag".to_string(), boxes()),
            ],
        };
        assert_eq!(render_type(&point, false), "record(0.0..1.5: x, Box: tag)");
    }

    #[test]
    fn guarded_constraints_and_goal() {
        let mut p = Program::new();
        p.constrain(Constraint::unconditional("x > 0"));
        p.constrain(Constraint {
            guards: vec!["a".to_string()],
            body: "c".to_string(),
        });
        p.constrain(Constraint {
            guards: vec!["a".to_string(), "b".to_string()],
            body: "c".to_string(),
        });
        p.goal = Goal::Minimize("x".to_string());
        let out = emit_program(&p);
        assert_eq!(
            out,
            "constraint x > 0;\nconstraint a -> c;\nconstraint (a /\\ b) -> c;\n\nsolve minimize x;\n"
        );
    }
}
