use mzdsl_core::{IndexBase, LowerConfig, TranslationError, lower_module};
use mzdsl_ir::{Constraint, DeclKind, Goal, Program, TypeSpec, Value};
use mzdsl_parse::parse_module;

fn lower_with(src: &str, config: &LowerConfig) -> Result<Program, TranslationError> {
    let module = parse_module(src).unwrap_or_else(|e| panic!("parse failed: {e:?}"));
    lower_module(&module, src, config)
}

fn lower(src: &str) -> Program {
    lower_with(src, &LowerConfig::default()).unwrap_or_else(|e| panic!("lowering failed: {e:?}"))
}

#[test]
fn declarations_keep_source_order() {
    let p = lower("Box = DSInt(1, 4)\nN = 2\nassignment: DSList(N, Box)\n");
    let names: Vec<&str> = p.declarations.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Box", "N", "assignment"]);
    assert_eq!(p.count(DeclKind::TypeAlias), 1);
    assert_eq!(p.declaration("N").and_then(|d| d.value.clone()), Some(Value::Int(2)));

    let decl = p.declaration("assignment").unwrap();
    assert_eq!(decl.kind, DeclKind::Variable);
    match &decl.ty {
        TypeSpec::List { length, elem } => {
            assert_eq!(*length, 2);
            assert!(matches!(elem.as_ref(), TypeSpec::Named { name, .. } if name == "Box"));
        }
        other => panic!("expected a list type, got {other:?}"),
    }
}

#[test]
fn guards_are_kept_apart_from_the_body() {
    let src = "\
a: DSBool()
x: DSInt(0, 9)
if a:
    if x > 3:
        assert x != 5
";
    let p = lower(src);
    assert_eq!(
        p.constraints,
        vec![Constraint {
            guards: vec!["a".to_string(), "x > 3".to_string()],
            body: "x != 5".to_string(),
        }]
    );
}

#[test]
fn disjunctive_bodies_are_parenthesized_under_guards() {
    let src = "\
a: DSBool()
b: DSBool()
c: DSBool()
if a:
    assert b or c
";
    let p = lower(src);
    assert_eq!(p.constraints[0].guards, vec!["a"]);
    assert_eq!(p.constraints[0].body, "b \\/ c");
}

#[test]
fn false_assertions_stay_visible() {
    let p = lower("N = 2\nassert N > 3\n");
    assert_eq!(p.constraints, vec![Constraint::unconditional("false")]);
}

#[test]
fn objective_follows_the_accumulator() {
    let src = "\
x: DSList(3, DSBool())
for i in range(1, 4):
    if x[i]:
        objective += i
maximize(objective)
";
    let p = lower(src);
    assert!(p.constraints.is_empty());
    assert_eq!(
        p.goal,
        Goal::Maximize("bool2int(x[1]) + bool2int(x[2]) * 2 + bool2int(x[3]) * 3".to_string())
    );
}

#[test]
fn zero_based_indexing_shifts_subscripts() {
    let config = LowerConfig {
        index_base: IndexBase::Zero,
        native_aggregates: false,
        ..LowerConfig::default()
    };
    let p = lower_with("x: DSList(2, DSInt(0, 3))\nassert x[0] < x[1]\n", &config).unwrap();
    assert_eq!(p.constraints, vec![Constraint::unconditional("x[1] < x[2]")]);
}

#[test]
fn function_locals_are_mangled_per_call() {
    let src = "\
def pick(limit):
    choice: DSInt(0, 3)
    assert choice <= limit

pick(1)
pick(2)
";
    let p = lower(src);
    assert!(p.declaration("choice__pick__1").is_some());
    assert!(p.declaration("choice__pick__2").is_some());
    assert!(p.declaration("choice").is_none());
    let bodies: Vec<&str> = p.constraints.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["choice__pick__1 <= 1", "choice__pick__2 <= 2"]);
}

#[test]
fn errors_stop_lowering() {
    let err = lower_with("x: DSInt(0, 3)\nassert nope\n", &LowerConfig::default()).unwrap_err();
    assert_eq!(err.kind, mzdsl_core::ErrorKind::UnknownSymbol);
}
