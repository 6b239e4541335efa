use mzdsl::{ErrorKind, TranslationError, TranslatorConfig, translate, translate_with_config};

fn fails(src: &str) -> TranslationError {
    match translate(src) {
        Ok(out) => panic!("expected an error, got:\n{out}"),
        Err(err) => err,
    }
}

fn text<'a>(src: &'a str, span: mzdsl_ast::Span) -> &'a str {
    &src[span.offset()..span.offset() + span.len()]
}

#[test]
fn malformed_input_is_a_syntax_error() {
    let err = fails("x = (1 +\n");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.to_string().starts_with("syntax error: "));
}

#[test]
fn unknown_names_point_at_the_name() {
    let src = "x: DSInt(0, 3)\nassert y > 0\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::UnknownSymbol);
    assert_eq!(text(src, err.span), "y");
    assert!(err.to_string().starts_with("unknown symbol: "));
}

#[test]
fn constants_cannot_change_value() {
    let src = "N = 3\nN = 4\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Redeclaration);
    assert_eq!(err.span.offset(), 6);
    assert_eq!(text(src, err.span), "N");
}

#[test]
fn variables_cannot_change_type() {
    let src = "x: DSInt(0, 3)\nx: DSInt(0, 4)\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Redeclaration);
    assert_eq!(err.span.offset(), 15);
}

#[test]
fn the_objective_is_set_once() {
    let src = "x: DSInt(0, 3)\nminimize(x)\nmaximize(x)\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Redeclaration);
    assert!(text(src, err.span).starts_with("maximize"));
}

#[test]
fn list_lengths_must_be_constant() {
    let src = "n: DSInt(1, 3)\nxs: DSList(n, DSBool())\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::UnresolvedBound);
    assert_eq!(text(src, err.span), "n");
}

#[test]
fn loop_bounds_must_be_constant() {
    let src = "x: DSInt(1, 3)\nfor i in range(x):\n    assert x >= i\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::UnresolvedBound);
    assert_eq!(text(src, err.span), "x");
    assert_eq!(err.span.offset(), 30);
}

#[test]
fn scalars_do_not_fit_lists() {
    let src = "x: DSList(3, DSInt(0, 9))\nx = 5\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert_eq!(text(src, err.span), "x = 5");
}

#[test]
fn constants_must_fit_their_annotation() {
    let err = fails("N: DSInt(0, 5) = 7\n");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert!(err.message.contains("does not fit"));
}

#[test]
fn direct_recursion_reports_the_call_chain() {
    let src = "\
def f(v):
    f(v)

x: DSInt(0, 1)
f(x)
";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Recursion);
    assert_eq!(text(src, err.span), "f(v)");
    assert_eq!(err.call_sites.len(), 1);
    assert_eq!(text(src, err.call_sites[0]), "f(x)");
}

#[test]
fn mutual_recursion_is_detected() {
    let src = "\
def g(v):
    h(v)

def h(v):
    g(v)

x: DSInt(0, 1)
g(x)
";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Recursion);
    assert!(err.message.contains("g -> h -> g"), "{}", err.message);
    let sites: Vec<&str> = err.call_sites.iter().map(|s| text(src, *s)).collect();
    assert_eq!(sites, vec!["h(v)", "g(x)"]);
}

#[test]
fn errors_inside_functions_carry_the_call_site() {
    let src = "\
def check(v):
    assert v > missing

x: DSInt(0, 1)
check(x)
";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::UnknownSymbol);
    assert_eq!(text(src, err.span), "missing");
    assert_eq!(err.call_sites.len(), 1);
    assert_eq!(text(src, err.call_sites[0]), "check(x)");
}

#[test]
fn stepped_ranges_are_unsupported() {
    let err = fails("x: DSInt(0, 9)\nfor i in range(0, 10, 2):\n    assert x != i\n");
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert!(err.to_string().starts_with("unsupported: "));
}

#[test]
fn return_must_end_the_function() {
    let src = "\
def f(v):
    return v
    assert v > 0
";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert!(text(src, err.span).starts_with("return"));
}

#[test]
fn unrolling_is_bounded() {
    let config = TranslatorConfig {
        max_unrolled_statements: 10,
        ..TranslatorConfig::default()
    };
    let src = "x: DSInt(0, 200)\nfor i in range(100):\n    assert x != i\n";
    let err = translate_with_config(src, &config).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert!(err.message.contains("10"), "{}", err.message);
}

#[test]
fn constant_division_by_zero() {
    let err = fails("N = 1 // 0\n");
    assert_eq!(err.kind, ErrorKind::Arithmetic);
    assert!(err.to_string().starts_with("arithmetic error: "));
}

#[test]
fn iterating_a_declared_list_is_bounded() {
    let src = "x: DSList(4000000000, DSBool())\nfor v in x:\n    assert v\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert_eq!(text(src, err.span), "x");

    let config = TranslatorConfig {
        max_unrolled_statements: 10,
        ..TranslatorConfig::default()
    };
    let src = "x: DSList(20, DSBool())\nfor i, v in enumerate(x):\n    assert v\n";
    let err = translate_with_config(src, &config).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert!(err.message.contains("20"), "{}", err.message);
}

#[test]
fn list_repetition_is_bounded() {
    let err = fails("X = [0] * 4611686018427387904\n");
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert!(err.message.contains("repeated list"), "{}", err.message);

    let err = fails("X = [0, 0] * 9223372036854775807\n");
    assert_eq!(err.kind, ErrorKind::Arithmetic);

    let err = fails("x: DSInt(0, 3)\nys = [x] * 4611686018427387904\n");
    assert_eq!(err.kind, ErrorKind::Unsupported);
}

#[test]
fn enumerate_without_arguments_points_at_the_call() {
    let src = "for i, v in enumerate():\n    assert v\n";
    let err = fails(src);
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert_eq!(text(src, err.span), "enumerate()");
}
