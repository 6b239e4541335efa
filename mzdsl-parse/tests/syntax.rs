use mzdsl_ast::{BinOp, BoolOp, CallArg, CmpOp, ComprehensionKind, Direction, ExprKind, Stmt};
use mzdsl_parse::{parse_expr, parse_module, parse_source};

#[test]
fn annotated_declarations_and_type_aliases_parse() {
    let src = r#"
NBOXES = 4
Box = DSInt(lb=1, ub=NBOXES)
assignment: DSList(5, Box)
VALUES: DSList(2) = [1, 2];
"#;
    let module = parse_source(src).expect("declarations should parse");
    assert_eq!(module.stmts.len(), 4);

    let Stmt::Assign(alias) = &module.stmts[1] else {
        panic!("expected an assignment for the alias");
    };
    let ExprKind::Call { callee, args } = &alias.value.kind else {
        panic!("expected a constructor call");
    };
    assert_eq!(callee.node, "DSInt");
    assert!(matches!(&args[0], CallArg::Named { name, .. } if name.node == "lb"));

    let Stmt::AnnAssign(decl) = &module.stmts[2] else {
        panic!("expected an annotated declaration");
    };
    assert_eq!(decl.target.node, "assignment");
    assert!(decl.value.is_none());

    let Stmt::AnnAssign(constant) = &module.stmts[3] else {
        panic!("expected an annotated constant");
    };
    assert!(matches!(
        constant.value.as_ref().map(|v| &v.kind),
        Some(ExprKind::List(items)) if items.len() == 2
    ));
}

#[test]
fn nested_blocks_and_elif_parse() {
    let src = r#"
for i in range(1, 4):
    if i == 1:
        assert x[i] > 0
    elif i == 2:
        pass
    else:
        x[i] = 0
"#;
    let module = parse_source(src).expect("nested blocks should parse");
    let Stmt::For(f) = &module.stmts[0] else {
        panic!("expected a for loop");
    };
    assert_eq!(f.targets.len(), 1);
    let Stmt::If(outer) = &f.body.stmts[0] else {
        panic!("expected an if statement");
    };
    let else_block = outer.else_block.as_ref().expect("elif becomes an else block");
    let Stmt::If(inner) = &else_block.stmts[0] else {
        panic!("expected the elif as a nested if");
    };
    assert!(inner.else_block.is_some());
}

#[test]
fn function_with_annotations_and_tuple_return() {
    let src = "def f(a: int, b) -> int:\n    c = a + b\n    return c, a * b\nc, d = f(1, 2)\n";
    let module = parse_source(src).expect("function should parse");
    let Stmt::FunctionDef(def) = &module.stmts[0] else {
        panic!("expected a function definition");
    };
    assert_eq!(def.params.len(), 2);
    assert!(def.params[0].annotation.is_some());
    assert!(def.ret.is_some());
    let Some(Stmt::Return(ret)) = def.body.stmts.last() else {
        panic!("expected a trailing return");
    };
    assert!(matches!(
        ret.value.as_ref().map(|v| &v.kind),
        Some(ExprKind::Tuple(items)) if items.len() == 2
    ));
    let Stmt::Assign(unpack) = &module.stmts[1] else {
        panic!("expected tuple unpacking");
    };
    assert!(matches!(&unpack.target.kind, ExprKind::Tuple(items) if items.len() == 2));
}

#[test]
fn objective_calls_become_objective_statements() {
    let module = parse_source("minimize(objective)\nmaximize(x + 1)\n").expect("objective should parse");
    assert!(matches!(
        &module.stmts[0],
        Stmt::Objective(o) if o.direction == Direction::Minimize
    ));
    assert!(matches!(
        &module.stmts[1],
        Stmt::Objective(o) if o.direction == Direction::Maximize
    ));
}

#[test]
fn objective_requires_one_argument() {
    let err = parse_module("minimize(a, b)\n").expect_err("expected parse error");
    assert!(err.message.contains("exactly one"), "unexpected: {}", err.message);
}

#[test]
fn generator_argument_parses_as_comprehension() {
    let expr = parse_expr("sum(w[j] * (a[j] == i) for j in range(1, 6) if j != 2)").expect("generator");
    let ExprKind::Call { callee, args } = &expr.kind else {
        panic!("expected a call");
    };
    assert_eq!(callee.node, "sum");
    let [CallArg::Positional(arg)] = args.as_slice() else {
        panic!("expected one positional argument");
    };
    let ExprKind::Comprehension(comp) = &arg.kind else {
        panic!("expected a comprehension");
    };
    assert_eq!(comp.kind, ComprehensionKind::Generator);
    assert_eq!(comp.targets[0].node, "j");
    assert_eq!(comp.filters.len(), 1);
}

#[test]
fn list_comprehension_parses() {
    let expr = parse_expr("[x * 2 for x in VALUES]").expect("list comprehension");
    let ExprKind::Comprehension(comp) = &expr.kind else {
        panic!("expected a comprehension");
    };
    assert_eq!(comp.kind, ComprehensionKind::List);
}

#[test]
fn precedence_follows_python() {
    let expr = parse_expr("2 * 3 + 1").expect("arith");
    let ExprKind::Binary { op, left, .. } = &expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinOp::Add);
    assert!(matches!(left.kind, ExprKind::Binary { op: BinOp::Mul, .. }));

    // `-2 ** 2` is `-(2 ** 2)`.
    let expr = parse_expr("-2 ** 2").expect("power");
    assert!(matches!(
        &expr.kind,
        ExprKind::Unary { expr, .. } if matches!(expr.kind, ExprKind::Binary { op: BinOp::Pow, .. })
    ));

    let expr = parse_expr("not a and b or c").expect("bool ops");
    let ExprKind::BoolOp { op: BoolOp::Or, values } = &expr.kind else {
        panic!("expected `or` at the top");
    };
    assert!(matches!(values[0].kind, ExprKind::BoolOp { op: BoolOp::And, .. }));
}

#[test]
fn chained_comparisons_keep_every_operator() {
    let expr = parse_expr("0 <= x < 10").expect("chained comparison");
    let ExprKind::Compare { rest, .. } = &expr.kind else {
        panic!("expected a comparison");
    };
    let ops: Vec<CmpOp> = rest.iter().map(|(op, _)| *op).collect();
    assert_eq!(ops, vec![CmpOp::Le, CmpOp::Lt]);
}

#[test]
fn conditional_expression_and_multi_index() {
    let expr = parse_expr("m[i, j] if i < j else 0").expect("ternary");
    let ExprKind::IfExp { then, .. } = &expr.kind else {
        panic!("expected a conditional expression");
    };
    assert!(matches!(&then.kind, ExprKind::Index { indices, .. } if indices.len() == 2));
}

#[test]
fn inline_suite_and_semicolons() {
    let module = parse_source("if a > 0: assert b; assert c\nx = 1; y = 2\n").expect("inline suite");
    let Stmt::If(i) = &module.stmts[0] else {
        panic!("expected an if");
    };
    assert_eq!(i.then_block.stmts.len(), 2);
    assert_eq!(module.stmts.len(), 3);
}

#[test]
fn augmented_assignment_parses() {
    let module = parse_source("cap[i] += W[j]\n").expect("augmented assignment");
    assert!(matches!(&module.stmts[0], Stmt::AugAssign(a) if a.op == BinOp::Add));
}

#[test]
fn while_loops_are_rejected() {
    let err = parse_module("while x:\n    pass\n").expect_err("expected parse error");
    assert!(err.message.contains("while"), "unexpected: {}", err.message);
    assert_eq!(err.span.offset(), 0);
}

#[test]
fn invalid_assignment_target_is_rejected() {
    let err = parse_module("f(x) = 3\n").expect_err("expected parse error");
    assert!(err.message.contains("invalid assignment target"));
}

#[test]
fn missing_colon_points_at_offending_token() {
    let err = parse_module("for i in range(3)\n    pass\n").expect_err("expected parse error");
    assert!(err.message.contains("expected `:`"), "unexpected: {}", err.message);
}

#[test]
fn lex_errors_surface_as_parse_errors() {
    let err = parse_module("x = 1 $ 2\n").expect_err("expected parse error");
    assert!(err.message.contains("unexpected character"));
}

#[test]
fn brackets_join_lines() {
    let module = parse_module("W = [4, 2,\n     5, 3]\n").unwrap();
    let Stmt::Assign(a) = &module.stmts[0] else {
        panic!("expected an assignment");
    };
    assert!(matches!(&a.value.kind, ExprKind::List(items) if items.len() == 4));
}

#[test]
fn chained_assignment_is_rejected() {
    let err = parse_module("a = b = 1\n").unwrap_err();
    assert!(err.message.contains("chained assignment"));
}
