use mzdsl::config::IndexBaseSetting;
use mzdsl::{Goal, TranslatorConfig, translate, translate_with_config};

fn lines(src: &str) -> Vec<String> {
    let out = translate(src).unwrap_or_else(|e| panic!("translation failed: {e:?}"));
    out.as_str().lines().map(str::to_string).collect()
}

fn constraints(src: &str) -> Vec<String> {
    lines(src)
        .into_iter()
        .filter_map(|l| l.strip_prefix("constraint ").map(|c| c.trim_end_matches(';').to_string()))
        .collect()
}

fn with(config: TranslatorConfig, src: &str) -> String {
    translate_with_config(src, &config)
        .unwrap_or_else(|e| panic!("translation failed: {e:?}"))
        .into_string()
}

#[test]
fn literal_constants_fold_to_one_value() {
    let out = translate("MAX = 2 * 3 + 1\nHALF = MAX / 2\nT = True + 1\n").unwrap();
    assert_eq!(
        out.as_str(),
        "int: MAX = 7;\nfloat: HALF = 3.5;\nint: T = 2;\n\nsolve satisfy;\n"
    );
}

#[test]
fn nested_ifs_compose_into_one_implication() {
    let src = "\
a: DSBool()
b: DSBool()
c: DSBool()
if a:
    if b:
        assert c
";
    assert_eq!(constraints(src), vec!["(a /\\ b) -> c"]);
}

#[test]
fn constant_conditions_select_a_branch() {
    let src = "\
N = 3
x: DSInt(0, 5)
if N > 2:
    assert x >= 1
else:
    assert x == 0
";
    assert_eq!(constraints(src), vec!["x >= 1"]);
}

#[test]
fn else_branches_are_guarded_by_the_negation() {
    let src = "\
x: DSInt(0, 10)
b: DSBool()
if x > 5:
    assert b
else:
    assert not b
";
    assert_eq!(constraints(src), vec!["x > 5 -> b", "not (x > 5) -> not b"]);
}

#[test]
fn loops_unroll_in_ascending_order() {
    let src = "\
N = 3
x: DSList(N, DSInt(0, 10))
for i in range(1, N + 1):
    assert x[i] >= i
";
    assert_eq!(constraints(src), vec!["x[1] >= 1", "x[2] >= 2", "x[3] >= 3"]);
}

#[test]
fn nested_loops_unroll_depth_first() {
    let src = "\
x: DSList(2, DSList(2, DSInt(0, 3)))
for i in range(1, 3):
    for j in range(1, 3):
        assert x[i][j] != i + j
";
    assert_eq!(
        constraints(src),
        vec!["x[1, 1] != 2", "x[1, 2] != 3", "x[2, 1] != 3", "x[2, 2] != 4"]
    );
}

#[test]
fn empty_ranges_emit_nothing() {
    let src = "\
x: DSList(3, DSInt(0, 10))
for i in range(5, 2):
    assert x[1] >= i
";
    assert!(constraints(src).is_empty());
}

#[test]
fn list_declarations_have_the_constant_length() {
    let out = lines("N = 3\nflags: DSList(N, DSBool())\nrows: DSList(2, DSList(N))\n");
    assert_eq!(out[1], "array[1..3] of var bool: flags;");
    assert_eq!(out[2], "array[1..2, 1..3] of var int: rows;");
}

#[test]
fn calls_match_manual_substitution() {
    let inlined = "\
x: DSList(3, DSInt(0, 9))
def at_least(v, k):
    assert v + 1 >= k * 2
at_least(x[2], 3)
";
    let manual = "\
x: DSList(3, DSInt(0, 9))
assert x[2] + 1 >= 3 * 2
";
    assert_eq!(translate(inlined).unwrap(), translate(manual).unwrap());
}

#[test]
fn return_values_substitute_at_the_call_site() {
    let src = "\
def double(v):
    return v * 2
y: DSInt(0, 20)
x: DSInt(0, 10)
assert y == double(x) + 1
";
    assert_eq!(constraints(src), vec!["y = x * 2 + 1"]);
}

#[test]
fn function_variables_are_declared_per_expansion() {
    let src = "\
def pick(k):
    t: DSInt(0, 5)
    assert t >= k
pick(1)
pick(2)
";
    assert_eq!(
        translate(src).unwrap().as_str(),
        "var 0..5: t__pick__1;\nvar 0..5: t__pick__2;\n\n\
         constraint t__pick__1 >= 1;\nconstraint t__pick__2 >= 2;\n\nsolve satisfy;\n"
    );
}

#[test]
fn bin_assignment_with_target_side_sums() {
    let src = "\
NBOXES = 4
NITEMS = 5
CAPACITY = [5, 5, 5, 5]
WEIGHT = [4, 2, 5, 3, 1]
assignment: DSList(NITEMS, DSInt(1, NBOXES))
for i in range(1, NBOXES + 1):
    load = sum((assignment[j] == i) * WEIGHT[j] for j in range(1, NITEMS + 1))
    assert load <= CAPACITY[i]
    if load > 0:
        objective += 1
minimize(objective)
";
    let load = |i: usize| format!("sum(j in 1..5)(bool2int(assignment[j] = {i}) * WEIGHT[j])");
    let expected: Vec<String> = (1..=4).map(|i| format!("{} <= 5", load(i))).collect();
    assert_eq!(constraints(src), expected);

    let out = lines(src);
    let objective = (1..=4)
        .map(|i| format!("bool2int({} > 0)", load(i)))
        .collect::<Vec<_>>()
        .join(" + ");
    assert_eq!(out.last().map(String::as_str), Some(format!("solve minimize {objective};").as_str()));
}

#[test]
fn bin_assignment_unrolled() {
    let src = "\
NBOXES = 4
NITEMS = 5
CAPACITY = [5, 5, 5, 5]
WEIGHT = [4, 2, 5, 3, 1]
assignment: DSList(NITEMS, DSInt(1, NBOXES))
for i in range(1, NBOXES + 1):
    assert sum((assignment[j] == i) * WEIGHT[j] for j in range(1, NITEMS + 1)) <= CAPACITY[i]
";
    let config = TranslatorConfig {
        native_aggregates: false,
        ..TranslatorConfig::default()
    };
    let out = with(config, src);
    let cs: Vec<&str> = out.lines().filter(|l| l.starts_with("constraint ")).collect();
    assert_eq!(cs.len(), 4);
    assert_eq!(
        cs[0],
        "constraint bool2int(assignment[1] = 1) * 4 + bool2int(assignment[2] = 1) * 2 + \
         bool2int(assignment[3] = 1) * 5 + bool2int(assignment[4] = 1) * 3 + \
         bool2int(assignment[5] = 1) * 1 <= 5;"
    );
    assert!(!out.contains("sum("));
}

#[test]
fn undecided_filters_stay_in_the_aggregate() {
    let src = "\
x: DSList(3, DSInt(0, 5))
assert sum(x[i] for i in range(1, 4) if x[i] > 2) <= 5
";
    assert_eq!(constraints(src), vec!["sum(i in 1..3 where x[i] > 2)(x[i]) <= 5"]);

    let config = TranslatorConfig {
        native_aggregates: false,
        ..TranslatorConfig::default()
    };
    let out = with(config, src);
    assert!(out.contains(
        "constraint bool2int(x[1] > 2) * x[1] + bool2int(x[2] > 2) * x[2] + bool2int(x[3] > 2) * x[3] <= 5;"
    ));
}

#[test]
fn aggregates_over_whole_arrays() {
    let src = "\
flags: DSList(3, DSBool())
x: DSList(3, DSInt(0, 5))
assert all(flags)
assert max(x) - min(x) <= 2
assert any(f for f in flags)
";
    assert_eq!(
        constraints(src),
        vec!["forall(flags)", "max(x) - min(x) <= 2", "flags[1] \\/ flags[2] \\/ flags[3]"]
    );
}

#[test]
fn translation_is_idempotent() {
    let src = "\
N = 4
x: DSList(N, DSInt(0, N))
total = 0
for i in range(1, N + 1):
    if x[i] > 1:
        total += x[i]
assert total <= 2 * N
minimize(total)
";
    let first = translate(src).unwrap();
    let second = translate(src).unwrap();
    assert_eq!(first, second);
}

#[test]
fn guarded_updates_merge_with_the_previous_value() {
    let src = "\
x: DSInt(0, 10)
y = 1
if x > 5:
    y = 2
assert x >= y
";
    assert_eq!(constraints(src), vec!["x >= if x > 5 then 2 else 1 endif"]);
}

#[test]
fn element_assignment_builds_a_table() {
    let src = "\
x: DSList(3, DSInt(0, 5))
for i in range(1, 4):
    load[i] = x[i] * 2
assert sum(load) <= 10
";
    assert_eq!(constraints(src), vec!["x[1] * 2 + x[2] * 2 + x[3] * 2 <= 10"]);
}

#[test]
fn assignments_to_variables_are_equalities() {
    let src = "\
x: DSList(3, DSInt(0, 5))
y: DSInt(0, 9) = x[1] + 1
x[2] = 3
";
    assert_eq!(constraints(src), vec!["y = x[1] + 1", "x[2] = 3"]);
}

#[test]
fn enumerate_starts_at_the_index_base() {
    let src = "\
W = [3, 1]
x: DSList(2, DSInt(0, 1))
for i, w in enumerate(W):
    assert x[i] * w <= 2
";
    assert_eq!(constraints(src), vec!["x[1] * 3 <= 2", "x[2] * 1 <= 2"]);
}

#[test]
fn zero_based_sources_shift_subscripts() {
    let src = "\
x: DSList(3, DSInt(0, 9))
for i in range(3):
    assert x[i] >= i
assert sum(x[i] for i in range(3)) <= 20
for i, v in enumerate(x):
    assert v <= 9 - i
";
    let config = TranslatorConfig {
        index_base: IndexBaseSetting::Zero,
        ..TranslatorConfig::default()
    };
    let out = with(config, src);
    let cs: Vec<&str> = out.lines().filter(|l| l.starts_with("constraint ")).collect();
    assert_eq!(
        cs,
        vec![
            "constraint x[1] >= 0;",
            "constraint x[2] >= 1;",
            "constraint x[3] >= 2;",
            "constraint sum(i in 0..2)(x[i + 1]) <= 20;",
            "constraint x[1] <= 9;",
            "constraint x[2] <= 8;",
            "constraint x[3] <= 7;",
        ]
    );
}

#[test]
fn outer_accumulators_see_function_updates() {
    let src = "\
x: DSList(2, DSBool())
def count(v):
    if v:
        objective += 1
count(x[1])
count(x[2])
minimize(objective)
";
    let out = lines(src);
    assert_eq!(out.last().map(String::as_str), Some("solve minimize bool2int(x[1]) + bool2int(x[2]);"));
}

#[test]
fn the_accumulator_name_is_configurable() {
    let src = "\
x: DSInt(0, 3)
cost += x
cost += 2
maximize(cost)
";
    let config = TranslatorConfig {
        objective_name: "cost".to_string(),
        ..TranslatorConfig::default()
    };
    assert!(with(config, src).ends_with("solve maximize x + 2;\n"));
}

#[test]
fn lowering_reports_counts() {
    let src = "\
Box = DSInt(1, 4)
N = 2
x: DSList(N, Box)
assert x[1] != x[2]
minimize(x[1])
";
    let program = mzdsl::lower(src, &TranslatorConfig::default()).unwrap();
    assert_eq!(program.declarations.len(), 3);
    assert_eq!(program.constraints.len(), 1);
    assert_eq!(program.goal, Goal::Minimize("x[1]".to_string()));
}

#[test]
fn identical_redeclarations_are_accepted() {
    let src = "\
N = 3
N = 3
x: DSInt(0, N)
x: DSInt(0, N)
";
    assert_eq!(lines(src), vec!["int: N = 3;", "var 0..3: x;", "", "solve satisfy;"]);
}

// Loop-body and inlined-function updates to the objective land in source order.
#[test]
fn accumulation_follows_source_order() {
    let src = "\
x: DSList(2, DSBool())

def bump(v):
    if v:
        objective += 10

for i in range(1, 3):
    if x[i]:
        objective += 1
    bump(x[i])
minimize(objective)
";
    let out = translate(src).unwrap();
    assert!(out.as_str().ends_with(
        "solve minimize bool2int(x[1]) + bool2int(x[1]) * 10 + bool2int(x[2]) + bool2int(x[2]) * 10;\n"
    ));
}

#[test]
fn functions_update_outer_bindings_they_read() {
    let src = "\
x: DSInt(1, 5)
total = 2
def scale(v):
    total = total * v
scale(x)
minimize(total)
";
    assert_eq!(lines(src).last().map(String::as_str), Some("solve minimize 2 * x;"));

    let src = "\
x: DSInt(1, 5)
b: DSBool()
total = 2
def scale(v):
    if b:
        total = total * v
scale(x)
minimize(total)
";
    assert_eq!(
        lines(src).last().map(String::as_str),
        Some("solve minimize if b then 2 * x else 2 endif;")
    );
}

#[test]
fn prepended_steps_accumulate_like_appended_ones() {
    let src = "\
x: DSList(2, DSInt(0, 5))
total = 0
def add(v):
    total = v + total
add(x[1])
add(x[2])
minimize(total)
";
    assert_eq!(lines(src).last().map(String::as_str), Some("solve minimize x[2] + x[1];"));

    let src = "x: DSInt(0, 5)\ntotal = 0\ntotal = x + total\nminimize(total)\n";
    assert_eq!(lines(src).last().map(String::as_str), Some("solve minimize x;"));
}
