use miette::Result;
use proptest::test_runner::{Config, TestCaseError, TestRunner};

use mzdsl::translate;

fn runner() -> TestRunner {
    TestRunner::new(Config {
        cases: 64,
        ..Config::default()
    })
}

fn run(src: &str) -> std::result::Result<String, TestCaseError> {
    translate(src)
        .map(|p| p.into_string())
        .map_err(|e| TestCaseError::fail(format!("{e}\n{src}")))
}

fn constraints(out: &str) -> Vec<&str> {
    out.lines()
        .filter_map(|l| l.strip_prefix("constraint "))
        .map(|c| c.trim_end_matches(';'))
        .collect()
}

fn guarded_loop(k: i64, lo: i64, hi: i64) -> String {
    format!(
        "K = {k}\nx: DSList(20, DSInt(0, 50))\ntotal = 0\n\
         for i in range({lo}, {hi}):\n    if x[i] > K:\n        assert x[i] <= K + i\n        total += x[i]\n\
         minimize(total)\n"
    )
}

#[test]
fn translation_is_deterministic() -> Result<()> {
    runner()
        .run(&(0i64..10, 1i64..10, 0i64..21), |(k, lo, hi)| {
            let src = guarded_loop(k, lo, hi);
            let first = run(&src)?;
            let second = run(&src)?;
            if first != second {
                return Err(TestCaseError::fail(format!("outputs differ for\n{src}")));
            }
            Ok(())
        })
        .map_err(|e| miette::miette!("{e}"))
}

#[test]
fn loops_unroll_once_per_value_in_order() -> Result<()> {
    runner()
        .run(&(1i64..15, 0i64..21), |(a, b)| {
            let src = format!("x: DSList(20, DSInt(0, 30))\nfor i in range({a}, {b}):\n    assert x[i] >= i\n");
            let out = run(&src)?;
            let expected: Vec<String> = (a..b).map(|i| format!("x[{i}] >= {i}")).collect();
            let got = constraints(&out);
            if got != expected {
                return Err(TestCaseError::fail(format!("expected {expected:?}, got {got:?}")));
            }
            Ok(())
        })
        .map_err(|e| miette::miette!("{e}"))
}

#[test]
fn constant_arithmetic_folds_to_a_literal() -> Result<()> {
    runner()
        .run(&(-100i64..100, -100i64..100), |(a, b)| {
            let out = run(&format!("N = {a} * {b} + {a}\n"))?;
            let expected = format!("int: N = {};", a * b + a);
            if out.lines().next() != Some(expected.as_str()) {
                return Err(TestCaseError::fail(format!("expected {expected}, got {out}")));
            }
            Ok(())
        })
        .map_err(|e| miette::miette!("{e}"))
}

#[test]
fn declared_lists_keep_their_length() -> Result<()> {
    runner()
        .run(&(1usize..50), |n| {
            let out = run(&format!("N = {n}\nxs: DSList(N, DSBool())\n"))?;
            let expected = format!("array[1..{n}] of var bool: xs;");
            if !out.lines().any(|l| l == expected) {
                return Err(TestCaseError::fail(format!("missing `{expected}` in\n{out}")));
            }
            Ok(())
        })
        .map_err(|e| miette::miette!("{e}"))
}
