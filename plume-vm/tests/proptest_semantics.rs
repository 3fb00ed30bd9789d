// plume-vm - Property-based tests for language semantics
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for arithmetic and compilation invariants.
//!
//! Tests the following properties:
//! - Integer arithmetic wraps like the two's-complement operations
//! - Integer division matches checked division
//! - Literal constants are pooled once per program
//! - String length counts characters

mod common;

use std::collections::HashSet;

use common::compile_and_run;
use plume_vm::{OpCode, compile_source};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// Non-negative integers, since the literal grammar has no sign.
fn arb_literal() -> impl Strategy<Value = i64> {
    prop_oneof![0i64..100, 0i64..=i64::MAX]
}

/// Source text evaluating to `n`, built from unsigned literals.
fn int_expr(n: i64) -> String {
    if n >= 0 {
        n.to_string()
    } else if n == i64::MIN {
        format!("subtract(subtract(0, {}), 1)", i64::MAX)
    } else {
        format!("subtract(0, {})", n.unsigned_abs())
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn add_wraps(a in arb_literal(), b in arb_literal()) {
        let out = compile_and_run(&format!("print(add({}, {}));", a, b));
        prop_assert_eq!(out, format!("{}\n", a.wrapping_add(b)));
    }

    #[test]
    fn subtract_and_multiply_wrap(a in any::<i64>(), b in any::<i64>()) {
        let src = format!(
            "print(subtract({a}, {b})); print(multiply({a}, {b}));",
            a = int_expr(a),
            b = int_expr(b)
        );
        let out = compile_and_run(&src);
        prop_assert_eq!(
            out,
            format!("{}\n{}\n", a.wrapping_sub(b), a.wrapping_mul(b))
        );
    }

    #[test]
    fn divide_matches_checked_div(a in any::<i64>(), b in -5i64..5) {
        let src = format!("print(divide({}, {}));", int_expr(a), int_expr(b));
        let expected = match a.checked_div(b) {
            Some(n) => n.to_string(),
            None => "undefined".to_string(),
        };
        prop_assert_eq!(compile_and_run(&src), format!("{}\n", expected));
    }

    #[test]
    fn comparisons_agree(a in any::<i64>(), b in any::<i64>()) {
        let src = format!(
            "print(less({a}, {b})); print(greaterOrEqual({a}, {b})); print(equal({a}, {b}));",
            a = int_expr(a),
            b = int_expr(b)
        );
        prop_assert_eq!(
            compile_and_run(&src),
            format!("{}\n{}\n{}\n", a < b, a >= b, a == b)
        );
    }
}

// =============================================================================
// Compilation invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn integer_constants_are_pooled_once(values in prop::collection::vec(0i64..20, 1..30)) {
        let body: String = values.iter().map(|n| format!("print({});", n)).collect();
        let src = format!("{} var f = function() {{ {} }};", body, body);
        let program = compile_source(&src).unwrap();

        let distinct: HashSet<i64> = values.iter().copied().collect();
        prop_assert_eq!(program.integers.len(), distinct.len());

        let loads = program
            .entry
            .instructions
            .iter()
            .chain(program.functions.iter().flat_map(|f| f.instructions.iter()))
            .filter(|i| i.op == OpCode::LoadIntegerConstant);
        for load in loads {
            prop_assert!((load.parameter as usize) < program.integers.len());
        }
    }

    #[test]
    fn string_constants_are_pooled_once(words in prop::collection::vec("[a-z]{0,4}", 1..20)) {
        let body: String = words.iter().map(|w| format!("print(\"{}\");", w)).collect();
        let program = compile_source(&body).unwrap();
        let distinct: HashSet<&String> = words.iter().collect();
        prop_assert_eq!(program.strings.len(), distinct.len());
    }

    #[test]
    fn output_follows_program_order(values in prop::collection::vec(0i64..1000, 0..20)) {
        let src: String = values.iter().map(|n| format!("print({});", n)).collect();
        let expected: String = values.iter().map(|n| format!("{}\n", n)).collect();
        prop_assert_eq!(compile_and_run(&src), expected);
    }

    #[test]
    fn length_counts_characters(s in "[a-zé ü]{0,12}") {
        let out = compile_and_run(&format!("print(length(\"{}\"));", s));
        prop_assert_eq!(out, format!("{}\n", s.chars().count()));
    }
}
