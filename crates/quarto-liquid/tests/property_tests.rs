/*
 * property_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Property-based tests for value ordering, conversion, filters and the
 * template scanner.
 */

use proptest::prelude::*;
use quarto_liquid::value::{less, sort};
use quarto_liquid::{Bindings, Engine, Shape, Value, convert};

/// Numbers that compare exactly whether stored as int or float.
fn gen_number() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1_000_000_000i64..1_000_000_000).prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
    ]
}

fn gen_string() -> impl Strategy<Value = Value> {
    "\\PC{0,8}".prop_map(Value::String)
}

/// Scalars of any kind, nil included.
fn gen_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        gen_number(),
        // digits, hex letters and signs make numeric-looking strings common
        "[0-9a-f .+-]{0,6}".prop_map(Value::String),
    ]
}

fn gen_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => gen_scalar(),
        1 => prop::collection::vec(gen_scalar(), 0..4).prop_map(Value::List),
    ]
}

fn gen_shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        Just(Shape::Any),
        Just(Shape::Bool),
        Just(Shape::Int),
        Just(Shape::Float),
        Just(Shape::Number),
        Just(Shape::String),
        Just(Shape::list(Shape::Int)),
        Just(Shape::list(Shape::String)),
        Just(Shape::optional(Shape::Number)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Exactly one of `a < b`, `b < a`, `a == b` holds within an orderable
    /// family.
    #[test]
    fn test_less_trichotomy_for_numbers(a in gen_number(), b in gen_number()) {
        let outcomes = [less(&a, &b), less(&b, &a), a == b];
        prop_assert_eq!(outcomes.iter().filter(|&&x| x).count(), 1, "{:?} {:?}", a, b);
    }

    #[test]
    fn test_less_trichotomy_for_strings(a in gen_string(), b in gen_string()) {
        let outcomes = [less(&a, &b), less(&b, &a), a == b];
        prop_assert_eq!(outcomes.iter().filter(|&&x| x).count(), 1, "{:?} {:?}", a, b);
    }

    /// Ordering is never symmetric, whatever the kinds involved.
    #[test]
    fn test_less_is_asymmetric(a in gen_value(), b in gen_value()) {
        prop_assert!(!(less(&a, &b) && less(&b, &a)), "{:?} {:?}", a, b);
        prop_assert!(!less(&a, &a));
    }

    #[test]
    fn test_sort_is_idempotent(items in prop::collection::vec(gen_number(), 0..20)) {
        let mut once = items;
        sort(&mut once);
        let mut twice = once.clone();
        sort(&mut twice);
        prop_assert_eq!(&twice, &once);
        prop_assert!(once.windows(2).all(|w| !less(&w[1], &w[0])));
    }

    #[test]
    fn test_sort_of_strings_is_idempotent(items in prop::collection::vec(gen_string(), 0..20)) {
        let mut once = items;
        sort(&mut once);
        let mut twice = once.clone();
        sort(&mut twice);
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn test_conversion_is_idempotent(value in gen_value(), shape in gen_shape()) {
        if let Ok(once) = convert(&value, &shape) {
            let twice = convert(&once, &shape);
            prop_assert_eq!(twice, Ok(once), "{} / {:?}", shape, value);
        }
    }

    #[test]
    fn test_base64_round_trip(text in "\\PC{0,64}") {
        let mut bindings = Bindings::new();
        bindings.insert("text".to_string(), Value::String(text.clone()));
        let out = Engine::new()
            .parse_and_render_string("{{ text | base64_encode | base64_decode }}", &bindings)
            .unwrap();
        prop_assert_eq!(out, text);
    }

    /// Arbitrary markup, including non-ASCII text and stray quotes, either
    /// compiles or fails with an error.
    #[test]
    fn test_scanning_arbitrary_source_never_panics(source in "[{}%'\"#a-z éü漢 .|-]{0,40}") {
        let engine = Engine::basic();
        let _ = engine.parse_and_render_string(&source, &Bindings::new());
    }
}
