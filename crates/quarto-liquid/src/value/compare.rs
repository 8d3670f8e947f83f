/*
 * value/compare.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Ordering, emptiness and sorting over dynamic values.
//!
//! [`less`] is a best-effort strict weak order: nil, sequences, mappings and
//! mixed-kind pairs are never ordered. Because of that it is not a total
//! order, so sorting goes through a stable merge sort that only ever asks
//! `less` questions instead of `slice::sort_by`, which may panic on
//! comparators that are not total.

use super::Value;

/// Strict "less than" between two values.
///
/// - nil is never less than anything, and nothing is less than nil
/// - `false < true`
/// - integers and floats compare numerically, promoting to float when mixed
/// - strings compare lexicographically by code point
/// - timestamps compare chronologically
/// - any other pair is unordered
pub fn less(a: &Value, b: &Value) -> bool {
    let a = a.canonical();
    let b = b.canonical();
    match (a.as_ref(), b.as_ref()) {
        (Value::Bool(x), Value::Bool(y)) => !*x && *y,
        (Value::Int(x), Value::Int(y)) => x < y,
        (Value::Int(x), Value::Float(y)) => (*x as f64) < *y,
        (Value::Float(x), Value::Int(y)) => *x < (*y as f64),
        (Value::Float(x), Value::Float(y)) => x < y,
        (Value::String(x), Value::String(y)) => x < y,
        (Value::Time(x), Value::Time(y)) => x < y,
        _ => false,
    }
}

/// Emptiness as used by `default` and `== empty`.
///
/// Nil, false, the empty string and empty collections are empty. Numbers,
/// including zero, are never empty.
pub fn is_empty(value: &Value) -> bool {
    match value.canonical().as_ref() {
        Value::Nil | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        _ => false,
    }
}

/// Length of a string (in characters), sequence or mapping; 0 otherwise.
pub fn length(value: &Value) -> usize {
    match value.canonical().as_ref() {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        _ => 0,
    }
}

/// Stable ascending sort using [`less`].
pub fn sort(items: &mut Vec<Value>) {
    merge_sort_by(items, less);
}

/// Stable sort by a property of each element.
///
/// Elements whose property is missing or nil always come first, whatever
/// the direction; `ascending` only orders the elements that have a value.
pub fn sort_by_property(items: &mut Vec<Value>, key: &str, ascending: bool) {
    let mut keyed: Vec<(Value, Value)> = std::mem::take(items)
        .into_iter()
        .map(|item| {
            let k = item.property(key).map_or(Value::Nil, |v| v.into_owned());
            (k, item)
        })
        .collect();

    merge_sort_by(&mut keyed, |(a, _), (b, _)| match (a.is_nil(), b.is_nil()) {
        (true, false) => true,
        (false, true) | (true, true) => false,
        (false, false) if ascending => less(a, b),
        (false, false) => less(b, a),
    });

    items.extend(keyed.into_iter().map(|(_, item)| item));
}

/// Stable merge sort driven by a strict "comes before" predicate.
///
/// An element from the right half is only taken ahead of the left half when
/// it is strictly before it, so unordered elements keep their input order.
fn merge_sort_by<T, F>(items: &mut Vec<T>, before: F)
where
    F: Fn(&T, &T) -> bool,
{
    let len = items.len();
    if len < 2 {
        return;
    }
    let mut slots: Vec<Option<T>> = std::mem::take(items).into_iter().map(Some).collect();
    let mut order: Vec<usize> = (0..len).collect();
    let mut scratch = Vec::with_capacity(len);

    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j) = (start, mid);
            scratch.clear();
            while i < mid && j < end {
                let right_first = match (&slots[order[j]], &slots[order[i]]) {
                    (Some(r), Some(l)) => before(r, l),
                    _ => false,
                };
                if right_first {
                    scratch.push(order[j]);
                    j += 1;
                } else {
                    scratch.push(order[i]);
                    i += 1;
                }
            }
            scratch.extend_from_slice(&order[i..mid]);
            scratch.extend_from_slice(&order[j..end]);
            order[start..end].copy_from_slice(&scratch);
            start = end;
        }
        width *= 2;
    }

    items.extend(order.into_iter().filter_map(|idx| slots[idx].take()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_less_table() {
        let cases: Vec<(Value, Value, bool)> = vec![
            (Value::Nil, Value::Nil, false),
            (Value::Bool(false), Value::Bool(true), true),
            (Value::Bool(false), Value::Bool(false), false),
            (Value::Bool(false), Value::Nil, false),
            (Value::Nil, Value::Bool(false), false),
            (Value::Int(0), Value::Int(1), true),
            (Value::Int(1), Value::Int(0), false),
            (Value::Int(1), Value::Int(1), false),
            (Value::Int(1), Value::Float(2.1), true),
            (Value::Float(1.1), Value::Int(2), true),
            (Value::Float(2.1), Value::Int(1), false),
            (s("a"), s("b"), true),
            (s("b"), s("a"), false),
            (
                Value::List(vec![s("a")]),
                Value::List(vec![s("a")]),
                false,
            ),
        ];
        for (i, (a, b, expected)) in cases.iter().enumerate() {
            assert_eq!(less(a, b), *expected, "case {}: {:?} < {:?}", i + 1, a, b);
        }
    }

    #[test]
    fn test_less_nil_is_unordered() {
        for x in [Value::Int(-5), s(""), Value::Bool(true), Value::Float(0.0)] {
            assert!(!less(&Value::Nil, &x));
            assert!(!less(&x, &Value::Nil));
        }
    }

    #[test]
    fn test_less_trichotomy_for_scalars() {
        let numbers = [Value::Int(-3), Value::Float(-2.5), Value::Int(0), Value::Float(4.0)];
        for a in &numbers {
            for b in &numbers {
                let lt = less(a, b);
                let gt = less(b, a);
                assert!(!(lt && gt));
                if a != b {
                    assert!(lt ^ gt);
                }
            }
        }
        let strings = [s(""), s("a"), s("ab"), s("b"), s("é")];
        for a in &strings {
            for b in &strings {
                if a != b {
                    assert!(less(a, b) ^ less(b, a));
                }
            }
        }
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&Value::Nil));
        assert!(is_empty(&Value::Bool(false)));
        assert!(is_empty(&s("")));
        assert!(is_empty(&Value::List(vec![])));
        assert!(is_empty(&Value::Map(Map::new())));
        assert!(!is_empty(&Value::Int(0)));
        assert!(!is_empty(&Value::Float(0.0)));
        assert!(!is_empty(&Value::Bool(true)));
        assert!(!is_empty(&s(" ")));
    }

    #[test]
    fn test_length() {
        assert_eq!(length(&Value::from(vec![1i64, 2, 3])), 3);
        assert_eq!(length(&s("abc")), 3);
        assert_eq!(length(&s("héllo")), 5);
        let mut map = Map::new();
        map.insert("a".to_string(), Value::Int(1));
        assert_eq!(length(&Value::Map(map)), 1);
        assert_eq!(length(&Value::Int(12)), 0);
    }

    #[test]
    fn test_sort() {
        let mut items = vec![Value::Int(2), Value::Int(1)];
        sort(&mut items);
        assert_eq!(items, vec![Value::Int(1), Value::Int(2)]);

        let mut items = vec![s("b"), s("a")];
        sort(&mut items);
        assert_eq!(items, vec![s("a"), s("b")]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut items: Vec<Value> = [5i64, 3, 9, 1, 3, 7, 2, 8]
            .into_iter()
            .map(Value::Int)
            .collect();
        sort(&mut items);
        let once = items.clone();
        sort(&mut items);
        assert_eq!(items, once);
    }

    #[test]
    fn test_sort_keeps_unordered_elements_in_place() {
        let mut items = vec![Value::Nil, s("x"), Value::List(vec![])];
        sort(&mut items);
        assert_eq!(items, vec![Value::Nil, s("x"), Value::List(vec![])]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = vec![Value::Int(1), Value::Float(1.0), Value::Int(0)];
        sort(&mut items);
        assert!(matches!(items[0], Value::Int(0)));
        assert!(matches!(items[1], Value::Int(1)));
        assert!(matches!(items[2], Value::Float(_)));
    }

    fn keyed(key: Option<i64>) -> Value {
        let mut map = Map::new();
        if let Some(k) = key {
            map.insert("key".to_string(), Value::Int(k));
        }
        Value::Map(map)
    }

    fn keys(items: &[Value]) -> Vec<Option<Value>> {
        items
            .iter()
            .map(|item| item.property("key").map(|v| v.into_owned()))
            .collect()
    }

    #[test]
    fn test_sort_by_property() {
        let mut items = vec![keyed(Some(20)), keyed(Some(10)), keyed(None)];
        sort_by_property(&mut items, "key", true);
        assert_eq!(
            keys(&items),
            vec![None, Some(Value::Int(10)), Some(Value::Int(20))]
        );
    }

    #[test]
    fn test_sort_by_property_descending_keeps_nil_first() {
        let mut items = vec![keyed(Some(10)), keyed(None), keyed(Some(20)), keyed(None)];
        sort_by_property(&mut items, "key", false);
        assert_eq!(
            keys(&items),
            vec![None, None, Some(Value::Int(20)), Some(Value::Int(10))]
        );
    }
}
