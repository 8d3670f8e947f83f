/*
 * expression/eval.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression evaluation against a render context.

use super::ast::{BinaryOp, Expr, FilterCall};
use crate::convert::{Shape, convert};
use crate::error::{TemplateError, TemplateResult};
use crate::render::RenderContext;
use crate::value::{Map, Value, is_empty, less};
use std::borrow::Cow;

/// Evaluate an expression to an owned value.
pub fn evaluate(expr: &Expr, ctx: &RenderContext<'_>) -> TemplateResult<Value> {
    Ok(eval(expr, ctx)?.into_owned())
}

/// Evaluate an expression for its truthiness.
pub fn evaluate_condition(expr: &Expr, ctx: &RenderContext<'_>) -> TemplateResult<bool> {
    Ok(eval(expr, ctx)?.is_truthy())
}

/// Evaluate without cloning values that live in the bindings.
fn eval<'c>(expr: &'c Expr, ctx: &'c RenderContext<'_>) -> TemplateResult<Cow<'c, Value>> {
    match expr {
        Expr::Literal(value) => Ok(Cow::Borrowed(value)),
        Expr::Empty => Ok(Cow::Owned(Value::String(String::new()))),
        Expr::Variable(name) => match ctx.lookup(name) {
            Some(value) => Ok(Cow::Borrowed(value)),
            None if ctx.options().strict_variables => Err(TemplateError::UndefinedVariable {
                name: name.clone(),
                location: None,
            }),
            None => Ok(Cow::Owned(Value::Nil)),
        },
        Expr::Property(base, key) => Ok(match eval(base, ctx)? {
            Cow::Borrowed(value) => value.property(key).unwrap_or(Cow::Owned(Value::Nil)),
            Cow::Owned(value) => {
                Cow::Owned(value.property(key).map_or(Value::Nil, Cow::into_owned))
            }
        }),
        Expr::Index(base, index) => {
            let index = eval(index, ctx)?;
            Ok(match eval(base, ctx)? {
                Cow::Borrowed(value) => value.index(&index).unwrap_or(Cow::Owned(Value::Nil)),
                Cow::Owned(value) => {
                    Cow::Owned(value.index(&index).map_or(Value::Nil, Cow::into_owned))
                }
            })
        }
        Expr::Range(start, end) => {
            let (start, end) = range_bounds(start, end, ctx)?;
            let len = i128::from(end) - i128::from(start) + 1;
            if len > MAX_RANGE_LEN {
                return Err(TemplateError::evaluation(format!(
                    "range ({}..{}) has {} elements, more than the limit of {}",
                    start, end, len, MAX_RANGE_LEN
                )));
            }
            Ok(Cow::Owned((start..=end).map(Value::Int).collect()))
        }
        Expr::Not(inner) => Ok(Cow::Owned(Value::Bool(!eval(inner, ctx)?.is_truthy()))),
        Expr::Binary(op, left, right) => binary(*op, left, right, ctx).map(Cow::Owned),
        Expr::Filtered(base, calls) => {
            let mut value = evaluate(base, ctx)?;
            for call in calls {
                value = apply_filter(call, value, ctx)?;
            }
            Ok(Cow::Owned(value))
        }
    }
}

/// Largest range that is built as a list. `for` walks ranges without
/// building them, so this only bounds ranges used as values.
pub const MAX_RANGE_LEN: i128 = 1_000_000;

/// Evaluate the bounds of a `(start..end)` range.
pub fn range_bounds(
    start: &Expr,
    end: &Expr,
    ctx: &RenderContext<'_>,
) -> TemplateResult<(i64, i64)> {
    let start = integer(eval(start, ctx)?.as_ref())?;
    let end = integer(eval(end, ctx)?.as_ref())?;
    Ok((start, end))
}

fn integer(value: &Value) -> TemplateResult<i64> {
    match convert(value, &Shape::Int)? {
        Value::Int(i) => Ok(i),
        other => Err(TemplateError::evaluation(format!(
            "expected an integer, got {}",
            other.type_name()
        ))),
    }
}

fn binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &RenderContext<'_>,
) -> TemplateResult<Value> {
    match op {
        BinaryOp::And => {
            return Ok(Value::Bool(
                eval(left, ctx)?.is_truthy() && eval(right, ctx)?.is_truthy(),
            ));
        }
        BinaryOp::Or => {
            return Ok(Value::Bool(
                eval(left, ctx)?.is_truthy() || eval(right, ctx)?.is_truthy(),
            ));
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let other = match (left, right) {
                (Expr::Empty, other) | (other, Expr::Empty) => Some(other),
                _ => None,
            };
            if let Some(other) = other {
                let empty = is_empty(eval(other, ctx)?.as_ref());
                return Ok(Value::Bool(empty == (op == BinaryOp::Eq)));
            }
        }
        _ => {}
    }

    let a = eval(left, ctx)?;
    let b = eval(right, ctx)?;
    let (a, b) = (a.as_ref(), b.as_ref());
    let result = match op {
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(less(a, b)),
        BinaryOp::Le => Value::Bool(less(a, b) || a == b),
        BinaryOp::Gt => Value::Bool(less(b, a)),
        BinaryOp::Ge => Value::Bool(less(b, a) || a == b),
        BinaryOp::Contains => Value::Bool(contains(a, b)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let a = convert(a, &Shape::Number)?;
            let b = convert(b, &Shape::Number)?;
            arithmetic(op, &a, &b).map_err(TemplateError::evaluation)?
        }
        BinaryOp::And | BinaryOp::Or => Value::Nil,
    };
    Ok(result)
}

/// `container contains item`: substring for strings, membership for
/// sequences, key presence for mappings.
pub fn contains(container: &Value, item: &Value) -> bool {
    match container.canonical().as_ref() {
        Value::String(s) => match item.canonical().as_ref() {
            Value::Nil => false,
            Value::String(sub) => s.contains(sub.as_str()),
            other => s.contains(&other.to_string()),
        },
        Value::List(items) => items.iter().any(|v| v == item),
        Value::Map(map) => item.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

/// Arithmetic over numbers.
///
/// Integer operands stay integers; a float on either side, or integer
/// overflow, yields a float. Division and modulo are floored, so the
/// remainder takes the sign of the divisor. Division or modulo by zero is an
/// error.
pub fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, String> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        let (x, y) = (*x, *y);
        if y == 0 && matches!(op, BinaryOp::Div | BinaryOp::Mod) {
            return Err("divided by 0".to_string());
        }
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => floor_div(x, y),
            BinaryOp::Mod => floor_rem(x, y),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::Int(result));
        }
    }

    let x = as_float(a)?;
    let y = as_float(b)?;
    match op {
        BinaryOp::Add => Ok(Value::Float(x + y)),
        BinaryOp::Sub => Ok(Value::Float(x - y)),
        BinaryOp::Mul => Ok(Value::Float(x * y)),
        BinaryOp::Div | BinaryOp::Mod if y == 0.0 => Err("divided by 0".to_string()),
        BinaryOp::Div => Ok(Value::Float(x / y)),
        BinaryOp::Mod => Ok(Value::Float(x - y * (x / y).floor())),
        _ => Err(format!("{:?} is not an arithmetic operator", op)),
    }
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_rem(x: i64, y: i64) -> Option<i64> {
    let r = x.checked_rem(y)?;
    if r != 0 && ((r < 0) != (y < 0)) {
        Some(r + y)
    } else {
        Some(r)
    }
}

fn as_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(x) => Ok(*x),
        other => Err(format!("expected a number, got {}", other.type_name())),
    }
}

fn apply_filter(call: &FilterCall, input: Value, ctx: &RenderContext<'_>) -> TemplateResult<Value> {
    let Some(def) = ctx.config().filter(&call.name) else {
        return Err(TemplateError::UndefinedFilter {
            name: call.name.clone(),
            location: None,
        });
    };
    let mut args = Vec::with_capacity(call.args.len() + 1);
    args.push(input);
    for arg in &call.args {
        args.push(evaluate(arg, ctx)?);
    }
    let mut named = Map::new();
    for (key, arg) in &call.named {
        named.insert(key.clone(), evaluate(arg, ctx)?);
    }
    tracing::trace!(filter = %call.name, args = args.len(), "Applying filter");
    def.call(args, &named)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(
            arithmetic(BinaryOp::Add, &Value::Int(2), &Value::Int(3)),
            Ok(Value::Int(5))
        );
        assert_eq!(
            arithmetic(BinaryOp::Div, &Value::Int(7), &Value::Int(2)),
            Ok(Value::Int(3))
        );
        assert_eq!(
            arithmetic(BinaryOp::Div, &Value::Int(-7), &Value::Int(2)),
            Ok(Value::Int(-4))
        );
        assert_eq!(
            arithmetic(BinaryOp::Mod, &Value::Int(7), &Value::Int(3)),
            Ok(Value::Int(1))
        );
        assert_eq!(
            arithmetic(BinaryOp::Mod, &Value::Int(-7), &Value::Int(3)),
            Ok(Value::Int(2))
        );
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            arithmetic(BinaryOp::Div, &Value::Int(7), &Value::Float(2.0)),
            Ok(Value::Float(3.5))
        );
        assert_eq!(
            arithmetic(BinaryOp::Mul, &Value::Float(1.5), &Value::Int(2)),
            Ok(Value::Float(3.0))
        );
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        let result = arithmetic(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert!(matches!(result, Value::Float(_)));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(arithmetic(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
        assert!(arithmetic(BinaryOp::Mod, &Value::Float(1.0), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_contains() {
        assert!(contains(&Value::from("hello"), &Value::from("ell")));
        assert!(!contains(&Value::from("hello"), &Value::Nil));
        assert!(contains(&Value::from(vec![1i64, 2]), &Value::Int(2)));
        assert!(!contains(&Value::from(vec![1i64, 2]), &Value::from("2")));
        let mut map = Map::new();
        map.insert("k".to_string(), Value::Nil);
        assert!(contains(&Value::Map(map), &Value::from("k")));
        assert!(!contains(&Value::Int(12), &Value::Int(1)));
    }
}
