/*
 * filters/standard.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The standard filter catalog.

use crate::config::{ConfigBuilder, FilterDef};
use crate::convert::{Shape, convert_item};
use crate::error::FilterError;
use crate::expression::BinaryOp;
use crate::expression::eval::arithmetic;
use crate::value::compare::{is_empty, length, sort, sort_by_property};
use crate::value::Value;
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static NIL: Value = Value::Nil;

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<.*?>").expect("Invalid regex pattern for HTML tags"));

static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|([a-zA-Z]+));")
        .expect("Invalid regex pattern for HTML entities")
});

const DEFAULT_DATE_FORMAT: &str = "%a, %b %d, %y";
const DEFAULT_TRUNCATE_LENGTH: i64 = 50;
const DEFAULT_ELLIPSIS: &str = "...";
const DEFAULT_JOIN_SEPARATOR: &str = ", ";

/// Register the standard filters.
pub fn register_standard_filters(builder: &mut ConfigBuilder) {
    // values
    builder.add_filter(FilterDef::new("default", vec![Shape::Any, Shape::Any], |args, named| {
        let allow_false = named.get("allow_false").is_some_and(Value::is_truthy);
        let value = arg(args, 0);
        let keep = match value {
            Value::Bool(false) => allow_false,
            other => !is_empty(other),
        };
        Ok(if keep { value.clone() } else { arg(args, 1).clone() })
    }));

    // dates
    builder.add_filter(FilterDef::new(
        "date",
        vec![Shape::optional(Shape::Time), Shape::optional(Shape::String)],
        |args, _| match arg(args, 0) {
            Value::Time(t) => {
                let format = arg(args, 1).as_str().unwrap_or(DEFAULT_DATE_FORMAT);
                strftime(t, format).map(Value::String)
            }
            _ => Ok(Value::Nil),
        },
    ));

    // sequences
    builder
        .add_filter(list_filter("compact", |items| {
            items.iter().filter(|item| !item.is_nil()).cloned().collect()
        }))
        .add_filter(list_filter("reverse", |items| {
            items.iter().rev().cloned().collect()
        }))
        .add_filter(list_filter("first", |items| {
            items.first().cloned().unwrap_or_default()
        }))
        .add_filter(list_filter("last", |items| {
            items.last().cloned().unwrap_or_default()
        }));

    builder.add_filter(FilterDef::new(
        "join",
        vec![sequence(), Shape::Any],
        |args, _| {
            let separator = match arg(args, 1) {
                Value::Nil => DEFAULT_JOIN_SEPARATOR.to_string(),
                other => other.to_string(),
            };
            let parts: Vec<String> = items(args, 0).iter().map(Value::to_string).collect();
            Ok(Value::String(parts.join(&separator)))
        },
    ));

    builder.add_filter(FilterDef::new(
        "map",
        vec![sequence(), Shape::String],
        |args, _| {
            let key = text(args, 1);
            Ok(items(args, 0)
                .iter()
                .map(|item| item.property(key).map_or(Value::Nil, |v| v.into_owned()))
                .collect())
        },
    ));

    builder.add_filter(FilterDef::new(
        "sort",
        vec![sequence(), Shape::optional(Shape::String)],
        |args, _| {
            let mut out = items(args, 0).to_vec();
            match arg(args, 1).as_str() {
                Some(key) => sort_by_property(&mut out, key, true),
                None => sort(&mut out),
            }
            Ok(Value::List(out))
        },
    ));

    builder.add_filter(FilterDef::new(
        "push",
        vec![sequence(), Shape::Any],
        |args, _| {
            let mut out = items(args, 0).to_vec();
            let item =
                convert_item(arg(args, 1), &out).map_err(|e| FilterError::new(e.to_string()))?;
            out.push(item);
            Ok(Value::List(out))
        },
    ));

    builder.add_filter(FilterDef::new("size", vec![Shape::Any], |args, _| {
        Ok(Value::from(length(arg(args, 0))))
    }));

    // numbers
    builder
        .add_filter(arithmetic_filter("plus", BinaryOp::Add))
        .add_filter(arithmetic_filter("minus", BinaryOp::Sub))
        .add_filter(arithmetic_filter("times", BinaryOp::Mul))
        .add_filter(arithmetic_filter("divided_by", BinaryOp::Div))
        .add_filter(arithmetic_filter("modulo", BinaryOp::Mod));

    builder.add_filter(FilterDef::new("abs", vec![Shape::Number], |args, _| {
        Ok(match arg(args, 0) {
            Value::Int(n) => n
                .checked_abs()
                .map_or(Value::Float((*n as f64).abs()), Value::Int),
            other => Value::Float(number(other).abs()),
        })
    }));

    builder.add_filter(FilterDef::new("ceil", vec![Shape::Number], |args, _| {
        Ok(whole(number(arg(args, 0)).ceil()))
    }));

    builder.add_filter(FilterDef::new("floor", vec![Shape::Number], |args, _| {
        Ok(whole(number(arg(args, 0)).floor()))
    }));

    builder.add_filter(FilterDef::new(
        "round",
        vec![Shape::Number, Shape::optional(Shape::Int)],
        |args, _| {
            let n = number(arg(args, 0));
            Ok(match arg(args, 1) {
                Value::Int(places) if *places > 0 => {
                    let scale = 10f64.powi(i32::try_from(*places).unwrap_or(i32::MAX));
                    Value::Float((n * scale + 0.5).floor() / scale)
                }
                _ => whole((n + 0.5).floor()),
            })
        },
    ));

    // strings
    builder
        .add_filter(string_filter("capitalize", capitalize))
        .add_filter(string_filter("downcase", str::to_lowercase))
        .add_filter(string_filter("upcase", str::to_uppercase))
        .add_filter(string_filter("escape", escape_html))
        .add_filter(string_filter("escape_once", |s| escape_html(&unescape_html(s))))
        .add_filter(string_filter("newline_to_br", |s| s.replace('\n', "<br />")))
        .add_filter(string_filter("strip_html", |s| HTML_TAG.replace_all(s, "").into_owned()))
        .add_filter(string_filter("strip_newlines", |s| s.replace('\n', "")))
        .add_filter(string_filter("strip", |s| s.trim().to_string()))
        .add_filter(string_filter("lstrip", |s| s.trim_start().to_string()))
        .add_filter(string_filter("rstrip", |s| s.trim_end().to_string()));

    builder
        .add_filter(string_op("append", |s, suffix| format!("{}{}", s, suffix)))
        .add_filter(string_op("prepend", |s, prefix| format!("{}{}", prefix, s)))
        .add_filter(string_op("remove", |s, old| s.replace(old, "")))
        .add_filter(string_op("remove_first", |s, old| s.replacen(old, "", 1)));

    builder
        .add_filter(FilterDef::new(
            "replace",
            vec![Shape::String, Shape::String, Shape::String],
            |args, _| Ok(Value::String(text(args, 0).replace(text(args, 1), text(args, 2)))),
        ))
        .add_filter(FilterDef::new(
            "replace_first",
            vec![Shape::String, Shape::String, Shape::String],
            |args, _| {
                Ok(Value::String(
                    text(args, 0).replacen(text(args, 1), text(args, 2), 1),
                ))
            },
        ));

    builder.add_filter(FilterDef::new(
        "slice",
        vec![Shape::Any, Shape::Int, Shape::optional(Shape::Int)],
        |args, _| {
            let start = int(args, 1).unwrap_or(0);
            let count = int(args, 2).unwrap_or(1);
            match arg(args, 0).canonical().as_ref() {
                Value::List(items) => {
                    let (from, to) = slice_bounds(items.len(), start, count);
                    Ok(Value::List(items[from..to].to_vec()))
                }
                other => {
                    let chars: Vec<char> = other.to_string().chars().collect();
                    let (from, to) = slice_bounds(chars.len(), start, count);
                    Ok(Value::String(chars[from..to].iter().collect()))
                }
            }
        },
    ));

    builder.add_filter(FilterDef::new(
        "split",
        vec![Shape::String, Shape::String],
        |args, _| {
            Ok(split(text(args, 0), text(args, 1))
                .into_iter()
                .map(Value::String)
                .collect())
        },
    ));

    builder.add_filter(FilterDef::new(
        "truncate",
        vec![Shape::String, Shape::optional(Shape::Int), Shape::optional(Shape::String)],
        |args, _| {
            let limit = int(args, 1).unwrap_or(DEFAULT_TRUNCATE_LENGTH);
            let ellipsis = arg(args, 2).as_str().unwrap_or(DEFAULT_ELLIPSIS);
            Ok(Value::String(truncate(text(args, 0), limit, ellipsis)))
        },
    ));

    // debugging
    builder
        .add_filter(FilterDef::new("inspect", vec![Shape::Any], |args, _| {
            let value = arg(args, 0);
            Ok(Value::String(
                serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value)),
            ))
        }))
        .add_filter(FilterDef::new("type", vec![Shape::Any], |args, _| {
            Ok(Value::from(arg(args, 0).type_name()))
        }));
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NIL)
}

fn text(args: &[Value], index: usize) -> &str {
    arg(args, index).as_str().unwrap_or_default()
}

fn int(args: &[Value], index: usize) -> Option<i64> {
    match arg(args, index) {
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

fn items(args: &[Value], index: usize) -> &[Value] {
    match arg(args, index) {
        Value::List(items) => items,
        _ => &[],
    }
}

fn number(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => 0.0,
    }
}

/// A whole float as an integer, when it fits.
fn whole(x: f64) -> Value {
    if x.is_finite() && x.abs() < 9.0e18 {
        Value::Int(x as i64)
    } else {
        Value::Float(x)
    }
}

/// Sequence input; nil is accepted as the empty sequence.
fn sequence() -> Shape {
    Shape::optional(Shape::list(Shape::Any))
}

fn list_filter(name: &str, f: fn(&[Value]) -> Value) -> FilterDef {
    FilterDef::new(name, vec![sequence()], move |args, _| Ok(f(items(args, 0))))
}

fn string_filter(name: &str, f: fn(&str) -> String) -> FilterDef {
    FilterDef::new(name, vec![Shape::String], move |args, _| {
        Ok(Value::String(f(text(args, 0))))
    })
}

fn string_op(name: &str, f: fn(&str, &str) -> String) -> FilterDef {
    FilterDef::new(name, vec![Shape::String, Shape::String], move |args, _| {
        Ok(Value::String(f(text(args, 0), text(args, 1))))
    })
}

fn arithmetic_filter(name: &str, op: BinaryOp) -> FilterDef {
    FilterDef::new(name, vec![Shape::Number, Shape::Number], move |args, _| {
        arithmetic(op, arg(args, 0), arg(args, 1)).map_err(FilterError)
    })
}

fn strftime(t: &DateTime<FixedOffset>, format: &str) -> Result<String, FilterError> {
    // fractional-second widths are not supported
    let format = format.replace("%N", "");
    let mut out = String::new();
    write!(out, "{}", t.format(&format))
        .map_err(|_| FilterError::new(format!("invalid date format {:?}", format)))?;
    Ok(out)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_html(s: &str) -> String {
    HTML_ENTITY
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                caps.get(3).and_then(|name| match name.as_str() {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                })
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// `[from, to)` for `count` elements starting at `start`, clamped to `len`.
/// A negative start counts back from the end.
fn slice_bounds(len: usize, start: i64, count: i64) -> (usize, usize) {
    let len = len as i64;
    let from = if start < 0 {
        (len + start).max(0)
    } else {
        start.min(len)
    };
    let to = from.saturating_add(count.max(0)).min(len);
    (from as usize, to as usize)
}

fn split(s: &str, separator: &str) -> Vec<String> {
    let mut parts: Vec<String> = if separator.is_empty() {
        s.chars().map(String::from).collect()
    } else {
        s.split(separator).map(String::from).collect()
    };
    if parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
    parts
}

/// Shorten `s` to at most `limit` characters, ellipsis included.
fn truncate(s: &str, limit: i64, ellipsis: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if (chars.len() as i64) <= limit {
        return s.to_string();
    }
    let keep = (limit - ellipsis.chars().count() as i64).max(0) as usize;
    let mut out: String = chars[..keep.min(chars.len())].iter().collect();
    out.push_str(ellipsis);
    out
}
