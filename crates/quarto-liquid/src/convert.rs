/*
 * convert.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Conversion of dynamic values into declared shapes.
//!
//! Filters and tags declare the [`Shape`] of every parameter they take.
//! Before a filter is invoked its arguments are reshaped with [`convert`],
//! which recursively rebuilds sequences, mappings and records so the callee
//! can rely on the declared shape.
//!
//! Rules, in priority order:
//!
//! 1. An object's canonical-value hook is applied first.
//! 2. A value already of the target kind is returned as-is.
//! 3. Strings convert to timestamps by parsing.
//! 4. Anything converts to bool: nil and false are false, the rest true.
//! 5. Numbers parse from strings; bools become 0/1; ints widen to floats and
//!    floats truncate to ints.
//! 6. Mappings convert key by key and value by value.
//! 7. Sequences (and the values of mappings) convert element by element.
//! 8. Anything converts to a string through its display form.
//! 9. Everything else is a [`ConversionError`].

use crate::error::{ConversionError, TemplateResult};
use crate::value::{Map, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use std::borrow::Cow;
use std::fmt;

/// The shape a consumer expects a value to have.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Any value, passed through untouched.
    Any,
    Bool,
    Int,
    Float,
    /// An int or a float, whichever the value already is.
    Number,
    String,
    Time,
    /// A sequence whose elements all have the given shape.
    List(Box<Shape>),
    /// A mapping with the given key and value shapes.
    Map(Box<Shape>, Box<Shape>),
    /// A mapping or object reduced to the named fields.
    Record(Vec<(String, Shape)>),
    /// Nil, or a value of the given shape.
    Optional(Box<Shape>),
}

impl Shape {
    pub fn list(element: Shape) -> Shape {
        Shape::List(Box::new(element))
    }

    pub fn map(key: Shape, value: Shape) -> Shape {
        Shape::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Shape) -> Shape {
        Shape::Optional(Box::new(inner))
    }

    /// The shape a value already has.
    pub fn of(value: &Value) -> Shape {
        match value.canonical().as_ref() {
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::String(_) => Shape::String,
            Value::Time(_) => Shape::Time,
            Value::List(items) => Shape::list(Shape::of_elements(items)),
            Value::Map(_) => Shape::map(Shape::String, Shape::Any),
            Value::Nil | Value::Object(_) => Shape::Any,
        }
    }

    /// The common shape of a sequence's elements, or `Any` if they differ.
    pub fn of_elements(items: &[Value]) -> Shape {
        let mut shapes = items.iter().map(Shape::of);
        match shapes.next() {
            Some(first) if shapes.all(|s| s == first) => first,
            _ => Shape::Any,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => f.write_str("any"),
            Shape::Bool => f.write_str("bool"),
            Shape::Int => f.write_str("int"),
            Shape::Float => f.write_str("float"),
            Shape::Number => f.write_str("number"),
            Shape::String => f.write_str("string"),
            Shape::Time => f.write_str("time"),
            Shape::List(inner) => write!(f, "list of {}", inner),
            Shape::Map(key, value) => write!(f, "map of {} to {}", key, value),
            Shape::Record(fields) => {
                f.write_str("record {")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, shape)?;
                }
                f.write_str("}")
            }
            Shape::Optional(inner) => write!(f, "optional {}", inner),
        }
    }
}

fn conversion_error(modifier: &str, value: &Value, shape: &Shape) -> ConversionError {
    let modifier = if modifier.is_empty() {
        String::new()
    } else {
        format!("{} ", modifier)
    };
    ConversionError::new(format!(
        "can't convert {}{}({}) to type {}",
        modifier,
        value.type_name(),
        value.to_json(),
        shape
    ))
}

fn is_assignable(value: &Value, shape: &Shape) -> bool {
    match (shape, value) {
        (Shape::Any, _)
        | (Shape::Bool, Value::Bool(_))
        | (Shape::Int, Value::Int(_))
        | (Shape::Float, Value::Float(_))
        | (Shape::Number, Value::Int(_) | Value::Float(_))
        | (Shape::String, Value::String(_))
        | (Shape::Time, Value::Time(_)) => true,
        (Shape::List(inner), Value::List(_)) => **inner == Shape::Any,
        (Shape::Map(key, inner), Value::Map(_)) => {
            matches!(**key, Shape::Any | Shape::String) && **inner == Shape::Any
        }
        _ => false,
    }
}

/// Convert `value` to `shape`, recursively rebuilding collections.
pub fn convert(value: &Value, shape: &Shape) -> Result<Value, ConversionError> {
    let value = value.canonical();
    let value = value.as_ref();

    if let Shape::Optional(inner) = shape {
        return if value.is_nil() {
            Ok(Value::Nil)
        } else {
            convert(value, inner)
        };
    }
    if is_assignable(value, shape) {
        return Ok(value.clone());
    }

    match (shape, value) {
        (Shape::Time, Value::String(s)) => parse_time(s).map(Value::Time),

        (Shape::Bool, v) => Ok(Value::Bool(v.is_truthy())),

        (Shape::Int, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (Shape::Int, Value::Float(x)) => Ok(Value::Int(x.trunc() as i64)),
        (Shape::Int, Value::String(s)) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| conversion_error("", value, shape)),

        (Shape::Float, Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        (Shape::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        (Shape::Float, Value::String(s)) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| conversion_error("", value, shape)),

        (Shape::Number, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (Shape::Number, Value::String(s)) => match s.parse::<i64>() {
            Ok(i) => Ok(Value::Int(i)),
            Err(_) => s
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| conversion_error("", value, shape)),
        },

        (Shape::Map(key_shape, value_shape), Value::Map(map)) => {
            let mut out = Map::new();
            for (k, v) in map {
                let key = Value::String(k.clone());
                let key = convert(&key, key_shape)
                    .map_err(|_| conversion_error("map key", &key, key_shape))?;
                let item = convert(v, value_shape).map_err(|e| {
                    ConversionError::new(format!("map value at key {:?}: {}", k, e))
                })?;
                let key = key.to_string();
                if out.contains_key(&key) {
                    return Err(ConversionError::new(format!(
                        "map key {:?} converts to the duplicate key {:?}",
                        k, key
                    )));
                }
                out.insert(key, item);
            }
            Ok(Value::Map(out))
        }

        (Shape::List(element), Value::List(items)) => items
            .iter()
            .map(|item| convert(item, element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (Shape::List(element), Value::Map(map)) => map
            .values()
            .map(|item| convert(item, element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),

        (Shape::Record(fields), Value::Map(_) | Value::Object(_)) => {
            let mut out = Map::new();
            for (name, field_shape) in fields {
                let field = value.property(name).map_or(Value::Nil, Cow::into_owned);
                let field = convert(&field, field_shape)
                    .map_err(|e| ConversionError::new(format!("field {:?}: {}", name, e)))?;
                out.insert(name.clone(), field);
            }
            Ok(Value::Map(out))
        }

        (Shape::String, v) => Ok(Value::String(v.to_string())),

        _ => Err(conversion_error("", value, shape)),
    }
}

/// Convert, treating failure as fatal for the current render.
///
/// The error is propagated up to the node being executed, which attaches its
/// source location and aborts the render. It never panics.
pub fn must_convert(value: &Value, shape: &Shape) -> TemplateResult<Value> {
    Ok(convert(value, shape)?)
}

/// Convert `item` to the element shape of an existing sequence.
pub fn convert_item(item: &Value, sequence: &[Value]) -> TemplateResult<Value> {
    let shape = Shape::of_elements(sequence);
    convert(item, &shape).map_err(|e| {
        ConversionError::new(format!("can't convert {} to {}: {}", item.to_json(), shape, e))
            .into()
    })
}

/// Parse a timestamp from the formats commonly found in front matter and
/// bindings. Times without an offset are taken as UTC.
pub fn parse_time(s: &str) -> Result<DateTime<FixedOffset>, ConversionError> {
    let s = s.trim();
    if s == "now" || s == "today" {
        return Ok(Utc::now().fixed_offset());
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t);
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(s) {
        return Ok(t);
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %:z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(t) = DateTime::parse_from_str(s, format) {
            return Ok(t);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t.and_utc().fixed_offset());
        }
    }
    for format in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            if let Some(t) = date.and_hms_opt(0, 0, 0) {
                return Ok(t.and_utc().fixed_offset());
            }
        }
    }
    Err(conversion_error("", &Value::from(s), &Shape::Time))
}
