/*
 * value/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dynamic template values.
//!
//! This module defines [`Value`], the untyped value that bindings, expression
//! results and filter arguments are made of, and the [`ObjectValue`]
//! capability through which host objects take part in rendering.
//!
//! Ordering, emptiness and sorting live in [`compare`].

pub mod compare;

use crate::error::ConversionError;
use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

pub use compare::{is_empty, length, less, sort, sort_by_property};

/// A mapping of string keys to values.
pub type Map = BTreeMap<String, Value>;

/// Variable bindings supplied by the caller of a render.
pub type Bindings = Map;

/// A host object exposed to templates.
///
/// Objects are looked up by named field (`{{ user.name }}`). An object may
/// also supply a canonical value of its own via [`ObjectValue::to_liquid`];
/// comparison, conversion and output use that value when present.
pub trait ObjectValue: fmt::Debug + Send + Sync {
    /// Look up a named field.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// The canonical template value for this object, if it has one.
    fn to_liquid(&self) -> Option<Value> {
        None
    }

    /// Name reported by the `type` filter and in conversion errors.
    fn type_name(&self) -> &str {
        "object"
    }
}

/// A value that can be used in template evaluation.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// A null/missing value.
    #[default]
    Nil,

    Bool(bool),

    Int(i64),

    Float(f64),

    String(String),

    /// A timestamp, produced by converting strings for the `date` filter.
    Time(DateTime<FixedOffset>),

    /// An ordered sequence of values.
    List(Vec<Value>),

    /// A mapping of string keys to values.
    Map(Map),

    /// An opaque host object, accessed through named fields.
    Object(Arc<dyn ObjectValue>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness for conditionals: only nil and false are falsy.
    ///
    /// Zero, the empty string and empty collections are all truthy; use
    /// `== empty` or the emptiness helpers to test for those.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(false) => false,
            Value::Object(obj) => obj.to_liquid().is_none_or(|v| v.is_truthy()),
            _ => true,
        }
    }

    /// Short name of the value's kind.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Time(_) => "time",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Apply an object's canonical-value hook. Other values are returned as-is.
    pub fn canonical(&self) -> Cow<'_, Value> {
        match self {
            Value::Object(obj) => match obj.to_liquid() {
                Some(value) => Cow::Owned(value),
                None => Cow::Borrowed(self),
            },
            _ => Cow::Borrowed(self),
        }
    }

    /// Look up a named property.
    ///
    /// Mappings are looked up by key and objects by field. Sequences answer
    /// `size`, `first` and `last`; strings and mappings answer `size`.
    pub fn property(&self, key: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Map(map) => match map.get(key) {
                Some(value) => Some(Cow::Borrowed(value)),
                None if key == "size" => Some(Cow::Owned(Value::from(map.len()))),
                None => None,
            },
            Value::List(items) => match key {
                "size" => Some(Cow::Owned(Value::from(items.len()))),
                "first" => items.first().map(Cow::Borrowed),
                "last" => items.last().map(Cow::Borrowed),
                _ => None,
            },
            Value::String(s) if key == "size" => Some(Cow::Owned(Value::from(s.chars().count()))),
            Value::Object(obj) => match obj.get_field(key) {
                Some(value) => Some(Cow::Owned(value)),
                None => obj
                    .to_liquid()
                    .and_then(|v| v.property(key).map(Cow::into_owned))
                    .map(Cow::Owned),
            },
            _ => None,
        }
    }

    /// Index with a computed key: `items[0]`, `items[-1]`, `page["title"]`.
    pub fn index(&self, index: &Value) -> Option<Cow<'_, Value>> {
        match (self, index) {
            (Value::List(items), Value::Int(i)) => {
                let len = i64::try_from(items.len()).ok()?;
                let i = if *i < 0 { len + *i } else { *i };
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .map(Cow::Borrowed)
            }
            (Value::Map(map), Value::Int(i)) => map.get(&i.to_string()).map(Cow::Borrowed),
            (_, Value::String(key)) => self.property(key),
            (Value::Object(obj), _) => obj
                .to_liquid()
                .and_then(|v| v.index(index).map(Cow::into_owned))
                .map(Cow::Owned),
            _ => None,
        }
    }

    /// Convert any serializable host value (structs, references, boxes).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value, ConversionError> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(|e| ConversionError::new(format!("can't convert host value: {}", e)))
    }

    /// JSON representation, used by `inspect` and `jq`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b)
                    || match (a.to_liquid(), b.to_liquid()) {
                        (Some(x), Some(y)) => x == y,
                        _ => false,
                    }
            }
            (Value::Object(obj), value) | (value, Value::Object(obj)) => {
                obj.to_liquid().is_some_and(|v| &v == value)
            }
            _ => false,
        }
    }
}

/// Human-readable rendering, used for `{{ output }}` and string conversion.
///
/// - nil renders as nothing
/// - sequences render as the concatenation of their elements
/// - mappings render as JSON
/// - whole floats keep a trailing `.0`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => f.write_str(s),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S %z")),
            Value::List(items) => items.iter().try_for_each(|item| write!(f, "{}", item)),
            Value::Map(_) => write!(f, "{}", self.to_json()),
            Value::Object(obj) => match obj.to_liquid() {
                Some(value) => write!(f, "{}", value),
                None => write!(f, "<{}>", obj.type_name()),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::Time(t) => serializer.serialize_str(&t.to_rfc3339()),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
            Value::Object(obj) => match obj.to_liquid() {
                Some(value) => value.serialize(serializer),
                None => serializer.serialize_str(obj.type_name()),
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Nil, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Value::Time(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Box<T>> for Value {
    fn from(boxed: Box<T>) -> Self {
        (*boxed).into()
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>, S: BuildHasher> From<HashMap<String, T, S>> for Value {
    fn from(map: HashMap<String, T, S>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<Arc<dyn ObjectValue>> for Value {
    fn from(obj: Arc<dyn ObjectValue>) -> Self {
        Value::Object(obj)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::List(iter.into_iter().collect())
    }
}
