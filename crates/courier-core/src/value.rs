//! Dynamic value model for update payloads and API results.
//!
//! The remote API speaks JSON whose shape varies by update kind and method.
//! Rather than modelling every object, the core keeps payloads as a small
//! sum type with safe accessors. Path lookups use dot notation
//! (`"chat.type"`) and report failures as [`ValueError`] instead of panicking.
//!
//! ```rust,ignore
//! use courier_core::{Object, Value};
//!
//! let message: Object = serde_json::from_str(r#"{"chat": {"id": 42, "type": "private"}}"#)?;
//! assert_eq!(message.get_str("chat.type")?, "private");
//! assert_eq!(message.get_i64("chat.id")?, 42);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ValueError, ValueResult};

// =============================================================================
// Value
// =============================================================================

/// A dynamically-typed JSON value.
///
/// Integers that fit in `i64` decode to [`Value::Int`]; every other number
/// decodes to [`Value::Float`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// JSON `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integral number.
    Int(i64),
    /// A non-integral (or out of `i64` range) number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// A string-keyed map of values.
    Object(Object),
}

impl Value {
    /// Returns a short name for the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    ///
    /// Floats are accepted when they carry no fractional part and fit in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    fn root(&self) -> ValueResult<&Object> {
        self.as_object().ok_or_else(|| ValueError::NotAnObject {
            path: String::from("<root>"),
        })
    }

    /// Resolves a dot-separated path; fails unless `self` is an object.
    pub fn lookup(&self, path: &str) -> ValueResult<&Value> {
        self.root()?.lookup(path)
    }

    pub fn get_str(&self, path: &str) -> ValueResult<&str> {
        self.root()?.get_str(path)
    }

    pub fn get_i64(&self, path: &str) -> ValueResult<i64> {
        self.root()?.get_i64(path)
    }

    pub fn get_f64(&self, path: &str) -> ValueResult<f64> {
        self.root()?.get_f64(path)
    }

    pub fn get_bool(&self, path: &str) -> ValueResult<bool> {
        self.root()?.get_bool(path)
    }

    pub fn get_object(&self, path: &str) -> ValueResult<&Object> {
        self.root()?.get_object(path)
    }

    pub fn get_array(&self, path: &str) -> ValueResult<&Vec<Value>> {
        self.root()?.get_array(path)
    }

    /// Consumes the value, returning the inner object if it is one.
    pub fn into_object(self) -> Result<Object, Value> {
        match self {
            Self::Object(object) => Ok(object),
            other => Err(other),
        }
    }

    /// Consumes the value, returning the inner array if it is one.
    pub fn into_array(self) -> Result<Vec<Value>, Value> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

// =============================================================================
// Object
// =============================================================================

/// A string-keyed map of [`Value`]s with dot-path accessors.
///
/// Dereferences to the underlying `BTreeMap`, so the usual map methods
/// (`get`, `insert`, `contains_key`, iteration) are available directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object(BTreeMap<String, Value>);

impl Object {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a field (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Resolves a dot-separated path such as `"message.chat.id"`.
    pub fn lookup(&self, path: &str) -> ValueResult<&Value> {
        if path.is_empty() {
            return Err(ValueError::EmptyPath);
        }
        self.resolve(path, 0)
    }

    fn resolve<'a>(&'a self, path: &str, start: usize) -> ValueResult<&'a Value> {
        let rest = &path[start..];
        match rest.split_once('.') {
            None => self.0.get(rest).ok_or_else(|| ValueError::MissingKey {
                path: path.to_string(),
            }),
            Some((key, _)) => {
                let end = start + key.len();
                match self.0.get(key) {
                    Some(Value::Object(next)) => next.resolve(path, end + 1),
                    Some(_) => Err(ValueError::NotAnObject {
                        path: path[..end].to_string(),
                    }),
                    None => Err(ValueError::MissingKey {
                        path: path.to_string(),
                    }),
                }
            }
        }
    }

    pub fn get_str(&self, path: &str) -> ValueResult<&str> {
        let value = self.lookup(path)?;
        value.as_str().ok_or_else(|| mismatch(path, "string", value))
    }

    pub fn get_i64(&self, path: &str) -> ValueResult<i64> {
        let value = self.lookup(path)?;
        value.as_i64().ok_or_else(|| mismatch(path, "integer", value))
    }

    pub fn get_f64(&self, path: &str) -> ValueResult<f64> {
        let value = self.lookup(path)?;
        value.as_f64().ok_or_else(|| mismatch(path, "number", value))
    }

    pub fn get_bool(&self, path: &str) -> ValueResult<bool> {
        let value = self.lookup(path)?;
        value.as_bool().ok_or_else(|| mismatch(path, "bool", value))
    }

    pub fn get_object(&self, path: &str) -> ValueResult<&Object> {
        let value = self.lookup(path)?;
        value.as_object().ok_or_else(|| mismatch(path, "object", value))
    }

    pub fn get_array(&self, path: &str) -> ValueResult<&Vec<Value>> {
        let value = self.lookup(path)?;
        value.as_array().ok_or_else(|| mismatch(path, "array", value))
    }

    /// Consumes the object, returning the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl Deref for Object {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Object {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, Value>> for Object {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Object {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Object {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(object) => Self::Object(
                object
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(object) => object.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut object = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            object.insert(key, value);
        }
        Ok(Value::Object(Object(object)))
    }
}
