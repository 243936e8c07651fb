//! Generic attribute representation shared by the codecs and the backend.
//!
//! An [`AttributeMap`] is the wire-agnostic shape of a record: a sparse
//! mapping from attribute name to [`AttributeValue`]. Top-level fields that
//! hold their type's zero value are left out entirely, so on the way back a
//! missing attribute and a zero value are indistinguishable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Attribute name → value. Ordered so that encoding is deterministic.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// A single stored attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    String(String),
    /// Decimal text, kept verbatim so no precision is lost in storage.
    #[serde(rename = "N")]
    Number(String),
    #[serde(rename = "B")]
    Blob(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    #[serde(rename = "M")]
    Map(AttributeMap),
    #[serde(rename = "NULL")]
    Null,
}

impl AttributeValue {
    /// Short name of the stored shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Number(_) => "number",
            AttributeValue::Blob(_) => "blob",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::List(_) => "list",
            AttributeValue::Map(_) => "map",
            AttributeValue::Null => "null",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// True when `value` is the zero value of its JSON shape.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Convert a top-level field value, omitting it when it holds its zero value.
pub fn from_json(value: &Value) -> Option<AttributeValue> {
    if is_zero(value) {
        None
    } else {
        Some(dense(value))
    }
}

// Nested values are stored as-is; only top-level fields are sparse.
fn dense(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::Number(n.to_string()),
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(items) => AttributeValue::List(items.iter().map(dense).collect()),
        Value::Object(fields) => AttributeValue::Map(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), dense(v)))
                .collect(),
        ),
    }
}

/// Convert a stored attribute back into a JSON value for field `field`.
pub fn to_json(field: &str, attr: &AttributeValue) -> Result<Value> {
    let value = match attr {
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Number(text) => {
            let n: Number = text
                .parse()
                .map_err(|_| Error::schema(field, format!("`{text}` is not a number")))?;
            Value::Number(n)
        }
        AttributeValue::Blob(bytes) => {
            Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
        }
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| to_json(field, item))
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::Map(fields) => {
            let mut object = Map::with_capacity(fields.len());
            for (name, v) in fields {
                object.insert(name.clone(), to_json(field, v)?);
            }
            Value::Object(object)
        }
        AttributeValue::Null => Value::Null,
    };
    Ok(value)
}
