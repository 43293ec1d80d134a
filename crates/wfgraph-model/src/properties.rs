//! Store-neutral property values.
//!
//! Property graphs accept scalars and homogeneous lists of scalars only.
//! Anything else (objects, nested or mixed lists) is kept as its JSON text so
//! no field is lost on the way into the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type PropertyMap = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Convert a JSON value. `null` has no property representation and yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(list_or_text(items, value)),
            Value::Object(_) => Some(PropertyValue::String(value.to_string())),
            scalar => scalar_from_json(scalar),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

/// Convert every non-null member of a JSON object.
pub fn properties_from_object(object: &Map<String, Value>) -> PropertyMap {
    object
        .iter()
        .filter_map(|(key, value)| PropertyValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

fn scalar_from_json(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(PropertyValue::Int(i)),
            None => n.as_f64().map(PropertyValue::Float),
        },
        Value::String(s) => Some(PropertyValue::String(s.clone())),
        _ => None,
    }
}

#[derive(PartialEq)]
enum ScalarKind {
    Bool,
    Number,
    String,
}

fn list_or_text(items: &[Value], whole: &Value) -> PropertyValue {
    let mut kind: Option<ScalarKind> = None;
    let mut any_float = false;
    for item in items {
        let item_kind = match item {
            Value::Bool(_) => ScalarKind::Bool,
            Value::Number(n) => {
                any_float |= n.as_i64().is_none();
                ScalarKind::Number
            }
            Value::String(_) => ScalarKind::String,
            _ => return PropertyValue::String(whole.to_string()),
        };
        match &kind {
            None => kind = Some(item_kind),
            Some(k) if *k != item_kind => return PropertyValue::String(whole.to_string()),
            Some(_) => {}
        }
    }

    let values = items
        .iter()
        .filter_map(|item| match item {
            // Mixed int/float lists are widened so the list stays homogeneous.
            Value::Number(n) if any_float => n.as_f64().map(PropertyValue::Float),
            other => scalar_from_json(other),
        })
        .collect();
    PropertyValue::List(values)
}
