use super::{ApiObject, TransportMeta};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::ops::Index;
use std::sync::Arc;

pub(crate) static NULL: ApiValue = ApiValue::Null;

/// A field value inside an [`ApiObject`].
///
/// Mirrors `serde_json::Value`, except that nested JSON objects are
/// materialized as `ApiObject`s so they carry the transport metadata too.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ApiValue>),
    Object(ApiObject),
}

impl ApiValue {
    pub(crate) fn from_json(value: Value, meta: &Arc<TransportMeta>) -> Self {
        match value {
            Value::Null => ApiValue::Null,
            Value::Bool(b) => ApiValue::Bool(b),
            Value::Number(n) => ApiValue::Number(n),
            Value::String(s) => ApiValue::String(s),
            Value::Array(items) => ApiValue::Array(
                items
                    .into_iter()
                    .map(|item| ApiValue::from_json(item, meta))
                    .collect(),
            ),
            Value::Object(map) => ApiValue::Object(ApiObject::from_map(map, None, Arc::clone(meta))),
        }
    }

    /// Convert back into plain JSON, dropping transport metadata
    pub fn to_value(&self) -> Value {
        match self {
            ApiValue::Null => Value::Null,
            ApiValue::Bool(b) => Value::Bool(*b),
            ApiValue::Number(n) => Value::Number(n.clone()),
            ApiValue::String(s) => Value::String(s.clone()),
            ApiValue::Array(items) => Value::Array(items.iter().map(ApiValue::to_value).collect()),
            ApiValue::Object(object) => object.to_value(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ApiValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ApiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ApiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ApiValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ApiValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ApiValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ApiValue]> {
        match self {
            ApiValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ApiObject> {
        match self {
            ApiValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Iterate the objects of an array value, skipping anything else
    pub fn objects(&self) -> impl Iterator<Item = &ApiObject> {
        self.as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(ApiValue::as_object)
    }
}

impl Index<&str> for ApiValue {
    type Output = ApiValue;

    fn index(&self, key: &str) -> &ApiValue {
        match self {
            ApiValue::Object(object) => &object[key],
            _ => &NULL,
        }
    }
}

impl Index<usize> for ApiValue {
    type Output = ApiValue;

    fn index(&self, index: usize) -> &ApiValue {
        match self {
            ApiValue::Array(items) => items.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

impl Serialize for ApiValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ApiValue::Null => serializer.serialize_unit(),
            ApiValue::Bool(b) => serializer.serialize_bool(*b),
            ApiValue::Number(n) => n.serialize(serializer),
            ApiValue::String(s) => serializer.serialize_str(s),
            ApiValue::Array(items) => items.serialize(serializer),
            ApiValue::Object(object) => object.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ApiValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ApiValue::from_json(value, &Arc::default()))
    }
}

impl PartialEq<str> for ApiValue {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for ApiValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<bool> for ApiValue {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<i64> for ApiValue {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}
