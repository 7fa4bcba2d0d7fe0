//! Typed response objects.
//!
//! Every JSON response is materialized into an [`ApiObject`]: an ordered
//! field map whose nested objects are `ApiObject`s as well, all sharing one
//! [`TransportMeta`]. The object's [`ObjectKind`] is resolved from an
//! explicit tag, then the payload's `object` field, then falls back to
//! [`ObjectKind::Generic`]. Typed views (`as_chat_completion`, ...) give
//! named accessors for the known shapes while `get` and indexing keep
//! every field reachable.

mod value;
mod views;

pub use value::ApiValue;
pub use views::{ChatChunkView, ChatCompletionView, FineTuneView, ListView, ModerationView};

use crate::config::{ApiType, ResolvedCredentials};
use engine_ox_common::ResponseHead;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use value::NULL;

/// Known resource shapes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    ChatCompletion,
    ChatCompletionChunk,
    Moderation,
    FineTune,
    File,
    List,
    /// Untagged payloads and tags this client does not know about
    Generic(Option<String>),
}

impl ObjectKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("chat.completion") => ObjectKind::ChatCompletion,
            Some("chat.completion.chunk") => ObjectKind::ChatCompletionChunk,
            Some("moderation") => ObjectKind::Moderation,
            Some("fine-tune") => ObjectKind::FineTune,
            Some("file") => ObjectKind::File,
            Some("list") => ObjectKind::List,
            other => ObjectKind::Generic(other.map(str::to_string)),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            ObjectKind::ChatCompletion => Some("chat.completion"),
            ObjectKind::ChatCompletionChunk => Some("chat.completion.chunk"),
            ObjectKind::Moderation => Some("moderation"),
            ObjectKind::FineTune => Some("fine-tune"),
            ObjectKind::File => Some("file"),
            ObjectKind::List => Some("list"),
            ObjectKind::Generic(tag) => tag.as_deref(),
        }
    }
}

/// Transport details of the exchange an object came from.
///
/// Never serialized back into the payload.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TransportMeta {
    pub request_id: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub api_type: Option<ApiType>,
    pub api_version: Option<String>,
    pub organization: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl TransportMeta {
    pub fn from_exchange(credentials: &ResolvedCredentials, head: &ResponseHead) -> Self {
        Self {
            request_id: head.request_id.clone(),
            api_key: Some(credentials.api_key.clone()),
            api_base: Some(credentials.api_base.clone()),
            api_type: Some(credentials.api_type),
            api_version: credentials.api_version.clone(),
            organization: credentials.organization.clone(),
            headers: head.headers.clone(),
        }
    }

    /// Case-insensitive response header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for TransportMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportMeta")
            .field("request_id", &self.request_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .field("api_type", &self.api_type)
            .field("api_version", &self.api_version)
            .field("organization", &self.organization)
            .field("headers", &self.headers.len())
            .finish()
    }
}

/// A response object materialized from decoded JSON
#[derive(Clone)]
pub struct ApiObject {
    kind: ObjectKind,
    fields: Vec<(String, ApiValue)>,
    meta: Arc<TransportMeta>,
}

impl ApiObject {
    /// Materialize a JSON object.
    ///
    /// `tag` overrides the payload's own `object` field when given.
    pub fn from_map(map: Map<String, Value>, tag: Option<&str>, meta: Arc<TransportMeta>) -> Self {
        let kind = ObjectKind::from_tag(tag.or_else(|| map.get("object").and_then(Value::as_str)));

        let fields = map
            .into_iter()
            .map(|(key, value)| (key, ApiValue::from_json(value, &meta)))
            .collect();

        Self { kind, fields, meta }
    }

    /// Materialize any JSON value that is an object; `None` otherwise
    pub fn from_json(value: Value, tag: Option<&str>, meta: Arc<TransportMeta>) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map, tag, meta)),
            _ => None,
        }
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn meta(&self) -> &TransportMeta {
        &self.meta
    }

    /// Request id reported by the server for the originating exchange
    pub fn request_id(&self) -> Option<&str> {
        self.meta.request_id.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(ApiValue::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&ApiValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// String field shortcut
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ApiValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Fields in the order the server sent them
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApiValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A copy of this object without `key`, same kind and metadata
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        Self {
            kind: self.kind.clone(),
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| name != key)
                .cloned()
                .collect(),
            meta: Arc::clone(&self.meta),
        }
    }

    /// Visible fields as plain JSON
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_value()))
            .collect()
    }

    pub fn as_chat_completion(&self) -> Option<ChatCompletionView<'_>> {
        (self.kind == ObjectKind::ChatCompletion).then_some(ChatCompletionView(self))
    }

    pub fn as_chat_chunk(&self) -> Option<ChatChunkView<'_>> {
        (self.kind == ObjectKind::ChatCompletionChunk).then_some(ChatChunkView(self))
    }

    pub fn as_moderation(&self) -> Option<ModerationView<'_>> {
        (self.kind == ObjectKind::Moderation).then_some(ModerationView(self))
    }

    pub fn as_fine_tune(&self) -> Option<FineTuneView<'_>> {
        (self.kind == ObjectKind::FineTune).then_some(FineTuneView(self))
    }

    pub fn as_list(&self) -> Option<ListView<'_>> {
        (self.kind == ObjectKind::List).then_some(ListView(self))
    }
}

impl fmt::Debug for ApiObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiObject")
            .field("kind", &self.kind)
            .field("request_id", &self.meta.request_id)
            .field("fields", &self.to_value())
            .finish()
    }
}

impl fmt::Display for ApiObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.to_value()) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Equality covers kind and visible fields, never transport metadata
impl PartialEq for ApiObject {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.fields == other.fields
    }
}

impl Index<&str> for ApiObject {
    type Output = ApiValue;

    fn index(&self, key: &str) -> &ApiValue {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Serialize for ApiObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ApiObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(ApiObject::from_map(map, None, Arc::default()))
    }
}

impl TryFrom<Value> for ApiObject {
    type Error = de::value::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(ApiObject::from_map(map, None, Arc::default())),
            other => Err(de::Error::custom(format!("expected a JSON object, got {other}"))),
        }
    }
}
