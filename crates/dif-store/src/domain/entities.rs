//! # Domain Entities
//!
//! Core domain entities for the Dif Store.
//!
//! ## Entities
//!
//! - `Fingerprint`: opaque content signature ("dif") compared for equality
//! - `FingerprintRecord`: a fingerprint bound to its partition key
//! - `KeyRegistry`: the singleton set of known partition keys
//! - `LogEntry`: an append-only audit record with an indexed field

use crate::domain::errors::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Field of a fingerprint record emitted by the fingerprint-by-key index.
pub const DIFS_FIELD: &str = "difs_by_key";

/// Document id of the key registry.
pub const REGISTRY_DOC_ID: &str = "keys";

/// Field of the registry document holding the key list.
pub const KEYS_FIELD: &str = "keys";

/// Opaque, already-serialized content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Canonical fingerprint of a dif collection.
    ///
    /// Difs are sorted by (type, value) first, so the same collection in
    /// any order yields the same bytes.
    pub fn from_difs(difs: &[Dif]) -> Self {
        let mut pairs: Vec<(&str, &str)> = difs
            .iter()
            .map(|d| (d.kind.as_str(), d.value.as_str()))
            .collect();
        pairs.sort_unstable();
        // Serializing a list of string pairs cannot fail.
        let bytes = serde_json::to_vec(&pairs).unwrap_or_default();
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<&[u8]> for Fingerprint {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// A single typed value identifying submitted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dif {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Dif {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// A fingerprint recorded under a partition key.
///
/// Immutable once written; only removed by a full store reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintRecord {
    pub key: String,
    pub fingerprint: Fingerprint,
}

impl FingerprintRecord {
    pub fn new(key: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            key: key.into(),
            fingerprint,
        }
    }

    /// Serialized (key, fingerprint) pair; the fingerprint index key.
    pub fn index_key(key: &str, fingerprint: &Fingerprint) -> Value {
        json!([key, fingerprint.to_hex()])
    }

    /// Document body written to the backing store.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            DIFS_FIELD.to_string(),
            Self::index_key(&self.key, &self.fingerprint),
        );
        Value::Object(body)
    }

    /// Parse a stored document body back into a record.
    pub fn from_body(body: &Value) -> Option<Self> {
        let pair = body.get(DIFS_FIELD)?.as_array()?;
        match pair.as_slice() {
            [Value::String(key), Value::String(hex_fp)] => {
                let bytes = hex::decode(hex_fp).ok()?;
                Some(Self::new(key.clone(), Fingerprint::new(bytes)))
            }
            _ => None,
        }
    }
}

/// Contents of the singleton key registry document.
///
/// Keys keep insertion order and never repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRegistry {
    keys: Vec<String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_body(body: &Value) -> Result<Self, StorageError> {
        let list = body
            .get(KEYS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| StorageError::Corruption {
                message: format!("registry document has no '{}' list", KEYS_FIELD),
            })?;

        let mut registry = Self::new();
        for item in list {
            let key = item.as_str().ok_or_else(|| StorageError::Corruption {
                message: format!("registry entry is not a string: {}", item),
            })?;
            registry.insert(key);
        }
        Ok(registry)
    }

    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(KEYS_FIELD.to_string(), json!(self.keys));
        Value::Object(body)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Append `key` if absent. Returns true if it was added.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.contains(key) {
            return false;
        }
        self.keys.push(key.to_string());
        true
    }

    /// Append every absent key in input order. Returns true if any was added.
    pub fn extend<'a, I>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut changed = false;
        for key in keys {
            changed |= self.insert(key);
        }
        changed
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Who made a request and what they sent, for request log entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub remote_addr: String,
    pub body: String,
}

/// An append-only audit record.
///
/// The payload is free-form; one field (configured per store, `timestamp`
/// by default) is indexed for retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry {
    fields: Map<String, Value>,
}

impl LogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Entry for a request that was answered.
    pub fn success(
        timestamp: u64,
        request: &RequestContext,
        response: Value,
        uniques: &[String],
        duplicates: &[String],
    ) -> Self {
        Self::for_request(timestamp, request, true)
            .with_field("response", response)
            .with_field("uniques", json!(uniques))
            .with_field("duplicates", json!(duplicates))
    }

    /// Entry for a request that was rejected.
    pub fn error(timestamp: u64, request: &RequestContext, error_msg: impl Into<String>) -> Self {
        Self::for_request(timestamp, request, false).with_field("error_msg", error_msg.into())
    }

    fn for_request(timestamp: u64, request: &RequestContext, success: bool) -> Self {
        Self::new()
            .with_field("timestamp", timestamp)
            .with_field("remote_addr", request.remote_addr.clone())
            .with_field("req_body", request.body.clone())
            .with_field("success", success)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_body(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn from_body(body: Value) -> Option<Self> {
        match body {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }
}
