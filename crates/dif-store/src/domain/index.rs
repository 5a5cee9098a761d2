//! # Index Definitions
//!
//! Secondary indexes ("views") maintained by the backing database.
//!
//! An index maps one document field to the ids of documents carrying it.
//! A document is emitted only when the field is present and truthy
//! (not null, false, 0 or the empty string). Keys are compared in their
//! canonical JSON form.

use crate::domain::entities::DIFS_FIELD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Name of the fingerprint-by-key index.
pub const FINGERPRINT_INDEX: &str = "difs/difs_by_key";

/// Name of the log-by-index-field index.
pub const LOG_INDEX: &str = "log/entries";

/// A named, versioned index over one document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub field: String,
    pub version: u32,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            version: 1,
        }
    }

    /// Index over the serialized (key, fingerprint) pair of each record.
    pub fn fingerprints() -> Self {
        Self::new(FINGERPRINT_INDEX, DIFS_FIELD)
    }

    /// Index over the configured log field of each log entry.
    pub fn log(field: impl Into<String>) -> Self {
        Self::new(LOG_INDEX, field)
    }

    /// Index key emitted for a document body, if any.
    pub fn emit(&self, body: &Value) -> Option<String> {
        body.get(&self.field)
            .filter(|value| is_truthy(value))
            .map(canonical_key)
    }
}

/// Canonical string form of an index key.
pub fn canonical_key(value: &Value) -> String {
    value.to_string()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Read consistency requested for an index query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// Bring the index up to date with every committed write before reading.
    #[default]
    Strong,
    /// Read the index as last built; recent writes may be missing.
    Eventual,
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::Strong => write!(f, "strong"),
            Consistency::Eventual => write!(f, "eventual"),
        }
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strong" => Ok(Consistency::Strong),
            "eventual" => Ok(Consistency::Eventual),
            other => Err(format!("unknown consistency mode: {}", other)),
        }
    }
}

/// One row of an index query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub key: String,
    pub id: crate::domain::document::DocId,
}
