//! # Domain Errors
//!
//! Error types for the Dif Store.
//!
//! ## Design Principles
//!
//! - The backing database reports failures only as `StorageError`
//! - Write paths collapse every backing failure into `UpdateFailed`
//! - Read paths pass `StorageError` through unchanged

use thiserror::Error;

/// Failures raised by a backing document database adapter.
///
/// This is the only failure kind the service layer catches from the
/// backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The object being created already exists.
    #[error("already exists: {what}")]
    AlreadyExists { what: String },

    /// The object being addressed does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A conditional write lost against a concurrent writer.
    #[error("document update conflict: {id}")]
    Conflict { id: String },

    /// The bound database has not been created (or was deleted).
    #[error("database does not exist: {name}")]
    DatabaseMissing { name: String },

    /// I/O error talking to the backing store.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Stored data could not be interpreted.
    #[error("corruption: {message}")]
    Corruption { message: String },

    /// Document (de)serialization failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl StorageError {
    /// True if this error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    /// True if this error reports that the target already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists { .. })
    }

    pub(crate) fn io(err: impl std::fmt::Display) -> Self {
        StorageError::Io {
            message: err.to_string(),
        }
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the Dif Store API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DifStoreError {
    /// A write path failed. Carries the backing store's description.
    #[error("update failed: {message}")]
    UpdateFailed { message: String },

    /// A read path failed in the backing store.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A log entry is missing the configured index field.
    #[error("log entry is missing index field '{field}'")]
    InvalidLogEntry { field: String },

    /// A log entry carries a field reserved for store documents.
    #[error("log entry must not carry reserved field '{field}'")]
    ReservedLogField { field: String },

    /// Invalid configuration or backend URL.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl DifStoreError {
    /// Re-signal a backing failure on a write path.
    pub fn update_failed(err: impl std::fmt::Display) -> Self {
        DifStoreError::UpdateFailed {
            message: err.to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        DifStoreError::Config {
            message: message.into(),
        }
    }
}
