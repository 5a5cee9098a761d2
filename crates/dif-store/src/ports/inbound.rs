//! # Inbound Ports (Driving Ports)
//!
//! The primary API of the Dif Store, consumed by submission-intake services.

use crate::domain::entities::{Fingerprint, LogEntry};
use crate::domain::errors::DifStoreError;

/// Primary API for the Dif Store.
///
/// Write operations report every backing failure as `UpdateFailed`.
/// Read operations pass backing failures through as `Storage`.
pub trait DifStoreApi {
    /// True iff `(key, fingerprint)` has been recorded.
    ///
    /// ## Consistency
    ///
    /// Uses the store's configured consistency. Under eventual consistency a
    /// very recent `add` may not be visible yet.
    ///
    /// ## Errors
    ///
    /// - `Storage`: backing failure, unwrapped
    fn has(&self, key: &str, fingerprint: &Fingerprint) -> Result<bool, DifStoreError>;

    /// Record `(key, fingerprint)`.
    ///
    /// Does not check `has` first. Callers wanting to avoid duplicate
    /// records check `has` before calling `add`.
    ///
    /// ## Errors
    ///
    /// - `UpdateFailed`: backing failure on either write path
    fn add(&self, key: &str, fingerprint: &Fingerprint) -> Result<(), DifStoreError>;

    /// Register one partition key. Returns true if it was newly added.
    ///
    /// ## Errors
    ///
    /// - `UpdateFailed`: backing failure or retry budget exhausted
    fn register_key(&self, key: &str) -> Result<bool, DifStoreError>;

    /// Register every key not yet present, in input order, with at most one
    /// registry write per attempt.
    ///
    /// ## Errors
    ///
    /// - `UpdateFailed`: backing failure or retry budget exhausted
    fn ensure_keys(&self, keys: &[&str]) -> Result<(), DifStoreError>;

    /// Append an audit log entry carrying the configured index field.
    ///
    /// ## Errors
    ///
    /// - `InvalidLogEntry`: the index field is missing or empty
    /// - `ReservedLogField`: the entry carries the fingerprint record field
    /// - `UpdateFailed`: backing failure
    fn append(&self, entry: LogEntry) -> Result<(), DifStoreError>;

    /// Delete the backing database and bootstrap it again.
    ///
    /// Destructive and non-atomic. Must not run concurrently with any other
    /// operation.
    ///
    /// ## Errors
    ///
    /// - `UpdateFailed`: backing failure during delete or bootstrap
    fn clear(&self) -> Result<(), DifStoreError>;
}
