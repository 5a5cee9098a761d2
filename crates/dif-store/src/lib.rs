//! # Dif Store
//!
//! Duplicate-submission detection store. Records content fingerprints
//! ("difs") per partition key on top of a document database with secondary
//! indexes, and answers whether a (key, fingerprint) pair was seen before.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Stable Identity | Identical content derives the same record id in every process |
//! | 2 | No Lost Registry Updates | Registry writes are conditioned on the revision read |
//! | 3 | Idempotent Bootstrap | An existing database is never re-indexed |
//! | 4 | Write Failure Reporting | Every write-path failure surfaces as `UpdateFailed` |
//! | 5 | Append-Only Log | Log entries change only through `clear` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pure domain logic (identity, records, index definitions, config)
//! - `ports/` - Port traits (inbound API, outbound document database)
//! - `service/` - `DifStore`, implementing the API over any database
//! - `adapters/` - In-memory, file and RocksDB databases, backend URLs
//!
//! ## Usage
//!
//! ```
//! use dif_store::{DifStore, DifStoreApi, Fingerprint, StoreConfig};
//!
//! let store = DifStore::new_in_memory(StoreConfig::default()).unwrap();
//! let fingerprint = Fingerprint::new(b"submission".to_vec());
//!
//! assert!(!store.has("source-a", &fingerprint).unwrap());
//! store.add("source-a", &fingerprint).unwrap();
//! assert!(store.has("source-a", &fingerprint).unwrap());
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{
    open_backend, open_store, DynDifStore, FileDocumentDb, InMemoryDocumentDb,
    InMemoryDocumentServer, SystemTimeSource,
};
pub use domain::config::{BackendUrl, IdentityConfig, RetryPolicy, StoreConfig};
pub use domain::document::{DocId, Document, Revision};
pub use domain::entities::{Dif, Fingerprint, FingerprintRecord, KeyRegistry, LogEntry, RequestContext};
pub use domain::errors::{DifStoreError, StorageError};
pub use domain::identity::{change_base, content_hash, IdentityDeriver, DEFAULT_ALPHABET};
pub use domain::index::{Consistency, IndexDefinition, IndexRow};
pub use ports::inbound::DifStoreApi;
pub use ports::outbound::{DocumentDatabase, IndexQuery, TimeSource, Timestamp};
pub use service::{DifStore, DifStoreDependencies};

#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbDocumentDb, RocksDbDocumentStore};
