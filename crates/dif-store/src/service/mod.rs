//! # Dif Store Service
//!
//! The main service implementing the Dif Store API.
//!
//! ## Architecture
//!
//! This service:
//! 1. Bootstraps the backing database on construction (`lifecycle`)
//! 2. Answers and records fingerprints (`dedup`)
//! 3. Maintains the key registry under optimistic concurrency (`registry`)
//! 4. Appends and retrieves audit log entries (`audit`)
//!
//! The service holds no locks of its own. Every operation is a synchronous
//! call against the backing database, which is the only shared state.

mod audit;
mod dedup;
mod lifecycle;
mod registry;

use crate::adapters::{InMemoryDocumentDb, InMemoryDocumentServer, SystemTimeSource};
use crate::domain::config::StoreConfig;
use crate::domain::entities::{Fingerprint, LogEntry};
use crate::domain::errors::DifStoreError;
use crate::domain::identity::IdentityDeriver;
use crate::domain::index::IndexDefinition;
use crate::ports::inbound::DifStoreApi;
use crate::ports::outbound::{DocumentDatabase, TimeSource};

/// The Dif Store.
///
/// Owns its backing database handle for its whole lifetime; dropping the
/// store releases the handle.
pub struct DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    /// Backing document database.
    pub(crate) db: DB,
    /// Time source for log entry timestamps.
    pub(crate) time_source: TS,
    pub(crate) config: StoreConfig,
    /// Derives record ids from content.
    pub(crate) deriver: IdentityDeriver,
    pub(crate) fingerprint_index: IndexDefinition,
    pub(crate) log_index: IndexDefinition,
}

/// Dependencies for DifStore
pub struct DifStoreDependencies<DB, TS> {
    pub db: DB,
    pub time_source: TS,
}

impl<DB, TS> DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    /// Create a store over `deps.db`, bootstrapping the database if it does
    /// not exist yet.
    ///
    /// ## Errors
    ///
    /// - `Config`: invalid configuration, or an existing database indexed
    ///   on a different log field
    /// - `UpdateFailed`: the bootstrap failed
    pub fn new(deps: DifStoreDependencies<DB, TS>, config: StoreConfig) -> Result<Self, DifStoreError> {
        config.validate()?;
        let store = Self {
            db: deps.db,
            time_source: deps.time_source,
            deriver: config.identity.deriver()?,
            fingerprint_index: IndexDefinition::fingerprints(),
            log_index: IndexDefinition::log(config.log_index_field.clone()),
            config,
        };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The backing database handle.
    pub fn database(&self) -> &DB {
        &self.db
    }
}

impl DifStore<InMemoryDocumentDb, SystemTimeSource> {
    /// A store on a private in-memory server.
    pub fn new_in_memory(config: StoreConfig) -> Result<Self, DifStoreError> {
        let server =
            InMemoryDocumentServer::new().with_refresh_threshold(config.index_refresh_threshold);
        let deps = DifStoreDependencies {
            db: server.database(config.database.clone()),
            time_source: SystemTimeSource,
        };
        Self::new(deps, config)
    }
}

impl<DB, TS> DifStoreApi for DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    fn has(&self, key: &str, fingerprint: &Fingerprint) -> Result<bool, DifStoreError> {
        self.has_with(key, fingerprint, self.config.has_consistency)
    }

    fn add(&self, key: &str, fingerprint: &Fingerprint) -> Result<(), DifStoreError> {
        self.add_record(key, fingerprint)
    }

    fn register_key(&self, key: &str) -> Result<bool, DifStoreError> {
        self.update_registry(|registry| registry.insert(key))
    }

    fn ensure_keys(&self, keys: &[&str]) -> Result<(), DifStoreError> {
        self.update_registry(|registry| registry.extend(keys.iter().copied()))
            .map(|_| ())
    }

    fn append(&self, entry: LogEntry) -> Result<(), DifStoreError> {
        self.append_entry(entry)
    }

    fn clear(&self) -> Result<(), DifStoreError> {
        self.reset()
    }
}
