//! Backend selection from a [`BackendUrl`].

use crate::adapters::file::FileDocumentDb;
use crate::adapters::infra::SystemTimeSource;
use crate::adapters::memory::InMemoryDocumentServer;
use crate::domain::config::{BackendUrl, StoreConfig};
use crate::domain::errors::DifStoreError;
use crate::ports::outbound::DocumentDatabase;
use crate::service::{DifStore, DifStoreDependencies};

/// A store over a backend chosen at runtime.
pub type DynDifStore = DifStore<Box<dyn DocumentDatabase>, SystemTimeSource>;

/// Open the database a URL names. A database name in the URL takes
/// precedence over `config.database`.
pub fn open_backend(
    url: &BackendUrl,
    config: &StoreConfig,
) -> Result<Box<dyn DocumentDatabase>, DifStoreError> {
    let database = url.database().unwrap_or(&config.database).to_string();

    match url {
        BackendUrl::Memory { .. } => Ok(Box::new(
            InMemoryDocumentServer::new()
                .with_refresh_threshold(config.index_refresh_threshold)
                .database(database),
        )),
        BackendUrl::File { dir, .. } => Ok(Box::new(FileDocumentDb::open(dir, database)?)),
        #[cfg(feature = "rocksdb")]
        BackendUrl::RocksDb { dir, .. } => {
            use crate::adapters::rocksdb::{RocksDbConfig, RocksDbDocumentStore};
            let store = RocksDbDocumentStore::open(RocksDbConfig::new(dir))?;
            Ok(Box::new(store.database(database)))
        }
        #[cfg(not(feature = "rocksdb"))]
        BackendUrl::RocksDb { .. } => Err(DifStoreError::config(
            "rocksdb backend requested but dif-store was built without the `rocksdb` feature",
        )),
    }
}

/// Parse `url`, open its backend and bootstrap a store on it.
pub fn open_store(url: &str, config: StoreConfig) -> Result<DynDifStore, DifStoreError> {
    let backend: BackendUrl = url.parse()?;
    let config = match backend.database() {
        Some(name) => config.with_database(name),
        None => config,
    };
    let deps = DifStoreDependencies {
        db: open_backend(&backend, &config)?,
        time_source: SystemTimeSource,
    };
    DifStore::new(deps, config)
}
