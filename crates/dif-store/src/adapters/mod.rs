//! # Adapters Module
//!
//! Implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `memory`: in-process document server, shareable between stores
//! - `file`: JSON snapshot per database, durable across restarts
//! - `rocksdb`: RocksDB-backed databases (feature `rocksdb`)
//! - `infra`: system time source
//! - `url`: backend selection by URL

mod file;
mod infra;
mod lock;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb;
mod state;
mod url;

pub use file::FileDocumentDb;
pub use infra::SystemTimeSource;
pub use memory::{InMemoryDocumentDb, InMemoryDocumentServer, DEFAULT_REFRESH_THRESHOLD};
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbDocumentDb, RocksDbDocumentStore};
pub use self::url::{open_backend, open_store, DynDifStore};
