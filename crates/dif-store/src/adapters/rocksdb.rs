//! # RocksDB Document Database
//!
//! Persistent `DocumentDatabase` on RocksDB. One RocksDB instance can hold
//! any number of named databases.
//!
//! ## Key Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `<db>\0meta` | JSON list of index definitions; marks the database as existing |
//! | `<db>\0doc\0<id>` | JSON `{rev, body}` |
//! | `<db>\0view\0<index>\0<key>\0<id>` | empty |
//!
//! Every write lands in a single `WriteBatch` together with its index rows,
//! so indexes never lag behind documents.

use crate::adapters::state::{missing_index, next_revision, StoredDoc};
use crate::domain::document::{DocId, Document, Revision};
use crate::domain::errors::StorageError;
use crate::domain::index::{Consistency, IndexDefinition, IndexRow};
use crate::ports::outbound::{DocumentDatabase, IndexQuery};
use parking_lot::RwLock;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

const SEP: u8 = 0;

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 32MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/difstore"),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 32 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Small buffers and no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// An open RocksDB instance hosting named document databases.
#[derive(Clone)]
pub struct RocksDbDocumentStore {
    db: Arc<RwLock<DB>>,
    sync_writes: bool,
}

impl RocksDbDocumentStore {
    /// Open or create the RocksDB instance at `config.path`.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| StorageError::Io {
            message: format!("Failed to open RocksDB at {}: {}", config.path.display(), e),
        })?;
        tracing::info!("[dif-store] 💾 Opened RocksDB at {}", config.path.display());

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            sync_writes: config.sync_writes,
        })
    }

    /// Handle bound to the database `name`. The database need not exist.
    pub fn database(&self, name: impl Into<String>) -> RocksDbDocumentDb {
        RocksDbDocumentDb {
            store: self.clone(),
            name: name.into(),
        }
    }
}

/// One named database inside a [`RocksDbDocumentStore`].
pub struct RocksDbDocumentDb {
    store: RocksDbDocumentStore,
    name: String,
}

impl RocksDbDocumentDb {
    fn prefix(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.name.len() + 1);
        key.extend_from_slice(self.name.as_bytes());
        key.push(SEP);
        key
    }

    fn meta_key(&self) -> Vec<u8> {
        let mut key = self.prefix();
        key.extend_from_slice(b"meta");
        key
    }

    fn doc_key(&self, id: &DocId) -> Vec<u8> {
        let mut key = self.prefix();
        key.extend_from_slice(b"doc");
        key.push(SEP);
        key.extend_from_slice(id.as_str().as_bytes());
        key
    }

    fn view_prefix(&self, index: &str) -> Vec<u8> {
        let mut key = self.prefix();
        key.extend_from_slice(b"view");
        key.push(SEP);
        key.extend_from_slice(index.as_bytes());
        key.push(SEP);
        key
    }

    fn row_key(&self, index: &str, row_key: &str, id: &DocId) -> Vec<u8> {
        let mut key = self.view_prefix(index);
        key.extend_from_slice(row_key.as_bytes());
        key.push(SEP);
        key.extend_from_slice(id.as_str().as_bytes());
        key
    }

    fn load_meta(&self, db: &DB) -> Result<Option<Vec<IndexDefinition>>, StorageError> {
        let bytes = db.get(self.meta_key()).map_err(|e| StorageError::Io {
            message: format!("RocksDB get failed: {}", e),
        })?;
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|e| StorageError::Corruption {
                    message: format!("metadata of database {}: {}", self.name, e),
                })
            })
            .transpose()
    }

    fn require_meta(&self, db: &DB) -> Result<Vec<IndexDefinition>, StorageError> {
        self.load_meta(db)?
            .ok_or_else(|| StorageError::DatabaseMissing {
                name: self.name.clone(),
            })
    }

    fn load_doc(&self, db: &DB, id: &DocId) -> Result<Option<StoredDoc>, StorageError> {
        let bytes = db.get(self.doc_key(id)).map_err(|e| StorageError::Io {
            message: format!("RocksDB get failed: {}", e),
        })?;
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|e| StorageError::Corruption {
                    message: format!("document {}: {}", id, e),
                })
            })
            .transpose()
    }

    fn scan(&self, db: &DB, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut results = Vec::new();
        for item in db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::Io {
                message: format!("RocksDB scan failed: {}", e),
            })?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key[prefix.len()..].to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    /// Move a document's rows in every index from its old body to its new.
    fn reindex(
        &self,
        batch: &mut WriteBatch,
        indexes: &[IndexDefinition],
        id: &DocId,
        old: Option<&Value>,
        new: Option<&Value>,
    ) {
        for index in indexes {
            let old_key = old.and_then(|body| index.emit(body));
            let new_key = new.and_then(|body| index.emit(body));
            if old_key == new_key {
                continue;
            }
            if let Some(key) = old_key {
                batch.delete(self.row_key(&index.name, &key, id));
            }
            if let Some(key) = new_key {
                batch.put(self.row_key(&index.name, &key, id), b"");
            }
        }
    }

    fn write(&self, db: &DB, batch: WriteBatch) -> Result<(), StorageError> {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.store.sync_writes);
        db.write_opt(batch, &write_opts)
            .map_err(|e| StorageError::Io {
                message: format!("RocksDB batch write failed: {}", e),
            })
    }

    fn write_doc(
        &self,
        db: &DB,
        indexes: &[IndexDefinition],
        id: &DocId,
        old: Option<&Value>,
        doc: &StoredDoc,
    ) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(doc).map_err(StorageError::serialization)?;
        let mut batch = WriteBatch::default();
        batch.put(self.doc_key(id), bytes);
        self.reindex(&mut batch, indexes, id, old, Some(&doc.body));
        self.write(db, batch)
    }
}

impl DocumentDatabase for RocksDbDocumentDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn database_exists(&self) -> Result<bool, StorageError> {
        let db = self.store.db.read();
        Ok(self.load_meta(&db)?.is_some())
    }

    fn create_database(&self) -> Result<(), StorageError> {
        let db = self.store.db.write();
        if self.load_meta(&db)?.is_some() {
            return Err(StorageError::AlreadyExists {
                what: format!("database {}", self.name),
            });
        }
        let mut batch = WriteBatch::default();
        batch.put(self.meta_key(), b"[]");
        self.write(&db, batch)
    }

    fn delete_database(&self) -> Result<(), StorageError> {
        let db = self.store.db.write();
        self.require_meta(&db)?;

        let prefix = self.prefix();
        let mut batch = WriteBatch::default();
        for (suffix, _) in self.scan(&db, &prefix)? {
            let mut key = prefix.clone();
            key.extend_from_slice(&suffix);
            batch.delete(key);
        }
        self.write(&db, batch)
    }

    fn get(&self, id: &DocId) -> Result<Option<Document>, StorageError> {
        let db = self.store.db.read();
        self.require_meta(&db)?;
        Ok(self.load_doc(&db, id)?.map(|doc| Document {
            id: id.clone(),
            rev: doc.rev,
            body: doc.body,
        }))
    }

    fn put(
        &self,
        id: &DocId,
        body: Value,
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        let db = self.store.db.write();
        let indexes = self.require_meta(&db)?;
        let old = self.load_doc(&db, id)?;
        let rev = next_revision(id, old.as_ref().map(|doc| doc.rev), expected)?;

        let doc = StoredDoc { rev, body };
        self.write_doc(&db, &indexes, id, old.as_ref().map(|doc| &doc.body), &doc)?;
        Ok(rev)
    }

    fn insert(&self, body: Value) -> Result<DocId, StorageError> {
        let db = self.store.db.write();
        let indexes = self.require_meta(&db)?;
        let mut id = DocId::generate();
        while self.load_doc(&db, &id)?.is_some() {
            id = DocId::generate();
        }

        let doc = StoredDoc {
            rev: Revision::FIRST,
            body,
        };
        self.write_doc(&db, &indexes, &id, None, &doc)?;
        Ok(id)
    }

    fn delete(&self, id: &DocId, rev: Revision) -> Result<(), StorageError> {
        let db = self.store.db.write();
        let indexes = self.require_meta(&db)?;
        let old = self.load_doc(&db, id)?.ok_or_else(|| StorageError::NotFound {
            what: format!("document {}", id),
        })?;
        if old.rev != rev {
            return Err(StorageError::Conflict { id: id.to_string() });
        }

        let mut batch = WriteBatch::default();
        batch.delete(self.doc_key(id));
        self.reindex(&mut batch, &indexes, id, Some(&old.body), None);
        self.write(&db, batch)
    }

    fn put_index(&self, definition: &IndexDefinition) -> Result<(), StorageError> {
        let db = self.store.db.write();
        let mut indexes = self.require_meta(&db)?;
        indexes.retain(|index| index.name != definition.name);
        indexes.push(definition.clone());

        let mut batch = WriteBatch::default();
        let meta = serde_json::to_vec(&indexes).map_err(StorageError::serialization)?;
        batch.put(self.meta_key(), meta);

        let rows = self.view_prefix(&definition.name);
        for (suffix, _) in self.scan(&db, &rows)? {
            let mut key = rows.clone();
            key.extend_from_slice(&suffix);
            batch.delete(key);
        }

        let mut docs = self.prefix();
        docs.extend_from_slice(b"doc");
        docs.push(SEP);
        for (id, bytes) in self.scan(&db, &docs)? {
            let id = DocId::new(String::from_utf8_lossy(&id).into_owned());
            let doc: StoredDoc =
                serde_json::from_slice(&bytes).map_err(|e| StorageError::Corruption {
                    message: format!("document {}: {}", id, e),
                })?;
            if let Some(key) = definition.emit(&doc.body) {
                batch.put(self.row_key(&definition.name, &key, &id), b"");
            }
        }
        self.write(&db, batch)
    }

    fn index_definition(&self, name: &str) -> Result<Option<IndexDefinition>, StorageError> {
        let db = self.store.db.read();
        Ok(self
            .require_meta(&db)?
            .into_iter()
            .find(|index| index.name == name))
    }

    fn sync_index(&self, name: &str) -> Result<(), StorageError> {
        let db = self.store.db.read();
        let indexes = self.require_meta(&db)?;
        if indexes.iter().any(|index| index.name == name) {
            Ok(())
        } else {
            Err(missing_index(name))
        }
    }

    fn query_index(
        &self,
        name: &str,
        query: &IndexQuery,
        _consistency: Consistency,
    ) -> Result<Vec<IndexRow>, StorageError> {
        let db = self.store.db.read();
        let indexes = self.require_meta(&db)?;
        if !indexes.iter().any(|index| index.name == name) {
            return Err(missing_index(name));
        }

        let mut prefix = self.view_prefix(name);
        if let IndexQuery::Key(key) = query {
            prefix.extend_from_slice(key.as_bytes());
            prefix.push(SEP);
        }
        let base = self.view_prefix(name).len();

        self.scan(&db, &prefix)?
            .into_iter()
            .map(|(suffix, _)| {
                let mut full = prefix[base..].to_vec();
                full.extend_from_slice(&suffix);
                let split = full
                    .iter()
                    .rposition(|b| *b == SEP)
                    .ok_or_else(|| StorageError::Corruption {
                        message: format!("malformed row in index {}", name),
                    })?;
                Ok(IndexRow {
                    key: String::from_utf8_lossy(&full[..split]).into_owned(),
                    id: DocId::new(String::from_utf8_lossy(&full[split + 1..]).into_owned()),
                })
            })
            .collect()
    }
}
