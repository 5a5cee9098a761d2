use crate::adapters::lock::DatabaseLock;
use crate::adapters::state::{DatabaseState, Snapshot};
use crate::domain::document::{DocId, Document, Revision};
use crate::domain::errors::StorageError;
use crate::domain::index::{Consistency, IndexDefinition, IndexRow};
use crate::ports::outbound::{DocumentDatabase, IndexQuery};
use parking_lot::RwLock;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File-backed document database for single-node deployments without
/// RocksDB.
///
/// The database lives in `<dir>/<name>.json` as a snapshot of documents and
/// index definitions. Every write commits a whole new snapshot (temp file,
/// fsync, rename), so a crash leaves either the old or the new state.
/// Indexes are rebuilt on open and kept current on every write.
///
/// A write costs time and disk traffic proportional to the whole database,
/// so recording N fingerprints costs O(N²) overall. Use RocksDB beyond a
/// few thousand records.
///
/// The handle holds `<dir>/<name>.lock` while open; a second handle on the
/// same database fails to open.
pub struct FileDocumentDb {
    name: String,
    path: PathBuf,
    state: RwLock<Option<DatabaseState>>,
    _lock: DatabaseLock,
}

impl FileDocumentDb {
    /// Open (without creating) the database `name` under `dir`.
    pub fn open(dir: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        let name = name.into();
        std::fs::create_dir_all(dir).map_err(|e| StorageError::Io {
            message: format!("cannot create {}: {}", dir.display(), e),
        })?;

        let lock = DatabaseLock::acquire(&dir.join(format!("{}.lock", name)))?;
        let path = dir.join(format!("{}.json", name));
        let state = Self::load(&path)?;

        match &state {
            Some(_) => tracing::info!("[dif-store] 💾 Opened database file {}", path.display()),
            None => tracing::info!("[dif-store] 📁 No database file at {}", path.display()),
        }

        Ok(Self {
            name,
            path,
            state: RwLock::new(state),
            _lock: lock,
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Option<DatabaseState>, StorageError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(e)),
        };
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Corruption {
                message: format!("{}: {}", path.display(), e),
            })?;
        Ok(Some(DatabaseState::from_snapshot(snapshot, 0)))
    }

    fn persist(&self, state: &DatabaseState) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&state.snapshot()).map_err(StorageError::serialization)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&temp_path).map_err(StorageError::io)?;
        file.write_all(&bytes).map_err(StorageError::io)?;
        file.sync_all().map_err(StorageError::io)?;
        std::fs::rename(&temp_path, &self.path).map_err(StorageError::io)?;
        Ok(())
    }

    /// Apply a write to a copy of the state and commit it to disk before
    /// making it visible.
    fn commit<T>(
        &self,
        write: impl FnOnce(&mut DatabaseState) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.state.write();
        let mut next = guard.as_ref().ok_or_else(|| self.missing())?.clone();
        let out = write(&mut next)?;
        self.persist(&next)?;
        *guard = Some(next);
        Ok(out)
    }

    fn missing(&self) -> StorageError {
        StorageError::DatabaseMissing {
            name: self.name.clone(),
        }
    }
}

impl DocumentDatabase for FileDocumentDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn database_exists(&self) -> Result<bool, StorageError> {
        Ok(self.state.read().is_some())
    }

    fn create_database(&self) -> Result<(), StorageError> {
        let mut guard = self.state.write();
        if guard.is_some() {
            return Err(StorageError::AlreadyExists {
                what: format!("database {}", self.name),
            });
        }
        let state = DatabaseState::new(0);
        self.persist(&state)?;
        *guard = Some(state);
        Ok(())
    }

    fn delete_database(&self) -> Result<(), StorageError> {
        let mut guard = self.state.write();
        if guard.is_none() {
            return Err(self.missing());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(e)),
        }
        *guard = None;
        Ok(())
    }

    fn get(&self, id: &DocId) -> Result<Option<Document>, StorageError> {
        let guard = self.state.read();
        Ok(guard.as_ref().ok_or_else(|| self.missing())?.get(id))
    }

    fn put(
        &self,
        id: &DocId,
        body: Value,
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        self.commit(|state| state.put(id, body, expected))
    }

    fn insert(&self, body: Value) -> Result<DocId, StorageError> {
        self.commit(|state| Ok(state.insert(body)))
    }

    fn delete(&self, id: &DocId, rev: Revision) -> Result<(), StorageError> {
        self.commit(|state| state.delete(id, rev))
    }

    fn put_index(&self, definition: &IndexDefinition) -> Result<(), StorageError> {
        self.commit(|state| {
            state.put_index(definition.clone());
            Ok(())
        })
    }

    fn index_definition(&self, name: &str) -> Result<Option<IndexDefinition>, StorageError> {
        let guard = self.state.read();
        Ok(guard
            .as_ref()
            .ok_or_else(|| self.missing())?
            .index_definition(name))
    }

    fn sync_index(&self, name: &str) -> Result<(), StorageError> {
        let mut guard = self.state.write();
        guard.as_mut().ok_or_else(|| self.missing())?.sync_index(name)
    }

    fn query_index(
        &self,
        name: &str,
        query: &IndexQuery,
        _consistency: Consistency,
    ) -> Result<Vec<IndexRow>, StorageError> {
        // Indexes never lag here, so both consistency modes read the same rows.
        let guard = self.state.read();
        guard
            .as_ref()
            .ok_or_else(|| self.missing())?
            .query_as_built(name, query)
    }
}
