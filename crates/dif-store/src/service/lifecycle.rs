//! # Store Lifecycle
//!
//! Bootstrap of a fresh backing database and the destructive reset.

use super::*;
use crate::domain::document::DocId;
use crate::domain::entities::{KeyRegistry, REGISTRY_DOC_ID};
use crate::domain::errors::StorageError;

impl<DB, TS> DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    /// Create and index the backing database if it does not exist.
    ///
    /// An existing database is not re-indexed; its index definitions are
    /// only checked against this store's configuration. Losing a creation
    /// race to another process counts as finding an existing database.
    pub(crate) fn bootstrap(&self) -> Result<(), DifStoreError> {
        let name = self.db.name().to_string();
        if self.db.database_exists().map_err(DifStoreError::update_failed)? {
            tracing::info!("[dif-store] 📂 Using existing database '{}'", name);
            return self.verify_indexes();
        }

        match self.db.create_database() {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                // The winner may still be writing the indexes.
                tracing::info!("[dif-store] 📂 Database '{}' created concurrently", name);
                return self.verify_indexes();
            }
            Err(e) => return Err(DifStoreError::update_failed(e)),
        }

        self.initialize().map_err(DifStoreError::update_failed)?;
        tracing::info!("[dif-store] 🆕 Created database '{}'", name);
        Ok(())
    }

    /// Write the registry document and both index definitions, then build
    /// the indexes.
    fn initialize(&self) -> Result<(), StorageError> {
        match self.db.put(
            &DocId::new(REGISTRY_DOC_ID),
            KeyRegistry::new().to_body(),
            None,
        ) {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {}
            Err(e) => return Err(e),
        }

        for index in [&self.fingerprint_index, &self.log_index] {
            self.db.put_index(index)?;
            self.db.sync_index(&index.name)?;
        }
        Ok(())
    }

    /// Check the indexes of an existing database.
    ///
    /// A missing index is waited for under the registry retry policy, then
    /// written. An index emitting a different field than this store expects
    /// is a configuration error: entries appended through this store would
    /// never be indexed.
    fn verify_indexes(&self) -> Result<(), DifStoreError> {
        let retry = self.config.registry_retry;
        for expected in [&self.fingerprint_index, &self.log_index] {
            let mut stored = None;
            for attempt in 1..=retry.max_attempts {
                let delay = retry.delay_before(attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                stored = self
                    .db
                    .index_definition(&expected.name)
                    .map_err(DifStoreError::update_failed)?;
                if stored.is_some() {
                    break;
                }
            }

            match stored {
                Some(definition) if definition.field == expected.field => {}
                Some(definition) => {
                    return Err(DifStoreError::config(format!(
                        "index '{}' of database '{}' is built on field '{}', not '{}'",
                        expected.name,
                        self.db.name(),
                        definition.field,
                        expected.field
                    )));
                }
                None => {
                    tracing::warn!(
                        "[dif-store] ⚠️ Index '{}' missing from database '{}', recreating",
                        expected.name,
                        self.db.name()
                    );
                    self.db
                        .put_index(expected)
                        .and_then(|()| self.db.sync_index(&expected.name))
                        .map_err(DifStoreError::update_failed)?;
                }
            }
        }
        Ok(())
    }

    /// Delete the backing database if present and bootstrap it again.
    pub(crate) fn reset(&self) -> Result<(), DifStoreError> {
        let name = self.db.name().to_string();
        match self.db.delete_database() {
            Ok(()) => tracing::info!("[dif-store] 🗑️ Deleted database '{}'", name),
            Err(StorageError::DatabaseMissing { .. }) => {}
            Err(e) => return Err(DifStoreError::update_failed(e)),
        }
        self.bootstrap()
    }

    /// Bring both indexes up to date with every committed write.
    ///
    /// Gives read-your-writes to callers reading with eventual consistency.
    pub fn sync_indexes(&self) -> Result<(), DifStoreError> {
        self.db.sync_index(&self.fingerprint_index.name)?;
        self.db.sync_index(&self.log_index.name)?;
        Ok(())
    }
}
