use crate::adapters::state::DatabaseState;
use crate::domain::document::{DocId, Document, Revision};
use crate::domain::errors::StorageError;
use crate::domain::index::{Consistency, IndexDefinition, IndexRow};
use crate::ports::outbound::{DocumentDatabase, IndexQuery};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Default number of dirty documents an index tolerates before refreshing.
pub const DEFAULT_REFRESH_THRESHOLD: usize = 64;

type SharedState = Arc<RwLock<DatabaseState>>;

/// In-process document server holding any number of named databases.
///
/// Cloning yields another handle to the same server, so several stores (or
/// threads) can share databases the way clients share a remote server.
#[derive(Clone)]
pub struct InMemoryDocumentServer {
    databases: Arc<RwLock<HashMap<String, SharedState>>>,
    refresh_threshold: usize,
}

impl Default for InMemoryDocumentServer {
    fn default() -> Self {
        Self {
            databases: Arc::default(),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
        }
    }
}

impl InMemoryDocumentServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many dirty documents an index tolerates before refreshing
    /// itself. 0 keeps indexes current on every write.
    pub fn with_refresh_threshold(mut self, threshold: usize) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Handle bound to the database `name`. The database need not exist.
    pub fn database(&self, name: impl Into<String>) -> InMemoryDocumentDb {
        InMemoryDocumentDb {
            server: self.clone(),
            name: name.into(),
        }
    }

    /// Names of the existing databases, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// One database of an [`InMemoryDocumentServer`].
#[derive(Clone)]
pub struct InMemoryDocumentDb {
    server: InMemoryDocumentServer,
    name: String,
}

impl InMemoryDocumentDb {
    /// A database on a private server of its own.
    pub fn new(name: impl Into<String>) -> Self {
        InMemoryDocumentServer::new().database(name)
    }

    pub fn server(&self) -> &InMemoryDocumentServer {
        &self.server
    }

    /// True if `index` holds writes it has not absorbed yet.
    pub fn is_index_stale(&self, index: &str) -> Result<bool, StorageError> {
        Ok(self.state()?.read().is_stale(index))
    }

    fn state(&self) -> Result<SharedState, StorageError> {
        self.server
            .databases
            .read()
            .get(&self.name)
            .cloned()
            .ok_or_else(|| StorageError::DatabaseMissing {
                name: self.name.clone(),
            })
    }
}

impl DocumentDatabase for InMemoryDocumentDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn database_exists(&self) -> Result<bool, StorageError> {
        Ok(self.server.databases.read().contains_key(&self.name))
    }

    fn create_database(&self) -> Result<(), StorageError> {
        let mut databases = self.server.databases.write();
        if databases.contains_key(&self.name) {
            return Err(StorageError::AlreadyExists {
                what: format!("database {}", self.name),
            });
        }
        let state = DatabaseState::new(self.server.refresh_threshold);
        databases.insert(self.name.clone(), Arc::new(RwLock::new(state)));
        Ok(())
    }

    fn delete_database(&self) -> Result<(), StorageError> {
        self.server
            .databases
            .write()
            .remove(&self.name)
            .map(|_| ())
            .ok_or_else(|| StorageError::DatabaseMissing {
                name: self.name.clone(),
            })
    }

    fn get(&self, id: &DocId) -> Result<Option<Document>, StorageError> {
        Ok(self.state()?.read().get(id))
    }

    fn put(
        &self,
        id: &DocId,
        body: Value,
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        self.state()?.write().put(id, body, expected)
    }

    fn insert(&self, body: Value) -> Result<DocId, StorageError> {
        Ok(self.state()?.write().insert(body))
    }

    fn delete(&self, id: &DocId, rev: Revision) -> Result<(), StorageError> {
        self.state()?.write().delete(id, rev)
    }

    fn put_index(&self, definition: &IndexDefinition) -> Result<(), StorageError> {
        self.state()?.write().put_index(definition.clone());
        Ok(())
    }

    fn index_definition(&self, name: &str) -> Result<Option<IndexDefinition>, StorageError> {
        Ok(self.state()?.read().index_definition(name))
    }

    fn sync_index(&self, name: &str) -> Result<(), StorageError> {
        self.state()?.write().sync_index(name)
    }

    fn query_index(
        &self,
        name: &str,
        query: &IndexQuery,
        consistency: Consistency,
    ) -> Result<Vec<IndexRow>, StorageError> {
        let state = self.state()?;
        match consistency {
            Consistency::Strong => state.write().query(name, query, consistency),
            Consistency::Eventual => state.read().query_as_built(name, query),
        }
    }
}
