//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the Dif Store service.
//!
//! These are the interfaces a host application implements to plug in a
//! backing document database. The database offers per-document atomic
//! CRUD and secondary indexes, but no cross-document transactions.

use crate::domain::document::{DocId, Document, Revision};
use crate::domain::errors::StorageError;
use crate::domain::index::{Consistency, IndexDefinition, IndexRow};
use serde_json::Value;
use std::sync::Arc;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Selects the rows of an index query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Rows whose canonical key equals this one.
    Key(String),
    /// Every row, ordered by key then document id.
    All,
}

/// Abstract interface to one named database of a document store.
///
/// Implementations: `InMemoryDocumentDb`, `FileDocumentDb`, and
/// `RocksDbDocumentDb` (feature `rocksdb`).
///
/// All methods take `&self`; implementations synchronize internally and may
/// be shared by concurrent callers and by several store instances.
pub trait DocumentDatabase: Send + Sync {
    /// Name of the bound database.
    fn name(&self) -> &str;

    fn database_exists(&self) -> Result<bool, StorageError>;

    /// Create the bound database.
    ///
    /// ## Errors
    ///
    /// - `AlreadyExists`: the database exists (possibly created concurrently)
    fn create_database(&self) -> Result<(), StorageError>;

    /// Delete the bound database with all documents and indexes.
    ///
    /// ## Errors
    ///
    /// - `DatabaseMissing`: the database does not exist
    fn delete_database(&self) -> Result<(), StorageError>;

    /// Read a document by id.
    fn get(&self, id: &DocId) -> Result<Option<Document>, StorageError>;

    /// Conditionally write a document under a client-chosen id.
    ///
    /// - `expected = None`: create only; `Conflict` if the id is taken.
    /// - `expected = Some(rev)`: replace only if the stored revision is
    ///   `rev`; `Conflict` otherwise (including when the document is gone).
    ///
    /// Returns the new revision.
    fn put(
        &self,
        id: &DocId,
        body: Value,
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError>;

    /// Write a new document under a store-assigned id.
    fn insert(&self, body: Value) -> Result<DocId, StorageError>;

    /// Delete a document at the given revision.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no such document
    /// - `Conflict`: the stored revision differs from `rev`
    fn delete(&self, id: &DocId, rev: Revision) -> Result<(), StorageError>;

    /// Register (or replace) an index definition.
    fn put_index(&self, definition: &IndexDefinition) -> Result<(), StorageError>;

    /// The stored definition of an index, or `None` if none is registered.
    fn index_definition(&self, name: &str) -> Result<Option<IndexDefinition>, StorageError>;

    /// Bring an index up to date with every committed write.
    fn sync_index(&self, name: &str) -> Result<(), StorageError>;

    /// Query an index.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no index with this name
    fn query_index(
        &self,
        name: &str,
        query: &IndexQuery,
        consistency: Consistency,
    ) -> Result<Vec<IndexRow>, StorageError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

macro_rules! forward_document_database {
    ($wrapper:ty) => {
        impl<T: DocumentDatabase + ?Sized> DocumentDatabase for $wrapper {
            fn name(&self) -> &str {
                (**self).name()
            }

            fn database_exists(&self) -> Result<bool, StorageError> {
                (**self).database_exists()
            }

            fn create_database(&self) -> Result<(), StorageError> {
                (**self).create_database()
            }

            fn delete_database(&self) -> Result<(), StorageError> {
                (**self).delete_database()
            }

            fn get(&self, id: &DocId) -> Result<Option<Document>, StorageError> {
                (**self).get(id)
            }

            fn put(
                &self,
                id: &DocId,
                body: Value,
                expected: Option<Revision>,
            ) -> Result<Revision, StorageError> {
                (**self).put(id, body, expected)
            }

            fn insert(&self, body: Value) -> Result<DocId, StorageError> {
                (**self).insert(body)
            }

            fn delete(&self, id: &DocId, rev: Revision) -> Result<(), StorageError> {
                (**self).delete(id, rev)
            }

            fn put_index(&self, definition: &IndexDefinition) -> Result<(), StorageError> {
                (**self).put_index(definition)
            }

            fn index_definition(
                &self,
                name: &str,
            ) -> Result<Option<IndexDefinition>, StorageError> {
                (**self).index_definition(name)
            }

            fn sync_index(&self, name: &str) -> Result<(), StorageError> {
                (**self).sync_index(name)
            }

            fn query_index(
                &self,
                name: &str,
                query: &IndexQuery,
                consistency: Consistency,
            ) -> Result<Vec<IndexRow>, StorageError> {
                (**self).query_index(name, query, consistency)
            }
        }
    };
}

forward_document_database!(Box<T>);
forward_document_database!(Arc<T>);
