//! Document and index state of one database, shared by the in-memory and
//! file-backed adapters.
//!
//! Indexes are maintained lazily. A write marks the document dirty in every
//! index; an index is refreshed when a strong query or `sync` asks for it,
//! or as soon as it holds more dirty documents than the refresh threshold.
//! A threshold of 0 keeps every index current on each write.

use crate::domain::document::{DocId, Document, Revision};
use crate::domain::errors::StorageError;
use crate::domain::index::{Consistency, IndexDefinition, IndexRow};
use crate::ports::outbound::IndexQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredDoc {
    pub rev: Revision,
    pub body: Value,
}

/// Persistent part of a database: documents and index definitions.
///
/// Index rows are derived and rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub documents: BTreeMap<DocId, StoredDoc>,
    pub indexes: Vec<IndexDefinition>,
}

#[derive(Debug, Clone)]
struct IndexState {
    definition: IndexDefinition,
    rows: BTreeMap<String, BTreeSet<DocId>>,
    emitted: HashMap<DocId, String>,
    dirty: BTreeSet<DocId>,
}

impl IndexState {
    fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            rows: BTreeMap::new(),
            emitted: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    fn refresh(&mut self, documents: &BTreeMap<DocId, StoredDoc>) {
        let dirty = std::mem::take(&mut self.dirty);
        for id in dirty {
            if let Some(old_key) = self.emitted.remove(&id) {
                if let Some(ids) = self.rows.get_mut(&old_key) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        self.rows.remove(&old_key);
                    }
                }
            }
            let new_key = documents
                .get(&id)
                .and_then(|doc| self.definition.emit(&doc.body));
            if let Some(key) = new_key {
                self.rows.entry(key.clone()).or_default().insert(id.clone());
                self.emitted.insert(id, key);
            }
        }
    }

    fn rows(&self, query: &IndexQuery) -> Vec<IndexRow> {
        let to_rows = |(key, ids): (&String, &BTreeSet<DocId>)| {
            ids.iter()
                .map(|id| IndexRow {
                    key: key.clone(),
                    id: id.clone(),
                })
                .collect::<Vec<_>>()
        };
        match query {
            IndexQuery::Key(key) => self
                .rows
                .get_key_value(key)
                .map(to_rows)
                .unwrap_or_default(),
            IndexQuery::All => self.rows.iter().flat_map(to_rows).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseState {
    documents: BTreeMap<DocId, StoredDoc>,
    indexes: BTreeMap<String, IndexState>,
    refresh_threshold: usize,
}

impl DatabaseState {
    pub fn new(refresh_threshold: usize) -> Self {
        Self {
            documents: BTreeMap::new(),
            indexes: BTreeMap::new(),
            refresh_threshold,
        }
    }

    /// Rebuild a database from its snapshot with every index current.
    pub fn from_snapshot(snapshot: Snapshot, refresh_threshold: usize) -> Self {
        let mut state = Self {
            documents: snapshot.documents,
            indexes: BTreeMap::new(),
            refresh_threshold,
        };
        for definition in snapshot.indexes {
            state.put_index(definition);
        }
        state.refresh_all();
        state
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            documents: self.documents.clone(),
            indexes: self
                .indexes
                .values()
                .map(|index| index.definition.clone())
                .collect(),
        }
    }

    pub fn get(&self, id: &DocId) -> Option<Document> {
        self.documents.get(id).map(|doc| Document {
            id: id.clone(),
            rev: doc.rev,
            body: doc.body.clone(),
        })
    }

    pub fn put(
        &mut self,
        id: &DocId,
        body: Value,
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        let current = self.documents.get(id).map(|doc| doc.rev);
        let rev = next_revision(id, current, expected)?;
        self.documents.insert(id.clone(), StoredDoc { rev, body });
        self.mark_dirty(id);
        Ok(rev)
    }

    pub fn insert(&mut self, body: Value) -> DocId {
        let mut id = DocId::generate();
        while self.documents.contains_key(&id) {
            id = DocId::generate();
        }
        self.documents.insert(
            id.clone(),
            StoredDoc {
                rev: Revision::FIRST,
                body,
            },
        );
        self.mark_dirty(&id);
        id
    }

    pub fn delete(&mut self, id: &DocId, rev: Revision) -> Result<(), StorageError> {
        match self.documents.get(id) {
            None => Err(StorageError::NotFound {
                what: format!("document {}", id),
            }),
            Some(doc) if doc.rev != rev => Err(StorageError::Conflict {
                id: id.to_string(),
            }),
            Some(_) => {
                self.documents.remove(id);
                self.mark_dirty(id);
                Ok(())
            }
        }
    }

    /// Register or replace an index over the existing documents.
    pub fn put_index(&mut self, definition: IndexDefinition) {
        let mut index = IndexState::new(definition);
        index.dirty = self.documents.keys().cloned().collect();
        if index.dirty.len() > self.refresh_threshold {
            index.refresh(&self.documents);
        }
        self.indexes.insert(index.definition.name.clone(), index);
    }

    pub fn index_definition(&self, name: &str) -> Option<IndexDefinition> {
        self.indexes.get(name).map(|index| index.definition.clone())
    }

    pub fn sync_index(&mut self, name: &str) -> Result<(), StorageError> {
        let index = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| missing_index(name))?;
        index.refresh(&self.documents);
        Ok(())
    }

    pub fn refresh_all(&mut self) {
        for index in self.indexes.values_mut() {
            index.refresh(&self.documents);
        }
    }

    /// Query without refreshing; usable under a shared lock.
    pub fn query_as_built(
        &self,
        name: &str,
        query: &IndexQuery,
    ) -> Result<Vec<IndexRow>, StorageError> {
        let index = self.indexes.get(name).ok_or_else(|| missing_index(name))?;
        Ok(index.rows(query))
    }

    pub fn query(
        &mut self,
        name: &str,
        query: &IndexQuery,
        consistency: Consistency,
    ) -> Result<Vec<IndexRow>, StorageError> {
        if consistency == Consistency::Strong {
            self.sync_index(name)?;
        }
        self.query_as_built(name, query)
    }

    /// True if the named index has writes it has not absorbed yet.
    pub fn is_stale(&self, name: &str) -> bool {
        self.indexes
            .get(name)
            .map(|index| !index.dirty.is_empty())
            .unwrap_or(false)
    }

    fn mark_dirty(&mut self, id: &DocId) {
        for index in self.indexes.values_mut() {
            index.dirty.insert(id.clone());
            if index.dirty.len() > self.refresh_threshold {
                index.refresh(&self.documents);
            }
        }
    }
}

/// Revision produced by a conditional write, or `Conflict`.
///
/// Creation requires the id to be free; replacement requires the stored
/// revision to match `expected`.
pub(crate) fn next_revision(
    id: &DocId,
    current: Option<Revision>,
    expected: Option<Revision>,
) -> Result<Revision, StorageError> {
    match (current, expected) {
        (None, None) => Ok(Revision::FIRST),
        (Some(stored), Some(expected)) if stored == expected => Ok(stored.next()),
        _ => Err(StorageError::Conflict {
            id: id.to_string(),
        }),
    }
}

pub(crate) fn missing_index(name: &str) -> StorageError {
    StorageError::NotFound {
        what: format!("index {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_with_index(threshold: usize) -> DatabaseState {
        let mut state = DatabaseState::new(threshold);
        state.put_index(IndexDefinition::new("by_tag", "tag"));
        state
    }

    #[test]
    fn test_conditional_put() {
        let mut state = DatabaseState::new(0);
        let id = DocId::new("a");

        let rev = state.put(&id, json!({ "n": 1 }), None).unwrap();
        assert_eq!(rev, Revision::FIRST);
        assert!(state.put(&id, json!({ "n": 2 }), None).unwrap_err().is_conflict());

        let rev2 = state.put(&id, json!({ "n": 2 }), Some(rev)).unwrap();
        assert!(rev2 > rev);
        assert!(state.put(&id, json!({ "n": 3 }), Some(rev)).unwrap_err().is_conflict());
        assert!(state
            .put(&DocId::new("b"), json!({}), Some(rev))
            .unwrap_err()
            .is_conflict());
        assert_eq!(state.get(&id).unwrap().body, json!({ "n": 2 }));
    }

    #[test]
    fn test_lazy_index_until_strong_query() {
        let mut state = state_with_index(10);
        state.insert(json!({ "tag": "x" }));

        let key = IndexQuery::Key("\"x\"".to_string());
        assert!(state.query(LOOKUP, &key, Consistency::Eventual).unwrap().is_empty());
        assert!(state.is_stale(LOOKUP));

        assert_eq!(state.query(LOOKUP, &key, Consistency::Strong).unwrap().len(), 1);
        assert!(!state.is_stale(LOOKUP));
    }

    const LOOKUP: &str = "by_tag";

    #[test]
    fn test_staleness_is_bounded_by_threshold() {
        let mut state = state_with_index(2);
        for _ in 0..3 {
            state.insert(json!({ "tag": "x" }));
        }
        // The third dirty document pushed the index over its threshold.
        let rows = state
            .query(LOOKUP, &IndexQuery::All, Consistency::Eventual)
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_delete_and_update_move_rows() {
        let mut state = state_with_index(0);
        let id = DocId::new("doc");
        let rev = state.put(&id, json!({ "tag": "old" }), None).unwrap();
        let rev = state.put(&id, json!({ "tag": "new" }), Some(rev)).unwrap();

        let all = state.query_as_built(LOOKUP, &IndexQuery::All).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "\"new\"");

        assert!(state.delete(&id, Revision::FIRST).unwrap_err().is_conflict());
        state.delete(&id, rev).unwrap();
        assert!(state.query_as_built(LOOKUP, &IndexQuery::All).unwrap().is_empty());
        assert!(matches!(
            state.delete(&id, rev),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_snapshot_rebuilds_indexes() {
        let mut state = state_with_index(100);
        state.insert(json!({ "tag": "a" }));
        state.insert(json!({ "tag": "b" }));

        let restored = DatabaseState::from_snapshot(state.snapshot(), 100);
        let rows = restored.query_as_built(LOOKUP, &IndexQuery::All).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "\"a\"");
    }

    #[test]
    fn test_unknown_index() {
        let mut state = DatabaseState::new(0);
        assert!(matches!(
            state.query("nope", &IndexQuery::All, Consistency::Strong),
            Err(StorageError::NotFound { .. })
        ));
    }
}
