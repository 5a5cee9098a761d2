//! # Audit Log
//!
//! Append-only request log, retrievable through the log index.

use super::*;
use crate::domain::entities::{RequestContext, DIFS_FIELD};
use crate::domain::index::{canonical_key, Consistency};
use crate::ports::outbound::IndexQuery;
use serde_json::Value;

impl<DB, TS> DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    pub(crate) fn append_entry(&self, entry: LogEntry) -> Result<(), DifStoreError> {
        if entry.get(DIFS_FIELD).is_some() {
            return Err(DifStoreError::ReservedLogField {
                field: DIFS_FIELD.to_string(),
            });
        }
        let body = entry.into_body();
        if self.log_index.emit(&body).is_none() {
            return Err(DifStoreError::InvalidLogEntry {
                field: self.log_index.field.clone(),
            });
        }
        self.db
            .insert(body)
            .map(|_| ())
            .map_err(DifStoreError::update_failed)
    }

    /// Log an answered request, stamped with the current time.
    pub fn log_success(
        &self,
        request: &RequestContext,
        response: Value,
        uniques: &[String],
        duplicates: &[String],
    ) -> Result<(), DifStoreError> {
        let now = self.time_source.now();
        self.append_entry(LogEntry::success(now, request, response, uniques, duplicates))
    }

    /// Log a rejected request, stamped with the current time.
    pub fn log_error(
        &self,
        request: &RequestContext,
        error_msg: impl Into<String>,
    ) -> Result<(), DifStoreError> {
        let now = self.time_source.now();
        self.append_entry(LogEntry::error(now, request, error_msg))
    }

    /// Entries whose index field equals `value`.
    pub fn log_entries_at(&self, value: &Value) -> Result<Vec<LogEntry>, DifStoreError> {
        self.read_log(&IndexQuery::Key(canonical_key(value)))
    }

    /// Every entry, ordered by index key.
    pub fn log_entries(&self) -> Result<Vec<LogEntry>, DifStoreError> {
        self.read_log(&IndexQuery::All)
    }

    fn read_log(&self, query: &IndexQuery) -> Result<Vec<LogEntry>, DifStoreError> {
        let rows = self
            .db
            .query_index(&self.log_index.name, query, Consistency::Strong)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(doc) = self.db.get(&row.id)? {
                entries.extend(LogEntry::from_body(doc.body));
            }
        }
        Ok(entries)
    }
}
