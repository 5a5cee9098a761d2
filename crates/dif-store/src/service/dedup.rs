//! # Fingerprint Dedup
//!
//! Membership queries and recording of (key, fingerprint) pairs.

use super::*;
use crate::domain::document::DocId;
use crate::domain::entities::FingerprintRecord;
use crate::domain::errors::StorageError;
use crate::domain::index::{canonical_key, Consistency};
use crate::ports::outbound::IndexQuery;

impl<DB, TS> DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    /// `has` with an explicit read consistency.
    ///
    /// `Eventual` skips the index refresh and may miss records added since
    /// the last one.
    pub fn has_with(
        &self,
        key: &str,
        fingerprint: &Fingerprint,
        consistency: Consistency,
    ) -> Result<bool, DifStoreError> {
        let lookup = canonical_key(&FingerprintRecord::index_key(key, fingerprint));
        let rows = self.db.query_index(
            &self.fingerprint_index.name,
            &IndexQuery::Key(lookup),
            consistency,
        )?;
        Ok(!rows.is_empty())
    }

    pub(crate) fn add_record(&self, key: &str, fingerprint: &Fingerprint) -> Result<(), DifStoreError> {
        let record = FingerprintRecord::new(key, fingerprint.clone());
        let id = DocId::new(self.deriver.derive(key, fingerprint));
        self.write_record(&id, record.to_body())
            .map_err(DifStoreError::update_failed)
    }

    fn write_record(&self, id: &DocId, body: serde_json::Value) -> Result<(), StorageError> {
        let err = match self.db.put(id, body.clone(), None) {
            Ok(_) => {
                tracing::debug!("[dif-store] ✏️ Recorded fingerprint as {}", id);
                return Ok(());
            }
            Err(e) if e.is_conflict() => e,
            Err(e) => return Err(e),
        };

        // The derived id is taken. The occupant is either the same record,
        // written by a concurrent add, or a hash collision.
        match self.db.get(id)? {
            Some(occupant) if occupant.body == body => {
                tracing::debug!("[dif-store] Fingerprint already recorded as {}", id);
                Ok(())
            }
            Some(_) => {
                tracing::warn!(
                    "[dif-store] ⚠️ Derived id {} collides with a different record, using a store-assigned id",
                    id
                );
                let assigned = self.db.insert(body)?;
                tracing::debug!("[dif-store] ✏️ Recorded fingerprint as {}", assigned);
                Ok(())
            }
            // Deleted between the two calls; only a concurrent clear does that.
            None => Err(err),
        }
    }
}
