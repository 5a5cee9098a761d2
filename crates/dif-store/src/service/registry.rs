//! # Key Registry
//!
//! Read-modify-write of the registry document under optimistic concurrency
//! control: each cycle writes conditioned on the revision it read, and a
//! conflict restarts the cycle up to the configured attempt budget.

use super::*;
use crate::domain::document::DocId;
use crate::domain::entities::{KeyRegistry, REGISTRY_DOC_ID};

impl<DB, TS> DifStore<DB, TS>
where
    DB: DocumentDatabase,
    TS: TimeSource,
{
    /// Registered partition keys in insertion order.
    pub fn keys(&self) -> Result<Vec<String>, DifStoreError> {
        let registry = match self.db.get(&DocId::new(REGISTRY_DOC_ID))? {
            Some(doc) => KeyRegistry::from_body(&doc.body)?,
            None => KeyRegistry::new(),
        };
        Ok(registry.into_keys())
    }

    /// Apply `modify` to the registry and write it back if it reports a
    /// change. Returns whether a change was written.
    pub(crate) fn update_registry<F>(&self, mut modify: F) -> Result<bool, DifStoreError>
    where
        F: FnMut(&mut KeyRegistry) -> bool,
    {
        let id = DocId::new(REGISTRY_DOC_ID);
        let retry = self.config.registry_retry;

        for attempt in 1..=retry.max_attempts {
            let delay = retry.delay_before(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            let (mut registry, rev) = match self.db.get(&id).map_err(DifStoreError::update_failed)? {
                Some(doc) => (
                    KeyRegistry::from_body(&doc.body).map_err(DifStoreError::update_failed)?,
                    Some(doc.rev),
                ),
                None => (KeyRegistry::new(), None),
            };

            if !modify(&mut registry) {
                return Ok(false);
            }

            match self.db.put(&id, registry.to_body(), rev) {
                Ok(new_rev) => {
                    tracing::debug!(
                        "[dif-store] ✏️ Registry now holds {} keys (rev {})",
                        registry.len(),
                        new_rev
                    );
                    return Ok(true);
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        "[dif-store] ⚠️ Registry update conflict (attempt {}/{})",
                        attempt,
                        retry.max_attempts
                    );
                }
                Err(e) => return Err(DifStoreError::update_failed(e)),
            }
        }

        Err(DifStoreError::update_failed(format!(
            "registry update conflicted on all {} attempts",
            retry.max_attempts
        )))
    }
}
