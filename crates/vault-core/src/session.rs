//! Authenticated session
//!
//! A [`Session`] is the only holder of the session key. Every record
//! operation goes through it, and dropping or locking it wipes the key.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backup::{self, ImportReport};
use crate::crypto::SessionKey;
use crate::error::{Result, VaultError};
use crate::record::{Commit, LoadOutcome, RecordDraft, VaultRecord, VaultStore};

/// Unlocked vault context
pub struct Session {
    key: SessionKey,
    store: Arc<VaultStore>,
}

impl Session {
    pub(crate) fn new(key: SessionKey, store: Arc<VaultStore>) -> Self {
        Self { key, store }
    }

    /// Decrypt every stored record
    ///
    /// Undecryptable records are counted in the outcome, not returned as errors.
    pub async fn load_records(&self) -> Result<LoadOutcome> {
        self.store.load_all(&self.key).await
    }

    /// Find one record by id
    pub async fn get_record(&self, id: &str) -> Result<VaultRecord> {
        self.load_records()
            .await?
            .records
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))
    }

    /// Replace the whole vault with `records`
    pub async fn save_records(&self, records: &[VaultRecord]) -> Result<()> {
        self.store.save_all(&self.key, records).await
    }

    /// Create a record with a fresh id
    pub async fn add_record(&self, draft: RecordDraft) -> Result<VaultRecord> {
        draft.validate()?;
        let record = VaultRecord::create(draft);

        let added = record.clone();
        self.store
            .update(&self.key, move |records, _| {
                records.push(record);
                Ok(Commit::Save(()))
            })
            .await?;

        debug!("Added record {}", added.id);
        Ok(added)
    }

    /// Replace the editable fields of an existing record
    pub async fn update_record(&self, id: &str, draft: RecordDraft) -> Result<VaultRecord> {
        draft.validate()?;

        let updated = self
            .store
            .update(&self.key, |records, _| {
                let record = records
                    .iter_mut()
                    .find(|record| record.id == id)
                    .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))?;
                record.apply(draft);
                Ok(Commit::Save(record.clone()))
            })
            .await?;

        debug!("Updated record {}", id);
        Ok(updated)
    }

    /// Remove a record by id
    pub async fn delete_record(&self, id: &str) -> Result<()> {
        self.store
            .update(&self.key, |records, _| {
                let before = records.len();
                records.retain(|record| record.id != id);
                if records.len() == before {
                    return Err(VaultError::RecordNotFound(id.to_string()));
                }
                Ok(Commit::Save(()))
            })
            .await?;

        debug!("Deleted record {}", id);
        Ok(())
    }

    /// Encrypted-v1 backup of the stored vault, dated now
    pub async fn export_backup(&self) -> Result<String> {
        backup::export_backup(&self.store, Utc::now()).await
    }

    /// Merge a backup file, re-encrypting under this session's key
    pub async fn import_backup(&self, bytes: &[u8]) -> Result<ImportReport> {
        backup::import_backup(&self.store, &self.key, bytes).await
    }

    /// End the session and wipe the key
    pub fn lock(self) {
        self.key.discard();
        info!("Vault locked");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
