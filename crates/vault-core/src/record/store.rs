//! Encrypted vault persistence
//!
//! The whole vault is one JSON array of [`EncryptedRecord`] under a single
//! storage key. Every save replaces that value entirely. Entries are only
//! decoded one by one, so a damaged entry never hides its neighbours.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::cipher::{open_record, seal_record};
use super::types::{EncryptedRecord, StoredRecord, VaultRecord};
use crate::crypto::SessionKey;
use crate::error::{Result, VaultError};
use crate::storage::KeyValueStore;

/// Storage key for the serialized vault
pub const VAULT_KEY: &str = "password_manager_entries_encrypted";

/// Result of decrypting the persisted vault
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Records that decrypted cleanly
    pub records: Vec<VaultRecord>,
    /// Stored entries that were malformed or failed authentication
    pub undecryptable: Vec<StoredRecord>,
}

impl LoadOutcome {
    /// Number of records dropped from the visible list
    pub fn failed(&self) -> usize {
        self.undecryptable.len()
    }
}

/// What an [`VaultStore::update`] closure decided
pub enum Commit<T> {
    /// Persist the edited records
    Save(T),
    /// Leave the stored vault as it is
    Skip(T),
}

/// Loads and saves the encrypted record collection
pub struct VaultStore {
    /// Storage backend
    store: Arc<dyn KeyValueStore>,
    /// Readers share, writers are exclusive
    lock: RwLock<()>,
}

impl VaultStore {
    /// Create a vault store over a storage backend
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: RwLock::new(()),
        }
    }

    /// The serialized vault exactly as persisted
    pub async fn load_serialized(&self) -> Result<Option<String>> {
        let _guard = self.lock.read().await;
        self.read_serialized().await
    }

    /// Split the persisted vault into entries without decoding them
    pub async fn load_encrypted(&self) -> Result<Vec<StoredRecord>> {
        let _guard = self.lock.read().await;
        self.read_encrypted().await
    }

    /// Decrypt every stored record
    ///
    /// Records that fail to decrypt are left out of `records` and reported in
    /// `undecryptable`; they never fail the batch.
    pub async fn load_all(&self, key: &SessionKey) -> Result<LoadOutcome> {
        let _guard = self.lock.read().await;
        self.read_and_decrypt(key).await
    }

    /// Encrypt and persist `records`, replacing the stored vault entirely
    ///
    /// Nothing is written unless every record encrypts.
    pub async fn save_all(&self, key: &SessionKey, records: &[VaultRecord]) -> Result<()> {
        let _guard = self.lock.write().await;
        self.encrypt_and_write(key, records, &[]).await
    }

    /// Load, edit and save under one exclusive lock
    ///
    /// `change` sees the decrypted records and, read-only, the stored records
    /// that failed to decrypt. The latter are written back untouched.
    pub async fn update<T, F>(&self, key: &SessionKey, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<VaultRecord>, &[StoredRecord]) -> Result<Commit<T>>,
    {
        let _guard = self.lock.write().await;
        let LoadOutcome {
            mut records,
            undecryptable,
        } = self.read_and_decrypt(key).await?;

        match change(&mut records, &undecryptable)? {
            Commit::Save(value) => {
                self.encrypt_and_write(key, &records, &undecryptable).await?;
                Ok(value)
            }
            Commit::Skip(value) => Ok(value),
        }
    }

    /// Remove the stored vault
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.write().await;
        self.store.delete(VAULT_KEY).await
    }

    async fn read_serialized(&self) -> Result<Option<String>> {
        match self.store.get(VAULT_KEY).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| VaultError::Storage("Stored vault is not UTF-8".to_string())),
            None => Ok(None),
        }
    }

    async fn read_encrypted(&self) -> Result<Vec<StoredRecord>> {
        match self.read_serialized().await? {
            Some(serialized) => serde_json::from_str(&serialized)
                .map_err(|e| VaultError::Storage(format!("Corrupt vault: {}", e))),
            None => {
                debug!("No stored vault found");
                Ok(Vec::new())
            }
        }
    }

    async fn read_and_decrypt(&self, key: &SessionKey) -> Result<LoadOutcome> {
        let encrypted = self.read_encrypted().await?;
        let results = decrypt_all(key, &encrypted).await;

        let mut outcome = LoadOutcome::default();
        for (stored, result) in encrypted.into_iter().zip(results) {
            match result {
                Ok(record) => outcome.records.push(record),
                Err(_) => outcome.undecryptable.push(stored),
            }
        }

        if outcome.failed() > 0 {
            warn!(
                "{} of {} stored records could not be decrypted",
                outcome.failed(),
                outcome.failed() + outcome.records.len()
            );
        }
        debug!("Loaded {} records", outcome.records.len());
        Ok(outcome)
    }

    async fn encrypt_and_write(
        &self,
        key: &SessionKey,
        records: &[VaultRecord],
        retained: &[StoredRecord],
    ) -> Result<()> {
        // Retained entries are written back as found, even if their ids clash.
        let retained_ids: HashSet<&str> = retained.iter().filter_map(StoredRecord::id).collect();
        let mut ids = HashSet::with_capacity(records.len());
        for id in records.iter().map(|r| r.id.as_str()) {
            if retained_ids.contains(id) || !ids.insert(id) {
                return Err(VaultError::DuplicateRecordId(id.to_string()));
            }
        }

        let mut entries = records
            .iter()
            .map(|record| seal_record(key, record).map(Persisted::Sealed))
            .collect::<Result<Vec<_>>>()?;
        entries.extend(retained.iter().map(Persisted::Retained));

        let serialized = serde_json::to_string(&entries)?;
        self.store.set(VAULT_KEY, serialized.as_bytes()).await?;

        debug!(
            "Saved {} records ({} retained undecryptable)",
            entries.len(),
            retained.len()
        );
        Ok(())
    }
}

/// Array element as written back to storage
#[derive(Serialize)]
#[serde(untagged)]
enum Persisted<'a> {
    Sealed(EncryptedRecord),
    Retained(&'a StoredRecord),
}

/// Decode and decrypt every entry, all issued together and awaited as one batch
pub(crate) async fn decrypt_all(
    key: &SessionKey,
    entries: &[StoredRecord],
) -> Vec<Result<VaultRecord>> {
    join_all(entries.iter().map(|stored| async move {
        let encrypted = stored.decode()?;
        open_record(key, &encrypted)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_session_key, generate_salt, KdfParams};
    use crate::record::{Category, RecordDraft};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn key_for(password: &str) -> SessionKey {
        let salt = [3u8; 16];
        derive_session_key(password, &salt, &KdfParams::with_iterations(1_000)).unwrap()
    }

    fn record(title: &str) -> VaultRecord {
        VaultRecord::create(RecordDraft {
            title: title.to_string(),
            username: format!("{}-user", title),
            secret: format!("{}-secret", title),
            url: String::new(),
            category: Category::Personal,
            notes: None,
        })
    }

    fn by_id(records: &[VaultRecord]) -> HashMap<String, VaultRecord> {
        records.iter().map(|r| (r.id.clone(), r.clone())).collect()
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = VaultStore::new(Arc::new(MemoryStore::new()));
        let key = key_for("master-password");
        let records = vec![record("Gmail"), record("Github"), record("Bank")];

        store.save_all(&key, &records).await.unwrap();
        let outcome = store.load_all(&key).await.unwrap();

        assert_eq!(outcome.failed(), 0);
        assert_eq!(by_id(&outcome.records), by_id(&records));
    }

    #[tokio::test]
    async fn test_load_empty_vault() {
        let store = VaultStore::new(Arc::new(MemoryStore::new()));
        let outcome = store.load_all(&key_for("master-password")).await.unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed(), 0);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_state() {
        let store = VaultStore::new(Arc::new(MemoryStore::new()));
        let key = key_for("master-password");

        store.save_all(&key, &[record("Old")]).await.unwrap();
        store.save_all(&key, &[record("New")]).await.unwrap();

        let outcome = store.load_all(&key).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].fields.title, "New");
    }

    #[tokio::test]
    async fn test_only_id_stored_in_clear() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        let key = key_for("master-password");
        let saved = record("Gmail");

        store.save_all(&key, std::slice::from_ref(&saved)).await.unwrap();

        let raw = String::from_utf8(backend.get(VAULT_KEY).await.unwrap().unwrap()).unwrap();
        assert!(raw.contains(&saved.id));
        assert!(!raw.contains("Gmail"));
        assert!(!raw.contains("Gmail-secret"));
    }

    #[tokio::test]
    async fn test_corrupted_record_dropped_not_fatal() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        let key = key_for("master-password");

        store
            .save_all(&key, &[record("Gmail"), record("Github")])
            .await
            .unwrap();

        let mut encrypted: Vec<EncryptedRecord> = store
            .load_encrypted()
            .await
            .unwrap()
            .iter()
            .map(|stored| stored.decode().unwrap())
            .collect();
        encrypted[0].ciphertext[0] ^= 0xFF;
        let corrupted_id = encrypted[0].id.clone();
        backend
            .set(VAULT_KEY, serde_json::to_string(&encrypted).unwrap().as_bytes())
            .await
            .unwrap();

        let outcome = store.load_all(&key).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.undecryptable[0].id(), Some(corrupted_id.as_str()));
    }

    /// Rewrite one field of one stored entry as raw JSON text
    async fn tamper(backend: &MemoryStore, index: usize, field: &str, value: &str) -> String {
        let raw = backend.get(VAULT_KEY).await.unwrap().unwrap();
        let mut entries: Vec<serde_json::Value> = serde_json::from_slice(&raw).unwrap();
        entries[index][field] = serde_json::Value::String(value.to_string());
        let id = entries[index]["id"].as_str().unwrap().to_string();
        backend
            .set(VAULT_KEY, serde_json::to_string(&entries).unwrap().as_bytes())
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_malformed_hex_dropped_not_fatal() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        let key = key_for("master-password");
        store
            .save_all(&key, &[record("Gmail"), record("Github")])
            .await
            .unwrap();

        let raw = backend.get(VAULT_KEY).await.unwrap().unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&raw).unwrap();
        let data = entries[0]["data"].as_str().unwrap();
        let bad_data = format!("z{}", &data[1..]);
        let bad_id = tamper(&backend, 0, "data", &bad_data).await;

        let outcome = store.load_all(&key).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].fields.title, "Github");
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.undecryptable[0].id(), Some(bad_id.as_str()));
    }

    #[tokio::test]
    async fn test_malformed_entries_written_back_untouched() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        let key = key_for("master-password");
        store
            .save_all(&key, &[record("Gmail"), record("Github")])
            .await
            .unwrap();

        tamper(&backend, 0, "iv", "00").await;
        tamper(&backend, 1, "data", "abc").await;
        let damaged: Vec<serde_json::Value> =
            serde_json::from_slice(&backend.get(VAULT_KEY).await.unwrap().unwrap()).unwrap();

        store
            .update(&key, |records, undecryptable| {
                assert!(records.is_empty());
                assert_eq!(undecryptable.len(), 2);
                records.push(record("Bank"));
                Ok(Commit::Save(()))
            })
            .await
            .unwrap();

        let after: Vec<serde_json::Value> =
            serde_json::from_slice(&backend.get(VAULT_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(after.len(), 3);
        assert!(after.contains(&damaged[0]));
        assert!(after.contains(&damaged[1]));

        let outcome = store.load_all(&key).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failed(), 2);
    }

    #[tokio::test]
    async fn test_vault_that_is_not_an_array_fails_load() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        backend.set(VAULT_KEY, b"{\"not\":\"a list\"}").await.unwrap();

        let result = store.load_all(&key_for("master-password")).await;
        assert!(matches!(result, Err(VaultError::Storage(_))));
    }

    #[tokio::test]
    async fn test_wrong_key_drops_everything() {
        let store = VaultStore::new(Arc::new(MemoryStore::new()));

        store
            .save_all(&key_for("password-a"), &[record("Gmail")])
            .await
            .unwrap();

        let outcome = store.load_all(&key_for("password-b")).await.unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected_without_write() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        let key = key_for("master-password");

        let first = record("Gmail");
        let mut second = record("Github");
        second.id = first.id.clone();

        let result = store.save_all(&key, &[first, second]).await;
        assert!(matches!(result, Err(VaultError::DuplicateRecordId(_))));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_retains_undecryptable() {
        let store = VaultStore::new(Arc::new(MemoryStore::new()));
        let key_a = key_for("password-a");
        let key_b = key_for("password-b");

        store.save_all(&key_a, &[record("Foreign")]).await.unwrap();

        store
            .update(&key_b, |records, undecryptable| {
                assert_eq!(undecryptable.len(), 1);
                records.push(record("Local"));
                Ok(Commit::Save(()))
            })
            .await
            .unwrap();

        assert_eq!(store.load_encrypted().await.unwrap().len(), 2);
        assert_eq!(store.load_all(&key_a).await.unwrap().records[0].fields.title, "Foreign");
        assert_eq!(store.load_all(&key_b).await.unwrap().records[0].fields.title, "Local");
    }

    #[tokio::test]
    async fn test_update_skip_leaves_vault_unchanged() {
        let backend = Arc::new(MemoryStore::new());
        let store = VaultStore::new(backend.clone());
        let key = key_for("master-password");
        store.save_all(&key, &[record("Gmail")]).await.unwrap();
        let before = backend.get(VAULT_KEY).await.unwrap();

        let count = store
            .update(&key, |records, _| {
                records.clear();
                Ok(Commit::Skip(records.len()))
            })
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(backend.get(VAULT_KEY).await.unwrap(), before);
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Err(VaultError::Storage("disk full".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "Failing Storage"
        }
    }

    #[tokio::test]
    async fn test_storage_error_surfaces() {
        let store = VaultStore::new(Arc::new(FailingStore));
        let salt = generate_salt();
        let key = derive_session_key("master-password", &salt, &KdfParams::with_iterations(1_000))
            .unwrap();

        let result = store.save_all(&key, &[record("Gmail")]).await;
        assert!(matches!(result, Err(VaultError::Storage(_))));
    }
}
