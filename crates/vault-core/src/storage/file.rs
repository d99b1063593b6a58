//! File storage backend
//!
//! Keeps every key in a single JSON file in the user's data directory.
//! Values are base64-encoded. The file is rewritten through a temp file and
//! rename so a crash never leaves a half-written store behind.

use async_trait::async_trait;
use base64::Engine;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{Result, VaultError};

const STORE_FILE: &str = "vault-store.json";
const STORE_VERSION: u32 = 1;

/// File format for persistent storage
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// JSON file storage backend
pub struct FileStore {
    /// Directory holding the store file
    storage_dir: PathBuf,
    /// In-memory copy of the file
    cache: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl FileStore {
    /// Open the store in the default data directory
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_dir()?).await
    }

    /// Open (or create) the store in `storage_dir`
    pub async fn open(storage_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&storage_dir).await?;

        let entries = Self::read_file(&storage_dir.join(STORE_FILE)).await?;
        debug!(
            "File store opened at {:?} with {} keys",
            storage_dir,
            entries.len()
        );

        Ok(Self {
            storage_dir,
            cache: RwLock::new(entries),
        })
    }

    /// Get the default storage directory
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "cofre", "cofre-vault")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                VaultError::Storage("Could not determine data directory".to_string())
            })
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn file_path(&self) -> PathBuf {
        self.storage_dir.join(STORE_FILE)
    }

    async fn read_file(path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
        if !tokio::fs::try_exists(path).await? {
            debug!("No existing store file found");
            return Ok(BTreeMap::new());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let file: StoreFile = serde_json::from_str(&contents)?;
        if file.version != STORE_VERSION {
            return Err(VaultError::Storage(format!(
                "Unsupported store version {}",
                file.version
            )));
        }

        file.entries
            .into_iter()
            .map(|(key, encoded)| {
                base64::engine::general_purpose::STANDARD
                    .decode(&encoded)
                    .map(|value| (key, value))
                    .map_err(|e| VaultError::Storage(format!("Base64 decode error: {}", e)))
            })
            .collect()
    }

    /// Write the given entries to disk atomically
    async fn persist(&self, entries: &BTreeMap<String, Vec<u8>>) -> Result<()> {
        let file = StoreFile {
            version: STORE_VERSION,
            entries: entries
                .iter()
                .map(|(key, value)| {
                    (
                        key.clone(),
                        base64::engine::general_purpose::STANDARD.encode(value),
                    )
                })
                .collect(),
        };

        let contents = serde_json::to_string_pretty(&file)?;
        let path = self.file_path();

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!("Persisted {} keys to {:?}", entries.len(), path);
        Ok(())
    }

    /// Apply `change` to a copy of the cache, persist it, then publish it
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, Vec<u8>>) + Send,
    {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        change(&mut next);
        self.persist(&next).await?;
        *cache = next;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.cache.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_vec());
        })
        .await?;
        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn set_many(&self, items: &[(&str, &[u8])]) -> Result<()> {
        self.update(|entries| {
            for (key, value) in items {
                entries.insert(key.to_string(), value.to_vec());
            }
        })
        .await?;
        debug!("Stored {} keys", items.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if !self.cache.read().await.contains_key(key) {
            return Ok(());
        }

        self.update(|entries| {
            entries.remove(key);
        })
        .await?;
        debug!("Deleted key: {}", key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "File Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().to_path_buf()).await.unwrap();

        store.set("test-key", b"test-value").await.unwrap();

        let retrieved = store.get("test-key").await.unwrap();
        assert_eq!(retrieved, Some(b"test-value".to_vec()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().to_path_buf()).await.unwrap();

        store.set("test-key", b"test-value").await.unwrap();
        store.delete("test-key").await.unwrap();
        store.delete("never-existed").await.unwrap();

        assert!(!store.exists("test-key").await.unwrap());
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FileStore::open(temp_dir.path().to_path_buf()).await.unwrap();
            store
                .set_many(&[("a", b"\x00\x01binary".as_slice()), ("b", b"text".as_slice())])
                .await
                .unwrap();
        }

        {
            let store = FileStore::open(temp_dir.path().to_path_buf()).await.unwrap();
            assert_eq!(store.get("a").await.unwrap(), Some(b"\x00\x01binary".to_vec()));
            assert_eq!(store.get("b").await.unwrap(), Some(b"text".to_vec()));
        }

        assert!(!temp_dir.path().join("vault-store.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_unknown_version() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(STORE_FILE),
            r#"{"version": 99, "entries": {}}"#,
        )
        .unwrap();

        let result = FileStore::open(temp_dir.path().to_path_buf()).await;
        assert!(matches!(result, Err(VaultError::Storage(_))));
    }
}
