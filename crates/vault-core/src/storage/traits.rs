//! Storage trait definitions

use crate::error::Result;
use async_trait::async_trait;

/// Persistent key-value byte store
///
/// Values are opaque to the store. Every write is visible to readers either
/// completely or not at all.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Store several values as one unit
    async fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Remove the value under `key` (no-op when absent)
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
