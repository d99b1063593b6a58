//! Top-level vault orchestration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::credential::MasterCredentialStore;
use crate::crypto::KdfParams;
use crate::error::Result;
use crate::record::VaultStore;
use crate::session::Session;
use crate::settings::SettingsManager;
use crate::storage::{FileStore, KeyValueStore};

/// Vault state as seen before unlocking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No master password has been set yet
    NotInitialized,
    /// A master password exists; unlock to get a [`Session`]
    Locked,
}

/// Entry point: first-run detection, setup, unlock and reset
pub struct Vault {
    credentials: MasterCredentialStore,
    records: Arc<VaultStore>,
    settings: Option<SettingsManager>,
    backend_name: &'static str,
}

impl Vault {
    /// Create a vault over any storage backend
    ///
    /// `params` only applies to a credential created by [`Vault::setup`].
    pub fn new(store: Arc<dyn KeyValueStore>, params: KdfParams) -> Self {
        Self {
            backend_name: store.backend_name(),
            credentials: MasterCredentialStore::new(store.clone(), params),
            records: Arc::new(VaultStore::new(store)),
            settings: None,
        }
    }

    /// Open the file-backed vault in `data_dir`, or the default data directory
    pub async fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let dir = match data_dir {
            Some(dir) => dir,
            None => FileStore::default_dir()?,
        };
        let params = SettingsManager::new(&dir).get().kdf_params();
        Self::open_dir(dir, params).await
    }

    async fn open_dir(dir: PathBuf, params: KdfParams) -> Result<Self> {
        let store = FileStore::open(dir.clone()).await?;
        let mut vault = Self::new(Arc::new(store), params);
        vault.settings = Some(SettingsManager::new(&dir));
        debug!("Opened vault at {:?}", dir);
        Ok(vault)
    }

    /// Open the file-backed vault at an explicit path
    pub async fn open_at(data_dir: &Path) -> Result<Self> {
        Self::open(Some(data_dir.to_path_buf())).await
    }

    /// Name of the storage backend
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Settings, when the vault was opened from a data directory
    pub fn settings(&self) -> Option<&SettingsManager> {
        self.settings.as_ref()
    }

    /// Mutable settings, when the vault was opened from a data directory
    pub fn settings_mut(&mut self) -> Option<&mut SettingsManager> {
        self.settings.as_mut()
    }

    /// Whether a master password has been set
    pub async fn is_initialized(&self) -> Result<bool> {
        self.credentials.is_initialized().await
    }

    /// Current state
    pub async fn state(&self) -> Result<VaultState> {
        Ok(if self.is_initialized().await? {
            VaultState::Locked
        } else {
            VaultState::NotInitialized
        })
    }

    /// Set the master password on first run and open a session
    pub async fn setup(&self, password: &str) -> Result<Session> {
        let (_, key) = self.credentials.initialize_session(password).await?;
        info!("Vault initialized");
        Ok(Session::new(key, self.records.clone()))
    }

    /// Check a master password without opening a session
    pub async fn verify(&self, password: &str) -> Result<bool> {
        self.credentials.verify(password).await
    }

    /// Verify the master password and open a session
    pub async fn unlock(&self, password: &str) -> Result<Session> {
        let key = self.credentials.unlock(password).await?;
        info!("Vault unlocked");
        Ok(Session::new(key, self.records.clone()))
    }

    /// Delete the master credential and every stored record
    ///
    /// Irreversible. Settings are kept.
    pub async fn reset(&self) -> Result<()> {
        info!("Resetting vault - deleting all data");
        self.records.clear().await?;
        self.credentials.clear().await?;
        info!("Vault reset complete");
        Ok(())
    }
}
