//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file.
//! Settings are readable while the vault is locked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::crypto::{KdfParams, DEFAULT_ITERATIONS};
use crate::error::{Result, VaultError};
use crate::record::Category;

const SETTINGS_FILE: &str = "settings.json";

/// Lowest iteration count a new master credential may use
pub const MIN_KDF_ITERATIONS: u32 = DEFAULT_ITERATIONS;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// PBKDF2 iterations for a newly created master credential
    ///
    /// Never below [`MIN_KDF_ITERATIONS`]. An existing credential keeps the
    /// count it was created with.
    pub kdf_iterations: u32,
    /// Category preselected for new records
    pub default_category: Category,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            kdf_iterations: DEFAULT_ITERATIONS,
            default_category: Category::Other,
        }
    }
}

impl Settings {
    /// KDF parameters for setup
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::with_iterations(self.kdf_iterations.max(MIN_KDF_ITERATIONS))
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Create a settings manager, loading `settings.json` from `storage_dir`
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join(SETTINGS_FILE);
        let mut settings = Self::load_from_file(&settings_file).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings file: {}", e);
            Settings::default()
        });
        if settings.kdf_iterations < MIN_KDF_ITERATIONS {
            warn!(
                "Settings ask for {} KDF iterations, raising to {}",
                settings.kdf_iterations, MIN_KDF_ITERATIONS
            );
            settings.kdf_iterations = MIN_KDF_ITERATIONS;
        }

        Self {
            settings_file,
            settings,
        }
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        if let Some(dir) = self.settings_file.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Set the iteration count for future setups and save
    pub async fn set_kdf_iterations(&mut self, iterations: u32) -> Result<()> {
        if iterations < MIN_KDF_ITERATIONS {
            return Err(VaultError::KeyDerivation(format!(
                "iteration count must be at least {}",
                MIN_KDF_ITERATIONS
            )));
        }
        self.settings.kdf_iterations = iterations;
        self.save().await
    }

    /// Set the default category and save
    pub async fn set_default_category(&mut self, category: Category) -> Result<()> {
        self.settings.default_category = category;
        self.save().await
    }

    /// Reset settings to defaults and delete the settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }
}
