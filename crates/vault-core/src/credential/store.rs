//! Master credential persistence and verification

use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::types::MasterCredential;
use crate::crypto::{
    derive_credentials, generate_salt, verification_matches, DerivedCredentials, KdfParams,
    SessionKey, HASH_LEN, SALT_LEN,
};
use crate::error::{Result, VaultError};
use crate::storage::KeyValueStore;

/// Storage key for the hex-encoded salt
pub const SALT_KEY: &str = "password_manager_master_salt";

/// Storage key for the hex-encoded verification hash
pub const HASH_KEY: &str = "password_manager_master_hash";

/// Storage key for the PBKDF2 iteration count (absent means the default)
pub const ITERATIONS_KEY: &str = "password_manager_master_iterations";

/// Decides first run vs returning user and checks master passwords
pub struct MasterCredentialStore {
    /// Storage backend
    store: Arc<dyn KeyValueStore>,
    /// Parameters for newly created credentials
    params: KdfParams,
}

impl MasterCredentialStore {
    /// Create a credential store over a storage backend
    pub fn new(store: Arc<dyn KeyValueStore>, params: KdfParams) -> Self {
        Self { store, params }
    }

    /// Whether a master credential has been persisted
    pub async fn is_initialized(&self) -> Result<bool> {
        Ok(self.store.exists(SALT_KEY).await? && self.store.exists(HASH_KEY).await?)
    }

    /// Load the persisted master credential, if any
    pub async fn load(&self) -> Result<Option<MasterCredential>> {
        let (Some(salt_hex), Some(hash_hex)) = (
            self.store.get(SALT_KEY).await?,
            self.store.get(HASH_KEY).await?,
        ) else {
            return Ok(None);
        };

        let salt = decode_fixed::<SALT_LEN>(&salt_hex, "salt")?;
        let verification_hash = decode_fixed::<HASH_LEN>(&hash_hex, "verification hash")?;

        let kdf = match self.store.get(ITERATIONS_KEY).await? {
            Some(raw) => {
                let iterations = std::str::from_utf8(&raw)
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok())
                    .ok_or_else(|| {
                        VaultError::Storage("Corrupt master credential: iterations".to_string())
                    })?;
                KdfParams::with_iterations(iterations)
            }
            None => KdfParams::default(),
        };

        Ok(Some(MasterCredential {
            salt,
            verification_hash,
            kdf,
        }))
    }

    /// Create and persist the master credential on first run
    pub async fn initialize(&self, password: &str) -> Result<MasterCredential> {
        let (credential, _session_key) = self.initialize_session(password).await?;
        Ok(credential)
    }

    /// Check a password against the persisted credential
    pub async fn verify(&self, password: &str) -> Result<bool> {
        let credential = self.load().await?.ok_or(VaultError::NotInitialized)?;
        let derived = derive_off_thread(password, credential.salt, credential.kdf).await?;
        Ok(verification_matches(
            &credential.verification_hash,
            &derived.verification_hash,
        ))
    }

    /// First-run setup that also hands back the session key
    ///
    /// Stretches once; the key would otherwise cost a second full stretch.
    pub(crate) async fn initialize_session(
        &self,
        password: &str,
    ) -> Result<(MasterCredential, SessionKey)> {
        MasterCredential::check_strength(password)?;
        if self.is_initialized().await? {
            return Err(VaultError::AlreadyInitialized);
        }

        let salt = generate_salt();
        let derived = derive_off_thread(password, salt, self.params).await?;

        let credential = MasterCredential {
            salt,
            verification_hash: derived.verification_hash,
            kdf: self.params,
        };

        let salt_hex = credential.salt_hex();
        let hash_hex = credential.hash_hex();
        let iterations = credential.kdf.iterations.to_string();
        self.store
            .set_many(&[
                (SALT_KEY, salt_hex.as_bytes()),
                (HASH_KEY, hash_hex.as_bytes()),
                (ITERATIONS_KEY, iterations.as_bytes()),
            ])
            .await?;

        info!(
            "Master credential created ({} iterations)",
            credential.kdf.iterations
        );
        Ok((credential, derived.session_key))
    }

    /// Verify a password and derive the session key in one stretch
    pub(crate) async fn unlock(&self, password: &str) -> Result<SessionKey> {
        let credential = self.load().await?.ok_or(VaultError::NotInitialized)?;
        let derived = derive_off_thread(password, credential.salt, credential.kdf).await?;

        if !verification_matches(&credential.verification_hash, &derived.verification_hash) {
            debug!("Master password verification failed");
            return Err(VaultError::InvalidPassword);
        }

        debug!("Master password verified");
        Ok(derived.session_key)
    }

    /// Remove the persisted credential
    pub async fn clear(&self) -> Result<()> {
        for key in [SALT_KEY, HASH_KEY, ITERATIONS_KEY] {
            self.store.delete(key).await?;
        }
        info!("Master credential removed");
        Ok(())
    }
}

/// Run the stretch on the blocking pool so it never stalls the runtime
async fn derive_off_thread(
    password: &str,
    salt: [u8; SALT_LEN],
    params: KdfParams,
) -> Result<DerivedCredentials> {
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || derive_credentials(&password, &salt, &params))
        .await
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?
}

fn decode_fixed<const N: usize>(raw: &[u8], what: &str) -> Result<[u8; N]> {
    let corrupt = || VaultError::Storage(format!("Corrupt master credential: {}", what));

    let text = std::str::from_utf8(raw).map_err(|_| corrupt())?;
    let bytes = hex::decode(text.trim()).map_err(|_| corrupt())?;
    bytes.try_into().map_err(|_| corrupt())
}
