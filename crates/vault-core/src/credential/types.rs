//! Master credential type definitions

use crate::crypto::{KdfParams, Salt, VerificationHash};
use crate::error::{Result, VaultError};

/// Minimum master password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Persisted salt and verification hash
///
/// Lives outside the encrypted vault because it must be readable before any
/// key exists.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterCredential {
    /// Random salt mixed into the stretch
    pub salt: Salt,
    /// `SHA-256(stretch(password, salt))`
    pub verification_hash: VerificationHash,
    /// Stretch parameters the hash was produced with
    pub kdf: KdfParams,
}

impl MasterCredential {
    /// Reject master passwords that are too short
    pub fn check_strength(password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(VaultError::WeakPassword {
                min_length: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    /// Salt as lowercase hex
    pub fn salt_hex(&self) -> String {
        hex::encode(self.salt)
    }

    /// Verification hash as lowercase hex
    pub fn hash_hex(&self) -> String {
        hex::encode(self.verification_hash)
    }
}

impl std::fmt::Debug for MasterCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterCredential")
            .field("salt", &"[REDACTED]")
            .field("verification_hash", &"[REDACTED]")
            .field("kdf", &self.kdf)
            .finish()
    }
}
