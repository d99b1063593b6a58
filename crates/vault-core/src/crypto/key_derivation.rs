//! Password-based key derivation using PBKDF2-HMAC-SHA256
//!
//! One stretching step feeds two one-way derivations:
//! - verification hash: `SHA-256(stretched)`, persisted to check logins
//! - session key: `HKDF-SHA256(salt, stretched, info)`, held in memory only
//!
//! Neither output can be computed from the other, so a leaked verification
//! hash gives no decryption capability.

use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::SessionKey;
use crate::error::{Result, VaultError};

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 200_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Verification hash length in bytes
pub const HASH_LEN: usize = 32;

/// HKDF context string for the record encryption key
const SESSION_KEY_INFO: &[u8] = b"cofre/session-key/aes-256-gcm/v1";

/// Random salt mixed into the stretch
pub type Salt = [u8; SALT_LEN];

/// Digest of the stretched password, safe to persist
pub type VerificationHash = [u8; HASH_LEN];

/// Parameters for PBKDF2 stretching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 iterations (default: 200,000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Parameters with an explicit iteration count
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

/// Both outputs of a single stretch
pub struct DerivedCredentials {
    pub verification_hash: VerificationHash,
    pub session_key: SessionKey,
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Stretch a password into 256 key-grade bits
///
/// Deliberately slow; the intermediate bits are wiped when the returned
/// buffer drops.
pub fn stretch(password: &str, salt: &Salt, params: &KdfParams) -> Result<Zeroizing<[u8; 32]>> {
    if params.iterations == 0 {
        return Err(VaultError::KeyDerivation(
            "Iteration count must be positive".to_string(),
        ));
    }

    let mut stretched = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt,
        params.iterations,
        &mut stretched[..],
    );
    Ok(stretched)
}

/// Derive the persisted verification hash for a password
pub fn derive_verification_hash(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
) -> Result<VerificationHash> {
    let stretched = stretch(password, salt, params)?;
    Ok(hash_stretched(&stretched))
}

/// Derive the in-memory session key for a password
pub fn derive_session_key(password: &str, salt: &Salt, params: &KdfParams) -> Result<SessionKey> {
    let stretched = stretch(password, salt, params)?;
    key_from_stretched(&stretched, salt)
}

/// Derive verification hash and session key with a single stretch
pub fn derive_credentials(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
) -> Result<DerivedCredentials> {
    let stretched = stretch(password, salt, params)?;
    Ok(DerivedCredentials {
        verification_hash: hash_stretched(&stretched),
        session_key: key_from_stretched(&stretched, salt)?,
    })
}

/// Compare two verification hashes in constant time
pub fn verification_matches(expected: &VerificationHash, candidate: &VerificationHash) -> bool {
    expected.ct_eq(candidate).into()
}

fn hash_stretched(stretched: &[u8; 32]) -> VerificationHash {
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&Sha256::digest(stretched));
    hash
}

fn key_from_stretched(stretched: &[u8; 32], salt: &Salt) -> Result<SessionKey> {
    let hk = Hkdf::<Sha256>::new(Some(&salt[..]), stretched);
    let mut key = SessionKey::new([0u8; 32]);
    hk.expand(SESSION_KEY_INFO, key.as_mut_bytes())
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
