//! AES-256-GCM authenticated encryption
//!
//! - Nonce: 12 bytes (96 bits), drawn from the OS RNG on every call
//! - Ciphertext: variable length, with the 16-byte auth tag appended

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::SessionKey;
use crate::error::{Result, VaultError};

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Authentication tag length for AES-GCM
pub const TAG_LEN: usize = 16;

/// Output of one encryption: nonce plus ciphertext-with-tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt plaintext under the session key with a fresh random nonce
pub fn seal(key: &SessionKey, plaintext: &[u8]) -> Result<SealedBox> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    Ok(SealedBox { nonce, ciphertext })
}

/// Decrypt and authenticate a sealed box
///
/// Every failure - wrong key, flipped bit, truncated input - is reported as
/// [`VaultError::Authentication`].
pub fn open(key: &SessionKey, sealed: &SealedBox) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.ciphertext.len() < TAG_LEN {
        return Err(VaultError::Authentication);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::Authentication)?;

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| VaultError::Authentication)
}
