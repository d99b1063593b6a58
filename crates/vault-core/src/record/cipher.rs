//! Per-record authenticated encryption
//!
//! The plaintext is the JSON form of [`RecordFields`]; the id travels next
//! to the ciphertext, never inside it.

use zeroize::Zeroizing;

use super::types::{EncryptedRecord, RecordFields, VaultRecord};
use crate::crypto::{open, seal, SealedBox, SessionKey};
use crate::error::{Result, VaultError};

/// Encrypt the non-id fields of a record under a fresh nonce
pub fn encrypt_record(key: &SessionKey, fields: &RecordFields) -> Result<SealedBox> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(fields).map_err(|e| VaultError::Encryption(e.to_string()))?,
    );
    seal(key, &plaintext)
}

/// Decrypt a sealed box back into record fields
///
/// A plaintext that authenticates but does not decode is reported the same
/// way as a failed tag check.
pub fn decrypt_record(key: &SessionKey, sealed: &SealedBox) -> Result<RecordFields> {
    let plaintext = open(key, sealed)?;
    serde_json::from_slice(&plaintext).map_err(|_| VaultError::Authentication)
}

/// Encrypt a whole record into its stored form
pub fn seal_record(key: &SessionKey, record: &VaultRecord) -> Result<EncryptedRecord> {
    let sealed = encrypt_record(key, &record.fields)?;
    Ok(EncryptedRecord {
        id: record.id.clone(),
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext,
    })
}

/// Decrypt a stored record
pub fn open_record(key: &SessionKey, encrypted: &EncryptedRecord) -> Result<VaultRecord> {
    let sealed = SealedBox {
        nonce: encrypted.nonce,
        ciphertext: encrypted.ciphertext.clone(),
    };
    Ok(VaultRecord {
        id: encrypted.id.clone(),
        fields: decrypt_record(key, &sealed)?,
    })
}
