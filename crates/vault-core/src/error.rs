//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Master password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("Vault is not initialized - set a master password first")]
    NotInitialized,

    #[error("Vault is already initialized - reset it before creating a new master password")]
    AlreadyInitialized,

    #[error("Invalid master password")]
    InvalidPassword,

    /// Wrong key, tampered data and malformed ciphertext all land here.
    #[error("Authentication failed - wrong key or corrupted data")]
    Authentication,

    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    #[error("Could only decrypt {decrypted} of {expected} records - wrong master password or corrupted backup")]
    DecryptionMismatch { expected: usize, decrypted: usize },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Duplicate record id: {0}")]
    DuplicateRecordId(String),

    #[error("Vault is empty - nothing to export")]
    NothingToExport,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether the user can fix this by retyping input (password or file).
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::WeakPassword { .. }
                | Self::InvalidPassword
                | Self::InvalidFormat(_)
                | Self::DecryptionMismatch { .. }
        )
    }
}
