//! Cryptographic primitives for the vault
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 password stretching
//! - Separate derivations for the stored verification hash and the session key
//! - AES-256-GCM authenticated encryption with a fresh nonce per call
//! - Zeroize-on-drop key handling

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{open, seal, SealedBox, NONCE_LEN, TAG_LEN};
pub use key_derivation::{
    derive_credentials, derive_session_key, derive_verification_hash, generate_salt, stretch,
    verification_matches, DerivedCredentials, KdfParams, Salt, VerificationHash,
    DEFAULT_ITERATIONS, HASH_LEN, SALT_LEN,
};
pub use secure_memory::SessionKey;
