//! # vault-core
//!
//! Client-held secret vault engine:
//! - PBKDF2-SHA256 master password stretching with a stored verification hash
//! - AES-256-GCM encryption of every record under a per-session key
//! - Encrypted persistence over a pluggable key-value store
//! - Encrypted backup export, and import of encrypted or legacy plaintext backups

pub mod backup;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod record;
pub mod session;
pub mod settings;
pub mod storage;
mod vault;

pub use backup::{BackupFormat, ImportReport};
pub use crypto::{KdfParams, SessionKey};
pub use error::{Result, VaultError};
pub use record::{Category, LoadOutcome, RecordDraft, VaultRecord};
pub use session::Session;
pub use settings::{Settings, SettingsManager, MIN_KDF_ITERATIONS};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use vault::{Vault, VaultState};
