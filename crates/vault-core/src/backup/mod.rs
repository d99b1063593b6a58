//! Backup export and import
//!
//! Exports are always `vault-encrypted-v1`. Imports also accept the legacy
//! plaintext format and merge by title.

mod format;
mod import;

pub use format::{
    backup_file_name, encode_encrypted_backup, parse_backup, BackupFormat, BackupPayload,
    LegacyRecord, LegacyTimestamp, ENCRYPTED_BACKUP_TYPE,
};
pub use import::{export_backup, import_backup, ImportReport};
