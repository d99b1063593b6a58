//! Vault records: plaintext model, per-record cipher and the encrypted store

mod cipher;
mod store;
mod types;

pub use cipher::{decrypt_record, encrypt_record, open_record, seal_record};
pub use store::{Commit, LoadOutcome, VaultStore, VAULT_KEY};
pub(crate) use store::decrypt_all;
pub use types::{Category, EncryptedRecord, RecordDraft, RecordFields, StoredRecord, VaultRecord};
