//! Backup import and export

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::format::{encode_encrypted_backup, parse_backup, BackupFormat, BackupPayload};
use crate::crypto::SessionKey;
use crate::error::{Result, VaultError};
use crate::record::{decrypt_all, Commit, StoredRecord, VaultRecord, VaultStore};

/// Outcome of one import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub format: BackupFormat,
    pub imported: usize,
    pub skipped: usize,
    /// Titles dropped because the live vault already had them
    pub skipped_titles: Vec<String>,
}

/// Merge a backup file into the vault
///
/// Records whose title (case-insensitive) is already in the live vault are
/// skipped. Any failure before the merge leaves the vault untouched.
pub async fn import_backup(
    store: &VaultStore,
    key: &SessionKey,
    bytes: &[u8],
) -> Result<ImportReport> {
    let payload = parse_backup(bytes)?;
    let format = payload.format();
    debug!("Importing {:?} backup with {} records", format, payload.len());

    let incoming = materialize(key, payload).await?;

    let report = store
        .update(key, |records, undecryptable| {
            let live_titles: HashSet<String> = records.iter().map(VaultRecord::title_key).collect();
            let mut taken_ids: HashSet<String> = records
                .iter()
                .map(|r| r.id.clone())
                .chain(undecryptable.iter().filter_map(|r| r.id().map(str::to_string)))
                .collect();

            let mut report = ImportReport {
                format,
                imported: 0,
                skipped: 0,
                skipped_titles: Vec::new(),
            };

            for mut record in incoming {
                if live_titles.contains(&record.title_key()) {
                    report.skipped += 1;
                    report.skipped_titles.push(record.fields.title);
                    continue;
                }
                while !taken_ids.insert(record.id.clone()) {
                    record.id = Uuid::new_v4().to_string();
                }
                records.push(record);
                report.imported += 1;
            }

            if report.imported > 0 {
                Ok(Commit::Save(report))
            } else {
                Ok(Commit::Skip(report))
            }
        })
        .await?;

    info!(
        "Import finished: {} imported, {} skipped as duplicates",
        report.imported, report.skipped
    );
    Ok(report)
}

async fn materialize(key: &SessionKey, payload: BackupPayload) -> Result<Vec<VaultRecord>> {
    match payload {
        BackupPayload::EncryptedV1 { records, .. } => {
            let expected = records.len();
            let decrypted: Vec<VaultRecord> = decrypt_all(key, &records)
                .await
                .into_iter()
                .filter_map(|result| result.ok())
                .collect();

            if decrypted.len() < expected {
                warn!(
                    "Encrypted backup: only {} of {} records decrypted",
                    decrypted.len(),
                    expected
                );
                return Err(VaultError::DecryptionMismatch {
                    expected,
                    decrypted: decrypted.len(),
                });
            }
            Ok(decrypted)
        }
        BackupPayload::LegacyPlaintext(records) => {
            let now = Utc::now();
            Ok(records
                .into_iter()
                .map(|record| record.into_record(now))
                .collect())
        }
    }
}

/// Produce an encrypted-v1 backup of the stored vault
///
/// The stored ciphertexts are exported as they are; nothing is decrypted.
pub async fn export_backup(store: &VaultStore, export_date: DateTime<Utc>) -> Result<String> {
    let serialized = store
        .load_serialized()
        .await?
        .ok_or(VaultError::NothingToExport)?;

    let records: Vec<StoredRecord> = serde_json::from_str(&serialized)
        .map_err(|e| VaultError::Storage(format!("Corrupt vault: {}", e)))?;
    if records.is_empty() {
        return Err(VaultError::NothingToExport);
    }

    info!("Exporting {} encrypted records", records.len());
    encode_encrypted_backup(&serialized, export_date)
}
