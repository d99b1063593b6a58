//! Backup file formats
//!
//! Two shapes are accepted:
//! - encrypted-v1: `{ "type": "vault-encrypted-v1", "encryptedData": ..., "exportDate": ... }`
//! - legacy plaintext: a bare array of records, or `{ "passwords": [...] }`
//!
//! The `type` tag alone decides which one a file is.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::record::{Category, RecordFields, StoredRecord, VaultRecord};

/// Type tag of encrypted backups
pub const ENCRYPTED_BACKUP_TYPE: &str = "vault-encrypted-v1";

/// Which of the two formats a backup used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    EncryptedV1,
    LegacyPlaintext,
}

/// Decoded backup file
#[derive(Debug)]
pub enum BackupPayload {
    /// Records still encrypted under the exporting vault's key
    EncryptedV1 {
        records: Vec<StoredRecord>,
        export_date: Option<DateTime<Utc>>,
    },
    /// Plaintext records, possibly missing ids and timestamps
    LegacyPlaintext(Vec<LegacyRecord>),
}

impl BackupPayload {
    pub fn format(&self) -> BackupFormat {
        match self {
            Self::EncryptedV1 { .. } => BackupFormat::EncryptedV1,
            Self::LegacyPlaintext(_) => BackupFormat::LegacyPlaintext,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::EncryptedV1 { records, .. } => records.len(),
            Self::LegacyPlaintext(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptedBackupOut<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    encrypted_data: &'a str,
    export_date: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptedBackupIn {
    encrypted_data: EmbeddedVault,
    #[serde(default)]
    export_date: Option<String>,
}

/// `encryptedData` is normally the persisted vault string; an inline array
/// is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddedVault {
    Serialized(String),
    Inline(Vec<StoredRecord>),
}

/// Record as found in a legacy plaintext backup
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawLegacyRecord")]
pub struct LegacyRecord {
    pub id: Option<String>,
    pub title: String,
    pub username: String,
    pub secret: String,
    pub url: String,
    pub category: Option<Category>,
    pub notes: Option<String>,
    pub created_at: Option<LegacyTimestamp>,
    pub updated_at: Option<LegacyTimestamp>,
}

/// Wire shape of a legacy record; old and new field names may both appear
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLegacyRecord {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    created_at: Option<LegacyTimestamp>,
    #[serde(default)]
    updated_at: Option<LegacyTimestamp>,
}

impl From<RawLegacyRecord> for LegacyRecord {
    fn from(raw: RawLegacyRecord) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            username: raw.username.unwrap_or_default(),
            secret: first_non_empty(raw.secret, raw.password),
            url: first_non_empty(raw.url, raw.website),
            category: raw.category,
            notes: raw.notes,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

/// Current name wins unless it is absent or empty
fn first_non_empty(current: Option<String>, legacy: Option<String>) -> String {
    current
        .filter(|value| !value.is_empty())
        .or(legacy)
        .unwrap_or_default()
}

/// Timestamps in old files are ISO-8601 strings or epoch milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl LegacyTimestamp {
    /// Resolve to a UTC time; empty, zero or unparseable values are `None`
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(0) => None,
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Fractional(ms) if ms.is_finite() && *ms != 0.0 => {
                Utc.timestamp_millis_opt(*ms as i64).single()
            }
            Self::Fractional(_) => None,
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

impl LegacyRecord {
    /// Coerce into a vault record, filling a missing id and timestamps
    pub fn into_record(self, now: DateTime<Utc>) -> VaultRecord {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = self.created_at.and_then(|t| t.resolve()).unwrap_or(now);
        let updated_at = self.updated_at.and_then(|t| t.resolve()).unwrap_or(now);

        VaultRecord {
            id,
            fields: RecordFields {
                title: self.title,
                username: self.username,
                secret: self.secret,
                url: self.url,
                category: self.category.unwrap_or_default(),
                notes: self.notes.filter(|n| !n.is_empty()),
                created_at,
                updated_at,
            },
        }
    }
}

fn invalid(what: impl std::fmt::Display) -> VaultError {
    VaultError::InvalidFormat(what.to_string())
}

/// Decode a backup file
pub fn parse_backup(bytes: &[u8]) -> Result<BackupPayload> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| invalid(format!("malformed JSON: {}", e)))?;

    let is_encrypted = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|tag| tag == ENCRYPTED_BACKUP_TYPE);

    if is_encrypted {
        parse_encrypted(value)
    } else {
        parse_legacy(value)
    }
}

fn parse_encrypted(value: Value) -> Result<BackupPayload> {
    let backup: EncryptedBackupIn = serde_json::from_value(value)
        .map_err(|e| invalid(format!("encrypted backup: {}", e)))?;

    let records = match backup.encrypted_data {
        EmbeddedVault::Serialized(serialized) => serde_json::from_str(&serialized)
            .map_err(|e| invalid(format!("encrypted backup data: {}", e)))?,
        EmbeddedVault::Inline(records) => records,
    };

    let export_date = backup
        .export_date
        .and_then(|date| DateTime::parse_from_rfc3339(&date).ok())
        .map(|date| date.with_timezone(&Utc));

    Ok(BackupPayload::EncryptedV1 {
        records,
        export_date,
    })
}

fn parse_legacy(value: Value) -> Result<BackupPayload> {
    let records = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove("passwords") {
            Some(records @ Value::Array(_)) => records,
            _ => {
                return Err(invalid(
                    "expected a list of records or an object with a 'passwords' list",
                ))
            }
        },
        _ => return Err(invalid("expected a list of records")),
    };

    let records: Vec<LegacyRecord> =
        serde_json::from_value(records).map_err(|e| invalid(format!("record: {}", e)))?;
    Ok(BackupPayload::LegacyPlaintext(records))
}

/// Serialize an encrypted-v1 backup around the persisted vault string
pub fn encode_encrypted_backup(serialized_vault: &str, export_date: DateTime<Utc>) -> Result<String> {
    let backup = EncryptedBackupOut {
        kind: ENCRYPTED_BACKUP_TYPE,
        encrypted_data: serialized_vault,
        export_date,
    };
    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Default file name for a backup taken on `date`
pub fn backup_file_name(date: DateTime<Utc>) -> String {
    format!("vault-backup-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_json() {
        let result = parse_backup(b"{ not json");
        assert!(matches!(result, Err(VaultError::InvalidFormat(_))));
    }

    #[test]
    fn test_bare_array_is_legacy() {
        let payload =
            parse_backup(br#"[{"title":"Gmail","password":"x"},{"title":"Github","password":"y"}]"#)
                .unwrap();

        assert_eq!(payload.format(), BackupFormat::LegacyPlaintext);
        let BackupPayload::LegacyPlaintext(records) = payload else {
            panic!("expected legacy payload");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].secret, "y");
        assert!(records[0].id.is_none());
    }

    #[test]
    fn test_wrapped_legacy() {
        let payload = parse_backup(
            br#"{"passwords":[{"title":"Bank","website":"https://bank.example","category":"financeiro"}],
                 "exportDate":"2024-05-01T10:00:00.000Z","version":"1.0"}"#,
        )
        .unwrap();

        let BackupPayload::LegacyPlaintext(records) = payload else {
            panic!("expected legacy payload");
        };
        assert_eq!(records[0].url, "https://bank.example");
        assert_eq!(records[0].category, Some(Category::Finance));
    }

    #[test]
    fn test_old_and_new_field_names_together() {
        let payload = parse_backup(
            br#"[{"title":"Bank","secret":"new","password":"old","url":"","website":"https://bank.example"},
                 {"title":"Mail","secret":"","password":"kept"}]"#,
        )
        .unwrap();

        let BackupPayload::LegacyPlaintext(records) = payload else {
            panic!("expected legacy payload");
        };
        assert_eq!(records[0].secret, "new");
        assert_eq!(records[0].url, "https://bank.example");
        assert_eq!(records[1].secret, "kept");
    }

    #[test]
    fn test_malformed_encrypted_entry_still_parses() {
        let payload = parse_backup(
            br#"{"type":"vault-encrypted-v1","encryptedData":"[{\"id\":\"a\",\"iv\":\"00\",\"data\":\"zz\"}]"}"#,
        )
        .unwrap();

        let BackupPayload::EncryptedV1 { records, .. } = payload else {
            panic!("expected encrypted payload");
        };
        assert_eq!(records.len(), 1);
        assert!(records[0].decode().is_err());
    }

    #[test]
    fn test_unknown_type_tag_falls_back_to_legacy() {
        let payload =
            parse_backup(br#"{"type":"something-else","passwords":[{"title":"A"}]}"#).unwrap();
        assert_eq!(payload.format(), BackupFormat::LegacyPlaintext);
    }

    #[test]
    fn test_structurally_wrong_files() {
        for input in [
            br#"{"foo":1}"#.as_slice(),
            br#"{"passwords":"nope"}"#.as_slice(),
            br#"42"#.as_slice(),
            br#"[{"username":"no title"}]"#.as_slice(),
            br#"{"type":"vault-encrypted-v1"}"#.as_slice(),
            br#"{"type":"vault-encrypted-v1","encryptedData":"not json"}"#.as_slice(),
        ] {
            assert!(
                matches!(parse_backup(input), Err(VaultError::InvalidFormat(_))),
                "accepted {}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_encrypted_roundtrip_through_encoder() {
        let vault = r#"[{"id":"a","iv":"000000000000000000000000","data":"00112233445566778899aabbccddeeff"}]"#;
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let file = encode_encrypted_backup(vault, date).unwrap();
        let value: Value = serde_json::from_str(&file).unwrap();
        assert_eq!(value["type"], ENCRYPTED_BACKUP_TYPE);
        assert_eq!(value["encryptedData"], vault);

        let BackupPayload::EncryptedV1 { records, export_date } = parse_backup(file.as_bytes()).unwrap()
        else {
            panic!("expected encrypted payload");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), Some("a"));
        assert_eq!(export_date, Some(date));
    }

    #[test]
    fn test_inline_encrypted_data_accepted() {
        let payload = parse_backup(
            br#"{"type":"vault-encrypted-v1","encryptedData":[],"exportDate":"garbage"}"#,
        )
        .unwrap();

        let BackupPayload::EncryptedV1 { records, export_date } = payload else {
            panic!("expected encrypted payload");
        };
        assert!(records.is_empty());
        assert_eq!(export_date, None);
    }

    #[test]
    fn test_legacy_coercion_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let raw: LegacyRecord =
            serde_json::from_str(r#"{"id":"","title":"Gmail","username":null,"password":"x"}"#)
                .unwrap();

        let record = raw.into_record(now);
        assert!(!record.id.is_empty());
        assert_eq!(record.fields.created_at, now);
        assert_eq!(record.fields.updated_at, now);
        assert_eq!(record.fields.username, "");
        assert_eq!(record.fields.category, Category::Other);
    }

    #[test]
    fn test_legacy_coercion_keeps_given_values() {
        let now = Utc::now();
        let raw: LegacyRecord = serde_json::from_str(
            r#"{"id":"1714557600000abc","title":"Gmail","password":"x",
                "createdAt":"2024-05-01T10:00:00.000Z","updatedAt":1714557600000}"#,
        )
        .unwrap();

        let record = raw.into_record(now);
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(record.id, "1714557600000abc");
        assert_eq!(record.fields.created_at, expected);
        assert_eq!(record.fields.updated_at, expected);
    }

    #[test]
    fn test_backup_file_name() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        assert_eq!(backup_file_name(date), "vault-backup-2024-05-01.json");
    }
}
