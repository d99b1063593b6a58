//! Record type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::crypto::NONCE_LEN;
use crate::error::VaultError;

/// Record category
///
/// Serialized with the English ids. Decoding also accepts the Portuguese ids
/// used by older backups; anything unrecognized becomes [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Category {
    Personal,
    Work,
    Finance,
    Email,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Personal,
        Category::Work,
        Category::Finance,
        Category::Email,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Work => "work",
            Self::Finance => "finance",
            Self::Email => "email",
            Self::Other => "other",
        }
    }

    fn lookup(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "personal" | "pessoal" => Some(Self::Personal),
            "work" | "trabalho" => Some(Self::Work),
            "finance" | "financeiro" => Some(Self::Finance),
            "email" | "e-mail" => Some(Self::Email),
            "other" | "outros" => Some(Self::Other),
            _ => None,
        }
    }
}

impl From<String> for Category {
    fn from(id: String) -> Self {
        Self::lookup(&id).unwrap_or_default()
    }
}

impl FromStr for Category {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| VaultError::InvalidFormat(format!("unknown category '{}'", s)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every record field except the id - the plaintext that gets encrypted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(alias = "password")]
    pub secret: String,
    #[serde(default, alias = "website")]
    pub url: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plaintext record as handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Stable opaque id; the only field stored unencrypted
    pub id: String,
    #[serde(flatten)]
    pub fields: RecordFields,
}

impl VaultRecord {
    /// Create a record with a fresh id and both timestamps set to now
    pub fn create(draft: RecordDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            fields: draft.into_fields(now, now),
        }
    }

    /// Replace the editable fields, keeping id and creation time
    pub fn apply(&mut self, draft: RecordDraft) {
        let created_at = self.fields.created_at;
        self.fields = draft.into_fields(created_at, Utc::now());
    }

    /// Case-insensitive title used for import de-duplication
    pub fn title_key(&self) -> String {
        self.fields.title.to_lowercase()
    }
}

/// User-editable part of a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    pub username: String,
    pub secret: String,
    pub url: String,
    pub category: Category,
    pub notes: Option<String>,
}

impl RecordDraft {
    /// Title and secret are mandatory
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.title.trim().is_empty() {
            return Err(VaultError::InvalidFormat("title is required".to_string()));
        }
        if self.secret.is_empty() {
            return Err(VaultError::InvalidFormat("secret is required".to_string()));
        }
        Ok(())
    }

    /// Start a draft from an existing record (for edits)
    pub fn from_record(record: &VaultRecord) -> Self {
        let fields = &record.fields;
        Self {
            title: fields.title.clone(),
            username: fields.username.clone(),
            secret: fields.secret.clone(),
            url: fields.url.clone(),
            category: fields.category,
            notes: fields.notes.clone(),
        }
    }

    fn into_fields(self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> RecordFields {
        RecordFields {
            title: self.title,
            username: self.username,
            secret: self.secret,
            url: self.url,
            category: self.category,
            notes: self.notes.filter(|n| !n.is_empty()),
            created_at,
            updated_at,
        }
    }
}

/// Stored form of one record
///
/// Wire names follow the persisted vault format: `iv` and `data`, both hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: String,
    #[serde(rename = "iv", alias = "nonce", with = "hex::serde")]
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the auth tag appended
    #[serde(rename = "data", alias = "ciphertext", with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

/// One entry of a persisted vault array, kept exactly as read
///
/// Decoding into an [`EncryptedRecord`] is deferred to the per-record
/// decrypt step, so a damaged entry fails alone and can be written back
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredRecord(Value);

impl StoredRecord {
    /// The cleartext id, if the entry has one
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Decode the hex fields; any malformed entry is an authentication failure
    pub fn decode(&self) -> Result<EncryptedRecord, VaultError> {
        EncryptedRecord::deserialize(&self.0).map_err(|_| VaultError::Authentication)
    }
}

impl TryFrom<&EncryptedRecord> for StoredRecord {
    type Error = VaultError;

    fn try_from(record: &EncryptedRecord) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::to_value(record)?))
    }
}
