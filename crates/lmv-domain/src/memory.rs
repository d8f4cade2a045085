//! Plaintext domain types for the vault's memory document, its point-in-time
//! snapshots, its journal entries, and the non-secret metadata file.
//!
//! These are the shapes that get JSON-serialized and handed to the envelope
//! codec as payloads (or, for [`Metadata`], written to disk unencrypted).
//! None of this module touches I/O or cryptography.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The four top-level keys every memory document must carry.
pub const RESERVED_BLOCK_KEYS: [&str; 4] = ["identity", "methodology", "projects", "rules"];

/// `uid` carried by every snapshot and echoed into AAD contexts.
pub const SNAPSHOT_UID: &str = "lmv-v1";

/// Wire/storage schema version for [`Snapshot`].
pub const SCHEMA_VERSION: u32 = 1;

/// The shared JSON document: a monotonically versioned set of blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub version: u64,
    pub blocks: Map<String, Value>,
    pub updated_at: String,
}

impl Memory {
    /// A fresh, empty memory document: version 0, each reserved key present
    /// with an empty object.
    #[must_use]
    pub fn empty(updated_at: impl Into<String>) -> Self {
        let mut blocks = Map::new();
        for key in RESERVED_BLOCK_KEYS {
            blocks.insert(key.to_owned(), Value::Object(Map::new()));
        }
        Self { version: 0, blocks, updated_at: updated_at.into() }
    }

    /// Whether every reserved key is still present, regardless of value.
    #[must_use]
    pub fn has_reserved_keys(&self) -> bool {
        RESERVED_BLOCK_KEYS.iter().all(|key| self.blocks.contains_key(*key))
    }
}

/// An encrypted point-in-time materialization of [`Memory`], up to and
/// including journal cursor `snapshot_cursor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub uid: String,
    pub schema_version: u32,
    pub memory: Memory,
    pub snapshot_cursor: u64,
    pub updated_at: String,
}

impl Snapshot {
    #[must_use]
    pub fn initial(updated_at: impl Into<String>) -> Self {
        let updated_at = updated_at.into();
        Self {
            uid: SNAPSHOT_UID.to_owned(),
            schema_version: SCHEMA_VERSION,
            memory: Memory::empty(updated_at.clone()),
            snapshot_cursor: 0,
            updated_at,
        }
    }
}

/// How a write was authorized, recorded verbatim in the journal entry that
/// resulted from it. Never carries the token value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Token,
    None,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::None => "none",
        }
    }
}

/// One hash-chained, append-only mutation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub cursor: u64,
    pub ts: String,
    pub base_version: u64,
    pub new_version: u64,
    pub actor: String,
    pub reason: String,
    pub auth: AuthMethod,
    pub patch: Value,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl JournalEntry {
    /// The canonical form hashed to produce [`Self::entry_hash`]: every field
    /// except `entry_hash` itself, since the hash cannot depend on itself.
    ///
    /// # Panics
    /// Never, in practice: `JournalEntry` always serializes to a JSON object.
    #[must_use]
    pub fn hashable_form(&self) -> Value {
        let mut value = serde_json::to_value(self).expect("JournalEntry always serializes");
        if let Value::Object(map) = &mut value {
            map.remove("entry_hash");
        }
        value
    }
}

/// Non-secret parameters written to `meta.json`. Carries no key material;
/// reading it cannot help an attacker recover the passphrase or any key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub kdf_name: String,
    pub kdf_n: u32,
    pub kdf_r: u32,
    pub kdf_p: u32,
    pub kdf_keylen: usize,
    pub hkdf_name: String,
    pub aead_alg: String,
    pub updated_at: String,
}

impl Metadata {
    /// The fixed KDF/HKDF/AEAD parameters this implementation uses, stamped
    /// with the given `updated_at`.
    #[must_use]
    pub fn current(updated_at: impl Into<String>) -> Self {
        Self {
            kdf_name: "scrypt".to_owned(),
            kdf_n: 32_768,
            kdf_r: 8,
            kdf_p: 1,
            kdf_keylen: 32,
            hkdf_name: "hkdf-sha256".to_owned(),
            aead_alg: "aes-256-gcm".to_owned(),
            updated_at: updated_at.into(),
        }
    }
}
