//! Builders for the AAD context bound into each envelope, matching the two
//! record shapes the vault ever encrypts.

use lmv_domain::memory::SNAPSHOT_UID;
use serde_json::{Value, json};

pub(crate) fn vault(schema_version: u32, vault_version: u64) -> Value {
    json!({
        "record_type": "vault",
        "uid": SNAPSHOT_UID,
        "schema_version": schema_version,
        "vault_version": vault_version,
    })
}

pub(crate) fn ledger_entry(schema_version: u32, entry_cursor: u64) -> Value {
    json!({
        "record_type": "ledger_entry",
        "uid": SNAPSHOT_UID,
        "schema_version": schema_version,
        "entry_cursor": entry_cursor,
    })
}
