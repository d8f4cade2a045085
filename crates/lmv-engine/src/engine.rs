use crate::aad;
use crate::error::{EngineError, EngineErrorExt};
use crate::rotation;
use crate::state::{LedgerPage, PatchOutcome, SnapshotResult, StateView};
use lmv_domain::memory::{AuthMethod, RESERVED_BLOCK_KEYS, SCHEMA_VERSION, SNAPSHOT_UID};
use lmv_domain::{JournalEntry, Memory, Metadata, Snapshot};
use lmv_storage::{DataFile, Storage};
use lmv_vault::{Domain, Envelope, Vault};
use lmv_vault::canon::{canonical_json, sha256_hex};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

pub(crate) fn now_rfc3339_millis() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Debug)]
struct EngineInner {
    storage: Storage,
    vault: Vault,
    lock: Mutex<()>,
}

/// The vault engine: exclusively owns the three persisted artifacts in a
/// data directory and exposes the control-plane operations described by the
/// request surface.
///
/// Cheap to clone; every clone shares the same underlying storage, vault,
/// and serialization lock.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Opens a vault engine over `storage`, encrypting with `vault`,
    /// bootstrapping an empty snapshot and default metadata if they are
    /// absent.
    ///
    /// # Errors
    /// Returns [`EngineError::Storage`] if the initial snapshot or metadata
    /// cannot be written.
    pub async fn open(storage: Storage, vault: Vault) -> Result<Self, EngineError> {
        if !storage.file_exists(DataFile::Vault) {
            let snapshot = Snapshot::initial(now_rfc3339_millis());
            Self::write_snapshot(&storage, &vault, &snapshot).await?;
        }
        if !storage.file_exists(DataFile::Ledger) {
            storage.write_file(DataFile::Ledger, &[]).await.context("writing initial empty journal")?;
        }
        if !storage.file_exists(DataFile::Meta) {
            let metadata = Metadata::current(now_rfc3339_millis());
            let bytes = serde_json::to_vec_pretty(&metadata).expect("Metadata always serializes");
            storage.write_file(DataFile::Meta, &bytes).await.context("writing initial metadata")?;
        }

        Ok(Self { inner: Arc::new(EngineInner { storage, vault, lock: Mutex::new(()) }) })
    }

    /// Wraps an already-bootstrapped data directory without running
    /// [`Self::open`]'s bootstrap, for probing a directory with a specific
    /// vault (e.g. in rotation round-trip tests).
    #[cfg(test)]
    pub(crate) fn from_parts(storage: Storage, vault: Vault) -> Self {
        Self { inner: Arc::new(EngineInner { storage, vault, lock: Mutex::new(()) }) }
    }

    pub(crate) async fn write_snapshot(
        storage: &Storage,
        vault: &Vault,
        snapshot: &Snapshot,
    ) -> Result<(), EngineError> {
        let aad_context = aad::vault(snapshot.schema_version, snapshot.memory.version);
        let payload = serde_json::to_value(snapshot).expect("Snapshot always serializes");
        let envelope = vault
            .encrypt(&payload, Domain::Vault, &aad_context)
            .map_err(|e| EngineError::corruption(format!("failed to encrypt snapshot: {e}")))?;
        let bytes = serde_json::to_vec(&envelope).expect("Envelope always serializes");
        storage.write_file(DataFile::Vault, &bytes).await.context("writing snapshot")?;
        Ok(())
    }

    pub(crate) async fn read_snapshot(storage: &Storage, vault: &Vault) -> Result<Snapshot, EngineError> {
        let bytes = storage.read_file(DataFile::Vault).await.context("reading snapshot")?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::corruption(format!("malformed snapshot envelope: {e}")))?;
        let (payload, aad_context) = vault
            .decrypt(&envelope, Domain::Vault)
            .map_err(|e| EngineError::corruption(format!("snapshot decrypt failed: {e}")))?;
        let snapshot: Snapshot = serde_json::from_value(payload)
            .map_err(|e| EngineError::corruption(format!("malformed snapshot payload: {e}")))?;

        let expected = aad::vault(snapshot.schema_version, snapshot.memory.version);
        if aad_context != expected {
            return Err(EngineError::corruption("snapshot AAD context does not match its contents"));
        }

        Ok(snapshot)
    }

    /// Reads and parses `meta.json`, checking its algorithm parameters
    /// against what this build expects.
    ///
    /// `meta.json` is plaintext (it carries no key material), so there is no
    /// vault involved here, only a schema check.
    pub(crate) async fn read_metadata(storage: &Storage) -> Result<Metadata, EngineError> {
        let bytes = storage.read_file(DataFile::Meta).await.context("reading metadata")?;
        let metadata: Metadata = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::corruption(format!("malformed metadata: {e}")))?;

        let expected = Metadata::current(metadata.updated_at.clone());
        if metadata.kdf_name != expected.kdf_name
            || metadata.kdf_n != expected.kdf_n
            || metadata.kdf_r != expected.kdf_r
            || metadata.kdf_p != expected.kdf_p
            || metadata.kdf_keylen != expected.kdf_keylen
            || metadata.hkdf_name != expected.hkdf_name
            || metadata.aead_alg != expected.aead_alg
        {
            return Err(EngineError::corruption(
                "metadata schema mismatch: persisted algorithm parameters do not match this build",
            ));
        }

        Ok(metadata)
    }

    pub(crate) fn decode_entry(vault: &Vault, line: &[u8]) -> Result<JournalEntry, EngineError> {
        let envelope: Envelope = serde_json::from_slice(line)
            .map_err(|e| EngineError::corruption(format!("malformed journal envelope: {e}")))?;
        let (payload, aad_context) = vault
            .decrypt(&envelope, Domain::Ledger)
            .map_err(|e| EngineError::corruption(format!("journal entry decrypt failed: {e}")))?;
        let entry: JournalEntry = serde_json::from_value(payload)
            .map_err(|e| EngineError::corruption(format!("malformed journal entry: {e}")))?;

        let expected = aad::ledger_entry(SCHEMA_VERSION, entry.cursor);
        if aad_context != expected {
            return Err(EngineError::corruption("journal entry AAD context does not match its contents"));
        }

        Ok(entry)
    }

    /// Reads, decrypts, and decodes every journal line. A line other than
    /// the last that fails to decode is fatal; if only the last line fails,
    /// it is discarded as a torn append.
    pub(crate) async fn read_journal(storage: &Storage, vault: &Vault) -> Result<Vec<JournalEntry>, EngineError> {
        let lines = storage.read_journal_lines().await.context("reading journal")?;
        let last_idx = lines.len().saturating_sub(1);
        let mut entries = Vec::with_capacity(lines.len());

        for (idx, line) in lines.into_iter().enumerate() {
            match Self::decode_entry(vault, &line) {
                Ok(entry) => entries.push(entry),
                Err(err) if idx == last_idx => {
                    tracing::warn!(%err, "discarding torn trailing journal entry");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Self::verify_chain(&entries)?;
        Ok(entries)
    }

    pub(crate) fn verify_chain(entries: &[JournalEntry]) -> Result<(), EngineError> {
        let mut prev_hash = String::new();
        for (idx, entry) in entries.iter().enumerate() {
            let expected_cursor = idx as u64 + 1;
            if entry.cursor != expected_cursor {
                return Err(EngineError::corruption(format!(
                    "journal cursor discontinuity: expected {expected_cursor}, found {}",
                    entry.cursor
                )));
            }
            if entry.prev_hash != prev_hash {
                return Err(EngineError::corruption(format!(
                    "hash chain broken at cursor {}",
                    entry.cursor
                )));
            }
            let recomputed = sha256_hex(&canonical_json(&entry.hashable_form()));
            if recomputed != entry.entry_hash {
                return Err(EngineError::corruption(format!("entry_hash mismatch at cursor {}", entry.cursor)));
            }
            prev_hash.clone_from(&entry.entry_hash);
        }
        Ok(())
    }

    pub(crate) fn replay(mut memory: Memory, snapshot_cursor: u64, entries: &[JournalEntry]) -> Result<Memory, EngineError> {
        for entry in entries.iter().filter(|e| e.cursor > snapshot_cursor) {
            if entry.base_version != memory.version {
                return Err(EngineError::corruption(format!(
                    "base_version mismatch at cursor {}: expected {}, found {}",
                    entry.cursor, memory.version, entry.base_version
                )));
            }

            let new_blocks = apply_patch(&memory.blocks, &entry.patch)
                .map_err(|e| EngineError::corruption(format!("stored patch failed to replay: {e}")))?;

            memory.blocks = new_blocks;
            memory.version = entry.new_version;
            memory.updated_at.clone_from(&entry.ts);
        }
        Ok(memory)
    }

    async fn assemble(&self) -> Result<(Memory, u64, Vec<JournalEntry>), EngineError> {
        let snapshot = Self::read_snapshot(&self.inner.storage, &self.inner.vault).await?;
        Self::read_metadata(&self.inner.storage).await?;
        let entries = Self::read_journal(&self.inner.storage, &self.inner.vault).await?;
        let memory = Self::replay(snapshot.memory, snapshot.snapshot_cursor, &entries)?;
        Ok((memory, snapshot.snapshot_cursor, entries))
    }

    /// Assembles the current state: the snapshot replayed forward through
    /// every journal entry past its cursor.
    ///
    /// # Errors
    /// [`EngineError::Corruption`] on any integrity failure, or
    /// [`EngineError::Storage`] on an unexpected I/O failure.
    pub async fn current_state(&self) -> Result<StateView, EngineError> {
        let (memory, snapshot_cursor, entries) = self.assemble().await?;
        Ok(StateView { memory, snapshot_cursor, ledger_cursor: entries.len() as u64 })
    }

    /// Applies a JSON-Patch to the memory document under optimistic
    /// concurrency control, appending a fresh hash-chained journal entry.
    ///
    /// # Errors
    /// [`EngineError::BadRequest`] for a malformed `If-Match` or a patch
    /// touching a reserved path; [`EngineError::Conflict`] if `if_match`
    /// does not match the current version; [`EngineError::PatchApply`] if
    /// the patch cannot be applied or violates the blocks shape; otherwise
    /// as [`Self::current_state`].
    pub async fn patch_memory(
        &self,
        if_match: &str,
        patch: Value,
        actor: String,
        reason: String,
        auth: AuthMethod,
    ) -> Result<PatchOutcome, EngineError> {
        validate_patch_ops(&patch)?;
        let target_version = parse_if_match(if_match)?;

        let _guard = self.inner.lock.lock();

        let (memory, snapshot_cursor, entries) = self.assemble().await?;
        if target_version != memory.version {
            return Err(EngineError::Conflict { current_version: memory.version, context: None });
        }

        let new_blocks = apply_patch(&memory.blocks, &patch).map_err(EngineError::patch_apply)?;
        if !RESERVED_BLOCK_KEYS.iter().all(|key| new_blocks.contains_key(*key)) {
            return Err(EngineError::patch_apply("patch removed a reserved block key"));
        }

        let cursor = entries.len() as u64 + 1;
        let ts = now_rfc3339_millis();
        let prev_hash = entries.last().map_or_else(String::new, |e| e.entry_hash.clone());

        let mut entry = JournalEntry {
            cursor,
            ts: ts.clone(),
            base_version: memory.version,
            new_version: memory.version + 1,
            actor,
            reason,
            auth,
            patch,
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = sha256_hex(&canonical_json(&entry.hashable_form()));

        let aad_context = aad::ledger_entry(SCHEMA_VERSION, cursor);
        let payload = serde_json::to_value(&entry).expect("JournalEntry always serializes");
        let envelope = self
            .inner
            .vault
            .encrypt(&payload, Domain::Ledger, &aad_context)
            .map_err(|e| EngineError::corruption(format!("failed to encrypt journal entry: {e}")))?;
        let line = serde_json::to_vec(&envelope).expect("Envelope always serializes");
        self.inner.storage.append_journal_line(&line).await.context("appending journal entry")?;

        let new_memory = Memory { version: entry.new_version, blocks: new_blocks, updated_at: ts };
        let state = StateView { memory: new_memory, snapshot_cursor, ledger_cursor: cursor };

        Ok(PatchOutcome { state, applied_cursor: cursor })
    }

    /// Returns a page of the journal: entries with `cursor > since`, up to
    /// `limit` (clamped to `1..=500`).
    ///
    /// # Errors
    /// As [`Self::current_state`].
    pub async fn get_ledger(&self, since: u64, limit: u64) -> Result<LedgerPage, EngineError> {
        let limit = limit.clamp(1, 500) as usize;
        let (_, snapshot_cursor, entries) = self.assemble().await?;
        let ledger_cursor = entries.len() as u64;

        let mut page: Vec<JournalEntry> =
            entries.into_iter().filter(|e| e.cursor > since).take(limit).collect();
        let has_more = page.last().is_some_and(|last| last.cursor < ledger_cursor);
        let next_cursor = page.last().map_or(since, |e| e.cursor);
        page.shrink_to_fit();

        Ok(LedgerPage { entries: page, next_cursor, has_more, snapshot_cursor, ledger_cursor })
    }

    /// Folds the journal into a fresh snapshot if there are entries past
    /// the current snapshot cursor; a no-op otherwise. The journal itself
    /// is retained in full.
    ///
    /// # Errors
    /// As [`Self::current_state`], plus [`EngineError::Storage`] if the new
    /// snapshot cannot be written.
    pub async fn snapshot(&self) -> Result<SnapshotResult, EngineError> {
        let _guard = self.inner.lock.lock();

        let (memory, snapshot_cursor, entries) = self.assemble().await?;
        let ledger_cursor = entries.len() as u64;

        if ledger_cursor <= snapshot_cursor {
            return Ok(SnapshotResult { snapshot_cursor, ledger_cursor, memory_version: memory.version });
        }

        let snapshot = Snapshot {
            uid: SNAPSHOT_UID.to_owned(),
            schema_version: SCHEMA_VERSION,
            memory: memory.clone(),
            snapshot_cursor: ledger_cursor,
            updated_at: now_rfc3339_millis(),
        };
        Self::write_snapshot(&self.inner.storage, &self.inner.vault, &snapshot).await?;

        Ok(SnapshotResult { snapshot_cursor: ledger_cursor, ledger_cursor, memory_version: memory.version })
    }

    /// Performs the full state-assembly integrity check without exposing
    /// the resulting memory: used after rotation and on demand.
    ///
    /// # Errors
    /// As [`Self::current_state`].
    pub async fn verify_ledger(&self) -> Result<u64, EngineError> {
        let (_, _, entries) = self.assemble().await?;
        Ok(entries.len() as u64)
    }

    /// Re-encrypts the snapshot, journal, and metadata under `new_passphrase`,
    /// leaving the old passphrase unable to decrypt anything on success.
    ///
    /// Builds the new-passphrase versions of all three files in a staging
    /// directory and verifies them there, then swaps each file into place via
    /// a backup-rename. If any step after the first rename fails, every file
    /// already swapped is rolled back to its backup so the data directory is
    /// left exactly as it was, readable by the old passphrase.
    ///
    /// # Errors
    /// [`EngineError::BadRequest`] if `new_passphrase` is empty.
    /// [`EngineError::Corruption`] if the current state or the staged
    /// rewrite fails to verify. [`EngineError::Storage`] on any filesystem
    /// failure; the data directory is rolled back before this is returned if
    /// the failure occurred mid-swap.
    pub async fn rotate_passphrase(&self, new_passphrase: &str) -> Result<(), EngineError> {
        let new_vault = Vault::builder()
            .passphrase(new_passphrase)
            .build()
            .map_err(|e| EngineError::bad_request(format!("invalid new passphrase: {e}")))?;

        let _guard = self.inner.lock.lock();

        let snapshot = Self::read_snapshot(&self.inner.storage, &self.inner.vault).await?;
        let entries = Self::read_journal(&self.inner.storage, &self.inner.vault).await?;
        // Verification mirrors `assemble`'s replay check without keeping the result:
        // rotation re-encrypts the snapshot and journal as-is, it does not compact them.
        Self::replay(snapshot.memory.clone(), snapshot.snapshot_cursor, &entries)?;

        let run_id = rotation::run_id();
        let root = self.inner.storage.root();
        let staging_root = root.with_file_name(format!(
            "{}.rotate-staging.{run_id}",
            root.file_name().and_then(|n| n.to_str()).unwrap_or("data")
        ));

        let outcome =
            rotation::stage_and_swap(&self.inner.storage, &new_vault, &staging_root, &run_id, &snapshot, &entries)
                .await;

        let _ = tokio::fs::remove_dir_all(&staging_root).await;
        outcome
    }
}

fn apply_patch(
    blocks: &serde_json::Map<String, Value>,
    patch: &Value,
) -> Result<serde_json::Map<String, Value>, String> {
    let ops: json_patch::Patch =
        serde_json::from_value(patch.clone()).map_err(|e| format!("invalid JSON-Patch: {e}"))?;
    let mut document = Value::Object(blocks.clone());
    json_patch::patch(&mut document, &ops).map_err(|e| e.to_string())?;
    match document {
        Value::Object(map) => Ok(map),
        _ => Err("patched memory blocks is no longer a JSON object".to_owned()),
    }
}

fn parse_if_match(if_match: &str) -> Result<u64, EngineError> {
    if_match
        .strip_prefix('v')
        .and_then(|rest| rest.parse::<u64>().ok())
        .ok_or_else(|| EngineError::bad_request(format!("malformed If-Match header: {if_match:?}")))
}

fn validate_patch_ops(patch: &Value) -> Result<(), EngineError> {
    let Value::Array(ops) = patch else {
        return Err(EngineError::bad_request("patch body must be a JSON array"));
    };

    for op in ops {
        if let Some(path) = op.get("path").and_then(Value::as_str) {
            check_not_reserved(path)?;
        }
        if let Some(from) = op.get("from").and_then(Value::as_str) {
            check_not_reserved(from)?;
        }
    }
    Ok(())
}

fn check_not_reserved(path: &str) -> Result<(), EngineError> {
    let reserved = path == "/version"
        || path == "/updated_at"
        || path.starts_with("/version/")
        || path.starts_with("/updated_at/");
    if reserved {
        return Err(EngineError::bad_request(format!("patch path '{path}' is reserved")));
    }
    Ok(())
}
