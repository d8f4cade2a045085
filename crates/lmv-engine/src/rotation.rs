//! Passphrase rotation (spec "Passphrase rotation"): re-encrypts the
//! snapshot and journal under a new passphrase in a staging directory, then
//! swaps all three files into place with a backup-rename so a crash at any
//! point leaves either the full old-passphrase set or the full
//! new-passphrase set on disk, never a mix.

use crate::aad;
use crate::engine::{Engine, now_rfc3339_millis};
use crate::error::{EngineError, EngineErrorExt};
use lmv_domain::memory::SCHEMA_VERSION;
use lmv_domain::{JournalEntry, Metadata, Snapshot};
use lmv_storage::{DataFile, Storage, StorageError};
use lmv_vault::{Domain, Vault};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const FILES: [DataFile; 3] = [DataFile::Vault, DataFile::Ledger, DataFile::Meta];

pub(crate) fn run_id() -> String {
    let nanos =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map_or(0, |d| d.as_nanos());
    format!("{}-{nanos}", std::process::id())
}

/// Writes the new-passphrase snapshot, journal, and metadata into
/// `staging_root`, verifies them there, then swaps each into place over
/// `storage`'s data directory. Any failure after the first backup-rename
/// rolls every already-swapped file back to its backup.
pub(crate) async fn stage_and_swap(
    storage: &Storage,
    new_vault: &Vault,
    staging_root: &Path,
    run_id: &str,
    snapshot: &Snapshot,
    entries: &[JournalEntry],
) -> Result<(), EngineError> {
    let staged = Storage::builder()
        .root(staging_root)
        .create(true)
        .connect()
        .await
        .context("creating rotation staging directory")?;

    Engine::write_snapshot(&staged, new_vault, snapshot).await?;
    // Written unconditionally, even with zero entries, so the staged
    // directory always has all three files to swap into place — an empty
    // journal is a valid journal, per the ensure-exists contract `Engine::open`
    // itself follows.
    staged.write_file(DataFile::Ledger, &[]).await.context("staging empty journal")?;
    for entry in entries {
        stage_entry(&staged, new_vault, entry).await?;
    }
    let metadata = Metadata::current(now_rfc3339_millis());
    let meta_bytes = serde_json::to_vec_pretty(&metadata).expect("Metadata always serializes");
    staged.write_file(DataFile::Meta, &meta_bytes).await.context("staging rotated metadata")?;

    verify_staged(&staged, new_vault).await?;

    let root = storage.root().to_path_buf();
    let mut backed_up = Vec::with_capacity(FILES.len());
    let mut swapped = Vec::with_capacity(FILES.len());

    let result = swap_and_verify(&root, staging_root, run_id, new_vault, &mut backed_up, &mut swapped).await;
    if let Err(err) = result {
        rollback(&swapped, &backed_up).await;
        return Err(err);
    }

    Ok(())
}

async fn stage_entry(staged: &Storage, vault: &Vault, entry: &JournalEntry) -> Result<(), EngineError> {
    let aad_context = aad::ledger_entry(SCHEMA_VERSION, entry.cursor);
    let payload = serde_json::to_value(entry).expect("JournalEntry always serializes");
    let envelope = vault
        .encrypt(&payload, Domain::Ledger, &aad_context)
        .map_err(|e| EngineError::corruption(format!("failed to re-encrypt journal entry: {e}")))?;
    let line = serde_json::to_vec(&envelope).expect("Envelope always serializes");
    staged.append_journal_line(&line).await.context("staging re-encrypted journal entry")
}

async fn verify_staged(storage: &Storage, vault: &Vault) -> Result<(), EngineError> {
    let snapshot = Engine::read_snapshot(storage, vault).await?;
    Engine::read_metadata(storage).await?;
    let entries = Engine::read_journal(storage, vault).await?;
    Engine::replay(snapshot.memory, snapshot.snapshot_cursor, &entries)?;
    Ok(())
}

/// Backs up and swaps every file, then re-opens the data directory with the
/// new passphrase to confirm the swapped-in files verify.
async fn swap_and_verify(
    root: &Path,
    staging_root: &Path,
    run_id: &str,
    new_vault: &Vault,
    backed_up: &mut Vec<(PathBuf, PathBuf)>,
    swapped: &mut Vec<PathBuf>,
) -> Result<(), EngineError> {
    for file in FILES {
        let original = root.join(file.filename());
        let staged = staging_root.join(file.filename());
        let backup = root.join(format!("{}.bak.{run_id}", file.filename()));

        if tokio::fs::try_exists(&original).await.unwrap_or(false) {
            tokio::fs::rename(&original, &backup)
                .await
                .map_err(|e| storage_io_err(e, "backing up file before rotation"))?;
            backed_up.push((original.clone(), backup));
        }

        if tokio::fs::try_exists(&staged).await.unwrap_or(false) {
            tokio::fs::rename(&staged, &original)
                .await
                .map_err(|e| storage_io_err(e, "swapping rotated file into place"))?;
        } else {
            // Every staged file is written unconditionally before this runs;
            // this only guards against a staging directory built by a future
            // caller that skips a file, rather than erroring the whole swap.
            tokio::fs::write(&original, []).await.map_err(|e| storage_io_err(e, "creating empty file during rotation"))?;
        }
        swapped.push(original);
    }

    let reopened = Storage::builder()
        .root(root)
        .create(false)
        .connect()
        .await
        .context("reopening data directory after rotation")?;
    verify_staged(&reopened, new_vault).await
}

/// Undoes a partial swap: removes any file already swapped in, then renames
/// each backup back into place. The original failure is still what's
/// propagated to the caller.
async fn rollback(swapped: &[PathBuf], backed_up: &[(PathBuf, PathBuf)]) {
    for path in swapped {
        let _ = tokio::fs::remove_file(path).await;
    }
    for (original, backup) in backed_up {
        if let Err(err) = tokio::fs::rename(backup, original).await {
            tracing::error!(
                path = %original.display(),
                %err,
                "failed to restore rotation backup; data directory needs manual repair"
            );
        }
    }
}

fn storage_io_err(err: std::io::Error, context: &'static str) -> EngineError {
    EngineError::Storage {
        source: StorageError::Io { source: err, context: Some(Cow::Borrowed(context)) },
        context: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine as EngineHandle;
    use lmv_domain::memory::AuthMethod;
    use tempfile::TempDir;

    async fn open(dir: &TempDir, passphrase: &str) -> EngineHandle {
        let storage = Storage::builder().root(dir.path()).create(true).connect().await.unwrap();
        let vault = Vault::builder().passphrase(passphrase).build().unwrap();
        EngineHandle::open(storage, vault).await.unwrap()
    }

    #[tokio::test]
    async fn rotation_round_trip_preserves_memory_and_locks_out_old_passphrase() {
        let dir = TempDir::new().unwrap();
        let engine = open(&dir, "old-pass").await;

        for i in 0..3 {
            let patch = serde_json::json!([{"op": "add", "path": format!("/identity/field{i}"), "value": i}]);
            engine
                .patch_memory(&format!("v{i}"), patch, "alice".to_owned(), "seed".to_owned(), AuthMethod::None)
                .await
                .unwrap();
        }
        let before = engine.current_state().await.unwrap();

        engine.rotate_passphrase("new-pass").await.unwrap();

        // The live handle still wraps the old passphrase; production
        // rotation is a restart-time operation, so the caller re-opens from
        // scratch with the new passphrase, same as spec scenario S6.
        let storage = Storage::builder().root(dir.path()).create(false).connect().await.unwrap();
        let new_vault = Vault::builder().passphrase("new-pass").build().unwrap();
        let reopened = EngineHandle::from_parts(storage, new_vault);

        let count = reopened.verify_ledger().await.unwrap();
        assert_eq!(count, 3);
        let after = reopened.current_state().await.unwrap();
        assert_eq!(before.memory, after.memory);

        let storage = Storage::builder().root(dir.path()).create(false).connect().await.unwrap();
        let wrong_vault = Vault::builder().passphrase("old-pass").build().unwrap();
        let wrong_engine = EngineHandle::from_parts(storage, wrong_vault);
        let err = wrong_engine.current_state().await.expect_err("old passphrase must no longer decrypt");
        assert!(matches!(err, EngineError::Corruption { .. }));
    }

    #[tokio::test]
    async fn rotation_on_a_fresh_vault_with_no_patches_succeeds() {
        let dir = TempDir::new().unwrap();
        let engine = open(&dir, "old-pass").await;

        engine.rotate_passphrase("new-pass").await.unwrap();

        let storage = Storage::builder().root(dir.path()).create(false).connect().await.unwrap();
        let new_vault = Vault::builder().passphrase("new-pass").build().unwrap();
        let reopened = EngineHandle::from_parts(storage, new_vault);

        let count = reopened.verify_ledger().await.unwrap();
        assert_eq!(count, 0);
        let state = reopened.current_state().await.unwrap();
        assert_eq!(state.memory.version, 0);
    }

    #[tokio::test]
    async fn rotation_with_empty_passphrase_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = open(&dir, "only-pass").await;
        let err = engine.rotate_passphrase("").await.expect_err("empty passphrase must be rejected");
        assert!(matches!(err, EngineError::BadRequest { .. }));
    }
}
