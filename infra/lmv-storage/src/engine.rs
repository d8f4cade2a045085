//! Core storage engine implementation providing atomic, durable file I/O over
//! the vault's fixed three-file on-disk layout.
//!
//! This module contains the primary [`Storage`] handle, the single entry
//! point for reading and writing `vault.enc`, `ledger.jsonl.enc`, and
//! `meta.json` inside the data directory. There is no user-supplied path or
//! namespacing: the set of files is closed, so there is nothing to sandbox.

use crate::builder::StorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One of the fixed files that make up a vault's data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFile {
    /// The encrypted vault snapshot envelope.
    Vault,
    /// The append-only encrypted journal, one envelope per line.
    Ledger,
    /// Unencrypted bookkeeping: current version, creation time, key id.
    Meta,
}

impl DataFile {
    #[must_use]
    pub const fn filename(self) -> &'static str {
        match self {
            Self::Vault => "vault.enc",
            Self::Ledger => "ledger.jsonl.enc",
            Self::Meta => "meta.json",
        }
    }
}

/// The internal shared state of a [`Storage`] instance.
#[derive(Debug)]
pub struct StorageInner {
    /// The canonicalized physical path on disk of the data directory.
    pub(crate) root: PathBuf,
    /// A unique counter used to generate temporary file names.
    pub(crate) tmp_counter: AtomicU64,
}

/// A thread-safe handle to the vault's data directory.
///
/// `Storage` guarantees that every file it writes through [`Storage::write_file`]
/// or [`Storage::append_journal_line`] is either fully present or not present at
/// all after a crash: writes land in a unique temp file, are `fsync`'d, then
/// atomically renamed into place.
///
/// This handle is internally reference-counted (`Arc`) and can be cheaply
/// cloned across threads or tasks.
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn resolve(&self, file: DataFile) -> PathBuf {
        self.inner.root.join(file.filename())
    }

    /// Reads the entire contents of `file`.
    ///
    /// # Errors
    /// Returns [`StorageError::FileNotFound`] if it does not exist, or
    /// [`StorageError::Io`] on any other I/O failure.
    pub async fn read_file(&self, file: DataFile) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(file);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound { message: path.display().to_string().into(), context: None })
            }
            Err(err) => {
                Err(StorageError::Io { source: err, context: Some(format!("read {}", path.display()).into()) })
            }
        }
    }

    #[must_use]
    pub fn file_exists(&self, file: DataFile) -> bool {
        self.resolve(file).exists()
    }

    /// Atomically replaces the full contents of `file`.
    ///
    /// Writes to a unique temp file in the same directory, `fsync`s the file
    /// and its parent directory, then renames into place. The target file is
    /// never observed in a partially-written state.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] on any filesystem failure.
    pub async fn write_file(&self, file: DataFile, data: &[u8]) -> Result<(), StorageError> {
        let resolved = self.resolve(file);
        let temp = unique_tmp_path(&resolved, &self.inner.tmp_counter);

        {
            let mut handle = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp)
                .await
                .context(format!("temp creation failed: {}", temp.display()))?;
            handle.write_all(data).await.context("write failed")?;
            handle.sync_all().await.context("hardware sync failed")?;
        }

        replace_via_rename(&temp, &resolved).await?;
        Self::sync_dir(&self.inner.root).await;

        debug!(path = %resolved.display(), "File saved atomically");
        Ok(())
    }

    /// Appends one line (without trailing `\n`) to the journal file, creating
    /// it if necessary, and `fsync`s the file after the write.
    ///
    /// This is NOT atomic the way [`Storage::write_file`] is: a crash between
    /// the write and the `fsync` can leave a torn last line on disk. Readers
    /// must use [`Storage::read_journal_lines`], which drops an incomplete
    /// trailing line rather than treating it as corruption.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] on any filesystem failure.
    pub async fn append_journal_line(&self, line: &[u8]) -> Result<(), StorageError> {
        let resolved = self.resolve(DataFile::Ledger);
        let mut handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)
            .await
            .context(format!("journal open failed: {}", resolved.display()))?;

        handle.write_all(line).await.context("journal append failed")?;
        handle.write_all(b"\n").await.context("journal append failed")?;
        handle.sync_all().await.context("journal sync failed")?;

        Ok(())
    }

    /// Reads the journal file and splits it into complete lines.
    ///
    /// If the file does not end with a trailing newline, the dangling final
    /// segment is a torn write from a crash mid-append; it is dropped and a
    /// warning is logged. Any non-last line is returned as-is for the caller
    /// to parse and verify — corruption in a committed line is the caller's
    /// concern, not this layer's.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] on any filesystem failure other than the
    /// journal simply not existing yet, in which case an empty vector is
    /// returned.
    pub async fn read_journal_lines(&self) -> Result<Vec<Vec<u8>>, StorageError> {
        let resolved = self.resolve(DataFile::Ledger);
        let data = match fs::read(&resolved).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("read {}", resolved.display()).into()),
                });
            }
        };

        if data.is_empty() {
            return Ok(Vec::new());
        }

        let ends_clean = data.last() == Some(&b'\n');
        let mut lines: Vec<Vec<u8>> =
            data.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect();

        if ends_clean {
            lines.pop(); // trailing empty segment after the final '\n'
        } else if let Some(torn) = lines.pop() {
            if !torn.is_empty() {
                warn!(bytes = torn.len(), "Dropping torn trailing journal line");
            }
        }

        Ok(lines)
    }

    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.inner.root).await;
    }

    async fn sync_dir(path: &Path) {
        match fs::File::open(path).await {
            Ok(dir) => {
                if let Err(err) = dir.sync_all().await {
                    warn!(path = %path.display(), error = %err, "Directory sync failed");
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Directory open failed");
            }
        }
    }
}

async fn replace_via_rename(temp: &Path, resolved: &Path) -> Result<(), StorageError> {
    if let Err(err) = fs::rename(temp, resolved).await {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            fs::remove_file(resolved)
                .await
                .context(format!("failed to replace existing file: {}", resolved.display()))?;
            fs::rename(temp, resolved).await.context(format!(
                "atomic swap failed: {} -> {}",
                temp.display(),
                resolved.display()
            ))?;
        } else {
            return Err(StorageError::Io {
                source: err,
                context: Some(
                    format!("atomic swap failed: {} -> {}", temp.display(), resolved.display()).into(),
                ),
            });
        }
    }
    Ok(())
}

fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("storage");
    let tmp_name = format!("{file_name}.lmvtmp.{counter}");
    target.with_file_name(tmp_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> (Storage, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let storage = Storage::builder().root(tmp.path()).create(true).connect().await.unwrap();
        (storage, tmp)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (storage, _tmp) = storage().await;
        storage.write_file(DataFile::Vault, b"envelope-bytes").await.unwrap();
        let data = storage.read_file(DataFile::Vault).await.unwrap();
        assert_eq!(data, b"envelope-bytes");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let (storage, _tmp) = storage().await;
        let result = storage.read_file(DataFile::Vault).await;
        assert!(matches!(result, Err(StorageError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn journal_append_and_read_round_trips() {
        let (storage, _tmp) = storage().await;
        storage.append_journal_line(b"{\"seq\":1}").await.unwrap();
        storage.append_journal_line(b"{\"seq\":2}").await.unwrap();

        let lines = storage.read_journal_lines().await.unwrap();
        assert_eq!(lines, vec![b"{\"seq\":1}".to_vec(), b"{\"seq\":2}".to_vec()]);
    }

    #[tokio::test]
    async fn journal_read_on_missing_file_is_empty() {
        let (storage, _tmp) = storage().await;
        let lines = storage.read_journal_lines().await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn journal_read_drops_torn_trailing_line() {
        let (storage, _tmp) = storage().await;
        storage.append_journal_line(b"{\"seq\":1}").await.unwrap();

        let path = storage.resolve(DataFile::Ledger);
        let mut raw = fs::read(&path).await.unwrap();
        raw.extend_from_slice(b"{\"seq\":2,\"torn\""); // no trailing newline
        fs::write(&path, &raw).await.unwrap();

        let lines = storage.read_journal_lines().await.unwrap();
        assert_eq!(lines, vec![b"{\"seq\":1}".to_vec()]);
    }

    #[tokio::test]
    async fn write_file_replaces_existing_contents() {
        let (storage, _tmp) = storage().await;
        storage.write_file(DataFile::Meta, b"v1").await.unwrap();
        storage.write_file(DataFile::Meta, b"v2").await.unwrap();
        assert_eq!(storage.read_file(DataFile::Meta).await.unwrap(), b"v2");
    }
}
