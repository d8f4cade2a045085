//! Atomic on-disk persistence for the vault's fixed three-file layout.
//!
//! # Core Features
//!
//! - **Atomic Writes**: Uses an "atomic swap" pattern (unique temp write +
//!   `fsync` + `rename`) so `vault.enc` and `meta.json` are never observed
//!   partially written.
//! - **Durable Append**: `ledger.jsonl.enc` is appended to directly and
//!   `fsync`'d after each line; a crash mid-append leaves at most one torn
//!   trailing line, which readers are expected to discard.
//! - **Self-Healing**: Automatically identifies and cleans up orphaned
//!   temporary files left by a crash during a previous write.
//!
//! # Examples
//!
//! ```rust
//! use lmv_storage::{DataFile, Storage, StorageError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("data");
//!     let storage = Storage::builder().root(&root).create(true).connect().await?;
//!
//!     storage.write_file(DataFile::Meta, b"{}").await?;
//!     let data = storage.read_file(DataFile::Meta).await?;
//!     assert_eq!(data, b"{}");
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod engine;
mod error;
mod maintenance;

pub use builder::StorageBuilder;
pub use engine::{DataFile, Storage};
pub use error::{StorageError, StorageErrorExt};
