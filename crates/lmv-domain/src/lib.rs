//! # Domain Models
//!
//! Pure domain types with minimal dependencies (`serde`, `serde_json`).
//! Keep it lean: no I/O, networking, or heavy logic — just data and simple
//! helpers describing memory, snapshots, journal entries, and configuration.

pub mod config;
pub mod memory;

pub use config::ApiConfig;
pub use memory::{JournalEntry, Memory, Metadata, Snapshot};
