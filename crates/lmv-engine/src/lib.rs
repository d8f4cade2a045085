//! The vault engine: state assembly, optimistic-concurrency patching,
//! hash-chained journaling, and snapshot compaction.
//!
//! Everything here is storage- and transport-agnostic: [`Engine`] owns an
//! [`lmv_storage::Storage`] handle and an [`lmv_vault::Vault`], and exposes
//! the handful of operations the request surface needs. It knows nothing
//! about HTTP, bearer tokens, or JSON wire framing beyond the patch body and
//! journal entry shapes themselves.

mod aad;
mod engine;
mod error;
mod rotation;
mod state;

pub use engine::Engine;
pub use error::{EngineError, EngineErrorExt};
pub use state::{LedgerPage, PatchOutcome, SnapshotResult, StateView};
