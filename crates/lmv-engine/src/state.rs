use lmv_domain::{JournalEntry, Memory};
use serde::Serialize;

/// Assembled current state: memory folded forward from the snapshot through
/// every subsequent journal entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateView {
    pub memory: Memory,
    pub snapshot_cursor: u64,
    pub ledger_cursor: u64,
}

impl StateView {
    #[must_use]
    pub fn etag(&self) -> String {
        format!("\"v{}\"", self.memory.version)
    }
}

/// One page of the journal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerPage {
    pub entries: Vec<JournalEntry>,
    pub next_cursor: u64,
    pub has_more: bool,
    pub snapshot_cursor: u64,
    pub ledger_cursor: u64,
}

/// Result of a successful compaction.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SnapshotResult {
    pub snapshot_cursor: u64,
    pub ledger_cursor: u64,
    pub memory_version: u64,
}

/// Result of a successful patch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatchOutcome {
    pub state: StateView,
    pub applied_cursor: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn etag_formats_as_quoted_v_prefixed_version() {
        let view = StateView {
            memory: Memory { version: 7, blocks: Map::new(), updated_at: String::new() },
            snapshot_cursor: 0,
            ledger_cursor: 7,
        };
        assert_eq!(view.etag(), "\"v7\"");
    }
}
