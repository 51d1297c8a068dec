//! Look-aside index answering "when did this address first transact on
//! Bitcoin", used by the empty-address dispenser rule.
//!
//! The data cannot be derived from the ledger itself, so it ships as a
//! snapshot file keyed `"{address}-{height}"` mapping to the block index
//! of the address's oldest confirmed transaction.

use crate::errors::AppResult;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
struct OldestTxEntry {
    #[serde(default)]
    block_index: Option<u32>,
}

/// Immutable snapshot of oldest-transaction lookups.
#[derive(Debug, Clone, Default)]
pub struct OldestTxIndex {
    entries: HashMap<String, OldestTxEntry>,
}

impl OldestTxIndex {
    /// An empty index: every lookup misses, which disables the
    /// confirmed-bitcoin-txs arm of the empty-address rule.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load_from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, OldestTxEntry> = serde_json::from_str(&raw)?;
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn from_entries(entries: &[(&str, u32, u32)]) -> Self {
        let entries = entries
            .iter()
            .map(|(address, height, block_index)| {
                (
                    format!("{address}-{height}"),
                    OldestTxEntry {
                        block_index: Some(*block_index),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Block index of the oldest confirmed transaction of `address`, as
    /// snapshotted at `height`. `None` when the snapshot has no entry.
    pub fn get(&self, address: &str, height: u32) -> Option<u32> {
        self.entries
            .get(&format!("{address}-{height}"))
            .and_then(|entry| entry.block_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_hits_and_misses() {
        let index = OldestTxIndex::from_entries(&[("addr1", 700_000, 650_123)]);
        assert_eq!(index.get("addr1", 700_000), Some(650_123));
        assert_eq!(index.get("addr1", 700_001), None);
        assert_eq!(index.get("addr2", 700_000), None);
    }

    #[test]
    fn test_empty_index() {
        assert_eq!(OldestTxIndex::empty().get("addr", 1), None);
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("get_oldest_tx.json");
        std::fs::write(
            &path,
            r#"{"addr-100": {"block_index": 90}, "other-100": {}}"#,
        )
        .unwrap();

        let index = OldestTxIndex::load_from_file(&path).unwrap();
        assert_eq!(index.get("addr", 100), Some(90));
        assert_eq!(index.get("other", 100), None);
    }
}
