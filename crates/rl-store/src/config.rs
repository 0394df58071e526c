use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::wal::SyncMode;

/// Where and how the ledger keeps its state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Write-ahead log path. `None` keeps the ledger in memory only.
    pub path: Option<PathBuf>,
    pub sync: SyncMode,
}

impl LedgerConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            sync: SyncMode::default(),
        }
    }
}
