use rl_store::{HistoryIter, HistoryRecord, LedgerStore};
use rl_types::TxId;
use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// One historical version of a record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub tx_id: TxId,
    /// `None` for deletions.
    pub value: Option<Value>,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub is_delete: bool,
}

impl HistoryEntry {
    fn from_raw(raw: HistoryRecord) -> Self {
        let value = if raw.is_delete {
            None
        } else {
            let parsed = serde_json::from_slice(&raw.value).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&raw.value).into_owned())
            });
            Some(parsed)
        };
        Self {
            tx_id: raw.tx_id,
            value,
            timestamp: raw.timestamp.to_rfc3339(),
            is_delete: raw.is_delete,
        }
    }
}

/// Turns a key's raw mutation log into typed entries.
///
/// Each call re-opens the full history; the returned iterator is lazy and
/// cannot be resumed.
#[derive(Clone, Copy, Debug, Default)]
pub struct HistoryReconstructor;

impl HistoryReconstructor {
    pub fn history<'a>(&self, store: &'a dyn LedgerStore, id: &str) -> EngineResult<Entries<'a>> {
        Ok(Entries {
            inner: store.history(id)?,
        })
    }

    pub fn collect(&self, store: &dyn LedgerStore, id: &str) -> EngineResult<Vec<HistoryEntry>> {
        self.history(store, id)?.collect()
    }
}

/// Lazy iterator returned by [`HistoryReconstructor::history`].
pub struct Entries<'a> {
    inner: HistoryIter<'a>,
}

impl Iterator for Entries<'_> {
    type Item = EngineResult<HistoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.inner.next()?;
        Some(raw.map(HistoryEntry::from_raw).map_err(EngineError::from))
    }
}
