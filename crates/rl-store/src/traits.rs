use rl_types::{LedgerTimestamp, TxId};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// One `{key, value}` pair returned by a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// One raw entry of a key's mutation log.
///
/// For deletes `value` is empty and `is_delete` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub tx_id: TxId,
    pub value: Vec<u8>,
    pub timestamp: LedgerTimestamp,
    pub is_delete: bool,
}

/// Pagination metadata returned alongside a paged query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub fetched_count: usize,
    pub bookmark: String,
}

pub type KvIter<'a> = Box<dyn Iterator<Item = StoreResult<KeyValue>> + 'a>;
pub type HistoryIter<'a> = Box<dyn Iterator<Item = StoreResult<HistoryRecord>> + 'a>;

/// One ledger transaction, as seen by the record engine.
///
/// Implementations must satisfy these invariants:
/// - Every call is synchronous; it either returns or fails.
/// - `put` and `delete` are visible to subsequent reads through the same
///   handle.
/// - Query iterators yield records in store order; callers do not re-sort.
/// - `history` yields every write to the key in write order, including
///   deletes as tombstones.
/// - The store never interprets values beyond what selector evaluation
///   requires.
pub trait LedgerStore {
    /// Identifier of the transaction this handle writes under.
    fn tx_id(&self) -> &TxId;

    /// Timestamp of the transaction this handle writes under.
    fn tx_timestamp(&self) -> LedgerTimestamp;

    /// Read the current value of `key`. `Ok(None)` if absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any current value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`, leaving a tombstone in its history.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Run a selector query over all current values.
    fn rich_query(&self, query: &str) -> StoreResult<KvIter<'_>>;

    /// Run a selector query returning at most `page_size` results, starting
    /// after `bookmark` (empty = from the beginning).
    fn rich_query_paged(
        &self,
        query: &str,
        page_size: u32,
        bookmark: &str,
    ) -> StoreResult<(KvIter<'_>, PageMeta)>;

    /// Full mutation log of `key`.
    fn history(&self, key: &str) -> StoreResult<HistoryIter<'_>>;

    /// Whether `key` currently holds a value.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
