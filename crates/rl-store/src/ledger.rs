use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rl_types::{LedgerTimestamp, TxId};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::{StoreError, StoreResult};
use crate::query::QueryDoc;
use crate::traits::{HistoryIter, HistoryRecord, KeyValue, KvIter, LedgerStore, PageMeta};
use crate::wal::{LedgerWrite, SyncMode, WriteAheadLog};

/// Reference ledger: sorted current state plus append-only per-key history.
///
/// State is held in memory behind an `RwLock`. When opened with a path,
/// every write is first appended to a [`WriteAheadLog`] and the log is
/// replayed on the next open.
pub struct StateLedger {
    inner: RwLock<LedgerState>,
    wal: Option<WriteAheadLog>,
}

#[derive(Default)]
struct LedgerState {
    current: BTreeMap<String, Vec<u8>>,
    history: HashMap<String, Vec<HistoryRecord>>,
}

impl LedgerState {
    fn apply(&mut self, write: LedgerWrite) {
        let is_delete = write.value.is_none();
        let value = match write.value {
            Some(value) => {
                self.current.insert(write.key.clone(), value.clone());
                value
            }
            None => {
                self.current.remove(&write.key);
                Vec::new()
            }
        };
        self.history.entry(write.key).or_default().push(HistoryRecord {
            tx_id: write.tx_id,
            value,
            timestamp: write.timestamp,
            is_delete,
        });
    }
}

impl StateLedger {
    /// An empty, non-durable ledger.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            wal: None,
        }
    }

    /// Open a ledger as described by `config`.
    pub fn open(config: &LedgerConfig) -> StoreResult<Self> {
        match &config.path {
            Some(path) => Self::open_path(path, config.sync),
            None => Ok(Self::in_memory()),
        }
    }

    /// Open (or create) a durable ledger backed by the log at `path`,
    /// replaying every recovered write.
    pub fn open_path(path: &Path, sync: SyncMode) -> StoreResult<Self> {
        let wal = WriteAheadLog::open(path, sync)?;
        let mut state = LedgerState::default();
        let recovery = wal.recover()?;
        if recovery.end < wal.offset() {
            wal.truncate(recovery.end)?;
        }
        let replayed = recovery.writes.len();
        for write in recovery.writes {
            state.apply(write);
        }
        info!(path = %path.display(), replayed, keys = state.current.len(), "ledger opened");
        Ok(Self {
            inner: RwLock::new(state),
            wal: Some(wal),
        })
    }

    /// Start a transaction stamped with the current time.
    pub fn begin(&self) -> LedgerTx<'_> {
        self.begin_at(LedgerTimestamp::now())
    }

    /// Start a transaction stamped with `timestamp`.
    pub fn begin_at(&self, timestamp: LedgerTimestamp) -> LedgerTx<'_> {
        let tx_id = TxId::derive(timestamp);
        debug!(tx = %tx_id.short(), "transaction started");
        LedgerTx {
            ledger: self,
            tx_id,
            timestamp,
        }
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.current.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, LedgerState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, LedgerState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn commit(&self, write: LedgerWrite) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(wal) = &self.wal {
            wal.append(&write)?;
        }
        state.apply(write);
        Ok(())
    }
}

impl Default for StateLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for StateLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLedger")
            .field("key_count", &self.len())
            .field("wal", &self.wal)
            .finish()
    }
}

/// One transaction against a [`StateLedger`].
///
/// Writes are applied as they are made, so reads through the same handle
/// observe them.
pub struct LedgerTx<'a> {
    ledger: &'a StateLedger,
    tx_id: TxId,
    timestamp: LedgerTimestamp,
}

impl LedgerTx<'_> {
    fn write(&self, key: &str, value: Option<Vec<u8>>) -> StoreResult<()> {
        self.ledger.commit(LedgerWrite {
            tx_id: self.tx_id.clone(),
            timestamp: self.timestamp,
            key: key.to_string(),
            value,
        })
    }
}

impl LedgerStore for LedgerTx<'_> {
    fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> LedgerTimestamp {
        self.timestamp
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.ledger.read()?.current.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.write(key, Some(value.to_vec()))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        if !self.exists(key)? {
            return Ok(());
        }
        self.write(key, None)
    }

    fn rich_query(&self, query: &str) -> StoreResult<KvIter<'_>> {
        let doc = QueryDoc::parse(query)?;
        let state = self.ledger.read()?;
        let matched: Vec<KeyValue> = state
            .current
            .iter()
            .filter(|(_, value)| matches_doc(&doc, value))
            .skip(doc.skip)
            .take(doc.limit.unwrap_or(usize::MAX))
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        Ok(Box::new(matched.into_iter().map(Ok)))
    }

    fn rich_query_paged(
        &self,
        query: &str,
        page_size: u32,
        bookmark: &str,
    ) -> StoreResult<(KvIter<'_>, PageMeta)> {
        if page_size == 0 {
            return Err(StoreError::ZeroPageSize);
        }
        // Page size and bookmark govern paged queries; limit/skip are ignored.
        let doc = QueryDoc::parse(query)?;
        let start = decode_bookmark(bookmark)?;
        let lower = match &start {
            Some(key) => Bound::Excluded(key.as_str()),
            None => Bound::Unbounded,
        };

        let state = self.ledger.read()?;
        let page: Vec<KeyValue> = state
            .current
            .range::<str, _>((lower, Bound::Unbounded))
            .filter(|(_, value)| matches_doc(&doc, value))
            .take(page_size as usize)
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        let meta = PageMeta {
            fetched_count: page.len(),
            bookmark: match page.last() {
                Some(last) => hex::encode(last.key.as_bytes()),
                None => bookmark.to_string(),
            },
        };
        Ok((Box::new(page.into_iter().map(Ok)), meta))
    }

    fn history(&self, key: &str) -> StoreResult<HistoryIter<'_>> {
        let records = self
            .ledger
            .read()?
            .history
            .get(key)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(records.into_iter().map(Ok)))
    }
}

/// Values that are not JSON never match a selector.
fn matches_doc(doc: &QueryDoc, value: &[u8]) -> bool {
    serde_json::from_slice::<Value>(value)
        .map(|json| doc.selector.matches(&json))
        .unwrap_or(false)
}

fn decode_bookmark(bookmark: &str) -> StoreResult<Option<String>> {
    if bookmark.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(bookmark).map_err(|e| StoreError::InvalidBookmark(e.to_string()))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| StoreError::InvalidBookmark(e.to_string()))
}
