use rl_store::{KvIter, LedgerStore};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::PagingConfig;
use crate::error::{EngineError, EngineResult};

/// One query hit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryRecord {
    pub key: String,
    pub record: Value,
}

/// One page of query results.
///
/// `records_count == 0` is the authoritative end-of-results signal; the
/// bookmark alone is not.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub records: Vec<QueryRecord>,
    pub records_count: usize,
    pub next_bookmark: String,
}

/// Runs selector queries against a ledger transaction and attaches
/// pagination metadata. Results keep store order.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryPaginator {
    paging: PagingConfig,
}

impl QueryPaginator {
    pub fn new(paging: PagingConfig) -> Self {
        Self { paging }
    }

    pub fn paging(&self) -> PagingConfig {
        self.paging
    }

    /// One page of at most `page_size` results after `bookmark`.
    pub fn query(
        &self,
        store: &dyn LedgerStore,
        selector: &str,
        page_size: u32,
        bookmark: &str,
    ) -> EngineResult<Page> {
        let size = self.paging.resolve(page_size);
        let (iter, meta) = store.rich_query_paged(selector, size, bookmark)?;
        let records = collect(iter)?;
        debug!(
            requested = page_size,
            size,
            fetched = meta.fetched_count,
            "paged query"
        );
        Ok(Page {
            records_count: records.len(),
            records,
            next_bookmark: meta.bookmark,
        })
    }

    /// Every result of `selector`, unpaged.
    pub fn query_all(
        &self,
        store: &dyn LedgerStore,
        selector: &str,
    ) -> EngineResult<Vec<QueryRecord>> {
        collect(store.rich_query(selector)?)
    }

    /// Iterator over successive pages, following bookmarks until an empty
    /// page. The empty page itself is not yielded.
    pub fn pages<'a>(
        &self,
        store: &'a dyn LedgerStore,
        selector: impl Into<String>,
        page_size: u32,
    ) -> Pages<'a> {
        Pages {
            paginator: *self,
            store,
            selector: selector.into(),
            page_size,
            bookmark: String::new(),
            done: false,
        }
    }
}

fn collect(iter: KvIter<'_>) -> EngineResult<Vec<QueryRecord>> {
    iter.map(|kv| -> EngineResult<QueryRecord> {
        let kv = kv?;
        let record = serde_json::from_slice(&kv.value).map_err(|e| {
            EngineError::MalformedInput(format!("stored value under {}: {e}", kv.key))
        })?;
        Ok(QueryRecord {
            key: kv.key,
            record,
        })
    })
    .collect()
}

/// See [`QueryPaginator::pages`].
pub struct Pages<'a> {
    paginator: QueryPaginator,
    store: &'a dyn LedgerStore,
    selector: String,
    page_size: u32,
    bookmark: String,
    done: bool,
}

impl Iterator for Pages<'_> {
    type Item = EngineResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .paginator
            .query(self.store, &self.selector, self.page_size, &self.bookmark)
        {
            Ok(page) if page.records_count == 0 => {
                self.done = true;
                None
            }
            Ok(page) => {
                self.bookmark = page.next_bookmark.clone();
                Some(Ok(page))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
