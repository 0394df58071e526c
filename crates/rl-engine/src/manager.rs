use std::sync::Arc;

use rl_store::LedgerStore;
use rl_types::{Record, RecordSchema, TxId, CREATOR_FIELD, KIND_FIELD, UPDATED_BY_FIELD};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::PagingConfig;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::events::{self, EventSink};
use crate::history::{Entries, HistoryReconstructor};
use crate::identity::{caller_or_unknown, IdentityResolver};
use crate::paginate::{Page, Pages, QueryPaginator, QueryRecord};
use crate::validator::{RecordValidator, Verdict};

/// Result of a successful create.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub tx_id: TxId,
    pub id: String,
    pub record: Record,
}

/// Result of a successful status update.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Updated {
    pub tx_id: TxId,
    pub record: Record,
}

/// Why one element of a bulk call was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub index: usize,
    /// Empty when no id could be read from the element.
    pub id: String,
    pub error: ErrorKind,
    pub message: String,
}

/// Summary of a bulk call. Accepted elements stay written regardless of
/// later rejections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub accepted_count: usize,
    pub rejected_ids: Vec<String>,
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    fn reject(&mut self, index: usize, id: String, err: &EngineError) {
        self.rejected_ids.push(id.clone());
        self.failures.push(BulkFailure {
            index,
            id,
            error: err.kind(),
            message: err.to_string(),
        });
    }
}

/// How a status update addresses its record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateTarget {
    Id(String),
    /// First record of this kind whose `field` equals `value`.
    Lookup { field: String, value: String },
}

/// Create, update, and read records of one kind.
///
/// The manager owns all stamping: `kind`, `creator`, `updatedBy` and the
/// update timestamp. Every method runs against the transaction handle it is
/// given and never spans two transactions.
pub struct RecordManager {
    schema: Arc<RecordSchema>,
    validator: RecordValidator,
    identity: Arc<dyn IdentityResolver>,
    events: Arc<dyn EventSink>,
    paginator: QueryPaginator,
}

impl RecordManager {
    pub fn new(
        schema: Arc<RecordSchema>,
        identity: Arc<dyn IdentityResolver>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            validator: RecordValidator::new(schema.clone()),
            schema,
            identity,
            events,
            paginator: QueryPaginator::default(),
        }
    }

    pub fn with_paging(mut self, paging: PagingConfig) -> Self {
        self.paginator = QueryPaginator::new(paging);
        self
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn kind(&self) -> &str {
        &self.schema.kind
    }

    // ---- create ----

    pub fn create(&self, store: &dyn LedgerStore, raw: &[u8]) -> EngineResult<Created> {
        let record = self.parse(raw)?;
        let event = events::create_event(&self.schema.event_tag());
        self.create_record(store, record, &event)
    }

    /// Create every element of a JSON array in order. Failures are
    /// collected per element; nothing is rolled back.
    pub fn create_bulk(&self, store: &dyn LedgerStore, raw: &[u8]) -> EngineResult<BulkOutcome> {
        let items = parse_array(raw)?;
        let event = events::bulk_create_event(&self.schema.event_tag());
        let mut outcome = BulkOutcome::default();

        for (index, item) in items.into_iter().enumerate() {
            let id = self.id_of(&item);
            let result = Record::from_value(item)
                .map_err(EngineError::from)
                .and_then(|r| self.check_types(r))
                .and_then(|r| self.create_record(store, r, &event));
            match result {
                Ok(_) => outcome.accepted_count += 1,
                Err(e) => {
                    warn!(kind = %self.schema.kind, index, id = %id, error = %e, "bulk create rejected element");
                    outcome.reject(index, id, &e);
                }
            }
        }
        info!(
            kind = %self.schema.kind,
            accepted = outcome.accepted_count,
            rejected = outcome.rejected_ids.len(),
            "bulk create"
        );
        Ok(outcome)
    }

    fn create_record(
        &self,
        store: &dyn LedgerStore,
        mut record: Record,
        event: &str,
    ) -> EngineResult<Created> {
        let id_field = self.schema.id_field.as_str();
        let id = record.text_or_empty(id_field).to_string();
        if id.trim().is_empty() {
            return Err(EngineError::ValidationFailed(format!("{id_field} is mandatory")));
        }
        if store.get(&id)?.is_some() {
            return Err(EngineError::DuplicateKey { id });
        }

        let caller = caller_or_unknown(self.identity.as_ref());
        record.set(KIND_FIELD, self.schema.kind.as_str());
        record.set(CREATOR_FIELD, caller.as_str());
        record.set(UPDATED_BY_FIELD, caller);
        let created = record
            .text_or_empty(&self.schema.timestamps.created)
            .to_string();
        record.set(self.schema.timestamps.updated.as_str(), created);

        if let Verdict::Fail { reason, .. } = self.validator.validate(&record) {
            return Err(EngineError::ValidationFailed(reason));
        }

        let bytes = record.to_bytes()?;
        store.put(&id, &bytes)?;
        info!(kind = %self.schema.kind, id = %id, tx = %store.tx_id().short(), "record created");
        self.emit(event, &bytes)?;

        Ok(Created {
            tx_id: store.tx_id().clone(),
            id,
            record,
        })
    }

    // ---- update ----

    /// Overlay the non-empty mutable fields of `raw` onto the stored record.
    pub fn update_status(
        &self,
        store: &dyn LedgerStore,
        target: &UpdateTarget,
        raw: &[u8],
    ) -> EngineResult<Updated> {
        let input = self.parse(raw)?;
        let event = events::update_event(&self.schema.event_tag());
        self.update_record(store, target, &input, &event)
    }

    /// Status update addressed by the body itself: its id, or the kind's
    /// lookup field when the id is empty.
    pub fn update_status_addressed(
        &self,
        store: &dyn LedgerStore,
        raw: &[u8],
    ) -> EngineResult<Updated> {
        let input = self.parse(raw)?;
        let target = self.target_of(&input)?;
        let event = events::update_event(&self.schema.event_tag());
        self.update_record(store, &target, &input, &event)
    }

    /// Apply every element of a JSON array as a status update. Elements are
    /// addressed by id, or by the kind's lookup field when the id is empty.
    pub fn update_status_bulk(
        &self,
        store: &dyn LedgerStore,
        raw: &[u8],
    ) -> EngineResult<BulkOutcome> {
        let items = parse_array(raw)?;
        let event = events::bulk_update_event(&self.schema.event_tag());
        let mut outcome = BulkOutcome::default();

        for (index, item) in items.into_iter().enumerate() {
            let id = self.id_of(&item);
            let result = Record::from_value(item)
                .map_err(EngineError::from)
                .and_then(|r| self.check_types(r))
                .and_then(|input| {
                    let target = self.target_of(&input)?;
                    self.update_record(store, &target, &input, &event)
                });
            match result {
                Ok(_) => outcome.accepted_count += 1,
                Err(e) => {
                    warn!(kind = %self.schema.kind, index, id = %id, error = %e, "bulk update rejected element");
                    outcome.reject(index, id, &e);
                }
            }
        }
        info!(
            kind = %self.schema.kind,
            accepted = outcome.accepted_count,
            rejected = outcome.rejected_ids.len(),
            "bulk update"
        );
        Ok(outcome)
    }

    fn target_of(&self, input: &Record) -> EngineResult<UpdateTarget> {
        let id_field = self.schema.id_field.as_str();
        let id = input.text_or_empty(id_field);
        if !id.trim().is_empty() {
            return Ok(UpdateTarget::Id(id.to_string()));
        }
        if let Some(field) = &self.schema.lookup {
            let value = input.text_or_empty(field);
            if !value.trim().is_empty() {
                return Ok(UpdateTarget::Lookup {
                    field: field.clone(),
                    value: value.to_string(),
                });
            }
        }
        Err(EngineError::ValidationFailed(format!("{id_field} is mandatory")))
    }

    fn update_record(
        &self,
        store: &dyn LedgerStore,
        target: &UpdateTarget,
        input: &Record,
        event: &str,
    ) -> EngineResult<Updated> {
        let (key, mut record) = self.resolve(store, target)?;

        for field in &self.schema.mutable {
            if self.is_protected(field) {
                continue;
            }
            if let Some(value) = input.text(field)? {
                if !value.trim().is_empty() {
                    record.set(field.as_str(), value);
                }
            }
        }

        let updated_field = self.schema.timestamps.updated.as_str();
        let updated = match input.text(updated_field)? {
            Some(v) if !v.trim().is_empty() => v.to_string(),
            _ => store.tx_timestamp().seconds.to_string(),
        };
        record.set(updated_field, updated);
        record.set(UPDATED_BY_FIELD, caller_or_unknown(self.identity.as_ref()));

        if let Verdict::Fail { reason, .. } = self.validator.validate(&record) {
            return Err(EngineError::ValidationFailed(reason));
        }

        let bytes = record.to_bytes()?;
        store.put(&key, &bytes)?;
        info!(kind = %self.schema.kind, id = %key, tx = %store.tx_id().short(), "record updated");
        self.emit(event, &bytes)?;

        Ok(Updated {
            tx_id: store.tx_id().clone(),
            record,
        })
    }

    /// Fields an update never touches, whatever the schema lists as mutable.
    fn is_protected(&self, field: &str) -> bool {
        field == self.schema.id_field
            || field == self.schema.timestamps.created
            || field == self.schema.timestamps.updated
            || field == KIND_FIELD
            || field == CREATOR_FIELD
            || field == UPDATED_BY_FIELD
    }

    fn resolve(
        &self,
        store: &dyn LedgerStore,
        target: &UpdateTarget,
    ) -> EngineResult<(String, Record)> {
        match target {
            UpdateTarget::Id(id) => Ok((id.clone(), self.get(store, id)?)),
            UpdateTarget::Lookup { field, value } => {
                let allowed = self.schema.lookup.as_deref() == Some(field.as_str())
                    || *field == self.schema.id_field;
                if !allowed {
                    return Err(EngineError::MalformedInput(format!(
                        "{} records cannot be addressed by {field}",
                        self.schema.kind
                    )));
                }
                let selector = json!({ field.as_str(): value }).to_string();
                let hit = self
                    .query_all(store, &selector)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| EngineError::not_found(&self.schema.kind, value))?;
                debug!(kind = %self.schema.kind, field = %field, key = %hit.key, "lookup resolved");
                Ok((hit.key, Record::from_value(hit.record)?))
            }
        }
    }

    // ---- reads ----

    /// Current value of `id`. A value of another kind reads as not found.
    pub fn get(&self, store: &dyn LedgerStore, id: &str) -> EngineResult<Record> {
        let bytes = store
            .get(id)?
            .ok_or_else(|| EngineError::not_found(&self.schema.kind, id))?;
        let record = Record::from_slice(&bytes)?;
        if record.kind() != self.schema.kind {
            debug!(id, found = record.kind(), expected = %self.schema.kind, "kind mismatch");
            return Err(EngineError::not_found(&self.schema.kind, id));
        }
        Ok(record)
    }

    /// One page of records of this kind matching `selector`.
    pub fn query(
        &self,
        store: &dyn LedgerStore,
        selector: &str,
        page_size: u32,
        bookmark: &str,
    ) -> EngineResult<Page> {
        let scoped = self.scope(selector)?;
        self.paginator.query(store, &scoped, page_size, bookmark)
    }

    /// Every record of this kind matching `selector`.
    pub fn query_all(
        &self,
        store: &dyn LedgerStore,
        selector: &str,
    ) -> EngineResult<Vec<QueryRecord>> {
        let scoped = self.scope(selector)?;
        self.paginator.query_all(store, &scoped)
    }

    pub fn pages<'a>(
        &self,
        store: &'a dyn LedgerStore,
        selector: &str,
        page_size: u32,
    ) -> EngineResult<Pages<'a>> {
        let scoped = self.scope(selector)?;
        Ok(self.paginator.pages(store, scoped, page_size))
    }

    /// Full mutation history of `id`.
    pub fn history<'a>(&self, store: &'a dyn LedgerStore, id: &str) -> EngineResult<Entries<'a>> {
        HistoryReconstructor.history(store, id)
    }

    // ---- helpers ----

    fn parse(&self, raw: &[u8]) -> EngineResult<Record> {
        self.check_types(Record::from_slice(raw)?)
    }

    fn check_types(&self, record: Record) -> EngineResult<Record> {
        record.ensure_text_fields(self.schema.declared_fields())?;
        Ok(record)
    }

    /// The element's id for reporting. Non-string ids are rendered as JSON.
    fn id_of(&self, item: &Value) -> String {
        match item.get(&self.schema.id_field) {
            Some(Value::String(id)) => id.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        }
    }

    fn emit(&self, event: &str, payload: &[u8]) -> EngineResult<()> {
        self.events.emit(event, payload).map_err(|e| {
            warn!(event, error = %e, "event emission failed after write");
            EngineError::EventEmissionFailure {
                event: event.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Restrict a selector, bare or wrapped in a query document, to this
    /// kind. Limit and skip of a query document are kept.
    fn scope(&self, selector: &str) -> EngineResult<String> {
        let parsed: Value = if selector.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(selector)
                .map_err(|e| EngineError::MalformedInput(format!("selector: {e}")))?
        };
        let Value::Object(mut doc) = parsed else {
            return Err(EngineError::MalformedInput(
                "selector must be a JSON object".into(),
            ));
        };
        let kind_clause = json!({ KIND_FIELD: self.schema.kind });
        if let Some(inner) = doc.remove("selector") {
            doc.insert("selector".into(), json!({ "$and": [kind_clause, inner] }));
            Ok(Value::Object(doc).to_string())
        } else {
            Ok(json!({ "$and": [kind_clause, Value::Object(doc)] }).to_string())
        }
    }
}

impl std::fmt::Debug for RecordManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordManager")
            .field("kind", &self.schema.kind)
            .field("rules", &self.schema.rules.len())
            .field("paging", &self.paginator.paging())
            .finish()
    }
}

fn parse_array(raw: &[u8]) -> EngineResult<Vec<Value>> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(EngineError::MalformedInput(
            "expected a JSON array of records".into(),
        )),
        Err(e) => Err(EngineError::MalformedInput(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use rl_store::{HistoryIter, KvIter, PageMeta, StateLedger, StoreError, StoreResult};
    use rl_types::LedgerTimestamp;

    use crate::events::EventLog;
    use crate::identity::{AnonymousIdentity, StaticIdentity, UNKNOWN_CALLER};
    use crate::kinds;

    struct Fixture {
        ledger: StateLedger,
        events: Arc<EventLog>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ledger: StateLedger::in_memory(),
                events: Arc::new(EventLog::new()),
            }
        }

        fn manager(&self, schema: RecordSchema, caller: &str) -> RecordManager {
            RecordManager::new(
                Arc::new(schema),
                Arc::new(StaticIdentity::new(caller)),
                self.events.clone(),
            )
        }

        fn headers(&self) -> RecordManager {
            self.manager(kinds::header(), "alice")
        }
    }

    fn header_json(id: &str) -> Value {
        json!({
            "id": id,
            "entity": "E1",
            "name": "CLI1",
            "type": "T",
            "category": "8",
            "created": "100"
        })
    }

    fn bytes(v: &Value) -> Vec<u8> {
        serde_json::to_vec(v).unwrap()
    }

    /// Delegates to a real transaction but fails `put` for chosen keys.
    struct FailingPuts<'a> {
        inner: rl_store::LedgerTx<'a>,
        keys: HashSet<String>,
    }

    impl LedgerStore for FailingPuts<'_> {
        fn tx_id(&self) -> &TxId {
            self.inner.tx_id()
        }
        fn tx_timestamp(&self) -> LedgerTimestamp {
            self.inner.tx_timestamp()
        }
        fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }
        fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
            if self.keys.contains(key) {
                return Err(StoreError::Backend(format!("put {key} refused")));
            }
            self.inner.put(key, value)
        }
        fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key)
        }
        fn rich_query(&self, query: &str) -> StoreResult<KvIter<'_>> {
            self.inner.rich_query(query)
        }
        fn rich_query_paged(
            &self,
            query: &str,
            page_size: u32,
            bookmark: &str,
        ) -> StoreResult<(KvIter<'_>, PageMeta)> {
            self.inner.rich_query_paged(query, page_size, bookmark)
        }
        fn history(&self, key: &str) -> StoreResult<HistoryIter<'_>> {
            self.inner.history(key)
        }
    }

    // ---- create ----

    #[test]
    fn create_stamps_and_persists() {
        let fx = Fixture::new();
        let m = fx.headers();
        let tx = fx.ledger.begin();
        let mut input = header_json("H1");
        input["creator"] = json!("mallory");
        input["kind"] = json!("consent");

        let created = m.create(&tx, &bytes(&input)).unwrap();
        assert_eq!(created.id, "H1");
        assert_eq!(&created.tx_id, tx.tx_id());
        let r = &created.record;
        assert_eq!(r.kind(), "header");
        assert_eq!(r.text_or_empty("creator"), "alice");
        assert_eq!(r.text_or_empty("updatedBy"), "alice");
        assert_eq!(r.text_or_empty("updated"), "100");

        let stored = Record::from_slice(&tx.get("H1").unwrap().unwrap()).unwrap();
        assert_eq!(&stored, r);
        assert_eq!(fx.events.names(), vec!["CREATE_HEADER"]);
        assert_eq!(fx.events.events()[0].payload, r.to_bytes().unwrap());
    }

    #[test]
    fn duplicate_create_fails_without_writing() {
        let fx = Fixture::new();
        let m = fx.headers();
        m.create(&fx.ledger.begin(), &bytes(&header_json("H1"))).unwrap();

        let mut second = header_json("H1");
        second["name"] = json!("OTHER");
        let err = m.create(&fx.ledger.begin(), &bytes(&second)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateKey { ref id } if id == "H1"));

        let tx = fx.ledger.begin();
        assert_eq!(m.get(&tx, "H1").unwrap().text_or_empty("name"), "CLI1");
        assert_eq!(tx.history("H1").unwrap().count(), 1);
        assert_eq!(fx.events.len(), 1);
    }

    #[test]
    fn validation_failure_writes_nothing() {
        let fx = Fixture::new();
        let m = fx.headers();
        let tx = fx.ledger.begin();
        let mut input = header_json("H1");
        input["category"] = json!("9");
        let err = m.create(&tx, &bytes(&input)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert!(err.to_string().contains("category '9'"));
        assert!(!tx.exists("H1").unwrap());
        assert!(fx.events.is_empty());
    }

    #[test]
    fn every_missing_mandatory_field_is_reported() {
        let fx = Fixture::new();
        let m = fx.headers();
        for field in ["entity", "name", "type", "category", "created"] {
            let mut input = header_json("H1");
            input.as_object_mut().unwrap().remove(field);
            let err = m.create(&fx.ledger.begin(), &bytes(&input)).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("validation failed: {field} is mandatory")
            );
        }
        assert!(fx.ledger.is_empty());
    }

    #[test]
    fn empty_id_fails_before_store_access() {
        let fx = Fixture::new();
        let m = fx.headers();
        let tx = FailingPuts {
            inner: fx.ledger.begin(),
            keys: HashSet::from([String::new()]),
        };
        let err = m.create(&tx, &bytes(&header_json(""))).unwrap_err();
        assert_eq!(err.to_string(), "validation failed: id is mandatory");
    }

    #[test]
    fn malformed_input() {
        let fx = Fixture::new();
        let m = fx.headers();
        let tx = fx.ledger.begin();
        let inputs: [&[u8]; 3] = [b"{nope", b"[1]", br#"{"id":"H1","category":8}"#];
        for raw in inputs {
            let err = m.create(&tx, raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedInput, "{raw:?}");
        }
    }

    #[test]
    fn unknown_caller_is_recorded() {
        let fx = Fixture::new();
        let m = RecordManager::new(
            Arc::new(kinds::header()),
            Arc::new(AnonymousIdentity),
            fx.events.clone(),
        );
        let created = m
            .create(&fx.ledger.begin(), &bytes(&header_json("H1")))
            .unwrap();
        assert_eq!(created.record.text_or_empty("creator"), UNKNOWN_CALLER);
    }

    #[test]
    fn store_failure_is_reported() {
        let fx = Fixture::new();
        let m = fx.headers();
        let tx = FailingPuts {
            inner: fx.ledger.begin(),
            keys: HashSet::from(["H1".to_string()]),
        };
        let err = m.create(&tx, &bytes(&header_json("H1"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert!(fx.events.is_empty());
    }

    #[test]
    fn event_failure_reports_error_but_keeps_write() {
        let fx = Fixture::new();
        let m = fx.headers();
        fx.events.set_failing(true);
        let tx = fx.ledger.begin();
        let err = m.create(&tx, &bytes(&header_json("H1"))).unwrap_err();
        assert!(matches!(
            err,
            EngineError::EventEmissionFailure { ref event, .. } if event == "CREATE_HEADER"
        ));
        assert!(tx.exists("H1").unwrap());
    }

    // ---- bulk ----

    #[test]
    fn bulk_isolates_failures() {
        let fx = Fixture::new();
        let m = fx.headers();
        let mut bad = header_json("H2");
        bad["category"] = json!("9");
        let batch = json!([
            header_json("H1"),
            bad,
            header_json("H1"),
            {"name": "no id"},
            "not an object",
            header_json("H3")
        ]);
        let outcome = m.create_bulk(&fx.ledger.begin(), &bytes(&batch)).unwrap();

        assert_eq!(outcome.accepted_count, 2);
        assert_eq!(outcome.rejected_ids, vec!["H2", "H1", "", ""]);
        let kinds: Vec<ErrorKind> = outcome.failures.iter().map(|f| f.error).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::ValidationFailed,
                ErrorKind::DuplicateKey,
                ErrorKind::ValidationFailed,
                ErrorKind::MalformedInput
            ]
        );
        assert_eq!(outcome.failures[1].index, 2);

        let tx = fx.ledger.begin();
        assert!(tx.exists("H1").unwrap());
        assert!(!tx.exists("H2").unwrap());
        assert!(tx.exists("H3").unwrap());
        assert_eq!(fx.events.names(), vec!["BULK_HEADER", "BULK_HEADER"]);
    }

    #[test]
    fn rerunning_a_batch_rejects_committed_and_invalid_items() {
        let fx = Fixture::new();
        let m = fx.headers();
        let mut bad = header_json("H2");
        bad["category"] = json!("9");
        let batch = bytes(&json!([header_json("H1"), bad, header_json("H3")]));

        let first = m.create_bulk(&fx.ledger.begin(), &batch).unwrap();
        assert_eq!(first.accepted_count, 2);
        assert_eq!(first.rejected_ids, vec!["H2"]);

        let second = m.create_bulk(&fx.ledger.begin(), &batch).unwrap();
        assert_eq!(second.accepted_count, 0);
        assert_eq!(second.rejected_ids, vec!["H1", "H2", "H3"]);
        let kinds: Vec<ErrorKind> = second.failures.iter().map(|f| f.error).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::DuplicateKey,
                ErrorKind::ValidationFailed,
                ErrorKind::DuplicateKey
            ]
        );
        assert_eq!(fx.ledger.len(), 2);
    }

    #[test]
    fn bulk_reports_non_string_ids_as_json() {
        let fx = Fixture::new();
        let mut numeric = header_json("");
        numeric["id"] = json!(5);
        let outcome = fx
            .headers()
            .create_bulk(&fx.ledger.begin(), &bytes(&json!([numeric, {"id": null}])))
            .unwrap();
        assert_eq!(outcome.rejected_ids, vec!["5", ""]);
        assert_eq!(outcome.failures[0].error, ErrorKind::MalformedInput);
    }

    #[test]
    fn bulk_store_failure_only_rejects_that_element() {
        let fx = Fixture::new();
        let m = fx.headers();
        let tx = FailingPuts {
            inner: fx.ledger.begin(),
            keys: HashSet::from(["H2".to_string()]),
        };
        let batch = json!([header_json("H1"), header_json("H2"), header_json("H3")]);
        let outcome = m.create_bulk(&tx, &bytes(&batch)).unwrap();
        assert_eq!(outcome.accepted_count, 2);
        assert_eq!(outcome.rejected_ids, vec!["H2"]);
        assert_eq!(outcome.failures[0].error, ErrorKind::StoreFailure);
    }

    #[test]
    fn bulk_event_failure_rejects_committed_items() {
        let fx = Fixture::new();
        let m = fx.headers();
        fx.events.set_failing(true);
        let tx = fx.ledger.begin();
        let outcome = m
            .create_bulk(&tx, &bytes(&json!([header_json("H1")])))
            .unwrap();
        assert_eq!(outcome.accepted_count, 0);
        assert_eq!(outcome.rejected_ids, vec!["H1"]);
        assert!(tx.exists("H1").unwrap());
    }

    #[test]
    fn bulk_requires_an_array() {
        let fx = Fixture::new();
        let err = fx
            .headers()
            .create_bulk(&fx.ledger.begin(), &bytes(&header_json("H1")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn empty_bulk_is_a_no_op() {
        let fx = Fixture::new();
        let outcome = fx.headers().create_bulk(&fx.ledger.begin(), b"[]").unwrap();
        assert_eq!(outcome, BulkOutcome::default());
    }

    // ---- update ----

    #[test]
    fn update_overlays_mutable_fields_only() {
        let fx = Fixture::new();
        fx.headers()
            .create(&fx.ledger.begin(), &bytes(&header_json("H1")))
            .unwrap();

        let bob = fx.manager(kinds::header(), "bob");
        let tx = fx.ledger.begin_at(LedgerTimestamp::new(500, 0));
        let input = json!({
            "status": "I",
            "name": "RENAMED",
            "id": "H9",
            "creator": "mallory",
            "created": "999",
            "kind": "consent"
        });
        let updated = bob
            .update_status(&tx, &UpdateTarget::Id("H1".into()), &bytes(&input))
            .unwrap();
        let r = &updated.record;
        assert_eq!(r.text_or_empty("status"), "I");
        assert_eq!(r.text_or_empty("name"), "CLI1");
        assert_eq!(r.text_or_empty("id"), "H1");
        assert_eq!(r.text_or_empty("creator"), "alice");
        assert_eq!(r.text_or_empty("created"), "100");
        assert_eq!(r.kind(), "header");
        assert_eq!(r.text_or_empty("updatedBy"), "bob");
        assert_eq!(r.text_or_empty("updated"), "500");
        assert!(!tx.exists("H9").unwrap());
        assert_eq!(fx.events.names(), vec!["CREATE_HEADER", "UPDATE_HEADER"]);
    }

    #[test]
    fn update_uses_caller_timestamp_when_given() {
        let fx = Fixture::new();
        let m = fx.headers();
        m.create(&fx.ledger.begin(), &bytes(&header_json("H1"))).unwrap();
        let updated = m
            .update_status(
                &fx.ledger.begin(),
                &UpdateTarget::Id("H1".into()),
                br#"{"status":"B","updated":"777"}"#,
            )
            .unwrap();
        assert_eq!(updated.record.text_or_empty("updated"), "777");
    }

    #[test]
    fn empty_mutable_values_leave_the_record_alone() {
        let fx = Fixture::new();
        let m = fx.headers();
        let mut input = header_json("H1");
        input["status"] = json!("A");
        m.create(&fx.ledger.begin(), &bytes(&input)).unwrap();
        let updated = m
            .update_status(
                &fx.ledger.begin(),
                &UpdateTarget::Id("H1".into()),
                br#"{"status":"  ","tmid":"42"}"#,
            )
            .unwrap();
        assert_eq!(updated.record.text_or_empty("status"), "A");
        assert_eq!(updated.record.text_or_empty("tmid"), "42");
    }

    #[test]
    fn invalid_update_writes_nothing() {
        let fx = Fixture::new();
        let m = fx.headers();
        m.create(&fx.ledger.begin(), &bytes(&header_json("H1"))).unwrap();
        let tx = fx.ledger.begin();
        let err = m
            .update_status(&tx, &UpdateTarget::Id("H1".into()), br#"{"status":"Z"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(tx.history("H1").unwrap().count(), 1);
    }

    #[test]
    fn update_of_missing_or_foreign_record_is_not_found() {
        let fx = Fixture::new();
        let consent = fx.manager(kinds::consent(), "alice");
        fx.headers()
            .create(&fx.ledger.begin(), &bytes(&header_json("H1")))
            .unwrap();
        let tx = fx.ledger.begin();
        for id in ["H1", "nope"] {
            let err = consent
                .update_status(&tx, &UpdateTarget::Id(id.into()), br#"{"status":"Revoked"}"#)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[test]
    fn update_by_lookup_field() {
        let fx = Fixture::new();
        let tokens = fx.manager(kinds::scrub_token(), "alice");
        let token = json!({
            "id": "S1",
            "token": "tok-abc",
            "entity": "E1",
            "header": "H1",
            "templateId": "T1",
            "status": "Issued",
            "createdAt": "100"
        });
        tokens.create(&fx.ledger.begin(), &bytes(&token)).unwrap();

        let target = UpdateTarget::Lookup {
            field: "token".into(),
            value: "tok-abc".into(),
        };
        let updated = tokens
            .update_status(
                &fx.ledger.begin(),
                &target,
                br#"{"status":"Consumed","consumedBy":"M1"}"#,
            )
            .unwrap();
        assert_eq!(updated.record.text_or_empty("id"), "S1");
        assert_eq!(updated.record.text_or_empty("status"), "Consumed");
        assert_eq!(fx.events.names().last().unwrap(), "UPDATE_SCRUB_TOKEN");

        let missing = UpdateTarget::Lookup {
            field: "token".into(),
            value: "tok-zzz".into(),
        };
        let err = tokens
            .update_status(&fx.ledger.begin(), &missing, br#"{"status":"Expired"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let undeclared = UpdateTarget::Lookup {
            field: "entity".into(),
            value: "E1".into(),
        };
        let err = tokens
            .update_status(&fx.ledger.begin(), &undeclared, br#"{"status":"Expired"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn addressed_update_reads_the_target_from_the_body() {
        let fx = Fixture::new();
        let m = fx.headers();
        m.create(&fx.ledger.begin(), &bytes(&header_json("H1"))).unwrap();
        let updated = m
            .update_status_addressed(&fx.ledger.begin(), br#"{"id":"H1","status":"D"}"#)
            .unwrap();
        assert_eq!(updated.record.text_or_empty("status"), "D");
        let err = m
            .update_status_addressed(&fx.ledger.begin(), br#"{"status":"D"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "validation failed: id is mandatory");
    }

    #[test]
    fn bulk_update_isolates_failures() {
        let fx = Fixture::new();
        let m = fx.headers();
        for id in ["H1", "H2"] {
            m.create(&fx.ledger.begin(), &bytes(&header_json(id))).unwrap();
        }
        let batch = json!([
            {"id": "H1", "status": "I"},
            {"id": "H2", "status": "X"},
            {"id": "H7", "status": "I"},
            {"status": "I"}
        ]);
        let outcome = m.update_status_bulk(&fx.ledger.begin(), &bytes(&batch)).unwrap();
        assert_eq!(outcome.accepted_count, 1);
        assert_eq!(outcome.rejected_ids, vec!["H2", "H7", ""]);
        assert_eq!(outcome.failures[1].error, ErrorKind::NotFound);
        assert_eq!(
            m.get(&fx.ledger.begin(), "H1").unwrap().text_or_empty("status"),
            "I"
        );
        assert_eq!(fx.events.names().last().unwrap(), "BULK_UPDATE_HEADER");
    }

    // ---- reads ----

    #[test]
    fn queries_are_scoped_to_the_kind() {
        let fx = Fixture::new();
        let headers = fx.headers();
        let entities = fx.manager(kinds::entity(), "alice");
        headers
            .create(&fx.ledger.begin(), &bytes(&header_json("H1")))
            .unwrap();
        entities
            .create(
                &fx.ledger.begin(),
                &bytes(&json!({
                    "id": "E1",
                    "name": "Acme",
                    "entityType": "Enterprise",
                    "registrationNo": "R1",
                    "status": "A",
                    "createdAt": "1"
                })),
            )
            .unwrap();

        let tx = fx.ledger.begin();
        let all = headers.query_all(&tx, "{}").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "H1");

        let by_name = entities
            .query_all(&tx, r#"{"selector":{"name":"Acme"}}"#)
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert!(headers.query_all(&tx, r#"{"name":"Acme"}"#).unwrap().is_empty());

        let page = headers.query(&tx, "", 0, "").unwrap();
        assert_eq!(page.records_count, 1);

        let err = headers.query_all(&tx, "[1]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn pages_walk_every_record() {
        let fx = Fixture::new();
        let m = fx.headers();
        for i in 0..7 {
            m.create(&fx.ledger.begin(), &bytes(&header_json(&format!("H{i}"))))
                .unwrap();
        }
        let tx = fx.ledger.begin();
        let counts: Vec<usize> = m
            .pages(&tx, "{}", 3)
            .unwrap()
            .map(|p| p.unwrap().records_count)
            .collect();
        assert_eq!(counts, vec![3, 3, 1]);
    }

    #[test]
    fn worked_header_example() {
        let fx = Fixture::new();
        let m = fx.headers();

        let created = m
            .create(&fx.ledger.begin_at(LedgerTimestamp::new(100, 0)), &bytes(&header_json("H1")))
            .unwrap();
        assert_eq!(created.record.text_or_empty("creator"), "alice");

        let dup = m
            .create(&fx.ledger.begin(), &bytes(&header_json("H1")))
            .unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::DuplicateKey);

        m.update_status(
            &fx.ledger.begin_at(LedgerTimestamp::new(200, 0)),
            &UpdateTarget::Id("H1".into()),
            br#"{"status":"I"}"#,
        )
        .unwrap();

        let tx = fx.ledger.begin();
        let history: Vec<_> = m
            .history(&tx, "H1")
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value.as_ref().unwrap()["status"], Value::Null);
        assert_eq!(history[1].value.as_ref().unwrap()["status"], "I");
        assert_eq!(history[1].value.as_ref().unwrap()["updated"], "200");
        assert!(history.iter().all(|h| !h.is_delete));
    }
}
