use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event transport rejected {0}")]
    Rejected(String),
    #[error("event log lock poisoned")]
    LockPoisoned,
}

/// Receives change notifications after a successful ledger write.
///
/// Emission happens after the write; an error here does not undo it.
pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, payload: &[u8]) -> Result<(), EventError>;
}

pub fn create_event(tag: &str) -> String {
    format!("CREATE_{tag}")
}

pub fn update_event(tag: &str) -> String {
    format!("UPDATE_{tag}")
}

pub fn bulk_create_event(tag: &str) -> String {
    format!("BULK_{tag}")
}

pub fn bulk_update_event(tag: &str) -> String {
    format!("BULK_UPDATE_{tag}")
}

/// One recorded event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmittedEvent {
    pub name: String,
    #[serde(with = "payload_text")]
    pub payload: Vec<u8>,
}

mod payload_text {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(payload: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(payload))
    }
}

/// In-memory event recorder.
///
/// Keeps at most `capacity` events, dropping the oldest. Can be switched
/// into a failing mode to exercise emission errors.
pub struct EventLog {
    events: RwLock<Vec<EmittedEvent>>,
    capacity: usize,
    failing: AtomicBool,
}

impl EventLog {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `emit` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// The last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<EmittedEvent> {
        let events = self.events();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("events", &self.len())
            .field("capacity", &self.capacity)
            .field("failing", &self.failing.load(Ordering::SeqCst))
            .finish()
    }
}

impl EventSink for EventLog {
    fn emit(&self, name: &str, payload: &[u8]) -> Result<(), EventError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EventError::Rejected(name.to_string()));
        }
        let mut events = self.events.write().map_err(|_| EventError::LockPoisoned)?;
        if events.len() >= self.capacity {
            let excess = events.len() + 1 - self.capacity;
            events.drain(..excess);
        }
        events.push(EmittedEvent {
            name: name.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Logs each event through `tracing` and never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, name: &str, payload: &[u8]) -> Result<(), EventError> {
        info!(event = name, bytes = payload.len(), "event emitted");
        Ok(())
    }
}

/// Fans one event out to several sinks; the first failure wins.
pub struct FanOut {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanOut {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanOut {
    fn emit(&self, name: &str, payload: &[u8]) -> Result<(), EventError> {
        for sink in &self.sinks {
            sink.emit(name, payload)?;
        }
        Ok(())
    }
}
