use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input could not be parsed into the expected shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A create targeted an id that already holds a value.
    #[error("record {id} already exists")]
    DuplicateKey { id: String },

    /// A mandatory field is missing or a field value is outside its domain.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// No record of this kind exists under the key.
    #[error("{kind} record {key} not found")]
    NotFound { kind: String, key: String },

    /// The ledger store failed. Fatal for the operation, never retried.
    #[error("store failure: {0}")]
    StoreFailure(#[source] rl_store::StoreError),

    /// The change event could not be recorded. The ledger write that
    /// preceded it has already been applied.
    #[error("event {event} could not be emitted: {reason}")]
    EventEmissionFailure { event: String, reason: String },

    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// The error's kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::StoreFailure(_) => ErrorKind::StoreFailure,
            Self::EventEmissionFailure { .. } => ErrorKind::EventEmissionFailure,
            Self::UnknownKind(_) => ErrorKind::UnknownKind,
            Self::UnknownAction(_) => ErrorKind::UnknownAction,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn not_found(kind: &str, key: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }
}

/// Rejected selectors and bookmarks are caller mistakes, not store faults.
impl From<rl_store::StoreError> for EngineError {
    fn from(err: rl_store::StoreError) -> Self {
        match err {
            rl_store::StoreError::InvalidQuery(_) | rl_store::StoreError::InvalidBookmark(_) => {
                Self::MalformedInput(err.to_string())
            }
            other => Self::StoreFailure(other),
        }
    }
}

impl From<rl_types::TypeError> for EngineError {
    fn from(err: rl_types::TypeError) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

/// Machine-readable error tag carried in response envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedInput,
    DuplicateKey,
    ValidationFailed,
    NotFound,
    StoreFailure,
    EventEmissionFailure,
    UnknownKind,
    UnknownAction,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedInput => "MALFORMED_INPUT",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::StoreFailure => "STORE_FAILURE",
            Self::EventEmissionFailure => "EVENT_EMISSION_FAILURE",
            Self::UnknownKind => "UNKNOWN_KIND",
            Self::UnknownAction => "UNKNOWN_ACTION",
            Self::Config => "CONFIG",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_serde_names() {
        for kind in [
            ErrorKind::MalformedInput,
            ErrorKind::DuplicateKey,
            ErrorKind::ValidationFailed,
            ErrorKind::NotFound,
            ErrorKind::StoreFailure,
            ErrorKind::EventEmissionFailure,
            ErrorKind::UnknownKind,
            ErrorKind::UnknownAction,
            ErrorKind::Config,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn type_errors_become_malformed_input() {
        let err: EngineError = rl_types::TypeError::NotAnObject("array").into();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn store_errors_become_store_failures() {
        let err: EngineError = rl_store::StoreError::ZeroPageSize.into();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        let err: EngineError = rl_store::StoreError::Backend("disk gone".into()).into();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
    }

    #[test]
    fn rejected_queries_become_malformed_input() {
        let err: EngineError = rl_store::StoreError::InvalidQuery("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        let err: EngineError = rl_store::StoreError::InvalidBookmark("zz".into()).into();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn messages_are_human_readable() {
        let err = EngineError::DuplicateKey { id: "H1".into() };
        assert_eq!(err.to_string(), "record H1 already exists");
        let err = EngineError::not_found("header", "H9");
        assert_eq!(err.to_string(), "header record H9 not found");
    }
}
