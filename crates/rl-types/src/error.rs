use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("record must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("field '{field}' must be a string, got {actual}")]
    FieldType { field: String, actual: &'static str },
}
