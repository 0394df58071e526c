/// Errors from ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The query document could not be parsed or uses an unsupported operator.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The pagination bookmark is not one this store issued.
    #[error("invalid bookmark: {0}")]
    InvalidBookmark(String),

    /// A paged query was issued with a page size of zero.
    #[error("page size must be greater than zero")]
    ZeroPageSize,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the write-ahead log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned by a panicking writer.
    #[error("ledger lock poisoned")]
    LockPoisoned,

    /// Backend-specific failure reported by an external store.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
