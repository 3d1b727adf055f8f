//! Error types for docparquet operations

use thiserror::Error;

/// Result type for docparquet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while projecting, reading or writing nested records
#[derive(Error, Debug)]
pub enum Error {
    /// A caller broke the contract of an operation (closed stream, mismatched record)
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A column selector is not a valid glob
    #[error("Invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Schema text did not parse, or a schema is structurally unusable
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// The file holds no row groups
    #[error("No row groups found in file")]
    EmptyStorage,

    /// Projection with the given selectors kept no column
    #[error("Field selectors do not match any columns: {0}")]
    NoMatchingColumns(String),

    /// A single-column read matched more than one leaf
    #[error("Column glob pattern {pattern:?} matches several columns ({matches})")]
    AmbiguousColumn { pattern: String, matches: usize },

    /// Error reported by the Parquet engine while reading or writing
    #[error("Parquet error: {0}")]
    Storage(#[from] parquet::errors::ParquetError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A decoded row or a write event sequence does not fit the schema
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A document does not fit the schema it is written with
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// JSON input could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid writer or reader settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Releasing the underlying storage failed
    #[error("Error when closing record stream: {0}")]
    Close(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
