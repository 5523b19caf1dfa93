//! SQLite backend error types.

use thiserror::Error;

/// SQLite backend errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The driver reported a failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A parameter value has no SQLite representation.
    #[error("unsupported parameter value: {0}")]
    UnsupportedValue(String),

    /// A statement parameter has no matching placeholder.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// The operation cannot be expressed in SQLite.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl From<Error> for ormsql_core::Error {
    fn from(err: Error) -> Self {
        ormsql_core::Error::backend(err)
    }
}

/// Result type for SQLite backend operations.
pub type Result<T> = std::result::Result<T, Error>;
