//! Error types for the SQLite store

use gob_query::{QueryError, StreamError};
use thiserror::Error;

/// SQLite store error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database cannot be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema bootstrap failure
    #[error("Schema error: {0}")]
    Schema(String),

    /// Data that does not fit the model
    #[error("Load error: {0}")]
    Load(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        QueryError::Stream(StreamError::Store(err.to_string()))
    }
}
