//! Error types for authorization configuration

use thiserror::Error;

/// Authorization error type
#[derive(Error, Debug)]
pub enum AuthError {
    /// Scheme file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scheme file could not be parsed
    #[error("Parse error in {format} auth scheme: {message}")]
    Parse { format: &'static str, message: String },

    /// Scheme file extension not recognized
    #[error("Unsupported auth scheme format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for authorization operations
pub type AuthResult<T> = Result<T, AuthError>;
