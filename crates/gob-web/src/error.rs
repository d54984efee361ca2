//! Web errors and their HTTP mapping
//!
//! Authorization denials and malformed queries are 403 with a short
//! plaintext body. Grammar violations are logged in full and answered with a
//! generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gob_auth::AuthError;
use gob_model::ModelError;
use gob_query::{CompileError, QueryError};
use gob_sqlite::SqliteError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Auth scheme error: {0}")]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] SqliteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WebError>;

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            WebError::Query(QueryError::Compile(CompileError::NoAccess { .. })) => {
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }
            WebError::Query(QueryError::Compile(e)) => {
                warn!(error = %e, "Malformed query");
                (StatusCode::FORBIDDEN, format!("Malformed query: {e}"))
            }
            WebError::Query(QueryError::Grammar(e)) => {
                error!(error = %e, "Query outside the supported grammar");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Query could not be processed".to_string(),
                )
            }
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                error!(error = %other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gob_query::GrammarError;

    #[test]
    fn test_status_mapping() {
        let no_access = WebError::Query(QueryError::Compile(CompileError::NoAccess {
            catalog: "secure".into(),
            collection: "personen".into(),
        }));
        assert_eq!(no_access.into_response().status(), StatusCode::FORBIDDEN);

        let malformed =
            WebError::Query(QueryError::Compile(CompileError::UnknownRoot("x".into())));
        assert_eq!(malformed.into_response().status(), StatusCode::FORBIDDEN);

        let grammar = WebError::Query(QueryError::Grammar(GrammarError::Unsupported("fragments")));
        assert_eq!(
            grammar.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let bad = WebError::BadRequest("missing query".into());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
