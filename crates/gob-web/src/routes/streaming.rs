//! Streaming query endpoint
//!
//! The query is compiled on the request task so authorization and query
//! errors still get a proper status. Rows are then read on a blocking task
//! that owns the connection and cursor and feeds a bounded channel; the
//! response body drains that channel. A full channel pauses the cursor, a
//! dropped body stops the task and closes the cursor.
//!
//! On success the body ends with `{"complete": true, "count": N}` (when
//! enabled). On failure the body is aborted and that line never appears.

use crate::error::{Result, WebError};
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use gob_auth::AuthContext;
use gob_query::{compile_query, CompiledQuery, EntityStream, QueryError, StreamError};
use gob_sqlite::SqliteStore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

pub const STREAMING_PATH: &str = "/gob/graphql/streaming/";

const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub query: String,
}

pub fn streaming_routes() -> Router<AppState> {
    Router::new().route(STREAMING_PATH, get(get_query).post(post_query))
}

async fn get_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QueryParams>,
) -> Result<Response> {
    let query = params
        .query
        .ok_or_else(|| WebError::BadRequest("Missing 'query' parameter".to_string()))?;
    stream_query(state, &headers, &query)
}

async fn post_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
) -> Result<Response> {
    stream_query(state, &headers, &body.query)
}

fn stream_query(state: AppState, headers: &HeaderMap, query: &str) -> Result<Response> {
    let auth = state.auth_context(headers);
    let compiled = compile_query(query, &auth)?;
    info!(
        catalog = %compiled.plan.catalog,
        collection = %compiled.plan.collection,
        relations = compiled.plan.relations.len(),
        user = ?auth.user().id(),
        "Streaming query"
    );
    debug!(sql = %compiled.sql, "Compiled SQL");

    let (tx, rx) = mpsc::channel(state.streaming.channel_capacity);
    let store = state.store.clone();
    let marker = state.streaming.terminal_marker;
    tokio::task::spawn_blocking(move || run_query(&store, &compiled, &auth, &tx, marker));

    let body = Body::from_stream(ReceiverStream::new(rx));
    Ok(([(header::CONTENT_TYPE, NDJSON)], body).into_response())
}

type Chunk = std::result::Result<Bytes, io::Error>;

/// Drive cursor and reconstructor, one line per entity
fn run_query(
    store: &SqliteStore,
    compiled: &CompiledQuery,
    auth: &AuthContext,
    tx: &mpsc::Sender<Chunk>,
    marker: bool,
) {
    let result = store
        .with_cursor(&compiled.sql, |cursor| {
            let entities = EntityStream::new(cursor, &compiled.plan, auth)?;
            forward(entities, tx)
        })
        .map_err(QueryError::from)
        .and_then(|r| r);
    finish(result, tx, marker);
}

/// Send entities as lines until they run out or the receiver is gone
///
/// Returns the number of lines sent, `None` after a disconnect.
fn forward<I>(entities: I, tx: &mpsc::Sender<Chunk>) -> std::result::Result<Option<u64>, QueryError>
where
    I: IntoIterator<Item = std::result::Result<Value, QueryError>>,
{
    let mut count = 0u64;
    for entity in entities {
        let mut line =
            serde_json::to_vec(&entity?).map_err(|e| StreamError::InvalidRow(e.to_string()))?;
        line.push(b'\n');
        if tx.blocking_send(Ok(Bytes::from(line))).is_err() {
            return Ok(None);
        }
        count += 1;
    }
    Ok(Some(count))
}

/// Terminate the body: marker on success, an error chunk on failure
fn finish(result: std::result::Result<Option<u64>, QueryError>, tx: &mpsc::Sender<Chunk>, marker: bool) {
    match result {
        Ok(Some(count)) => {
            if marker {
                let line = format!("{}\n", json!({"complete": true, "count": count}));
                // A client gone at this point has all entities anyway
                let _ = tx.blocking_send(Ok(Bytes::from(line)));
            }
            info!(count, "Query stream complete");
        }
        Ok(None) => debug!("Client disconnected, cursor closed"),
        Err(e) => {
            error!(error = %e, "Query stream aborted");
            let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::sync::mpsc::error::TryRecvError;

    fn entity(i: u64) -> std::result::Result<Value, QueryError> {
        Ok(json!({"node": {"identificatie": format!("A{i}")}}))
    }

    fn text(chunk: Chunk) -> String {
        String::from_utf8(chunk.unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_dropped_receiver_stops_pulling_entities() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let pulled = Cell::new(0u64);
        let entities = (1..=100).map(|i| {
            pulled.set(pulled.get() + 1);
            entity(i)
        });

        let result = forward(entities, &tx);
        assert!(matches!(result, Ok(None)));
        assert_eq!(pulled.get(), 1);

        // No marker and no error chunk after a disconnect
        finish(result, &tx, true);
    }

    #[test]
    fn test_failure_mid_stream_aborts_without_marker() {
        let (tx, mut rx) = mpsc::channel(8);
        let entities = vec![
            entity(1),
            Err(StreamError::Store("connection lost".into()).into()),
            entity(3),
        ];

        let result = forward(entities, &tx);
        assert!(matches!(result, Err(QueryError::Stream(StreamError::Store(_)))));
        finish(result, &tx, true);
        drop(tx);

        assert!(text(rx.try_recv().unwrap()).contains("A1"));
        assert!(rx.try_recv().unwrap().is_err());
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[test]
    fn test_complete_stream_ends_with_marker() {
        let (tx, mut rx) = mpsc::channel(8);
        let result = forward((1..=2).map(entity), &tx);
        assert!(matches!(result, Ok(Some(2))));
        finish(result, &tx, true);
        drop(tx);

        let mut lines = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            lines.push(text(chunk));
        }
        assert_eq!(lines.len(), 3);
        assert_eq!(
            serde_json::from_str::<Value>(&lines[2]).unwrap(),
            json!({"complete": true, "count": 2})
        );
    }
}
