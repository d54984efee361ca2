//! HTTP tests against the router with a seeded store

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use gob_auth::{AuthScheme, CatalogRule, SecureLevels, PLACEHOLDER};
use gob_config::{ServerConfig, StreamingConfig};
use gob_model::testing::sample_registry;
use gob_sqlite::testing::sample_store;
use gob_web::routes::STREAMING_PATH;
use gob_web::{build_router, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use tempfile::TempDir;
use tokio_stream::StreamExt;
use tower::ServiceExt;

fn state(dir: &TempDir) -> AppState {
    let store = sample_store(&dir.path().join("gob.db"));
    AppState::new(sample_registry(), store)
}

fn secure_scheme() -> AuthScheme {
    AuthScheme {
        catalogs: HashMap::from([(
            "secure".to_string(),
            CatalogRule {
                roles: vec!["gob_secure".to_string()],
                ..Default::default()
            },
        )]),
        secure: SecureLevels {
            levels: HashMap::from([("5".to_string(), vec!["gob_level_5".to_string()])]),
        },
    }
}

fn app(state: AppState) -> Router {
    build_router(state, &ServerConfig::default()).unwrap()
}

fn post(query: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(STREAMING_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_with_store() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_streams_ndjson_with_marker() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(post("{ catalogCollectiona { identificatie naam } }"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );
    assert_eq!(
        lines(&body_text(response).await),
        vec![
            json!({"node": {"identificatie": "A1", "naam": "a1"}}),
            json!({"node": {"identificatie": "A2", "naam": "a2"}}),
            json!({"complete": true, "count": 2}),
        ]
    );
}

#[tokio::test]
async fn test_get_with_encoded_query() {
    let dir = TempDir::new().unwrap();
    let uri = format!(
        "{STREAMING_PATH}?query=%7B%20catalogCollectiona(first%3A%201)%20%7B%20identificatie%20%7D%20%7D"
    );
    let response = app(state(&dir))
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        lines(&body_text(response).await),
        vec![
            json!({"node": {"identificatie": "A1"}}),
            json!({"complete": true, "count": 1}),
        ]
    );
}

#[tokio::test]
async fn test_relations_in_stream() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(post(
            "{ catalogCollectiona(identificatie: \"A1\") { identificatie referentie { naam } } }",
        ))
        .await
        .unwrap();

    let entities = lines(&body_text(response).await);
    assert_eq!(
        entities[0],
        json!({"node": {
            "identificatie": "A1",
            "referentie": {"edges": [{"node": {"naam": "b1"}}]},
        }})
    );
}

#[tokio::test]
async fn test_missing_query_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(Request::get(STREAMING_PATH).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_access_is_forbidden() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).with_scheme(secure_scheme());
    let response = app(state)
        .oneshot(post("{ securePersonen { identificatie } }"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Forbidden");
}

#[tokio::test]
async fn test_unknown_collection_is_malformed() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(post("{ catalogNope { identificatie } }"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.starts_with("Malformed query"));
}

#[tokio::test]
async fn test_grammar_error_is_generic() {
    let dir = TempDir::new().unwrap();
    let response = app(state(&dir))
        .oneshot(post("{ catalogCollectiona { ...fields } }"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Query could not be processed");
}

#[tokio::test]
async fn test_marker_disabled() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).with_streaming(StreamingConfig {
        terminal_marker: false,
        ..Default::default()
    });
    let response = app(state)
        .oneshot(post("{ catalogCollectiona { identificatie } }"))
        .await
        .unwrap();

    let entities = lines(&body_text(response).await);
    assert_eq!(entities.len(), 2);
    assert!(entities.iter().all(|e| e.get("complete").is_none()));
}

#[tokio::test]
async fn test_roles_header_reveals_secure_values() {
    let dir = TempDir::new().unwrap();
    let app = app(state(&dir).with_scheme(secure_scheme()));
    let query = "{ securePersonen { identificatie bsn } }";

    let response = app
        .clone()
        .oneshot(
            Request::post(STREAMING_PATH)
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-Auth-Roles", "gob_secure")
                .body(Body::from(json!({ "query": query }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let entities = lines(&body_text(response).await);
    assert_eq!(entities[0]["node"]["bsn"], PLACEHOLDER);

    let response = app
        .oneshot(
            Request::post(STREAMING_PATH)
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-Auth-Roles", "gob_secure,gob_level_5")
                .body(Body::from(json!({ "query": query }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let entities = lines(&body_text(response).await);
    assert_eq!(entities[0]["node"]["bsn"], "123");
}

#[tokio::test]
async fn test_failure_mid_stream_aborts_body_without_marker() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).with_scheme(secure_scheme());
    // Row after P1 with a details column that is not JSON
    state
        .store
        .connect_rw()
        .unwrap()
        .execute_batch(
            "INSERT INTO secure_personen (_id, identificatie, details) VALUES ('P2', 'P2', '{broken')",
        )
        .unwrap();

    let response = app(state)
        .oneshot(
            Request::post(STREAMING_PATH)
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-Auth-Roles", "gob_secure")
                .body(Body::from(
                    json!({ "query": "{ securePersonen { identificatie details } }" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    // Headers were already sent
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let mut received = String::new();
    let mut aborted = false;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => received.push_str(std::str::from_utf8(&bytes).unwrap()),
            Err(_) => {
                aborted = true;
                break;
            }
        }
    }

    assert!(aborted);
    let entities = lines(&received);
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["node"]["identificatie"], "P1");
    assert!(!received.contains("complete"));
}
