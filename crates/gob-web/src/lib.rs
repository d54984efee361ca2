//! HTTP surface of the GOB streaming query service
//!
//! - `GET /gob/graphql/streaming/?query=...` and `POST` with `{"query": ...}`
//!   stream entities as NDJSON
//! - `GET /health` and `GET /ready`

pub mod roles;
pub mod routes;
pub mod server;
pub mod state;

mod error;

pub use error::{Result, WebError};
pub use roles::{HeaderRoleResolver, RoleResolver};
pub use server::{build_router, start_server};
pub use state::AppState;
