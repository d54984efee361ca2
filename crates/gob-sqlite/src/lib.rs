//! SQLite store for GOB collections
//!
//! This crate provides the storage side of the streaming query pipeline:
//!
//! - **SqliteStore**: opens one read-only connection per request
//! - **SqliteCursor**: streams the rows of a compiled statement as JSON maps,
//!   ready for [`gob_query::EntityStream`]
//! - **Schema bootstrap**: entity and relation tables derived from the model
//! - **Loading**: NDJSON records into those tables
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gob_sqlite::{SqliteConfig, SqliteStore};
//! use gob_query::{compile_query, EntityStream};
//!
//! let store = SqliteStore::new(SqliteConfig::new("./gob.db"))?;
//! let compiled = compile_query(query, &auth)?;
//! store.with_cursor(&compiled.sql, |cursor| {
//!     for entity in EntityStream::new(cursor, &compiled.plan, &auth)? {
//!         println!("{}", entity?);
//!     }
//!     Ok::<_, gob_query::QueryError>(())
//! })??;
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod load;
pub mod schema;
pub mod store;

// Include testing fixtures when test-utils feature is enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use config::SqliteConfig;
pub use cursor::SqliteCursor;
pub use error::{SqliteError, SqliteResult};
pub use load::{insert_entity, insert_relation, load_records, LoadStats, Record};
pub use schema::init_schema;
pub use store::SqliteStore;
