//! Metadata registry for GOB catalogs
//!
//! The registry describes every catalog, its collections and their attributes:
//! types, reference targets, cardinality and whether a collection carries
//! states (temporal versions). It is loaded once at startup and shared
//! read-only for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gob_model::Registry;
//!
//! let registry = Registry::from_file("gobmodel.json")?;
//! let collection = registry.get_collection("meetbouten", "meetbouten")?;
//! assert_eq!(registry.table_name("meetbouten", "meetbouten").as_deref(), Some("meetbouten_meetbouten"));
//! ```

pub mod case;
pub mod error;
pub mod registry;
pub mod types;

// Include testing fixtures when test-utils feature is enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use case::{to_camel, to_snake};
pub use error::{ModelError, ModelResult};
pub use registry::{InverseRelation, Registry, RelationRef};
pub use types::{Attribute, AttributeType, Catalog, Collection, ReferenceTarget, SecureKind};

/// Column holding the synthetic row identity
pub const GOBID: &str = "_gobid";
/// Column holding the entity identity shared by all states of an entity
pub const ID: &str = "_id";
/// Column holding the state sequence number of versioned collections
pub const SEQNR: &str = "volgnummer";
/// Soft-delete marker column
pub const DATE_DELETED: &str = "_date_deleted";
/// Expiration marker column used by the active filter
pub const EXPIRATION_DATE: &str = "_expiration_date";
/// Start of validity of a state
pub const BEGIN_VALIDITY: &str = "begin_geldigheid";
/// End of validity of a state
pub const END_VALIDITY: &str = "eind_geldigheid";
