//! Error types for the metadata registry

use thiserror::Error;

/// Metadata registry error type
#[derive(Error, Debug)]
pub enum ModelError {
    /// Catalog/collection pair is not part of the model
    #[error("Unknown collection: {catalog}:{collection}")]
    UnknownCollection { catalog: String, collection: String },

    /// A reference attribute points to a collection that does not exist
    #[error("Attribute {catalog}:{collection}.{attribute} references unknown collection {target}")]
    UnknownReference {
        catalog: String,
        collection: String,
        attribute: String,
        target: String,
    },

    /// Attribute type string not recognized
    #[error("Unknown attribute type '{0}'")]
    UnknownType(String),

    /// Reference target not in `catalog:collection` form
    #[error("Invalid reference target '{0}', expected catalog:collection")]
    InvalidReference(String),

    /// Model file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model file is not valid JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations
pub type ModelResult<T> = Result<T, ModelError>;
