//! Error types for the query pipeline

use thiserror::Error;

/// Query text outside the supported grammar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
    /// Chumsky parse failure, already formatted
    #[error("Syntax error:\n{0}")]
    Syntax(String),

    /// Construct recognised but deliberately unsupported
    #[error("Unsupported construct: {0}")]
    Unsupported(&'static str),

    /// Not exactly one root field
    #[error("Expected exactly one root field, found {0}")]
    RootCount(usize),

    /// Two relations share a key
    #[error("Relation alias '{0}' is used more than once, give each relation a unique alias")]
    DuplicateAlias(String),

    /// Two different fields of one relation share an output key
    #[error("Field key '{0}' is used for different fields, give each field a unique alias")]
    DuplicateField(String),

    /// Reserved argument with a value of the wrong type
    #[error("Argument '{name}' expects {expected}")]
    InvalidArgument {
        name: &'static str,
        expected: &'static str,
    },
}

/// Relation tree that cannot be turned into SQL
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Caller may not read the root collection
    #[error("No access to {catalog}:{collection}")]
    NoAccess { catalog: String, collection: String },

    #[error("Unknown collection '{0}'")]
    UnknownRoot(String),

    #[error("Unknown field '{field}' on {collection}")]
    UnknownField { collection: String, field: String },

    #[error("Unknown relation '{relation}' on {collection}")]
    UnknownRelation { collection: String, relation: String },

    /// Reference attribute requested as a plain field
    #[error("Relation '{0}' needs a selection of fields")]
    MissingSelection(String),

    #[error("Cannot filter '{collection}' on '{field}': {reason}")]
    InvalidFilter {
        collection: String,
        field: String,
        reason: &'static str,
    },

    /// Source value and source info only exist on the owning side
    #[error("Field '{field}' is not available on inverse relation '{relation}'")]
    SourceOnInverse { relation: String, field: String },
}

/// Failure while turning rows into entities
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Relation whose parent is not reachable from the root
    #[error("Relation '{relation}' has unreachable parent '{parent}'")]
    HierarchyInconsistency { relation: String, parent: String },

    /// Row that does not have the shape the plan describes
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Row cursor failed
    #[error("Store error: {0}")]
    Store(String),
}

/// Any failure of the query pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Result type for parsing
pub type GrammarResult<T> = Result<T, GrammarError>;

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type for the whole pipeline
pub type QueryResult<T> = Result<T, QueryError>;
