//! Streaming query compiler for GOB collections
//!
//! A query travels through three stages:
//!
//! 1. **Parse**: query text becomes a [`RelationTree`] ([`parse_query`])
//! 2. **Compile**: the tree becomes one SQL statement plus a [`ResultPlan`]
//!    ([`compile_query`]), with authorization applied to filters and access
//! 3. **Reconstruct**: the ordered row cursor of that statement is merged
//!    back into nested entities, one per root row identity ([`EntityStream`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gob_query::{compile_query, EntityStream};
//!
//! let compiled = compile_query("{ gebiedenBuurten { edges { node { naam } } } }", &auth)?;
//! let rows = store.query(&compiled.sql)?;
//! for entity in EntityStream::new(rows, &compiled.plan, &auth)? {
//!     println!("{}", entity?);
//! }
//! ```

pub mod compile;
pub mod error;
pub mod ir;
pub mod plan;
pub mod stream;
pub mod syntax;

// Re-exports
pub use compile::{active_predicate, compile_query, CompiledQuery, SqlCompiler};
pub use error::{
    CompileError, CompileResult, GrammarError, GrammarResult, QueryError, QueryResult, StreamError,
};
pub use ir::{Arguments, Field, Literal, RelationNode, RelationTree};
pub use plan::{FieldKind, FieldPlan, JoinKind, RelationPlan, ResultPlan};
pub use stream::{EntityStream, Row};
pub use syntax::parse_query;
