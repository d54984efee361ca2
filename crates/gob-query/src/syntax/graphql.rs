//! Grammar for the supported query subset
//!
//! ```text
//! query Name {
//!   catalogCollection(active: false, first: 10) {
//!     edges { node {
//!       identificatie
//!       ref: relationName(naam: "x") { edges { node { naam bronwaarde } } }
//!     } }
//!   }
//! }
//! ```
//!
//! Fragments, directives, variables and anything beyond a single query
//! operation are rejected up front by [`check_supported`].

use super::common::{ident, kw, value, ws, Extra};
use crate::error::{GrammarError, GrammarResult};
use crate::ir::Literal;
use chumsky::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;

/// A field in a selection set (before lowering to the relation tree)
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, Literal)>,
    /// `None` for leaf fields
    pub selections: Option<Vec<Selection>>,
}

/// A parsed query operation
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub name: Option<String>,
    pub selections: Vec<Selection>,
}

/// String literals and comments, blanked out before scanning
static OPAQUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|#[^\n]*"#).expect("valid regex"));

static OPERATION_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(mutation|subscription|fragment)\b").expect("valid regex"));

/// Reject constructs outside the supported subset before parsing
pub fn check_supported(input: &str) -> GrammarResult<()> {
    let code = OPAQUE.replace_all(input, " ");

    if let Some(captures) = OPERATION_KEYWORD.captures(&code) {
        return Err(GrammarError::Unsupported(match &captures[1] {
            "mutation" => "mutations",
            "subscription" => "subscriptions",
            _ => "fragments",
        }));
    }
    if code.contains("...") {
        return Err(GrammarError::Unsupported("fragments"));
    }
    if code.contains('@') {
        return Err(GrammarError::Unsupported("directives"));
    }
    if code.contains('$') {
        return Err(GrammarError::Unsupported("variables"));
    }

    let mut depth = 0usize;
    let mut operations = 0usize;
    for c in code.chars() {
        match c {
            '{' => {
                if depth == 0 {
                    operations += 1;
                }
                depth += 1;
            }
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if operations > 1 {
        return Err(GrammarError::Unsupported("multiple operations"));
    }
    Ok(())
}

/// Parser for a complete query document
pub fn document<'src>() -> impl Parser<'src, &'src str, Document, Extra<'src>> {
    let selection_set = recursive(|selection_set| {
        let alias = ident()
            .then_ignore(just(':').padded_by(ws()))
            .or_not();

        let argument = ident()
            .then_ignore(just(':').padded_by(ws()))
            .then(value());

        let arguments = argument
            .padded_by(ws())
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just('('), just(')'))
            .labelled("arguments like (naam: \"x\")");

        let field = alias
            .then(ident())
            .then(ws().ignore_then(arguments).or_not())
            .then(ws().ignore_then(selection_set).or_not())
            .map(|(((alias, name), arguments), selections)| Selection {
                alias,
                name,
                arguments: arguments.unwrap_or_default(),
                selections,
            })
            .labelled("field");

        field
            .padded_by(ws())
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just('{'), just('}'))
            .labelled("selection set")
    });

    let operation = kw("query")
        .ignore_then(ws())
        .ignore_then(ident().or_not())
        .then_ignore(ws());

    ws().ignore_then(operation.or_not())
        .then(selection_set)
        .then_ignore(ws())
        .then_ignore(end())
        .map(|(name, selections)| Document {
            name: name.flatten(),
            selections,
        })
}
