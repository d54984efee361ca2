//! Query parser: query text to relation tree
//!
//! `edges` and `node` are structural wrappers and are unwrapped in place;
//! `pageInfo` selections are skipped. Every other field with a selection set
//! opens a relation, every leaf field is a requested field of the relation
//! that encloses it.

pub mod common;
pub mod graphql;

use crate::error::{GrammarError, GrammarResult};
use crate::ir::{Arguments, Field, Literal, RelationNode, RelationTree};
use chumsky::Parser;
use common::format_errors;
use gob_model::{to_camel, to_snake};
use graphql::{check_supported, document, Selection};
use tracing::debug;

const EDGES: &str = "edges";
const NODE: &str = "node";
const PAGE_INFO: &str = "pageInfo";

/// Parse query text into a relation tree
pub fn parse_query(input: &str) -> GrammarResult<RelationTree> {
    check_supported(input)?;

    let doc = document()
        .parse(input)
        .into_result()
        .map_err(|errs| GrammarError::Syntax(format_errors(&errs, input)))?;

    if doc.selections.len() != 1 {
        return Err(GrammarError::RootCount(doc.selections.len()));
    }
    let Some(Selection {
        alias,
        name,
        arguments,
        selections,
    }) = doc.selections.into_iter().next()
    else {
        return Err(GrammarError::RootCount(0));
    };
    let Some(selections) = selections else {
        return Err(GrammarError::Unsupported("root field without a selection set"));
    };

    let alias = alias.unwrap_or_else(|| name.clone());
    let mut root = RelationNode::new(name, alias.clone(), None);
    root.arguments = lower_arguments(arguments, true)?;

    let mut tree = RelationTree::new(root);
    collect(&mut tree, &alias, selections)?;

    debug!(
        operation = ?doc.name,
        root = %tree.root().name,
        relations = tree.relations().len(),
        "Parsed query"
    );
    Ok(tree)
}

/// Accumulate `selections` against relation `owner`
fn collect(tree: &mut RelationTree, owner: &str, selections: Vec<Selection>) -> GrammarResult<()> {
    for Selection {
        alias,
        name,
        arguments,
        selections,
    } in selections
    {
        match selections {
            _ if name == PAGE_INFO => {}
            Some(inner) if name == EDGES || name == NODE => collect(tree, owner, inner)?,
            None => {
                let field_name = to_snake(&name);
                let key = alias.unwrap_or_else(|| to_camel(&field_name));
                if let Some(node) = tree.node_mut(owner) {
                    if !node.add_field(Field::new(field_name, key.clone())) {
                        return Err(GrammarError::DuplicateField(key));
                    }
                }
            }
            Some(inner) => {
                let alias = alias.unwrap_or_else(|| name.clone());
                if tree.contains(&alias) {
                    return Err(GrammarError::DuplicateAlias(alias));
                }
                let mut node = RelationNode::new(to_snake(&name), alias.clone(), Some(owner.to_string()));
                node.arguments = lower_arguments(arguments, false)?;
                tree.push(node);
                collect(tree, &alias, inner)?;
            }
        }
    }
    Ok(())
}

/// Split reserved arguments from equality filters
fn lower_arguments(arguments: Vec<(String, Literal)>, is_root: bool) -> GrammarResult<Arguments> {
    let mut lowered = Arguments::default();

    for (name, literal) in arguments {
        match (name.as_str(), literal) {
            ("active", Literal::Boolean(active)) => lowered.active = active,
            ("active", _) => {
                return Err(GrammarError::InvalidArgument {
                    name: "active",
                    expected: "a boolean",
                })
            }
            ("first", Literal::Int(n)) if n >= 0 => lowered.first = Some(n.unsigned_abs()),
            ("first", _) => {
                return Err(GrammarError::InvalidArgument {
                    name: "first",
                    expected: "a non-negative integer",
                })
            }
            ("after", Literal::Int(n)) if is_root => lowered.after = Some(n),
            ("after", _) if is_root => {
                return Err(GrammarError::InvalidArgument {
                    name: "after",
                    expected: "an integer row identity",
                })
            }
            ("after", _) => return Err(GrammarError::Unsupported("'after' on nested relations")),
            (_, literal) => lowered.filters.push((to_snake(&name), literal)),
        }
    }
    Ok(lowered)
}
