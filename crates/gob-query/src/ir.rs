//! Relation tree: the parsed form of a query
//!
//! One [`RelationNode`] per selected relation, root first, children after
//! their parent (pre-order). Every later stage keys relations by alias.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Synthetic relation field: the external key the relation was resolved from
pub const SOURCE_VALUE: &str = "bronwaarde";
/// Synthetic relation field: auxiliary data stored with the source value
pub const SOURCE_INFO: &str = "broninfo";
/// Synthetic relation field: start of validity of the relation itself
pub const BEGIN_VALIDITY_RELATION: &str = "begin_geldigheid_relatie";
/// Synthetic relation field: end of validity of the relation itself
pub const END_VALIDITY_RELATION: &str = "eind_geldigheid_relatie";

/// Argument literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// Render as SQL; strings are single-quoted with embedded quotes doubled
    pub fn to_sql(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Boolean(true) => "TRUE".to_string(),
            Literal::Boolean(false) => "FALSE".to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

/// Arguments of one relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    /// Restrict to active (not deleted, not expired) rows
    pub active: bool,
    /// Cap on entities per parent (or in total for the root)
    pub first: Option<u64>,
    /// Root only: continue after this row identity
    pub after: Option<i64>,
    /// Equality filters, snake_case attribute name to value, in query order
    pub filters: Vec<(String, Literal)>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            active: true,
            first: None,
            after: None,
            filters: Vec::new(),
        }
    }
}

/// One requested plain field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// snake_case attribute or synthetic field name
    pub name: String,
    /// Output key: the alias when given, else the camelCase name
    pub key: String,
}

impl Field {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// One selected relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationNode {
    /// snake_case attribute or inverse relation name; for the root the
    /// camelCase collection field as written in the query
    pub name: String,
    /// Key of the relation in every later map and in the output
    pub alias: String,
    /// Alias of the parent relation, `None` for the root
    pub parent: Option<String>,
    /// Requested plain fields in query order, unique by output key
    pub fields: Vec<Field>,
    pub arguments: Arguments,
}

impl RelationNode {
    pub fn new(name: impl Into<String>, alias: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            parent,
            fields: Vec::new(),
            arguments: Arguments::default(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Add a field unless its output key is already taken
    ///
    /// Returns `false` when the key is taken by a different field.
    pub fn add_field(&mut self, field: Field) -> bool {
        match self.fields.iter().find(|f| f.key == field.key) {
            Some(existing) => existing.name == field.name,
            None => {
                self.fields.push(field);
                true
            }
        }
    }

    pub fn wants(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }

    /// Distinct requested field names in query order
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !names.contains(&field.name.as_str()) {
                names.push(&field.name);
            }
        }
        names
    }
}

/// All relations of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationTree {
    nodes: Vec<RelationNode>,
}

impl RelationTree {
    /// Start a tree with its root
    pub fn new(root: RelationNode) -> Self {
        Self { nodes: vec![root] }
    }

    /// Append a relation; the caller guarantees the parent was added first
    pub(crate) fn push(&mut self, node: RelationNode) {
        self.nodes.push(node);
    }

    pub(crate) fn node_mut(&mut self, alias: &str) -> Option<&mut RelationNode> {
        self.nodes.iter_mut().find(|n| n.alias == alias)
    }

    pub fn root(&self) -> &RelationNode {
        &self.nodes[0]
    }

    /// Non-root relations in pre-order
    pub fn relations(&self) -> &[RelationNode] {
        &self.nodes[1..]
    }

    pub fn nodes(&self) -> &[RelationNode] {
        &self.nodes
    }

    pub fn get(&self, alias: &str) -> Option<&RelationNode> {
        self.nodes.iter().find(|n| n.alias == alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    /// Map of every non-root alias to its parent alias
    pub fn parent_of(&self) -> HashMap<String, String> {
        self.relations()
            .iter()
            .filter_map(|n| n.parent.clone().map(|p| (n.alias.clone(), p)))
            .collect()
    }

    /// Direct children of a relation, in query order
    pub fn children<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a RelationNode> + 'a {
        self.relations()
            .iter()
            .filter(move |n| n.parent.as_deref() == Some(alias))
    }
}
