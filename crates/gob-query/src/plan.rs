//! Result plan: what the reconstructor needs to know about the compiled SQL

use crate::error::StreamError;
use gob_model::{Attribute, AttributeType};
use serde::Serialize;
use std::collections::HashSet;

/// How a requested attribute travels through SQL and comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    /// Selected as text
    Geometry,
    /// JSON text, parsed back into JSON
    Structured,
    /// Encrypted envelope, JSON text
    Secure,
}

impl FieldKind {
    /// Field kind of an attribute; `None` for references, which are relations
    pub fn of(attribute: &Attribute) -> Option<Self> {
        match attribute.attribute_type {
            AttributeType::Reference | AttributeType::ManyReference => None,
            AttributeType::Geometry => Some(Self::Geometry),
            AttributeType::Json => Some(Self::Structured),
            AttributeType::Secure(_) => Some(Self::Secure),
            _ => Some(Self::Scalar),
        }
    }

    /// Whether the stored value is JSON text
    pub fn is_json(self) -> bool {
        matches!(self, Self::Structured | Self::Secure)
    }
}

/// Join shape of a relation, resolved once per relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    ForwardSingle,
    ForwardMany,
    InverseSingle,
    InverseMany,
}

impl JoinKind {
    pub fn is_inverse(self) -> bool {
        matches!(self, Self::InverseSingle | Self::InverseMany)
    }

    /// Whether the join can produce more than one row per parent row
    pub fn multiplies_rows(self) -> bool {
        !matches!(self, Self::ForwardSingle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPlan {
    /// snake_case attribute name, also the column or JSON key
    pub name: String,
    /// Key in the output object
    pub key: String,
    pub kind: FieldKind,
}

/// One relation of the compiled query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationPlan {
    /// Key in the output
    pub alias: String,
    /// Alias of the parent relation or of the root
    pub parent: String,
    pub join: JoinKind,
    pub catalog: String,
    pub collection: String,
    /// Column holding the relation's JSON object
    pub column: String,
    /// Column holding the owning row's raw reference, when source fields
    /// were requested
    pub source_column: Option<String>,
    /// Requested source fields (`bronwaarde`, `broninfo`)
    pub source_fields: Vec<String>,
    /// Requested fields in query order, one per output key
    pub fields: Vec<FieldPlan>,
}

/// Everything the reconstructor needs besides Authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPlan {
    pub root_alias: String,
    pub catalog: String,
    pub collection: String,
    /// Requested root fields in query order, one per output key
    pub fields: Vec<FieldPlan>,
    /// Relations in query order
    pub relations: Vec<RelationPlan>,
}

impl ResultPlan {
    /// Relation indices ordered parent before child, root excluded
    ///
    /// Fails when a relation's parent is neither the root nor reachable from
    /// it.
    pub fn evaluation_order(&self) -> Result<Vec<usize>, StreamError> {
        let mut placed: HashSet<&str> = HashSet::from([self.root_alias.as_str()]);
        let mut order = Vec::with_capacity(self.relations.len());
        let mut remaining: Vec<usize> = (0..self.relations.len()).collect();

        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|&i| {
                let relation = &self.relations[i];
                if placed.contains(relation.parent.as_str()) {
                    placed.insert(relation.alias.as_str());
                    order.push(i);
                    false
                } else {
                    true
                }
            });

            if remaining.len() == before {
                let relation = &self.relations[remaining[0]];
                return Err(StreamError::HierarchyInconsistency {
                    relation: relation.alias.clone(),
                    parent: relation.parent.clone(),
                });
            }
        }
        Ok(order)
    }

    /// Whether any join can multiply root rows
    pub fn multiplies_rows(&self) -> bool {
        self.relations.iter().any(|r| r.join.multiplies_rows())
    }
}
