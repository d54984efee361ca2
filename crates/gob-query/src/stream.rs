//! Row stream reconstructor: joined rows back to entity trees
//!
//! Rows arrive ordered by root row identity. [`EntityStream`] accumulates the
//! rows of one root entity and emits the merged entity as soon as a row with
//! another identity (or the end of the cursor) shows up, so memory holds one
//! entity's rows at a time.
//!
//! Each emitted entity looks like
//!
//! ```json
//! {"node": {"identificatie": "A1", "referentie": {"edges": [{"node": {"naam": "B"}}]}}}
//! ```

use crate::error::{QueryError, StreamError};
use crate::ir::{SOURCE_INFO, SOURCE_VALUE};
use crate::plan::{FieldPlan, RelationPlan, ResultPlan};
use gob_auth::{AuthContext, Authority};
use gob_model::GOBID;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

/// One result row keyed by column alias
pub type Row = Map<String, Value>;

const CATALOG: &str = "_catalog";
const COLLECTION: &str = "_collection";

/// Entity under construction
#[derive(Debug)]
struct NodeBuf<'a> {
    fields: Map<String, Value>,
    /// Output keys of the requested fields
    keys: &'a [FieldPlan],
    /// (relation index, child node indices) in plan order
    relations: Vec<(usize, Vec<usize>)>,
}

/// Lazily merges a row cursor into entities
///
/// Yields `{"node": ...}` values. A cursor error is yielded once and ends the
/// stream.
pub struct EntityStream<'a, I> {
    rows: I,
    plan: &'a ResultPlan,
    auth: &'a AuthContext,
    /// Relation indices, parent before child
    order: Vec<usize>,
    /// Child relation indices of the root and of every relation
    root_children: Vec<usize>,
    children: Vec<Vec<usize>>,
    /// Parent relation index of every relation, `None` under the root
    parents: Vec<Option<usize>>,
    authorities: HashMap<(String, String), Authority<'a>>,
    group: Vec<Row>,
    last_gobid: Option<Value>,
    emitted: u64,
    done: bool,
}

impl<'a, I, E> EntityStream<'a, I>
where
    I: Iterator<Item = Result<Row, E>>,
    E: Into<QueryError>,
{
    /// Fails when the plan's relation hierarchy is inconsistent
    pub fn new(rows: I, plan: &'a ResultPlan, auth: &'a AuthContext) -> Result<Self, QueryError> {
        let order = plan.evaluation_order()?;

        let index_of: HashMap<&str, usize> = plan
            .relations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.alias.as_str(), i))
            .collect();
        let mut root_children = Vec::new();
        let mut children = vec![Vec::new(); plan.relations.len()];
        let mut parents = Vec::with_capacity(plan.relations.len());
        for (i, relation) in plan.relations.iter().enumerate() {
            let parent = index_of.get(relation.parent.as_str()).copied();
            match parent {
                Some(parent) => children[parent].push(i),
                None => root_children.push(i),
            }
            parents.push(parent);
        }

        Ok(Self {
            rows,
            plan,
            auth,
            order,
            root_children,
            children,
            parents,
            authorities: HashMap::new(),
            group: Vec::new(),
            last_gobid: None,
            emitted: 0,
            done: false,
        })
    }

    /// Entities emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Merge the rows of one root entity
    fn finalize(&mut self, group: Vec<Row>) -> Result<Value, QueryError> {
        let Some(first) = group.first() else {
            return Err(StreamError::InvalidRow("empty row group".to_string()).into());
        };

        let mut root = Map::new();
        for key in [GOBID, CATALOG, COLLECTION] {
            root.insert(key.to_string(), first.get(key).cloned().unwrap_or(Value::Null));
        }
        for field in &self.plan.fields {
            let value = first.get(&field.name).cloned().unwrap_or(Value::Null);
            let value = if field.kind.is_json() {
                parse_json_text(value)?
            } else {
                value
            };
            root.insert(field.name.clone(), value);
        }

        let plan = self.plan;
        let mut nodes = vec![NodeBuf {
            fields: root,
            keys: &plan.fields,
            relations: self.root_children.iter().map(|&i| (i, Vec::new())).collect(),
        }];
        let mut identities: HashMap<(usize, usize, String), usize> = HashMap::new();

        for row in &group {
            let mut resolved: Vec<Option<usize>> = vec![None; self.plan.relations.len()];

            for &r in &self.order {
                let relation = &plan.relations[r];
                let parent_node = match self.parents[r] {
                    None => 0,
                    Some(p) => match resolved[p] {
                        Some(node) => node,
                        None => continue,
                    },
                };

                let Some((object, identity)) = relation_object(relation, row)? else {
                    continue;
                };

                let key = (parent_node, r, identity);
                let node = match identities.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let index = nodes.len();
                        nodes.push(NodeBuf {
                            fields: object,
                            keys: &relation.fields,
                            relations: self.children[r].iter().map(|&c| (c, Vec::new())).collect(),
                        });
                        if let Some((_, items)) =
                            nodes[parent_node].relations.iter_mut().find(|(c, _)| *c == r)
                        {
                            items.push(index);
                        }
                        identities.insert(key, index);
                        index
                    }
                };
                resolved[r] = Some(node);
            }
        }

        trace!(rows = group.len(), objects = nodes.len(), "Merged entity");
        let node = self.render(&mut nodes, 0);
        Ok(Value::Object(Map::from_iter([("node".to_string(), node)])))
    }

    /// Apply authority, rename to output keys and nest relations
    fn render(&mut self, nodes: &mut [NodeBuf<'a>], index: usize) -> Value {
        let mut fields = std::mem::take(&mut nodes[index].fields);
        let catalog = string_field(&fields, CATALOG);
        let collection = string_field(&fields, COLLECTION);
        self.authority(catalog, collection).filter_row(&mut fields);

        // A field requested under several keys appears under each of them
        let mut output = Map::new();
        for field in nodes[index].keys {
            let value = fields.get(&field.name).cloned().unwrap_or(Value::Null);
            output.insert(field.key.clone(), value);
        }

        let relations = std::mem::take(&mut nodes[index].relations);
        for (relation, items) in relations {
            let edges: Vec<Value> = items
                .into_iter()
                .map(|child| {
                    let node = self.render(nodes, child);
                    Value::Object(Map::from_iter([("node".to_string(), node)]))
                })
                .collect();
            let container = Map::from_iter([("edges".to_string(), Value::Array(edges))]);
            output.insert(
                self.plan.relations[relation].alias.clone(),
                Value::Object(container),
            );
        }
        Value::Object(output)
    }

    fn authority(&mut self, catalog: String, collection: String) -> &Authority<'a> {
        let auth = self.auth;
        self.authorities
            .entry((catalog, collection))
            .or_insert_with_key(|(catalog, collection)| auth.authority(catalog, collection))
    }
}

impl<'a, I, E> Iterator for EntityStream<'a, I>
where
    I: Iterator<Item = Result<Row, E>>,
    E: Into<QueryError>,
{
    type Item = Result<Value, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.rows.next() {
                Some(Ok(row)) => {
                    let gobid = row.get(GOBID).cloned().unwrap_or(Value::Null);
                    let changed = self.last_gobid.as_ref().is_some_and(|last| *last != gobid);
                    self.last_gobid = Some(gobid);

                    if changed && !self.group.is_empty() {
                        let group = std::mem::replace(&mut self.group, vec![row]);
                        let entity = self.finalize(group);
                        self.emitted += 1;
                        return Some(entity);
                    }
                    self.group.push(row);
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.group.clear();
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    if self.group.is_empty() {
                        debug!(entities = self.emitted, "Entity stream complete");
                        return None;
                    }
                    let group = std::mem::take(&mut self.group);
                    self.emitted += 1;
                    debug!(entities = self.emitted, "Entity stream complete");
                    return Some(self.finalize(group));
                }
            }
        }
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// JSON text columns come back as strings
fn parse_json_text(value: Value) -> Result<Value, StreamError> {
    match value {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|e| StreamError::InvalidRow(format!("invalid JSON column: {e}"))),
        other => Ok(other),
    }
}

/// Extract a relation's object from a row
///
/// Returns the object and its identity within the parent, or `None` when
/// the row carries no related entity for this relation. An object without
/// row identity is no entity, unless non-null source data was attached.
fn relation_object(
    relation: &RelationPlan,
    row: &Row,
) -> Result<Option<(Map<String, Value>, String)>, StreamError> {
    let mut object = match row.get(&relation.column) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(text)) => match serde_json::from_str(text) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(StreamError::InvalidRow(format!(
                    "column {} is not a JSON object",
                    relation.column
                )))
            }
        },
        Some(_) => {
            return Err(StreamError::InvalidRow(format!(
                "column {} is not a JSON object",
                relation.column
            )))
        }
    };

    let raw_source = relation
        .source_column
        .as_ref()
        .and_then(|column| row.get(column))
        .filter(|v| !v.is_null());
    if let Some(raw) = raw_source {
        let column = relation.source_column.as_deref().unwrap_or_default();
        let source = match raw {
            Value::String(text) => serde_json::from_str(text).map_err(|e| {
                StreamError::InvalidRow(format!("column {column} is not valid JSON: {e}"))
            })?,
            other => other.clone(),
        };
        for field in &relation.source_fields {
            let value = match field.as_str() {
                SOURCE_VALUE | SOURCE_INFO => source.get(field).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            };
            object.insert(field.clone(), value);
        }
    }

    let identified = object.get(GOBID).is_some_and(|v| !v.is_null());
    let sourced = relation
        .source_fields
        .iter()
        .any(|field| object.get(field).is_some_and(|v| !v.is_null()));
    if !identified && !sourced {
        return Ok(None);
    }

    let identity = format!(
        "{}|{}",
        object.get(GOBID).unwrap_or(&Value::Null),
        raw_source.map(Value::to_string).unwrap_or_default()
    );
    Ok(Some((object, identity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_query;
    use crate::plan::{FieldKind, FieldPlan, JoinKind};
    use gob_auth::{AuthScheme, Base64Cipher, CatalogRule, CollectionRule, User, PLACEHOLDER};
    use gob_model::testing::sample_registry;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Arc;

    fn context(scheme: AuthScheme, roles: &[&str]) -> AuthContext {
        AuthContext::new(
            Arc::new(sample_registry()),
            Arc::new(scheme),
            Arc::new(Base64Cipher),
            User::new(None, roles.iter().copied()),
        )
    }

    fn row(value: Value) -> Result<Row, Infallible> {
        match value {
            Value::Object(map) => Ok(map),
            _ => panic!("row fixture must be an object"),
        }
    }

    fn run(plan: &ResultPlan, auth: &AuthContext, rows: Vec<Value>) -> Vec<Value> {
        let rows = rows.into_iter().map(row);
        EntityStream::new(rows, plan, auth)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    impl From<Infallible> for QueryError {
        fn from(e: Infallible) -> Self {
            match e {}
        }
    }

    fn rel_b(gobid: Option<i64>, naam: Option<&str>) -> Value {
        json!({
            "_gobid": gobid,
            "_catalog": "catalog",
            "_collection": "collectionb",
            "naam": naam,
        })
        .to_string()
        .into()
    }

    #[test]
    fn test_scalar_rows_one_entity_per_identity() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query("{ catalogCollectiona { edges { node { identificatie } } } }", &auth)
            .unwrap();
        let rows = (1..=3)
            .map(|i| json!({"_gobid": i, "_catalog": "catalog", "_collection": "collectiona", "identificatie": format!("A{i}")}))
            .collect();

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities,
            vec![
                json!({"node": {"identificatie": "A1"}}),
                json!({"node": {"identificatie": "A2"}}),
                json!({"node": {"identificatie": "A3"}}),
            ]
        );
    }

    #[test]
    fn test_many_relation_merges_rows() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query(
            "{ catalogCollectiona { edges { node { naam referenties { edges { node { naam } } } } } } }",
            &auth,
        )
        .unwrap();
        let rows = vec![
            json!({"_gobid": 1, "_catalog": "catalog", "_collection": "collectiona", "naam": "a", "_rel_1": rel_b(Some(10), Some("b1"))}),
            json!({"_gobid": 1, "_catalog": "catalog", "_collection": "collectiona", "naam": "a", "_rel_1": rel_b(Some(11), Some("b2"))}),
            // Same child again (joined twice by another relation): no duplicate
            json!({"_gobid": 1, "_catalog": "catalog", "_collection": "collectiona", "naam": "a", "_rel_1": rel_b(Some(11), Some("b2"))}),
            json!({"_gobid": 2, "_catalog": "catalog", "_collection": "collectiona", "naam": "c", "_rel_1": null}),
        ];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(entities.len(), 2);
        assert_eq!(
            entities[0],
            json!({"node": {"naam": "a", "referenties": {"edges": [
                {"node": {"naam": "b1"}},
                {"node": {"naam": "b2"}},
            ]}}})
        );
        // Container present even without related entities
        assert_eq!(
            entities[1],
            json!({"node": {"naam": "c", "referenties": {"edges": []}}})
        );
    }

    #[test]
    fn test_unmatched_single_relation_is_empty_not_absent() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled =
            compile_query("{ catalogCollectiona { naam referentie { naam } } }", &auth).unwrap();
        let rows = vec![json!({
            "_gobid": 1, "_catalog": "catalog", "_collection": "collectiona", "naam": "a",
            "_rel_1": rel_b(None, None),
        })];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities[0],
            json!({"node": {"naam": "a", "referentie": {"edges": []}}})
        );
    }

    #[test]
    fn test_dangling_reference_keeps_source_values() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query(
            "{ catalogCollectiona { referentie { naam bronwaarde broninfo } } }",
            &auth,
        )
        .unwrap();
        let rows = vec![json!({
            "_gobid": 1, "_catalog": "catalog", "_collection": "collectiona",
            "_rel_1": rel_b(None, None),
            "_src_1": json!({"id": "missing", "bronwaarde": "B-404", "broninfo": {"code": 1}}).to_string(),
        })];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities[0],
            json!({"node": {"referentie": {"edges": [{"node": {
                "naam": null,
                "bronwaarde": "B-404",
                "broninfo": {"code": 1},
            }}]}}})
        );
    }

    #[test]
    fn test_validity_without_related_entity_is_empty() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query(
            r#"{ catalogCollectionb { invReferentieCatalogCollectiona(naam: "zzz") { naam beginGeldigheidRelatie } } }"#,
            &auth,
        )
        .unwrap();
        // Relation row matched, filtered source row did not
        let rel_a: Value = json!({
            "_gobid": null, "_catalog": "catalog", "_collection": "collectiona",
            "naam": null, "begin_geldigheid_relatie": "2020-06-01",
        })
        .to_string()
        .into();
        let rows = vec![json!({
            "_gobid": 1, "_catalog": "catalog", "_collection": "collectionb", "_rel_1": rel_a,
        })];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities[0],
            json!({"node": {"invReferentieCatalogCollectiona": {"edges": []}}})
        );
    }

    #[test]
    fn test_corrupt_source_column_is_invalid_row() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled =
            compile_query("{ catalogCollectiona { referentie { bronwaarde } } }", &auth).unwrap();
        let rows = vec![row(json!({
            "_gobid": 1, "_catalog": "catalog", "_collection": "collectiona",
            "_rel_1": rel_b(Some(10), Some("b1")),
            "_src_1": "{not json",
        }))];

        let mut stream = EntityStream::new(rows.into_iter(), &compiled.plan, &auth).unwrap();
        assert!(matches!(
            stream.next(),
            Some(Err(QueryError::Stream(StreamError::InvalidRow(_))))
        ));
    }

    #[test]
    fn test_aliased_fields_rendered_under_each_key() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query(
            "{ catalogCollectiona { ident: identificatie identificatie referentie { n: naam naam } } }",
            &auth,
        )
        .unwrap();
        let rows = vec![json!({
            "_gobid": 1, "_catalog": "catalog", "_collection": "collectiona",
            "identificatie": "A1",
            "_rel_1": rel_b(Some(10), Some("b1")),
        })];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities[0],
            json!({"node": {
                "ident": "A1",
                "identificatie": "A1",
                "referentie": {"edges": [{"node": {"n": "b1", "naam": "b1"}}]},
            }})
        );
    }

    #[test]
    fn test_nested_relations_attach_to_their_parent() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query(
            "{ catalogCollectiona { referenties { naam ligtIn { naam } } } }",
            &auth,
        )
        .unwrap();
        let rel_c = |gobid: i64, naam: &str| -> Value {
            json!({"_gobid": gobid, "_catalog": "catalog", "_collection": "collectionc", "naam": naam})
                .to_string()
                .into()
        };
        let base = |rel_1: Value, rel_2: Value| {
            json!({"_gobid": 1, "_catalog": "catalog", "_collection": "collectiona", "_rel_1": rel_1, "_rel_2": rel_2})
        };
        let rows = vec![
            base(rel_b(Some(10), Some("b1")), rel_c(20, "c1")),
            base(rel_b(Some(10), Some("b1")), rel_c(21, "c2")),
            base(rel_b(Some(11), Some("b2")), rel_c(20, "c1")),
        ];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities,
            vec![json!({"node": {"referenties": {"edges": [
                {"node": {"naam": "b1", "ligtIn": {"edges": [
                    {"node": {"naam": "c1"}},
                    {"node": {"naam": "c2"}},
                ]}}},
                {"node": {"naam": "b2", "ligtIn": {"edges": [
                    {"node": {"naam": "c1"}},
                ]}}},
            ]}}})]
        );
    }

    #[test]
    fn test_authority_applied_to_rows() {
        let scheme = AuthScheme {
            catalogs: HashMap::from([(
                "secure".to_string(),
                CatalogRule {
                    roles: vec![],
                    collections: HashMap::from([(
                        "personen".to_string(),
                        CollectionRule {
                            roles: vec![],
                            attributes: HashMap::from([(
                                "naam".to_string(),
                                vec!["gob_namen".to_string()],
                            )]),
                        },
                    )]),
                },
            )]),
            ..Default::default()
        };
        let auth = context(scheme, &[]);
        let compiled =
            compile_query("{ securePersonen { identificatie naam bsn } }", &auth).unwrap();
        let rows = vec![json!({
            "_gobid": 1, "_catalog": "secure", "_collection": "personen",
            "identificatie": "P1",
            "naam": "Jansen",
            "bsn": Base64Cipher::seal(5, "123").to_string(),
        })];

        let entities = run(&compiled.plan, &auth, rows);
        // Suppressed: present and null, never the value
        assert_eq!(
            entities[0],
            json!({"node": {"identificatie": "P1", "naam": null, "bsn": "123"}})
        );
    }

    #[test]
    fn test_secure_value_without_level_role_is_placeholder() {
        let scheme = AuthScheme {
            secure: gob_auth::SecureLevels {
                levels: HashMap::from([("5".to_string(), vec!["gob_level_5".to_string()])]),
            },
            ..Default::default()
        };
        let auth = context(scheme, &[]);
        let compiled = compile_query("{ securePersonen { bsn details } }", &auth).unwrap();
        let details = json!({"geboortedatum": Base64Cipher::seal(5, "1970-01-01"), "plaats": "A"});
        let rows = vec![json!({
            "_gobid": 1, "_catalog": "secure", "_collection": "personen",
            "bsn": Base64Cipher::seal(5, "123").to_string(),
            "details": details.to_string(),
        })];

        let entities = run(&compiled.plan, &auth, rows);
        assert_eq!(
            entities[0],
            json!({"node": {"bsn": PLACEHOLDER, "details": {"geboortedatum": PLACEHOLDER, "plaats": "A"}}})
        );
    }

    #[test]
    fn test_store_error_ends_stream() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query("{ catalogCollectiona { naam } }", &auth).unwrap();
        let rows: Vec<Result<Row, QueryError>> = vec![
            Ok(Map::from_iter([("_gobid".to_string(), json!(1))])),
            Ok(Map::from_iter([("_gobid".to_string(), json!(2))])),
            Err(StreamError::Store("connection lost".into()).into()),
            Ok(Map::from_iter([("_gobid".to_string(), json!(3))])),
        ];

        let mut stream = EntityStream::new(rows.into_iter(), &compiled.plan, &auth).unwrap();
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(
            stream.next(),
            Some(Err(QueryError::Stream(StreamError::Store(_))))
        ));
        // Nothing after a failure, not even the buffered entity
        assert!(stream.next().is_none());
        assert_eq!(stream.emitted(), 1);
    }

    #[test]
    fn test_inconsistent_hierarchy_is_fatal() {
        let auth = context(AuthScheme::default(), &[]);
        let plan = ResultPlan {
            root_alias: "catalogCollectiona".into(),
            catalog: "catalog".into(),
            collection: "collectiona".into(),
            fields: vec![FieldPlan {
                name: "naam".into(),
                key: "naam".into(),
                kind: FieldKind::Scalar,
            }],
            relations: vec![RelationPlan {
                alias: "orphan".into(),
                parent: "nowhere".into(),
                join: JoinKind::ForwardSingle,
                catalog: "catalog".into(),
                collection: "collectionb".into(),
                column: "_rel_1".into(),
                source_column: None,
                source_fields: vec![],
                fields: vec![],
            }],
        };
        let rows: Vec<Result<Row, QueryError>> = vec![];
        let result = EntityStream::new(rows.into_iter(), &plan, &auth);
        assert!(matches!(
            result,
            Err(QueryError::Stream(StreamError::HierarchyInconsistency { .. }))
        ));
    }

    #[test]
    fn test_empty_cursor() {
        let auth = context(AuthScheme::default(), &[]);
        let compiled = compile_query("{ catalogCollectiona { naam } }", &auth).unwrap();
        assert!(run(&compiled.plan, &auth, vec![]).is_empty());
    }
}
