//! SQL compiler: relation tree to a single SQLite statement
//!
//! The statement selects one row per combination of joined relation rows,
//! ordered by the root row identity:
//!
//! - root columns: `_gobid`, the `_catalog`/`_collection` constants and the
//!   requested root fields
//! - per relation `n`: a `json_object(...)` column `_rel_n` with the related
//!   entity (row identity, constants, requested fields, relation validity),
//!   and, when source fields are requested, the owning row's raw reference
//!   as `_src_n`
//!
//! Join shapes by [`JoinKind`]:
//!
//! - forward single: target joined on the id (and sequence number) inside the
//!   owning row's reference JSON
//! - forward many: reference array exploded with `json_each`, target joined
//!   per element; `first` and filters restrict the exploded elements through
//!   a sub-select ordered by array position
//! - inverse: joined through the relation table; with `first` the source
//!   table is matched on the fly through a sub-select ordered by `_gobid`
//!
//! Table aliases are `<abbreviation>_<relation index>`, the root being 0.

use crate::error::{CompileError, CompileResult, QueryResult};
use crate::ir::{
    Arguments, Literal, RelationNode, RelationTree, BEGIN_VALIDITY_RELATION,
    END_VALIDITY_RELATION, SOURCE_INFO, SOURCE_VALUE,
};
use crate::plan::{FieldKind, FieldPlan, JoinKind, RelationPlan, ResultPlan};
use crate::syntax::parse_query;
use gob_auth::{AuthContext, Authority};
use gob_model::{
    Attribute, Collection, Registry, RelationRef, BEGIN_VALIDITY, DATE_DELETED, END_VALIDITY,
    EXPIRATION_DATE, GOBID, ID, SEQNR,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// SQL plus the plan to turn its rows back into entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub plan: ResultPlan,
}

/// Parse and compile query text for a caller
pub fn compile_query(input: &str, auth: &AuthContext) -> QueryResult<CompiledQuery> {
    let tree = parse_query(input)?;
    Ok(SqlCompiler::new(auth).compile(&tree)?)
}

/// Active filter on a table alias
///
/// Soft-deleted rows are always excluded; `active` additionally excludes
/// expired rows.
pub fn active_predicate(alias: &str, active: bool) -> String {
    let not_deleted = format!("{alias}.{DATE_DELETED} IS NULL");
    if active {
        format!(
            "{not_deleted} AND ({alias}.{EXPIRATION_DATE} IS NULL OR {alias}.{EXPIRATION_DATE} > strftime('%Y-%m-%dT%H:%M:%S', 'now'))"
        )
    } else {
        not_deleted
    }
}

fn table_alias(collection: &Collection, index: usize) -> String {
    format!("{}_{}", collection.abbreviation.to_lowercase(), index)
}

fn quoted(s: &str) -> String {
    Literal::String(s.to_string()).to_sql()
}

/// Where a relation's entity lives in the statement
struct Scope<'r> {
    collection: &'r Collection,
    alias: String,
}

/// Requested fields of a relation split by purpose
#[derive(Default)]
struct Requested<'n> {
    attributes: Vec<&'n str>,
    source: Vec<String>,
    validity: bool,
}

impl<'n> Requested<'n> {
    fn split(node: &'n RelationNode) -> Self {
        let mut requested = Self::default();
        for field in node.field_names() {
            match field {
                SOURCE_VALUE | SOURCE_INFO => requested.source.push(field.to_string()),
                BEGIN_VALIDITY_RELATION | END_VALIDITY_RELATION => requested.validity = true,
                other => requested.attributes.push(other),
            }
        }
        requested
    }
}

/// Accumulates the statement while walking the tree
#[derive(Default)]
struct Statement {
    select: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<String>,
}

/// Compiles relation trees for one caller
pub struct SqlCompiler<'a> {
    registry: &'a Registry,
    auth: &'a AuthContext,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(auth: &'a AuthContext) -> Self {
        Self {
            registry: auth.registry(),
            auth,
        }
    }

    /// Compile a relation tree
    ///
    /// Fails with [`CompileError::NoAccess`] before anything else when the
    /// caller may not read the root collection.
    pub fn compile(&self, tree: &RelationTree) -> CompileResult<CompiledQuery> {
        let root = tree.root();
        let collection = self
            .registry
            .resolve_root(&root.name)
            .ok_or_else(|| CompileError::UnknownRoot(root.name.clone()))?;

        let authority = self.auth.authority(&collection.catalog, &collection.name);
        if !authority.allows_access() {
            info!(
                catalog = %collection.catalog,
                collection = %collection.name,
                user = ?self.auth.user().id(),
                "Query denied"
            );
            return Err(CompileError::NoAccess {
                catalog: collection.catalog.clone(),
                collection: collection.name.clone(),
            });
        }

        let root_alias = table_alias(collection, 0);
        let mut statement = Statement::default();

        statement.select.push(format!("{root_alias}.{GOBID} AS {GOBID}"));
        statement.select.extend(constants(collection));

        let mut kinds = HashMap::new();
        for field in root.field_names() {
            let attribute = attribute(collection, field)?;
            let kind = FieldKind::of(attribute)
                .ok_or_else(|| CompileError::MissingSelection(field.to_string()))?;
            statement
                .select
                .push(format!("{} AS {field}", column(&root_alias, field, kind)));
            kinds.insert(field, kind);
        }
        let fields = field_plans(root, &kinds);

        let mut scopes: HashMap<&str, Scope<'_>> = HashMap::new();
        scopes.insert(
            root.alias.as_str(),
            Scope {
                collection,
                alias: root_alias.clone(),
            },
        );

        let mut relations = Vec::with_capacity(tree.relations().len());
        for (offset, node) in tree.relations().iter().enumerate() {
            let index = offset + 1;
            let (plan, scope) = self.relation(node, index, &scopes, &mut statement)?;
            relations.push(plan);
            scopes.insert(node.alias.as_str(), scope);
        }

        let plan = ResultPlan {
            root_alias: root.alias.clone(),
            catalog: collection.catalog.clone(),
            collection: collection.name.clone(),
            fields,
            relations,
        };

        statement.conditions =
            self.root_predicates(collection, &authority, &root_alias, &root.arguments)?;

        let mut limit = None;
        if let Some(first) = root.arguments.first {
            if plan.multiplies_rows() {
                // Limit entities, not joined rows
                let inner = format!("lim_{root_alias}");
                let predicates =
                    self.root_predicates(collection, &authority, &inner, &root.arguments)?;
                statement.conditions.push(format!(
                    "{root_alias}.{GOBID} IN (SELECT {inner}.{GOBID} FROM {table} AS {inner} WHERE {predicates} ORDER BY {inner}.{GOBID} LIMIT {first})",
                    table = collection.table_name(),
                    predicates = predicates.join(" AND "),
                ));
            } else {
                limit = Some(first);
            }
        }

        let mut sql = format!(
            "SELECT {}\nFROM {} AS {}",
            statement.select.join(", "),
            collection.table_name(),
            root_alias
        );
        for join in &statement.joins {
            sql.push('\n');
            sql.push_str(join);
        }
        sql.push_str(&format!("\nWHERE {}", statement.conditions.join(" AND ")));
        sql.push_str(&format!("\nORDER BY {root_alias}.{GOBID}"));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        debug!(
            root = %root.name,
            relations = plan.relations.len(),
            joins = statement.joins.len(),
            "Compiled query"
        );
        Ok(CompiledQuery { sql, plan })
    }

    /// Predicates selecting root rows: active filter, equality filters and
    /// the `after` cursor
    fn root_predicates(
        &self,
        collection: &Collection,
        authority: &Authority<'_>,
        alias: &str,
        arguments: &Arguments,
    ) -> CompileResult<Vec<String>> {
        let mut predicates = vec![active_predicate(alias, arguments.active)];
        predicates.extend(filters(collection, authority, alias, &arguments.filters)?);
        if let Some(after) = arguments.after {
            predicates.push(format!("{alias}.{GOBID} > {after}"));
        }
        Ok(predicates)
    }

    fn relation<'s>(
        &'s self,
        node: &RelationNode,
        index: usize,
        scopes: &HashMap<&str, Scope<'s>>,
        statement: &mut Statement,
    ) -> CompileResult<(RelationPlan, Scope<'s>)> {
        let parent_alias = node.parent.as_deref().unwrap_or_default();
        let parent = scopes
            .get(parent_alias)
            .ok_or_else(|| CompileError::UnknownRelation {
                collection: parent_alias.to_string(),
                relation: node.name.clone(),
            })?;

        let relation = self
            .registry
            .relation(&parent.collection.catalog, &parent.collection.name, &node.name)
            .ok_or_else(|| CompileError::UnknownRelation {
                collection: format!("{}:{}", parent.collection.catalog, parent.collection.name),
                relation: node.name.clone(),
            })?;

        let requested = Requested::split(node);
        let arguments = &node.arguments;

        let (join, collection, alias, validity, source_expr) = match relation {
            RelationRef::Forward {
                attribute,
                target,
            } => {
                let alias = table_alias(target, index);
                let authority = self.auth.authority(&target.catalog, &target.name);
                let conditions = filters(target, &authority, &alias, &arguments.filters)?;
                let reference = format!("{}.{}", parent.alias, attribute.name);

                let (join, source_expr) = if attribute.attribute_type.is_many() {
                    let element = format!("je_{index}");
                    self.forward_many(
                        statement,
                        target,
                        &authority,
                        &reference,
                        &element,
                        &alias,
                        arguments,
                    )?;
                    let on = target_match(target, &alias, &format!("{element}.value"));
                    statement.joins.push(join_clause(
                        target,
                        &alias,
                        on,
                        &alias,
                        arguments.active,
                        conditions,
                    ));
                    (JoinKind::ForwardMany, format!("{element}.value"))
                } else {
                    let on = target_match(target, &alias, &reference);
                    statement.joins.push(join_clause(
                        target,
                        &alias,
                        on,
                        &alias,
                        arguments.active,
                        conditions,
                    ));
                    (JoinKind::ForwardSingle, reference)
                };

                let validity = if requested.validity {
                    let rel = format!("rel_{index}");
                    let table = self
                        .registry
                        .relation_table_name(
                            &parent.collection.catalog,
                            &parent.collection.name,
                            &attribute.name,
                        )
                        .ok_or_else(|| CompileError::UnknownRelation {
                            collection: parent.collection.name.clone(),
                            relation: attribute.name.clone(),
                        })?;
                    let mut on = vec![format!("{rel}.src_id = {}.{ID}", parent.alias)];
                    if parent.collection.has_states {
                        on.push(format!("{rel}.src_{SEQNR} = {}.{SEQNR}", parent.alias));
                    }
                    on.push(format!("{rel}.dst_id = {alias}.{ID}"));
                    if target.has_states {
                        on.push(format!("{rel}.dst_{SEQNR} = {alias}.{SEQNR}"));
                    }
                    on.push(active_predicate(&rel, arguments.active));
                    statement
                        .joins
                        .push(format!("LEFT JOIN {table} AS {rel} ON {}", on.join(" AND ")));
                    Some(rel)
                } else {
                    None
                };

                (join, target, alias, validity, Some(source_expr))
            }
            RelationRef::Inverse {
                relation: inverse,
                source,
            } => {
                if let Some(field) = requested.source.first() {
                    return Err(CompileError::SourceOnInverse {
                        relation: node.alias.clone(),
                        field: field.clone(),
                    });
                }
                let alias = table_alias(source, index);
                let authority = self.auth.authority(&source.catalog, &source.name);
                let join = if inverse.many {
                    JoinKind::InverseMany
                } else {
                    JoinKind::InverseSingle
                };

                let validity = match arguments.first {
                    Some(first) => {
                        self.inverse_paginated(
                            statement,
                            parent,
                            source,
                            &authority,
                            &inverse.attribute,
                            inverse.many,
                            &alias,
                            arguments,
                            first,
                        )?;
                        None
                    }
                    None => {
                        let rel = format!("rel_{index}");
                        let table = self
                            .registry
                            .relation_table_name(
                                &inverse.src_catalog,
                                &inverse.src_collection,
                                &inverse.attribute,
                            )
                            .ok_or_else(|| CompileError::UnknownRelation {
                                collection: inverse.src_collection.clone(),
                                relation: inverse.attribute.clone(),
                            })?;

                        let mut on = vec![format!("{rel}.dst_id = {}.{ID}", parent.alias)];
                        if parent.collection.has_states {
                            on.push(format!("{rel}.dst_{SEQNR} = {}.{SEQNR}", parent.alias));
                        }
                        on.push(active_predicate(&rel, arguments.active));
                        statement
                            .joins
                            .push(format!("LEFT JOIN {table} AS {rel} ON {}", on.join(" AND ")));

                        let mut source_on = vec![format!("{alias}.{ID} = {rel}.src_id")];
                        if source.has_states {
                            source_on.push(format!("{alias}.{SEQNR} = {rel}.src_{SEQNR}"));
                        }
                        let conditions = filters(source, &authority, &alias, &arguments.filters)?;
                        statement.joins.push(join_clause(
                            source,
                            &alias,
                            source_on.join(" AND "),
                            &alias,
                            arguments.active,
                            conditions,
                        ));
                        Some(rel)
                    }
                };

                (join, source, alias, validity, None)
            }
        };

        // Relation object
        let mut pairs = vec![
            format!("'{GOBID}', {alias}.{GOBID}"),
            format!("'_catalog', {}", quoted(&collection.catalog)),
            format!("'_collection', {}", quoted(&collection.name)),
        ];

        let mut kinds = HashMap::new();
        for &field in &requested.attributes {
            let attribute = attribute(collection, field)?;
            let kind = FieldKind::of(attribute)
                .ok_or_else(|| CompileError::MissingSelection(field.to_string()))?;
            let expr = match kind {
                FieldKind::Structured | FieldKind::Secure => format!("json({alias}.{field})"),
                _ => column(&alias, field, kind),
            };
            pairs.push(format!("'{field}', {expr}"));
            kinds.insert(field, kind);
        }
        if requested.validity {
            for (key, stored) in [
                (BEGIN_VALIDITY_RELATION, BEGIN_VALIDITY),
                (END_VALIDITY_RELATION, END_VALIDITY),
            ] {
                if node.wants(key) {
                    let expr = validity.as_ref().map_or_else(
                        || "NULL".to_string(),
                        |rel| format!("CASE WHEN {alias}.{GOBID} IS NOT NULL THEN {rel}.{stored} END"),
                    );
                    pairs.push(format!("'{key}', {expr}"));
                }
            }
        }

        let column_name = format!("_rel_{index}");
        statement
            .select
            .push(format!("json_object({}) AS {column_name}", pairs.join(", ")));

        let source_column = match (requested.source.is_empty(), source_expr) {
            (false, Some(expr)) => {
                let name = format!("_src_{index}");
                statement.select.push(format!("{expr} AS {name}"));
                Some(name)
            }
            _ => None,
        };

        let plan = RelationPlan {
            alias: node.alias.clone(),
            parent: parent_alias.to_string(),
            join,
            catalog: collection.catalog.clone(),
            collection: collection.name.clone(),
            column: column_name,
            source_column,
            source_fields: requested.source,
            fields: field_plans(node, &kinds),
        };
        Ok((plan, Scope { collection, alias }))
    }

    /// Explode a many reference; restrict the elements when paginated or
    /// filtered
    #[allow(clippy::too_many_arguments)]
    fn forward_many(
        &self,
        statement: &mut Statement,
        target: &Collection,
        authority: &Authority<'_>,
        reference: &str,
        element: &str,
        alias: &str,
        arguments: &Arguments,
    ) -> CompileResult<()> {
        if arguments.first.is_none() && arguments.filters.is_empty() {
            statement
                .joins
                .push(format!("LEFT JOIN json_each({reference}) AS {element} ON TRUE"));
            return Ok(());
        }

        let inner_element = format!("s_{element}");
        let inner = format!("s_{alias}");
        let mut predicates = vec![active_predicate(&inner, arguments.active)];
        predicates.extend(filters(target, authority, &inner, &arguments.filters)?);

        let mut subselect = format!(
            "SELECT {inner_element}.key FROM json_each({reference}) AS {inner_element} JOIN {table} AS {inner} ON {on} WHERE {predicates} ORDER BY {inner_element}.key",
            table = target.table_name(),
            on = target_match(target, &inner, &format!("{inner_element}.value")),
            predicates = predicates.join(" AND "),
        );
        if let Some(first) = arguments.first {
            subselect.push_str(&format!(" LIMIT {first}"));
        }

        statement.joins.push(format!(
            "LEFT JOIN json_each({reference}) AS {element} ON {element}.key IN ({subselect})"
        ));
        Ok(())
    }

    /// Inverse relation with `first`: match the source table on the fly
    #[allow(clippy::too_many_arguments)]
    fn inverse_paginated(
        &self,
        statement: &mut Statement,
        parent: &Scope<'_>,
        source: &Collection,
        authority: &Authority<'_>,
        attribute: &str,
        many: bool,
        alias: &str,
        arguments: &Arguments,
        first: u64,
    ) -> CompileResult<()> {
        let inner = format!("s_{alias}");
        let reference_match = |reference: &str| {
            let mut on = vec![format!("json_extract({reference}, '$.id') = {}.{ID}", parent.alias)];
            if parent.collection.has_states {
                on.push(format!(
                    "json_extract({reference}, '$.{SEQNR}') = {}.{SEQNR}",
                    parent.alias
                ));
            }
            on.join(" AND ")
        };

        let matches = if many {
            let element = format!("s_je_{alias}");
            format!(
                "EXISTS (SELECT 1 FROM json_each({inner}.{attribute}) AS {element} WHERE {})",
                reference_match(&format!("{element}.value"))
            )
        } else {
            reference_match(&format!("{inner}.{attribute}"))
        };

        let mut predicates = vec![matches, active_predicate(&inner, arguments.active)];
        predicates.extend(filters(source, authority, &inner, &arguments.filters)?);

        statement.joins.push(format!(
            "LEFT JOIN {table} AS {alias} ON {alias}.{GOBID} IN (SELECT {inner}.{GOBID} FROM {table} AS {inner} WHERE {predicates} ORDER BY {inner}.{GOBID} LIMIT {first})",
            table = source.table_name(),
            predicates = predicates.join(" AND "),
        ));
        Ok(())
    }
}

/// One plan entry per requested field, synthetic fields included
fn field_plans(node: &RelationNode, kinds: &HashMap<&str, FieldKind>) -> Vec<FieldPlan> {
    node.fields
        .iter()
        .map(|field| {
            let kind = match (kinds.get(field.name.as_str()), field.name.as_str()) {
                (Some(&kind), _) => kind,
                (None, SOURCE_INFO) => FieldKind::Structured,
                (None, _) => FieldKind::Scalar,
            };
            FieldPlan {
                name: field.name.clone(),
                key: field.key.clone(),
                kind,
            }
        })
        .collect()
}

/// Literal catalog and collection columns
fn constants(collection: &Collection) -> [String; 2] {
    [
        format!("{} AS _catalog", quoted(&collection.catalog)),
        format!("{} AS _collection", quoted(&collection.name)),
    ]
}

fn attribute<'c>(collection: &'c Collection, field: &str) -> CompileResult<&'c Attribute> {
    collection
        .attribute(field)
        .ok_or_else(|| CompileError::UnknownField {
            collection: format!("{}:{}", collection.catalog, collection.name),
            field: field.to_string(),
        })
}

fn column(alias: &str, field: &str, kind: FieldKind) -> String {
    match kind {
        FieldKind::Geometry => format!("CAST({alias}.{field} AS TEXT)"),
        _ => format!("{alias}.{field}"),
    }
}

/// Match a target row to a reference JSON value
fn target_match(target: &Collection, alias: &str, reference: &str) -> String {
    let mut on = format!("{alias}.{ID} = json_extract({reference}, '$.id')");
    if target.has_states {
        on.push_str(&format!(
            " AND {alias}.{SEQNR} = json_extract({reference}, '$.{SEQNR}')"
        ));
    }
    on
}

fn join_clause(
    collection: &Collection,
    alias: &str,
    on: String,
    active_alias: &str,
    active: bool,
    conditions: Vec<String>,
) -> String {
    let mut on = vec![on, active_predicate(active_alias, active)];
    on.extend(conditions);
    format!(
        "LEFT JOIN {} AS {alias} ON {}",
        collection.table_name(),
        on.join(" AND ")
    )
}

/// Equality predicates for filter arguments
fn filters(
    collection: &Collection,
    authority: &Authority<'_>,
    alias: &str,
    pairs: &[(String, Literal)],
) -> CompileResult<Vec<String>> {
    pairs
        .iter()
        .map(|(field, literal)| {
            let attribute = attribute(collection, field)?;
            let invalid = |reason| CompileError::InvalidFilter {
                collection: format!("{}:{}", collection.catalog, collection.name),
                field: field.clone(),
                reason,
            };
            match FieldKind::of(attribute) {
                None => return Err(invalid("relations cannot be filtered")),
                Some(FieldKind::Scalar) => {}
                Some(_) => return Err(invalid("only plain attributes can be filtered")),
            }
            if authority.suppressed_columns().contains(field) {
                return Err(invalid("attribute is not accessible"));
            }
            Ok(match literal {
                Literal::Null => format!("{alias}.{field} IS NULL"),
                literal => format!("{alias}.{field} = {}", literal.to_sql()),
            })
        })
        .collect()
}
