//! Loading entities and relation rows from NDJSON
//!
//! One record per line:
//!
//! ```json
//! {"kind": "entity", "catalog": "gebieden", "collection": "buurten", "values": {"_id": "B1", "naam": "Oost"}}
//! {"kind": "relation", "catalog": "gebieden", "collection": "buurten", "attribute": "ligt_in_wijk", "values": {"src_id": "B1", "dst_id": "W1"}}
//! ```
//!
//! Objects and arrays are stored as JSON text, booleans as integers.

use crate::error::{SqliteError, SqliteResult};
use crate::schema::RELATION_COLUMNS;
use gob_model::{Collection, Registry, DATE_DELETED, EXPIRATION_DATE, GOBID, ID};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::BufRead;
use tracing::{debug, info};

/// One line of a load file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Entity {
        catalog: String,
        collection: String,
        values: Map<String, Value>,
    },
    Relation {
        catalog: String,
        collection: String,
        attribute: String,
        values: Map<String, Value>,
    },
}

/// Rows written by [`load_records`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub entities: usize,
    pub relations: usize,
}

/// Load NDJSON records in one transaction
///
/// Blank lines are skipped. The first invalid record aborts the load and
/// nothing is written.
pub fn load_records(
    conn: &mut Connection,
    registry: &Registry,
    reader: impl BufRead,
) -> SqliteResult<LoadStats> {
    let tx = conn.transaction()?;
    let mut stats = LoadStats::default();

    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SqliteError::Load(format!("line {}: {}", number + 1, e)))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line)
            .map_err(|e| SqliteError::Load(format!("line {}: {}", number + 1, e)))?;

        match record {
            Record::Entity {
                catalog,
                collection,
                values,
            } => {
                let collection = collection_of(registry, &catalog, &collection)?;
                insert_entity(&tx, collection, &values)?;
                stats.entities += 1;
            }
            Record::Relation {
                catalog,
                collection,
                attribute,
                values,
            } => {
                insert_relation(&tx, registry, &catalog, &collection, &attribute, &values)?;
                stats.relations += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        entities = stats.entities,
        relations = stats.relations,
        "Loaded records"
    );
    Ok(stats)
}

/// Insert one entity row; returns its row identity
pub fn insert_entity(
    conn: &Connection,
    collection: &Collection,
    values: &Map<String, Value>,
) -> SqliteResult<i64> {
    let table = collection.table_name();
    insert(conn, &table, values, |column| {
        [GOBID, ID, DATE_DELETED, EXPIRATION_DATE].contains(&column)
            || collection.attribute(column).is_some()
    })?;
    Ok(conn.last_insert_rowid())
}

/// Insert one row into the materialization table of a reference attribute
pub fn insert_relation(
    conn: &Connection,
    registry: &Registry,
    catalog: &str,
    collection: &str,
    attribute: &str,
    values: &Map<String, Value>,
) -> SqliteResult<()> {
    let table = registry
        .relation_table_name(catalog, collection, attribute)
        .ok_or_else(|| {
            SqliteError::Load(format!("{catalog}:{collection} has no reference '{attribute}'"))
        })?;
    insert(conn, &table, values, |column| RELATION_COLUMNS.contains(&column))
}

fn collection_of<'r>(
    registry: &'r Registry,
    catalog: &str,
    collection: &str,
) -> SqliteResult<&'r Collection> {
    registry
        .collection(catalog, collection)
        .ok_or_else(|| SqliteError::Load(format!("Unknown collection {catalog}:{collection}")))
}

fn insert(
    conn: &Connection,
    table: &str,
    values: &Map<String, Value>,
    known: impl Fn(&str) -> bool,
) -> SqliteResult<()> {
    if let Some(unknown) = values.keys().find(|k| !known(k.as_str())) {
        return Err(SqliteError::Load(format!("Unknown column {table}.{unknown}")));
    }
    if values.is_empty() {
        return Err(SqliteError::Load(format!("Empty row for {table}")));
    }

    let columns: Vec<&str> = values.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    debug!(table, columns = columns.len(), "Inserting row");
    conn.execute(&sql, params_from_iter(values.values().map(to_sql)))?;
    Ok(())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
