//! Tables derived from the model
//!
//! One entity table per collection and one materialization table per
//! reference attribute, named the way the query compiler expects them.

use crate::error::{SqliteError, SqliteResult};
use gob_model::{
    AttributeType, Collection, Registry, DATE_DELETED, EXPIRATION_DATE, GOBID, ID,
};
use rusqlite::Connection;
use tracing::{debug, info};

/// Columns of every relation materialization table
pub const RELATION_COLUMNS: &[&str] = &[
    "src_id",
    "src_volgnummer",
    "dst_id",
    "dst_volgnummer",
    "bronwaarde",
    "begin_geldigheid",
    "eind_geldigheid",
    DATE_DELETED,
    EXPIRATION_DATE,
];

/// Create all tables and indexes for a model (idempotent)
pub fn init_schema(conn: &Connection, registry: &Registry) -> SqliteResult<()> {
    let mut ddl = String::new();
    let mut relation_tables = 0usize;

    for collection in registry.collections() {
        ddl.push_str(&entity_table(collection));

        for attribute in collection.references() {
            let table = registry
                .relation_table_name(&collection.catalog, &collection.name, &attribute.name)
                .ok_or_else(|| {
                    SqliteError::Schema(format!(
                        "Reference {}.{} has no resolvable target",
                        collection.table_name(),
                        attribute.name
                    ))
                })?;
            ddl.push_str(&relation_table(&table));
            relation_tables += 1;
        }
    }

    debug!(statements = ddl.matches(';').count(), "Applying schema");
    conn.execute_batch(&ddl)?;

    info!(
        collections = registry.collections().count(),
        relation_tables, "Schema initialized"
    );
    Ok(())
}

fn entity_table(collection: &Collection) -> String {
    let table = collection.table_name();
    let mut columns = vec![
        format!("{GOBID} INTEGER PRIMARY KEY"),
        format!("{ID} TEXT"),
        format!("{DATE_DELETED} TEXT"),
        format!("{EXPIRATION_DATE} TEXT"),
    ];
    columns.extend(
        collection
            .attributes
            .iter()
            .map(|a| format!("{} {}", a.name, sql_type(&a.attribute_type))),
    );

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n);\nCREATE INDEX IF NOT EXISTS idx_{table}_id ON {table}({ID});\n",
        columns.join(",\n    ")
    )
}

fn relation_table(table: &str) -> String {
    let columns: Vec<String> = RELATION_COLUMNS
        .iter()
        .map(|c| {
            let ty = if c.ends_with("volgnummer") { "INTEGER" } else { "TEXT" };
            format!("{c} {ty}")
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n);\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_src ON {table}(src_id);\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_dst ON {table}(dst_id);\n",
        columns.join(",\n    ")
    )
}

/// SQLite storage class for an attribute
///
/// References, structured and secure attributes hold JSON text, geometries
/// hold WKT.
fn sql_type(attribute_type: &AttributeType) -> &'static str {
    match attribute_type {
        AttributeType::Integer | AttributeType::Boolean => "INTEGER",
        AttributeType::Decimal => "REAL",
        _ => "TEXT",
    }
}
