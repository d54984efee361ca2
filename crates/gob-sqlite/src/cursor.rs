//! Streaming row cursor
//!
//! Rows are fetched one at a time from the statement and converted to JSON
//! maps keyed by column alias. Nothing is buffered beyond the current row.

use crate::error::{SqliteError, SqliteResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gob_query::Row;
use rusqlite::types::ValueRef;
use rusqlite::{Rows, Statement};
use serde_json::{Number, Value};

/// Iterator over the rows of one statement
pub struct SqliteCursor<'s> {
    columns: Vec<String>,
    rows: Rows<'s>,
    done: bool,
}

impl<'s> SqliteCursor<'s> {
    /// Execute a prepared statement
    pub fn open(statement: &'s mut Statement<'_>) -> SqliteResult<Self> {
        let columns = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let rows = statement.query([])?;
        Ok(Self {
            columns,
            rows,
            done: false,
        })
    }

    /// Column aliases in select order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for SqliteCursor<'_> {
    type Item = SqliteResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let columns = &self.columns;
        let result = match self.rows.next() {
            Ok(Some(row)) => columns
                .iter()
                .enumerate()
                .map(|(i, name)| Ok((name.clone(), to_json(row.get_ref(i)?))))
                .collect::<Result<Row, rusqlite::Error>>()
                .map_err(SqliteError::from),
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e.into()),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}
