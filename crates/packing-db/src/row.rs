//! # Generic Rows
//!
//! The store's untyped API speaks JSON: parameters are `serde_json::Value`s
//! and every result row is a column-name → value map.
//!
//! ```text
//!   Value::Null      ──► NULL            INTEGER ──► Value::Number (i64)
//!   Value::Bool      ──► INTEGER 0/1     REAL    ──► Value::Number (f64)
//!   Value::Number    ──► INTEGER | REAL  TEXT    ──► Value::String
//!   Value::String    ──► TEXT            BLOB    ──► Value::Array of bytes
//!   Array / Object   ──► TEXT (JSON)     NULL    ──► Value::Null
//! ```

use serde_json::{Map, Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

/// Result of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    /// Rows changed by the statement.
    pub changes: u64,
    /// Rowid of the last inserted row on this connection.
    pub last_insert_id: i64,
}

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds positional parameters in order.
pub(crate) fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Converts a result row into a JSON map, using each value's storage class.
pub(crate) fn decode_row(row: &SqliteRow) -> Row {
    let mut map = Map::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let value = match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => Value::Null,
            Ok(raw) => {
                let type_name = raw.type_info().name().to_ascii_uppercase();
                decode_value(row, index, &type_name)
            }
            Err(_) => Value::Null,
        };
        map.insert(column.name().to_string(), value);
    }

    map
}

fn decode_value(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "INTEGER" | "INT4" | "INT8" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get_unchecked::<f64, _>(index)
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::Array(bytes.into_iter().map(Value::from).collect()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
