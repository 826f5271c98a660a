//! Conversion between serde-serializable records and rows.
//!
//! Records travel through `serde_json`, so the column names a struct maps
//! to follow its serde attributes (`rename`, `rename_all`, field order).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::DbError;
use crate::row::{ResultSet, Row};
use crate::value::{SqlValue, parse_timestamp_text};

/// Which statement a converted row feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Insert,
    Update,
}

/// Converts a record into a row of column/value pairs.
///
/// For [`Action::Update`] zero values are excluded so unset fields do not
/// clobber stored data: null, false, zero numbers, empty strings, and
/// empty containers all drop out. The result can legitimately be empty;
/// callers check [`Row::is_empty`] and skip the statement.
///
/// # Errors
/// Returns `DbError::Conversion` when the record does not serialize to an
/// object.
pub fn record_to_row<T: Serialize>(record: &T, action: Action) -> Result<Row, DbError> {
    let value = serde_json::to_value(record)
        .map_err(|e| DbError::Conversion(format!("record serialize error: {e}")))?;
    let JsonValue::Object(map) = value else {
        return Err(DbError::Conversion(format!(
            "record must serialize to an object, got {}",
            json_kind(&value)
        )));
    };

    let mut row = Row::empty();
    for (column, field) in map {
        if action == Action::Update && is_zero_value(&field) {
            continue;
        }
        row.push(column, json_to_sql(field));
    }
    Ok(row)
}

/// Assigns a row's columns onto a deserializable record by field name.
/// Text columns holding JSON documents decode into nested structures.
///
/// # Errors
/// Returns `DbError::Conversion` when a column cannot be assigned to its
/// field.
pub fn row_to_record<T: DeserializeOwned>(row: &Row) -> Result<T, DbError> {
    let mut map = Map::with_capacity(row.len());
    for (column, value) in row.iter() {
        map.insert(column.to_string(), sql_to_json(value));
    }
    serde_json::from_value(JsonValue::Object(map))
        .map_err(|e| DbError::Conversion(format!("record field assignment error: {e}")))
}

/// Converts every row of a result set.
///
/// # Errors
/// Returns the first conversion failure.
pub fn rows_to_records<T: DeserializeOwned>(rs: &ResultSet) -> Result<Vec<T>, DbError> {
    rs.iter().map(row_to_record).collect()
}

fn is_zero_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
    }
}

fn json_to_sql(value: JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Bool(b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(SqlValue::Int)
            .or_else(|| n.as_f64().map(SqlValue::Float))
            .unwrap_or(SqlValue::Null),
        JsonValue::String(s) => match parse_timestamp_text(&s) {
            Some(ts) => SqlValue::Timestamp(ts),
            None => SqlValue::Text(s),
        },
        JsonValue::Array(items) => {
            SqlValue::Array(items.into_iter().map(json_to_sql).collect())
        }
        doc @ JsonValue::Object(_) => SqlValue::Json(doc),
    }
}

fn sql_to_json(value: &SqlValue) -> JsonValue {
    if let SqlValue::Text(s) = value {
        // Stored JSON documents come back as text on most backends.
        let trimmed = s.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(doc) = serde_json::from_str(s) {
                return doc;
            }
        }
        return JsonValue::String(s.clone());
    }
    value.to_json_value()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
