//! SQLite backend over `deadpool-sqlite`.
//!
//! `rusqlite` is synchronous, so every statement runs inside the pool
//! object's `interact` closure on its blocking thread.

use std::sync::Arc;

use deadpool_sqlite::rusqlite;
use deadpool_sqlite::{Config, Object, Pool, Runtime};

use crate::cursor::{RowCursor, RowSource};
use crate::dialect::SqliteDriver;
use crate::error::DbError;
use crate::row::ResultSet;
use crate::value::{SqlValue, TIMESTAMP_FORMAT};

/// Builds the connection pool for one SQLite database and switches it to
/// WAL journaling.
///
/// # Errors
/// Returns `DbError::Connection` when the pool cannot be built and the
/// underlying error when the database file cannot be opened.
pub(crate) async fn create_pool(driver: &SqliteDriver, max_count: usize) -> Result<Pool, DbError> {
    let mut cfg = Config::new(driver.connect_string());
    cfg.pool = Some(deadpool::managed::PoolConfig::new(max_count));
    let pool = cfg
        .create_pool(Runtime::Tokio1)
        .map_err(|e| DbError::Connection(format!("Failed to create SQLite pool: {e}")))?;

    // Also serves as an open-time reachability check.
    let conn = pool.get().await?;
    conn.interact(|conn| conn.execute_batch("PRAGMA journal_mode = WAL;"))
        .await??;

    Ok(pool)
}

pub(crate) async fn execute(
    conn: &Object,
    sql: &str,
    args: &[SqlValue],
    prepared: bool,
) -> Result<u64, DbError> {
    let sql = sql.to_owned();
    let params: Vec<rusqlite::types::Value> = args.iter().map(to_sqlite_value).collect();
    let affected = conn
        .interact(move |conn| -> Result<usize, rusqlite::Error> {
            let refs: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            if prepared {
                let mut stmt = conn.prepare_cached(&sql)?;
                stmt.execute(refs.as_slice())
            } else {
                let mut stmt = conn.prepare(&sql)?;
                stmt.execute(refs.as_slice())
            }
        })
        .await??;
    Ok(affected as u64)
}

pub(crate) async fn query(
    conn: &Object,
    sql: &str,
    args: &[SqlValue],
    prepared: bool,
) -> Result<ResultSet, DbError> {
    let sql = sql.to_owned();
    let params: Vec<rusqlite::types::Value> = args.iter().map(to_sqlite_value).collect();
    conn.interact(move |conn| -> Result<ResultSet, DbError> {
        if prepared {
            let mut stmt = conn.prepare_cached(&sql)?;
            query_stmt(&mut stmt, &params)
        } else {
            let mut stmt = conn.prepare(&sql)?;
            query_stmt(&mut stmt, &params)
        }
    })
    .await?
}

pub(crate) async fn batch(conn: &Object, script: &str) -> Result<(), DbError> {
    let script = script.to_owned();
    conn.interact(move |conn| conn.execute_batch(&script))
        .await??;
    Ok(())
}

fn query_stmt(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[rusqlite::types::Value],
) -> Result<ResultSet, DbError> {
    let refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    // Column names come off the statement before `query` borrows it.
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let rows = stmt.query(refs.as_slice())?;
    RowCursor::new(SqliteRows {
        columns: Arc::new(columns),
        rows: Some(rows),
    })
    .drain()
}

struct SqliteRows<'s> {
    columns: Arc<Vec<String>>,
    rows: Option<rusqlite::Rows<'s>>,
}

impl RowSource for SqliteRows<'_> {
    fn columns(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.columns)
    }

    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for idx in 0..self.columns.len() {
            values.push(from_sqlite_value(
                row.get::<_, rusqlite::types::Value>(idx)?,
            ));
        }
        Ok(Some(values))
    }

    fn release(&mut self) {
        self.rows = None;
    }
}

fn to_sqlite_value(value: &SqlValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
        SqlValue::Array(_) | SqlValue::HStore(_) => {
            Value::Text(value.to_json_value().to_string())
        }
        SqlValue::Json(doc) => Value::Text(doc.to_string()),
        SqlValue::Null => Value::Null,
    }
}

fn from_sqlite_value(value: rusqlite::types::Value) -> SqlValue {
    use rusqlite::types::Value;
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::types::Value;

    #[test]
    fn values_map_to_native_sqlite_storage_classes() {
        assert_eq!(to_sqlite_value(&SqlValue::Int(5)), Value::Integer(5));
        assert_eq!(to_sqlite_value(&SqlValue::Bool(true)), Value::Integer(1));
        assert_eq!(to_sqlite_value(&SqlValue::Null), Value::Null);

        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            to_sqlite_value(&SqlValue::Timestamp(dt)),
            Value::Text("2024-01-02 03:04:05".to_string())
        );

        let arr = SqlValue::Array(vec![SqlValue::Int(1), SqlValue::Int(2)]);
        assert_eq!(to_sqlite_value(&arr), Value::Text("[1,2]".to_string()));
    }

    #[test]
    fn native_values_map_back() {
        assert_eq!(from_sqlite_value(Value::Integer(7)), SqlValue::Int(7));
        assert_eq!(from_sqlite_value(Value::Null), SqlValue::Null);
        assert_eq!(
            from_sqlite_value(Value::Text("x".to_string())),
            SqlValue::Text("x".to_string())
        );
    }
}
