//! PostgreSQL backend over `tokio-postgres` and `deadpool-postgres`.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::cursor::{RowCursor, RowSource};
use crate::dialect::{
    PostgresDriver, array_literal, hstore_literal, parse_array, parse_hstore, parse_number_array,
};
use crate::error::DbError;
use crate::row::ResultSet;
use crate::value::{SqlValue, TIMESTAMP_FORMAT, parse_timestamp_text};

/// Builds the connection pool for one PostgreSQL database.
///
/// # Errors
/// Returns `DbError::Config` when the connect string does not parse and
/// `DbError::Connection` when the pool cannot be built.
pub(crate) fn create_pool(driver: &PostgresDriver, max_count: usize) -> Result<Pool, DbError> {
    let pg_config = driver
        .connect_string()
        .parse::<tokio_postgres::Config>()
        .map_err(|e| DbError::Config(format!("invalid postgres connect string: {e}")))?;
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(max_count)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| DbError::Connection(format!("Failed to create Postgres pool: {e}")))
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            SqlValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            // Flattened values travel as text; re-type them when the
            // column wants something stronger.
            SqlValue::Text(s) => match *ty {
                Type::BOOL => self
                    .as_bool()
                    .ok_or_else(|| format!("cannot encode {s:?} as bool"))?
                    .to_sql(ty, out),
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
                }
                Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => {
                    let dt = parse_timestamp_text(s)
                        .ok_or_else(|| format!("cannot encode {s:?} as timestamp"))?;
                    match *ty {
                        Type::DATE => dt.date().to_sql(ty, out),
                        Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                        _ => dt.to_sql(ty, out),
                    }
                }
                Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
                    parse_array::<String>(s)?.to_sql(ty, out)
                }
                Type::INT4_ARRAY => {
                    let items = parse_number_array::<i64>(s)?
                        .into_iter()
                        .map(i32::try_from)
                        .collect::<Result<Vec<_>, _>>()?;
                    items.to_sql(ty, out)
                }
                Type::INT8_ARRAY => parse_number_array::<i64>(s)?.to_sql(ty, out),
                Type::FLOAT8_ARRAY => parse_number_array::<f64>(s)?.to_sql(ty, out),
                _ if ty.name() == "hstore" => {
                    let map: HashMap<String, Option<String>> = parse_hstore(s)?
                        .into_iter()
                        .map(|(k, v)| (k, Some(v)))
                        .collect();
                    map.to_sql(ty, out)
                }
                _ => s.to_sql(ty, out),
            },
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Timestamp(dt) => match *ty {
                Type::TEXT | Type::VARCHAR => {
                    dt.format(TIMESTAMP_FORMAT).to_string().to_sql(ty, out)
                }
                Type::DATE => dt.date().to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            SqlValue::Blob(b) => b.to_sql(ty, out),
            // Composites bind exactly like their flattened text form.
            SqlValue::Array(items) => SqlValue::Text(array_literal(items)).to_sql(ty, out),
            SqlValue::HStore(map) => SqlValue::Text(hstore_literal(map)).to_sql(ty, out),
            SqlValue::Json(doc) => match *ty {
                Type::TEXT | Type::VARCHAR => doc.to_string().to_sql(ty, out),
                _ => doc.to_sql(ty, out),
            },
            SqlValue::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(ty: &Type) -> bool {
        match *ty {
            Type::INT2 | Type::INT4 | Type::INT8 => true,
            Type::FLOAT4 | Type::FLOAT8 => true,
            Type::TEXT | Type::VARCHAR | Type::CHAR | Type::NAME => true,
            Type::BOOL => true,
            Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => true,
            Type::JSON | Type::JSONB => true,
            Type::BYTEA => true,
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => true,
            Type::INT4_ARRAY | Type::INT8_ARRAY | Type::FLOAT8_ARRAY => true,
            _ => ty.name() == "hstore",
        }
    }

    to_sql_checked!();
}

fn as_params(args: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|a| a as &(dyn ToSql + Sync)).collect()
}

/// Runs a statement, optionally through the connection's statement cache.
///
/// # Errors
/// Returns `DbError::Execution` when the server rejects the statement.
pub(crate) async fn execute(
    client: &Object,
    sql: &str,
    args: &[SqlValue],
    prepared: bool,
) -> Result<u64, DbError> {
    let params = as_params(args);
    let affected = if prepared {
        let stmt = client
            .prepare_cached(sql)
            .await
            .map_err(|e| DbError::Execution(format!("postgres prepare error: {e}")))?;
        client.execute(&stmt, &params).await
    } else {
        client.execute(sql, &params).await
    }
    .map_err(|e| DbError::Execution(format!("postgres execute error: {e}")))?;
    Ok(affected)
}

/// Runs a query and buffers the rows.
///
/// # Errors
/// Returns `DbError::Execution` for server errors and `DbError::Postgres`
/// when a column value cannot be decoded.
pub(crate) async fn query(
    client: &Object,
    sql: &str,
    args: &[SqlValue],
    prepared: bool,
) -> Result<ResultSet, DbError> {
    let params = as_params(args);
    let (columns, rows) = if prepared {
        let stmt = client
            .prepare_cached(sql)
            .await
            .map_err(|e| DbError::Execution(format!("postgres prepare error: {e}")))?;
        let rows = client
            .query(&stmt, &params)
            .await
            .map_err(|e| DbError::Execution(format!("postgres select error: {e}")))?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        (columns, rows)
    } else {
        let rows = client
            .query(sql, &params)
            .await
            .map_err(|e| DbError::Execution(format!("postgres select error: {e}")))?;
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        (columns, rows)
    };
    RowCursor::new(PgRows {
        columns: Arc::new(columns),
        rows: rows.into_iter(),
    })
    .drain()
}

/// Runs a multi-statement script.
///
/// # Errors
/// Returns `DbError::Execution` when the server rejects the script.
pub(crate) async fn batch(client: &Object, script: &str) -> Result<(), DbError> {
    client
        .batch_execute(script)
        .await
        .map_err(|e| DbError::Execution(format!("postgres batch error: {e}")))
}

struct PgRows {
    columns: Arc<Vec<String>>,
    rows: std::vec::IntoIter<tokio_postgres::Row>,
}

impl RowSource for PgRows {
    fn columns(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.columns)
    }

    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
        let Some(row) = self.rows.next() else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for idx in 0..self.columns.len() {
            values.push(extract_value(&row, idx)?);
        }
        Ok(Some(values))
    }

    fn release(&mut self) {
        self.rows = Vec::new().into_iter();
    }
}

/// Decodes one column by its PostgreSQL type name.
fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue, DbError> {
    let type_name = row.columns()[idx].type_().name();
    let value = match type_name {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Float),
        "bool" => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Bool),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Timestamp(v.naive_utc())),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .map_or(SqlValue::Null, |v| {
                SqlValue::Timestamp(v.and_time(chrono::NaiveTime::MIN))
            }),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Json),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Blob),
        "_text" | "_varchar" => row
            .try_get::<_, Option<Vec<String>>>(idx)?
            .map_or(SqlValue::Null, |v| {
                SqlValue::Array(v.into_iter().map(SqlValue::Text).collect())
            }),
        "_int4" => row
            .try_get::<_, Option<Vec<i32>>>(idx)?
            .map_or(SqlValue::Null, |v| {
                SqlValue::Array(v.into_iter().map(|n| SqlValue::Int(i64::from(n))).collect())
            }),
        "_int8" => row
            .try_get::<_, Option<Vec<i64>>>(idx)?
            .map_or(SqlValue::Null, |v| {
                SqlValue::Array(v.into_iter().map(SqlValue::Int).collect())
            }),
        "_float8" => row
            .try_get::<_, Option<Vec<f64>>>(idx)?
            .map_or(SqlValue::Null, |v| {
                SqlValue::Array(v.into_iter().map(SqlValue::Float).collect())
            }),
        "hstore" => row
            .try_get::<_, Option<HashMap<String, Option<String>>>>(idx)?
            .map_or(SqlValue::Null, |m| {
                SqlValue::HStore(
                    m.into_iter()
                        .map(|(k, v)| (k, v.unwrap_or_default()))
                        .collect(),
                )
            }),
        // Everything else comes back as its text form.
        _ => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Text),
    };
    Ok(value)
}
