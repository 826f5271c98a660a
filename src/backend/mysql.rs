//! MySQL backend over `mysql_async`.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Datelike, Timelike};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Value};

use crate::cursor::{RowCursor, RowSource};
use crate::dialect::MySqlDriver;
use crate::error::DbError;
use crate::row::ResultSet;
use crate::value::{SqlValue, TIMESTAMP_FORMAT};

/// Builds the connection pool for one MySQL database. Connections open
/// lazily on first use.
///
/// # Errors
/// Returns `DbError::Config` when the connect URL does not parse.
pub(crate) fn create_pool(
    driver: &MySqlDriver,
    pool_size: usize,
    max_count: usize,
) -> Result<Pool, DbError> {
    let opts = Opts::from_url(&driver.connect_url())
        .map_err(|e| DbError::Config(format!("invalid mysql connect url: {e}")))?;
    let mut builder = OptsBuilder::from_opts(opts);
    if let Some(path) = driver.socket_path() {
        builder = builder.socket(Some(path));
    }
    if let Some(constraints) = PoolConstraints::new(pool_size, max_count) {
        builder = builder.pool_opts(PoolOpts::default().with_constraints(constraints));
    }
    Ok(Pool::new(builder))
}

pub(crate) async fn execute(
    conn: &mut Conn,
    sql: &str,
    args: &[SqlValue],
    prepared: bool,
) -> Result<u64, DbError> {
    if prepared {
        let stmt = conn.prep(sql).await?;
        conn.exec_drop(&stmt, to_params(args)?).await?;
    } else if args.is_empty() {
        // No arguments to bind, so the statement goes over the text
        // protocol; not everything the server accepts is preparable.
        conn.query_drop(sql).await?;
    } else {
        conn.exec_drop(sql, to_params(args)?).await?;
    }
    Ok(conn.affected_rows())
}

pub(crate) async fn query(
    conn: &mut Conn,
    sql: &str,
    args: &[SqlValue],
    prepared: bool,
) -> Result<ResultSet, DbError> {
    let rows: Vec<mysql_async::Row> = if prepared {
        let stmt = conn.prep(sql).await?;
        conn.exec(&stmt, to_params(args)?).await?
    } else if args.is_empty() {
        conn.query(sql).await?
    } else {
        conn.exec(sql, to_params(args)?).await?
    };
    result_set_from_rows(rows)
}

/// Runs a multi-statement script one statement at a time; the wire
/// protocol rejects multi-statement packets by default.
pub(crate) async fn batch(conn: &mut Conn, script: &str) -> Result<(), DbError> {
    for stmt in script.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        conn.query_drop(stmt).await?;
    }
    Ok(())
}

fn result_set_from_rows(rows: Vec<mysql_async::Row>) -> Result<ResultSet, DbError> {
    let columns: Vec<String> = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect()
        })
        .unwrap_or_default();
    RowCursor::new(MyRows {
        columns: Arc::new(columns),
        rows: rows.into_iter(),
    })
    .drain()
}

struct MyRows {
    columns: Arc<Vec<String>>,
    rows: std::vec::IntoIter<mysql_async::Row>,
}

impl RowSource for MyRows {
    fn columns(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.columns)
    }

    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
        let Some(row) = self.rows.next() else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for idx in 0..self.columns.len() {
            let native = row.as_ref(idx).cloned().ok_or_else(|| {
                DbError::Conversion(format!("missing column {idx} in mysql row"))
            })?;
            values.push(from_mysql_value(native)?);
        }
        Ok(Some(values))
    }

    fn release(&mut self) {
        self.rows = Vec::new().into_iter();
    }
}

fn to_params(args: &[SqlValue]) -> Result<Params, DbError> {
    if args.is_empty() {
        return Ok(Params::Empty);
    }
    let values = args
        .iter()
        .map(to_mysql_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Params::Positional(values))
}

#[allow(clippy::cast_possible_truncation)]
fn to_mysql_value(value: &SqlValue) -> Result<Value, DbError> {
    let native = match value {
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Date(
            u16::try_from(dt.year()).map_err(|_| {
                DbError::Conversion(format!(
                    "timestamp {} is out of the mysql datetime range",
                    dt.format(TIMESTAMP_FORMAT)
                ))
            })?,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            (dt.nanosecond() / 1000).min(999_999),
        ),
        SqlValue::Blob(b) => Value::Bytes(b.clone()),
        SqlValue::Array(_) | SqlValue::HStore(_) => {
            Value::Bytes(value.to_json_value().to_string().into_bytes())
        }
        SqlValue::Json(doc) => Value::Bytes(doc.to_string().into_bytes()),
        SqlValue::Null => Value::NULL,
    };
    Ok(native)
}

#[allow(clippy::cast_precision_loss)]
fn from_mysql_value(value: Value) -> Result<SqlValue, DbError> {
    let converted = match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => i64::try_from(u)
            .map_or_else(|_| SqlValue::Float(u as f64), SqlValue::Int),
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(d) => SqlValue::Float(d),
        Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Blob(e.into_bytes()),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            chrono::NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|d| d.and_hms_micro_opt(
                    u32::from(hour),
                    u32::from(minute),
                    u32::from(second),
                    micros,
                ))
                .map(SqlValue::Timestamp)
                .ok_or_else(|| {
                    DbError::Conversion(format!(
                        "invalid mysql datetime {year}-{month}-{day} {hour}:{minute}:{second}"
                    ))
                })?
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = u64::from(days) * 24 + u64::from(hours);
            let mut text = String::new();
            if negative {
                text.push('-');
            }
            let _ = write!(text, "{total_hours:02}:{minutes:02}:{seconds:02}");
            if micros > 0 {
                let _ = write!(text, ".{micros:06}");
            }
            SqlValue::Text(text)
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn datetime_values_round_trip() {
        let dt = NaiveDate::from_ymd_opt(2023, 6, 30)
            .unwrap()
            .and_hms_micro_opt(12, 30, 45, 250_000)
            .unwrap();
        let native = to_mysql_value(&SqlValue::Timestamp(dt)).unwrap();
        assert_eq!(native, Value::Date(2023, 6, 30, 12, 30, 45, 250_000));
        assert_eq!(
            from_mysql_value(native).unwrap(),
            SqlValue::Timestamp(dt)
        );
    }

    #[test]
    fn bytes_prefer_text_and_fall_back_to_blob() {
        assert_eq!(
            from_mysql_value(Value::Bytes(b"hello".to_vec())).unwrap(),
            SqlValue::Text("hello".to_string())
        );
        assert_eq!(
            from_mysql_value(Value::Bytes(vec![0xff, 0xfe])).unwrap(),
            SqlValue::Blob(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn durations_render_as_signed_clock_text() {
        let t = Value::Time(true, 1, 2, 3, 4, 0);
        assert_eq!(
            from_mysql_value(t).unwrap(),
            SqlValue::Text("-26:03:04".to_string())
        );
        let t = Value::Time(false, 0, 0, 0, 1, 500);
        assert_eq!(
            from_mysql_value(t).unwrap(),
            SqlValue::Text("00:00:01.000500".to_string())
        );
    }

    #[test]
    fn unsigned_values_wider_than_i64_become_floats() {
        assert_eq!(
            from_mysql_value(Value::UInt(42)).unwrap(),
            SqlValue::Int(42)
        );
        assert!(matches!(
            from_mysql_value(Value::UInt(u64::MAX)).unwrap(),
            SqlValue::Float(_)
        ));
    }

    #[test]
    fn out_of_range_years_are_rejected() {
        let dt = NaiveDate::from_ymd_opt(-44, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(
            to_mysql_value(&SqlValue::Timestamp(dt)),
            Err(DbError::Conversion(_))
        ));
    }
}
