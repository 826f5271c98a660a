//! SQL dialect strategies.
//!
//! A [`Driver`] owns everything that differs between backends at the SQL
//! text level: placeholder style, identifier quoting, value flattening,
//! composite-literal codecs, and connect-string rendering. Drivers are
//! stateless apart from connection parameters.

mod mysql;
mod postgres;
mod sqlite;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use clap::ValueEnum;

use crate::error::DbError;
use crate::value::SqlValue;

pub use mysql::{MySqlDriver, MySqlProtocol};
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;

pub(crate) use postgres::{
    array_literal, hstore_literal, parse_array, parse_hstore, parse_number_array,
};

/// Which dialect a configured database speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DriverKind {
    #[value(name = "postgres")]
    Postgres,
    #[value(name = "mysql")]
    MySql,
    #[value(name = "sqlite3")]
    Sqlite,
    /// Pass-through fallback with no live backend.
    #[value(name = "common")]
    Common,
}

impl DriverKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DriverKind::Postgres => "postgres",
            DriverKind::MySql => "mysql",
            DriverKind::Sqlite => "sqlite3",
            DriverKind::Common => "common",
        }
    }
}

/// Dialect strategy, one variant per supported backend.
///
/// `Common` quotes like PostgreSQL and leaves SQL text untouched; it backs
/// databases configured with an unrecognized driver name.
#[derive(Debug, Clone, PartialEq)]
pub enum Driver {
    Postgres(PostgresDriver),
    MySql(MySqlDriver),
    Sqlite(SqliteDriver),
    Common,
}

impl Driver {
    #[must_use]
    pub fn kind(&self) -> DriverKind {
        match self {
            Driver::Postgres(_) => DriverKind::Postgres,
            Driver::MySql(_) => DriverKind::MySql,
            Driver::Sqlite(_) => DriverKind::Sqlite,
            Driver::Common => DriverKind::Common,
        }
    }

    /// True when the dialect numbers its placeholders (`$1`, `$2`, ...).
    #[must_use]
    pub fn numbered_markers(&self) -> bool {
        matches!(self, Driver::Postgres(_))
    }

    /// Appends the parameter marker for one-based position `seq`.
    pub fn push_marker(&self, buf: &mut String, seq: usize) {
        if self.numbered_markers() {
            let _ = write!(buf, "${seq}");
        } else {
            buf.push('?');
        }
    }

    /// Appends `ident` quoted for this dialect.
    pub fn push_quoted(&self, buf: &mut String, ident: &str) {
        match self {
            Driver::MySql(_) => {
                buf.push('`');
                buf.push_str(&ident.replace('`', "``"));
                buf.push('`');
            }
            _ => {
                buf.push('"');
                buf.push_str(&ident.replace('"', "\"\""));
                buf.push('"');
            }
        }
    }

    /// `ident` quoted for this dialect.
    #[must_use]
    pub fn quote_identifier(&self, ident: &str) -> String {
        let mut buf = String::with_capacity(ident.len() + 2);
        self.push_quoted(&mut buf, ident);
        buf
    }

    /// Rewrites dialect-neutral `?` markers into this dialect's native
    /// form. Markers inside string literals, comments, and dollar-quoted
    /// blocks are left alone; `$?` escapes to a literal `?` and consumes
    /// no parameter position. Borrows when nothing needs rewriting.
    #[must_use]
    pub fn adapt<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Driver::Postgres(_) => postgres::adapt_placeholders(sql),
            _ => Cow::Borrowed(sql),
        }
    }

    /// Normalizes a statement argument into the form this dialect's wire
    /// protocol expects. Scalars pass through; composites are encoded.
    #[must_use]
    pub fn flatten(&self, value: SqlValue) -> SqlValue {
        match self {
            Driver::Postgres(_) => match value {
                SqlValue::Bool(b) => {
                    SqlValue::Text(if b { "t" } else { "f" }.to_string())
                }
                SqlValue::Array(items) => {
                    SqlValue::Text(postgres::array_literal(&items))
                }
                SqlValue::HStore(map) => {
                    SqlValue::Text(postgres::hstore_literal(&map))
                }
                SqlValue::Json(doc) => SqlValue::Text(doc.to_string()),
                other => other,
            },
            Driver::MySql(_) | Driver::Sqlite(_) => match value {
                SqlValue::Array(_) | SqlValue::HStore(_) => {
                    SqlValue::Text(value.to_json_value().to_string())
                }
                SqlValue::Json(doc) => SqlValue::Text(doc.to_string()),
                other => other,
            },
            Driver::Common => value,
        }
    }

    /// Decodes a stored array of strings.
    ///
    /// # Errors
    /// Returns `DbError::Conversion` when the literal is malformed.
    pub fn parse_string_array(&self, src: &str) -> Result<Vec<String>, DbError> {
        match self {
            Driver::MySql(_) | Driver::Sqlite(_) => parse_json_array(src),
            _ => postgres::parse_array(src),
        }
    }

    /// Decodes a stored array of integers. The `NaN` placeholder some
    /// writers emit decodes as zero.
    ///
    /// # Errors
    /// Returns `DbError::Conversion` when the literal is malformed.
    pub fn parse_int_array(&self, src: &str) -> Result<Vec<i64>, DbError> {
        match self {
            Driver::MySql(_) | Driver::Sqlite(_) => parse_json_array(src),
            _ => postgres::parse_number_array(src),
        }
    }

    /// Decodes a stored key/value map.
    ///
    /// # Errors
    /// Returns `DbError::Conversion` when the literal is malformed.
    pub fn parse_hstore(&self, src: &str) -> Result<BTreeMap<String, String>, DbError> {
        match self {
            Driver::MySql(_) | Driver::Sqlite(_) => {
                if src.is_empty() {
                    return Ok(BTreeMap::new());
                }
                serde_json::from_str(src).map_err(|e| {
                    DbError::Conversion(format!("json parse error: {e} src={src}"))
                })
            }
            _ => postgres::parse_hstore(src),
        }
    }

    /// Renders the connection string for this driver's parameters, or the
    /// raw override when one was configured.
    #[must_use]
    pub fn connect_string(&self) -> String {
        match self {
            Driver::Postgres(d) => d.connect_string(),
            Driver::MySql(d) => d.connect_url(),
            Driver::Sqlite(d) => d.connect_string(),
            Driver::Common => String::new(),
        }
    }

    /// Query that fetches the id generated by the last insert, aliased as
    /// `count`. Run it on the same connection as the insert.
    #[must_use]
    pub fn last_insert_id_query(&self, table: &str, pkey: &str) -> String {
        match self {
            Driver::Postgres(_) => format!(
                "select currval(pg_get_serial_sequence('{table}','{pkey}')) as count"
            ),
            Driver::MySql(_) => "select last_insert_id() as count".to_string(),
            Driver::Sqlite(_) | Driver::Common => {
                "select last_insert_rowid() as count".to_string()
            }
        }
    }
}

fn parse_json_array<T: serde::de::DeserializeOwned>(src: &str) -> Result<Vec<T>, DbError> {
    if src.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(src)
        .map_err(|e| DbError::Conversion(format!("json parse error: {e} src={src}")))
}
