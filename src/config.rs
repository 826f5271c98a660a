//! Database configuration.
//!
//! A database is configured from a flat string map, the shape config
//! files and environment loaders already produce. Keys follow each
//! dialect's own vocabulary: `dbname`/`user`/`password`/`host`/`hostaddr`/
//! `port` for PostgreSQL, `dbname`/`user`/`password`/`protocol`/`addr`/
//! `parameters` for MySQL (with `protocol` `unix`, `addr` is the socket
//! path), `file` for SQLite. A `connect` key overrides the rendered
//! connect string wholesale.

use std::collections::HashMap;

use tracing::warn;

use crate::dialect::{Driver, MySqlDriver, MySqlProtocol, PostgresDriver, SqliteDriver};
use crate::error::DbError;

pub(crate) const DEFAULT_POOL_SIZE: usize = 3;
pub(crate) const DEFAULT_MAX_COUNT: usize = 10;

/// Parsed database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub driver: Driver,
    /// Connections a pooling backend keeps ready.
    pub pool_size: usize,
    /// Hard cap on open connections.
    pub max_count: usize,
}

impl DbConfig {
    /// Parses a flat configuration map.
    ///
    /// Unrecognized driver names fall back to the pass-through `common`
    /// driver with a warning; such a database renders SQL but fails on
    /// execution.
    ///
    /// # Errors
    /// Returns `DbError::Config` when a required key for the chosen
    /// driver is missing.
    pub fn from_map(config: &HashMap<String, String>) -> Result<Self, DbError> {
        let get = |key: &str| config.get(key).cloned().unwrap_or_default();
        let connect = config.get("connect").cloned().filter(|s| !s.is_empty());

        let driver = match get("driver").as_str() {
            "postgres" | "psql" => {
                if connect.is_none() {
                    require(config, "dbname")?;
                    require(config, "user")?;
                }
                Driver::Postgres(PostgresDriver {
                    dbname: get("dbname"),
                    user: get("user"),
                    password: get("password"),
                    host: get("host"),
                    hostaddr: get("hostaddr"),
                    port: get("port"),
                    connect,
                })
            }
            "mysql" => {
                if connect.is_none() {
                    require(config, "dbname")?;
                    require(config, "user")?;
                }
                let protocol = match get("protocol").as_str() {
                    "" | "tcp" => MySqlProtocol::Tcp,
                    "unix" | "socket" => MySqlProtocol::Socket,
                    other => {
                        warn!(protocol = %other, "unrecognized mysql protocol, using tcp");
                        MySqlProtocol::Tcp
                    }
                };
                Driver::MySql(MySqlDriver {
                    dbname: get("dbname"),
                    user: get("user"),
                    password: get("password"),
                    addr: get("addr"),
                    protocol,
                    parameters: get("parameters"),
                    connect,
                })
            }
            "sqlite3" | "sqlite" => {
                if connect.is_none() {
                    require(config, "file")?;
                }
                Driver::Sqlite(SqliteDriver {
                    file: get("file"),
                    connect,
                })
            }
            other => {
                warn!(driver = %other, "unrecognized driver, falling back to common");
                Driver::Common
            }
        };

        Ok(DbConfig {
            driver,
            pool_size: parse_count(config, "pool_size", DEFAULT_POOL_SIZE),
            max_count: parse_count(config, "max_count", DEFAULT_MAX_COUNT),
        })
    }
}

fn require(config: &HashMap<String, String>, key: &str) -> Result<(), DbError> {
    match config.get(key) {
        Some(value) if !value.is_empty() => Ok(()),
        _ => Err(DbError::Config(format!("{key} is required"))),
    }
}

fn parse_count(config: &HashMap<String, String>, key: &str, default: usize) -> usize {
    config
        .get(key)
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}
