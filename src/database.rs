//! A configured database and its statement entry points.

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::backend::{DbPool, SqlExecutor};
use crate::config::DbConfig;
use crate::dialect::Driver;
use crate::error::DbError;
use crate::logger::SqlLogger;
use crate::row::ResultSet;
use crate::value::SqlValue;

/// One named database: a dialect driver plus a connection pool.
///
/// All statement text passes through the driver before execution, so
/// callers write `?` markers and unquoted composites regardless of the
/// backend. Every statement is logged before it touches the wire.
#[derive(Debug)]
pub struct Database {
    name: String,
    driver: Driver,
    logger: SqlLogger,
    pool: DbPool,
}

impl Database {
    /// Opens a database from a flat configuration map and builds its
    /// connection pool.
    ///
    /// # Errors
    /// Returns `DbError::Config` for invalid configuration and
    /// `DbError::Connection` when the pool cannot be built.
    pub async fn open(
        name: impl Into<String>,
        config: &HashMap<String, String>,
    ) -> Result<Self, DbError> {
        let name = name.into();
        let config = DbConfig::from_map(config)?;
        let pool = DbPool::from_config(&config).await?;
        Ok(Database {
            logger: SqlLogger::new(&name),
            name,
            driver: config.driver,
            pool,
        })
    }

    /// A database with a driver but no live backend. SQL renders and
    /// adapts normally; execution fails with a connection error.
    #[must_use]
    pub fn with_driver(name: impl Into<String>, driver: Driver) -> Self {
        let name = name.into();
        Database {
            logger: SqlLogger::new(&name),
            name,
            driver,
            pool: DbPool::Detached,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Runs a statement and returns the affected row count.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        self.run_execute(sql, args, false).await
    }

    /// Like [`execute`](Self::execute) through the backend's prepared
    /// statement cache.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn execute_prepared(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        self.run_execute(sql, args, true).await
    }

    /// Runs a query and buffers every row.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, DbError> {
        self.run_query(sql, args, false).await
    }

    /// Like [`query`](Self::query) through the backend's prepared
    /// statement cache.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn query_prepared(&self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, DbError> {
        self.run_query(sql, args, true).await
    }

    /// Runs a query and deserializes each row into `T`.
    ///
    /// # Errors
    /// Returns any backend error, or `DbError::Conversion` when a row
    /// does not fit `T`.
    pub async fn find<T: DeserializeOwned>(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Vec<T>, DbError> {
        let rows = self.query(sql, args).await?;
        crate::record::rows_to_records(&rows)
    }

    /// Like [`find`](Self::find) through the backend's prepared statement
    /// cache.
    ///
    /// # Errors
    /// Returns any backend error, or `DbError::Conversion` when a row
    /// does not fit `T`.
    pub async fn find_prepared<T: DeserializeOwned>(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Vec<T>, DbError> {
        let rows = self.query_prepared(sql, args).await?;
        crate::record::rows_to_records(&rows)
    }

    /// Runs an insert and fetches the id it generated, both on the same
    /// connection. `table` and `pkey` feed the dialect's id query.
    ///
    /// # Errors
    /// Returns any backend error, and `DbError::Execution` when the id
    /// query yields no usable row.
    pub async fn execute_returning_id(
        &self,
        sql: &str,
        args: &[SqlValue],
        table: &str,
        pkey: &str,
    ) -> Result<i64, DbError> {
        let args = self.flatten_args(args);
        let sql = self.driver.adapt(sql);
        self.logger.statement(&sql, &args);
        let mut conn = self.pool.connection().await?;
        conn.execute(&sql, &args).await?;

        let id_query = self.driver.last_insert_id_query(table, pkey);
        self.logger.statement(&id_query, &[]);
        let rows = conn.query(&id_query, &[]).await?;
        rows.rows()
            .first()
            .and_then(|row| row.get_by_index(0))
            .and_then(SqlValue::as_int)
            .ok_or_else(|| {
                DbError::Execution("last insert id query returned no rows".to_string())
            })
    }

    /// Runs a script on one connection, statement by statement. The
    /// script splits on `;`, blank segments are skipped, and no implicit
    /// transaction is opened; statements before a failure stay applied.
    ///
    /// # Errors
    /// Returns the first backend error.
    pub async fn execute_batch(&self, script: &str) -> Result<(), DbError> {
        let mut conn = self.pool.connection().await?;
        for segment in script.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let sql = self.driver.adapt(segment);
            self.logger.statement(&sql, &[]);
            conn.execute_batch(&sql).await?;
        }
        Ok(())
    }

    /// Reads a SQL script from disk and runs it as a batch.
    ///
    /// # Errors
    /// Returns `DbError::Execution` when the file cannot be read, then
    /// any batch error.
    pub async fn execute_file(&self, path: impl AsRef<Path>) -> Result<(), DbError> {
        let path = path.as_ref();
        let script = tokio::fs::read_to_string(path).await.map_err(|e| {
            DbError::Execution(format!("cannot read sql file {}: {e}", path.display()))
        })?;
        self.execute_batch(&script).await
    }

    async fn run_execute(
        &self,
        sql: &str,
        args: &[SqlValue],
        prepared: bool,
    ) -> Result<u64, DbError> {
        let args = self.flatten_args(args);
        let sql = self.driver.adapt(sql);
        self.logger.statement(&sql, &args);
        let mut conn = self.pool.connection().await?;
        if prepared {
            conn.execute_prepared(&sql, &args).await
        } else {
            conn.execute(&sql, &args).await
        }
    }

    async fn run_query(
        &self,
        sql: &str,
        args: &[SqlValue],
        prepared: bool,
    ) -> Result<ResultSet, DbError> {
        let args = self.flatten_args(args);
        let sql = self.driver.adapt(sql);
        self.logger.statement(&sql, &args);
        let mut conn = self.pool.connection().await?;
        if prepared {
            conn.query_prepared(&sql, &args).await
        } else {
            conn.query(&sql, &args).await
        }
    }

    fn flatten_args(&self, args: &[SqlValue]) -> Vec<SqlValue> {
        args.iter()
            .map(|arg| self.driver.flatten(arg.clone()))
            .collect()
    }
}
