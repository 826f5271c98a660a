//! Live database backends.
//!
//! [`DbPool`] owns the connection pool for one configured database and
//! hands out [`DbConnection`]s. Statements run through the
//! [`SqlExecutor`] trait so callers never branch on the backend
//! themselves; each variant forwards to its driver module.

pub(crate) mod mysql;
pub(crate) mod postgres;
pub(crate) mod sqlite;

use async_trait::async_trait;

use crate::config::DbConfig;
use crate::error::DbError;
use crate::row::ResultSet;
use crate::value::SqlValue;

/// Connection pool for one database.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(deadpool_postgres::Pool),
    MySql(mysql_async::Pool),
    Sqlite(deadpool_sqlite::Pool),
    /// No live backend; SQL still renders but execution fails.
    Detached,
}

impl DbPool {
    /// Builds the pool for `config`.
    ///
    /// # Errors
    /// Returns `DbError::Config` for an unparsable connect string and
    /// `DbError::Connection` when pool construction fails.
    pub async fn from_config(config: &DbConfig) -> Result<Self, DbError> {
        match &config.driver {
            crate::dialect::Driver::Postgres(driver) => Ok(DbPool::Postgres(
                postgres::create_pool(driver, config.max_count)?,
            )),
            crate::dialect::Driver::MySql(driver) => Ok(DbPool::MySql(mysql::create_pool(
                driver,
                config.pool_size,
                config.max_count,
            )?)),
            crate::dialect::Driver::Sqlite(driver) => Ok(DbPool::Sqlite(
                sqlite::create_pool(driver, config.max_count).await?,
            )),
            crate::dialect::Driver::Common => Ok(DbPool::Detached),
        }
    }

    /// Checks out one connection.
    ///
    /// # Errors
    /// Returns a pool error from the backend, or `DbError::Connection`
    /// for a detached database.
    pub async fn connection(&self) -> Result<DbConnection, DbError> {
        match self {
            DbPool::Postgres(pool) => Ok(DbConnection::Postgres(pool.get().await?)),
            DbPool::MySql(pool) => Ok(DbConnection::MySql(pool.get_conn().await?)),
            DbPool::Sqlite(pool) => Ok(DbConnection::Sqlite(pool.get().await?)),
            DbPool::Detached => Err(DbError::Connection(
                "database has no live backend".to_string(),
            )),
        }
    }
}

/// One checked-out connection.
#[derive(Debug)]
pub enum DbConnection {
    Postgres(deadpool_postgres::Object),
    MySql(mysql_async::Conn),
    Sqlite(deadpool_sqlite::Object),
}

/// Uniform statement execution over any backend.
#[async_trait]
pub trait SqlExecutor {
    /// Runs a statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError>;

    /// Like [`execute`](Self::execute) through the backend's prepared
    /// statement cache.
    async fn execute_prepared(&mut self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError>;

    /// Runs a query, buffering every row.
    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, DbError>;

    /// Like [`query`](Self::query) through the backend's prepared
    /// statement cache.
    async fn query_prepared(&mut self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, DbError>;

    /// Runs a multi-statement script with no arguments.
    async fn execute_batch(&mut self, script: &str) -> Result<(), DbError>;
}

#[async_trait]
impl SqlExecutor for DbConnection {
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        match self {
            DbConnection::Postgres(client) => postgres::execute(client, sql, args, false).await,
            DbConnection::MySql(conn) => mysql::execute(conn, sql, args, false).await,
            DbConnection::Sqlite(conn) => sqlite::execute(conn, sql, args, false).await,
        }
    }

    async fn execute_prepared(&mut self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        match self {
            DbConnection::Postgres(client) => postgres::execute(client, sql, args, true).await,
            DbConnection::MySql(conn) => mysql::execute(conn, sql, args, true).await,
            DbConnection::Sqlite(conn) => sqlite::execute(conn, sql, args, true).await,
        }
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, DbError> {
        match self {
            DbConnection::Postgres(client) => postgres::query(client, sql, args, false).await,
            DbConnection::MySql(conn) => mysql::query(conn, sql, args, false).await,
            DbConnection::Sqlite(conn) => sqlite::query(conn, sql, args, false).await,
        }
    }

    async fn query_prepared(&mut self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, DbError> {
        match self {
            DbConnection::Postgres(client) => postgres::query(client, sql, args, true).await,
            DbConnection::MySql(conn) => mysql::query(conn, sql, args, true).await,
            DbConnection::Sqlite(conn) => sqlite::query(conn, sql, args, true).await,
        }
    }

    async fn execute_batch(&mut self, script: &str) -> Result<(), DbError> {
        match self {
            DbConnection::Postgres(client) => postgres::batch(client, script).await,
            DbConnection::MySql(conn) => mysql::batch(conn, script).await,
            DbConnection::Sqlite(conn) => sqlite::batch(conn, script).await,
        }
    }
}
