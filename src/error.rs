use thiserror::Error;

use deadpool_sqlite::rusqlite;

/// Unified error type for every backend and for the access layer itself.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    MySql(#[from] mysql_async::Error),

    // The wrappers re-export their own deadpool's error type; naming it
    // through them keeps the variant aligned with what the pools return.
    #[error(transparent)]
    PoolPostgres(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    PoolSqlite(#[from] deadpool_sqlite::PoolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("SQL execution error: {0}")]
    Execution(String),
}

impl From<deadpool_sqlite::InteractError> for DbError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        DbError::Connection(format!("SQLite interact error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_convert_through_the_wrapper_aliases() {
        let err: DbError = deadpool_postgres::PoolError::Closed.into();
        assert!(matches!(err, DbError::PoolPostgres(_)));

        let err: DbError = deadpool_sqlite::PoolError::Closed.into();
        assert!(matches!(err, DbError::PoolSqlite(_)));
    }
}
