//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::backend::{DbConnection, DbPool, SqlExecutor};
pub use crate::builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use crate::config::DbConfig;
pub use crate::cursor::{RowCursor, RowSource};
pub use crate::database::Database;
pub use crate::dialect::{
    Driver, DriverKind, MySqlDriver, MySqlProtocol, PostgresDriver, SqliteDriver,
};
pub use crate::error::DbError;
pub use crate::logger::{SQL_LOG_TARGET, SqlLogger};
pub use crate::record::{Action, record_to_row, row_to_record, rows_to_records};
pub use crate::registry::Registry;
pub use crate::row::{ResultSet, Row};
pub use crate::value::SqlValue;
