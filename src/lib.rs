//! Async database-access layer that normalizes PostgreSQL, MySQL, and
//! SQLite behind one value model, one placeholder style, and one set of
//! statement builders.

pub mod backend;
pub mod builder;
pub mod config;
pub mod cursor;
pub mod database;
pub mod dialect;
pub mod error;
pub mod logger;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod row;
pub mod value;

pub use builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use database::Database;
pub use error::DbError;
pub use record::{Action, record_to_row, row_to_record, rows_to_records};
pub use row::{ResultSet, Row};
pub use value::SqlValue;
