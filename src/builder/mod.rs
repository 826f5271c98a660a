//! Statement builders.
//!
//! Builders render dialect-correct SQL through the target database's
//! [`Driver`](crate::dialect::Driver) and execute through the database
//! itself. WHERE fragments are caller-supplied raw SQL; the builder never
//! re-parameterizes them. A builder bound to no database targets the
//! registry's current one, which panics when unset.

mod delete;
mod insert;
mod select;
mod update;

pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use select::SelectBuilder;
pub use update::UpdateBuilder;

use std::sync::Arc;

use crate::database::Database;
use crate::error::DbError;
use crate::row::ResultSet;
use crate::value::SqlValue;

pub(crate) struct BuilderCore {
    pub(crate) table: String,
    pub(crate) prepared: bool,
    pub(crate) database: Option<Arc<Database>>,
}

impl BuilderCore {
    pub(crate) fn new(table: impl Into<String>) -> Self {
        BuilderCore {
            table: table.into(),
            prepared: false,
            database: None,
        }
    }

    /// The database this builder runs against; the registry's current
    /// database when unbound.
    pub(crate) fn target(&self) -> Arc<Database> {
        self.database
            .clone()
            .unwrap_or_else(crate::registry::current)
    }

    pub(crate) async fn run_execute(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<u64, DbError> {
        let db = self.target();
        if self.prepared {
            db.execute_prepared(sql, args).await
        } else {
            db.execute(sql, args).await
        }
    }

    pub(crate) async fn run_query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<ResultSet, DbError> {
        let db = self.target();
        if self.prepared {
            db.query_prepared(sql, args).await
        } else {
            db.query(sql, args).await
        }
    }
}

/// Raw WHERE fragment plus its positional arguments.
#[derive(Debug, Clone, Default)]
pub(crate) struct WhereClause {
    pub(crate) cond: String,
    pub(crate) args: Vec<SqlValue>,
}

impl WhereClause {
    /// Replaces the clause wholesale. An empty condition is ignored.
    pub(crate) fn set(&mut self, cond: &str, args: Vec<SqlValue>) {
        if cond.is_empty() {
            return;
        }
        self.cond = cond.to_string();
        self.args = args;
    }

    pub(crate) fn is_set(&self) -> bool {
        !self.cond.is_empty()
    }
}
