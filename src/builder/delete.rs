use std::sync::Arc;

use crate::database::Database;
use crate::error::DbError;
use crate::value::SqlValue;

use super::{BuilderCore, WhereClause};

/// Builds and runs DELETE statements.
pub struct DeleteBuilder {
    core: BuilderCore,
    where_clause: WhereClause,
}

impl DeleteBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        DeleteBuilder {
            core: BuilderCore::new(table),
            where_clause: WhereClause::default(),
        }
    }

    /// Binds the builder to a database instead of the registry's current
    /// one.
    #[must_use]
    pub fn database(mut self, database: Arc<Database>) -> Self {
        self.core.database = Some(database);
        self
    }

    /// Replaces the WHERE fragment and its arguments wholesale. Without
    /// one the statement deletes every row.
    #[must_use]
    pub fn where_clause(mut self, cond: &str, args: Vec<SqlValue>) -> Self {
        self.where_clause.set(cond, args);
        self
    }

    /// Routes execution through a prepared statement.
    #[must_use]
    pub fn prepared(mut self, prepared: bool) -> Self {
        self.core.prepared = prepared;
        self
    }

    /// Renders the statement and its bound arguments without executing.
    #[must_use]
    pub fn parse(&self) -> (String, Vec<SqlValue>) {
        let db = self.core.target();
        let driver = db.driver();

        let mut sql = String::with_capacity(32);
        sql.push_str("delete from ");
        driver.push_quoted(&mut sql, &self.core.table);
        if self.where_clause.is_set() {
            sql.push_str(" where ");
            sql.push_str(&self.where_clause.cond);
        }
        (sql, self.where_clause.args.clone())
    }

    /// Executes the delete and returns the affected row count.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn delete(&self) -> Result<u64, DbError> {
        let (sql, args) = self.parse();
        self.core.run_execute(&sql, &args).await
    }
}
