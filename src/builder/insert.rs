use std::sync::Arc;

use crate::database::Database;
use crate::error::DbError;
use crate::row::Row;
use crate::value::SqlValue;

use super::BuilderCore;

/// Builds and runs INSERT statements.
pub struct InsertBuilder {
    core: BuilderCore,
}

impl InsertBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        InsertBuilder {
            core: BuilderCore::new(table),
        }
    }

    /// Binds the builder to a database instead of the registry's current
    /// one.
    #[must_use]
    pub fn database(mut self, database: Arc<Database>) -> Self {
        self.core.database = Some(database);
        self
    }

    /// Routes execution through a prepared statement.
    #[must_use]
    pub fn prepared(mut self, prepared: bool) -> Self {
        self.core.prepared = prepared;
        self
    }

    /// Renders the statement and its bound arguments without executing.
    /// Null values are written as literal `NULL` and consume no marker.
    ///
    /// # Panics
    /// Panics when `fields` is empty or its length differs from `values`.
    #[must_use]
    pub fn parse(&self, fields: &[&str], values: &[SqlValue]) -> (String, Vec<SqlValue>) {
        assert_eq!(
            fields.len(),
            values.len(),
            "insert fields/values length mismatch"
        );
        assert!(!fields.is_empty(), "insert requires at least one field");

        let db = self.core.target();
        let driver = db.driver();

        let mut sql = String::with_capacity(64);
        sql.push_str("insert into ");
        driver.push_quoted(&mut sql, &self.core.table);
        sql.push_str(" (");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            driver.push_quoted(&mut sql, field);
        }
        sql.push_str(") values (");

        let mut seq = 0;
        let mut args = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            if value.is_null() {
                sql.push_str("NULL");
            } else {
                seq += 1;
                driver.push_marker(&mut sql, seq);
                args.push(value.clone());
            }
        }
        sql.push(')');
        (sql, args)
    }

    /// Renders from a converted row, fields in row order.
    ///
    /// # Panics
    /// Panics when the row is empty.
    #[must_use]
    pub fn parse_row(&self, row: &Row) -> (String, Vec<SqlValue>) {
        let fields: Vec<&str> = row.columns().iter().map(String::as_str).collect();
        self.parse(&fields, row.values())
    }

    /// Executes the insert and returns the affected row count.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn insert(
        &self,
        fields: &[&str],
        values: &[SqlValue],
    ) -> Result<u64, DbError> {
        let (sql, args) = self.parse(fields, values);
        self.core.run_execute(&sql, &args).await
    }

    /// Executes the insert from a converted row.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn insert_row(&self, row: &Row) -> Result<u64, DbError> {
        let (sql, args) = self.parse_row(row);
        self.core.run_execute(&sql, &args).await
    }

    /// Executes the insert and reads back the generated id for `pkey` on
    /// the same connection.
    ///
    /// # Errors
    /// Returns any backend error, and an execution error when the id
    /// query yields no rows.
    pub async fn insert_returning_id(
        &self,
        fields: &[&str],
        values: &[SqlValue],
        pkey: &str,
    ) -> Result<i64, DbError> {
        let (sql, args) = self.parse(fields, values);
        let db = self.core.target();
        db.execute_returning_id(&sql, &args, &self.core.table, pkey)
            .await
    }
}
