use std::sync::Arc;

use crate::database::Database;
use crate::error::DbError;
use crate::row::Row;
use crate::value::SqlValue;

use super::{BuilderCore, WhereClause};

/// Builds and runs UPDATE statements.
///
/// On numbered dialects the WHERE arguments bind ahead of the SET
/// arguments: a fragment with N arguments uses `$1`..`$N` and the builder
/// numbers SET markers from `$N+1`. On `?` dialects arguments follow text
/// order, SET first.
pub struct UpdateBuilder {
    core: BuilderCore,
    where_clause: WhereClause,
}

impl UpdateBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        UpdateBuilder {
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

    /// Replaces the WHERE fragment and its arguments wholesale. The
    /// fragment is written into the statement verbatim.
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
    /// Null values are written as literal `NULL` and consume no marker.
    ///
    /// # Panics
    /// Panics when `fields` is empty or its length differs from `values`.
    #[must_use]
    pub fn parse(&self, fields: &[&str], values: &[SqlValue]) -> (String, Vec<SqlValue>) {
        assert_eq!(
            fields.len(),
            values.len(),
            "update fields/values length mismatch"
        );
        assert!(!fields.is_empty(), "update requires at least one field");

        let db = self.core.target();
        let driver = db.driver();

        let mut sql = String::with_capacity(64);
        sql.push_str("update ");
        driver.push_quoted(&mut sql, &self.core.table);
        sql.push_str(" set ");

        let mut seq = if driver.numbered_markers() {
            self.where_clause.args.len()
        } else {
            0
        };
        let mut set_args = Vec::with_capacity(values.len());
        for (i, (field, value)) in fields.iter().zip(values).enumerate() {
            if i > 0 {
                sql.push(',');
            }
            driver.push_quoted(&mut sql, field);
            sql.push('=');
            if value.is_null() {
                sql.push_str("NULL");
            } else {
                seq += 1;
                driver.push_marker(&mut sql, seq);
                set_args.push(value.clone());
            }
        }

        if self.where_clause.is_set() {
            sql.push_str(" where ");
            sql.push_str(&self.where_clause.cond);
        }

        let args = if driver.numbered_markers() {
            let mut args = self.where_clause.args.clone();
            args.extend(set_args);
            args
        } else {
            let mut args = set_args;
            args.extend(self.where_clause.args.iter().cloned());
            args
        };
        (sql, args)
    }

    /// Renders from a converted row, fields in row order.
    ///
    /// # Panics
    /// Panics when the row is empty; check [`Row::is_empty`] first when
    /// the row came from an update conversion.
    #[must_use]
    pub fn parse_row(&self, row: &Row) -> (String, Vec<SqlValue>) {
        let fields: Vec<&str> = row.columns().iter().map(String::as_str).collect();
        self.parse(&fields, row.values())
    }

    /// Executes the update and returns the affected row count.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn update(
        &self,
        fields: &[&str],
        values: &[SqlValue],
    ) -> Result<u64, DbError> {
        let (sql, args) = self.parse(fields, values);
        self.core.run_execute(&sql, &args).await
    }

    /// Executes the update from a converted row.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn update_row(&self, row: &Row) -> Result<u64, DbError> {
        let (sql, args) = self.parse_row(row);
        self.core.run_execute(&sql, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Driver, PostgresDriver, SqliteDriver};

    fn pg() -> Arc<Database> {
        Arc::new(Database::with_driver(
            "pg-render",
            Driver::Postgres(PostgresDriver::default()),
        ))
    }

    fn lite() -> Arc<Database> {
        Arc::new(Database::with_driver(
            "lite-render",
            Driver::Sqlite(SqliteDriver::default()),
        ))
    }

    #[test]
    fn numbered_set_markers_start_after_where_args() {
        let builder = UpdateBuilder::new("users").database(pg()).where_clause(
            "id=$1 and tenant=$2",
            vec![SqlValue::Int(7), SqlValue::Int(1)],
        );
        let (sql, args) = builder.parse(
            &["name", "age"],
            &[SqlValue::Text("ann".to_string()), SqlValue::Int(30)],
        );

        assert_eq!(
            sql,
            "update \"users\" set \"name\"=$3,\"age\"=$4 where id=$1 and tenant=$2"
        );
        assert_eq!(
            args,
            vec![
                SqlValue::Int(7),
                SqlValue::Int(1),
                SqlValue::Text("ann".to_string()),
                SqlValue::Int(30),
            ]
        );
    }

    #[test]
    fn markers_start_at_one_without_where_args() {
        let builder = UpdateBuilder::new("users").database(pg());
        let (sql, args) = builder.parse(&["name"], &[SqlValue::Text("bo".to_string())]);

        assert_eq!(sql, "update \"users\" set \"name\"=$1");
        assert_eq!(args, vec![SqlValue::Text("bo".to_string())]);
    }

    #[test]
    fn null_values_render_as_literal_null_and_skip_numbering() {
        let builder = UpdateBuilder::new("users")
            .database(pg())
            .where_clause("id=$1", vec![SqlValue::Int(9)]);
        let (sql, args) = builder.parse(
            &["a", "b", "c"],
            &[SqlValue::Int(1), SqlValue::Null, SqlValue::Int(2)],
        );

        assert_eq!(
            sql,
            "update \"users\" set \"a\"=$2,\"b\"=NULL,\"c\"=$3 where id=$1"
        );
        assert_eq!(
            args,
            vec![SqlValue::Int(9), SqlValue::Int(1), SqlValue::Int(2)]
        );
    }

    #[test]
    fn question_mark_dialects_bind_set_args_before_where_args() {
        let builder = UpdateBuilder::new("users")
            .database(lite())
            .where_clause("id=?", vec![SqlValue::Int(5)]);
        let (sql, args) = builder.parse(
            &["name", "age"],
            &[SqlValue::Text("ann".to_string()), SqlValue::Int(30)],
        );

        assert_eq!(sql, "update \"users\" set \"name\"=?,\"age\"=? where id=?");
        assert_eq!(
            args,
            vec![
                SqlValue::Text("ann".to_string()),
                SqlValue::Int(30),
                SqlValue::Int(5),
            ]
        );
    }

    #[test]
    fn where_clause_replaces_wholesale_and_ignores_empty() {
        let builder = UpdateBuilder::new("t")
            .database(lite())
            .where_clause("a=?", vec![SqlValue::Int(1)])
            .where_clause("b=?", vec![SqlValue::Int(2)])
            .where_clause("", vec![SqlValue::Int(3)]);
        let (sql, args) = builder.parse(&["x"], &[SqlValue::Int(0)]);

        assert_eq!(sql, "update \"t\" set \"x\"=? where b=?");
        assert_eq!(args, vec![SqlValue::Int(0), SqlValue::Int(2)]);
    }

    #[test]
    fn parse_row_uses_row_order() {
        let mut row = Row::empty();
        row.push("name", SqlValue::Text("zed".to_string()));
        row.push("age", SqlValue::Int(4));
        let builder = UpdateBuilder::new("users").database(pg());
        let (sql, args) = builder.parse_row(&row);

        assert_eq!(sql, "update \"users\" set \"name\"=$1,\"age\"=$2");
        assert_eq!(args.len(), 2);
    }

    #[test]
    #[should_panic(expected = "at least one field")]
    fn empty_field_set_panics() {
        let builder = UpdateBuilder::new("users").database(pg());
        let _ = builder.parse(&[], &[]);
    }
}
