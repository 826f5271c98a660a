use std::fmt::Write as _;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::database::Database;
use crate::error::DbError;
use crate::record::rows_to_records;
use crate::row::ResultSet;
use crate::value::SqlValue;

use super::{BuilderCore, WhereClause};

/// Builds and runs SELECT statements.
pub struct SelectBuilder {
    core: BuilderCore,
    where_clause: WhereClause,
    fields: String,
    order: String,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        SelectBuilder {
            core: BuilderCore::new(table),
            where_clause: WhereClause::default(),
            fields: "*".to_string(),
            order: String::new(),
            limit: None,
            offset: None,
        }
    }

    /// Binds the builder to a database instead of the registry's current
    /// one.
    #[must_use]
    pub fn database(mut self, database: Arc<Database>) -> Self {
        self.core.database = Some(database);
        self
    }

    /// Projection list, written verbatim. Defaults to `*`.
    #[must_use]
    pub fn fields(mut self, fields: &str) -> Self {
        if !fields.is_empty() {
            self.fields = fields.to_string();
        }
        self
    }

    /// Replaces the WHERE fragment and its arguments wholesale.
    #[must_use]
    pub fn where_clause(mut self, cond: &str, args: Vec<SqlValue>) -> Self {
        self.where_clause.set(cond, args);
        self
    }

    /// ORDER BY expression, written verbatim.
    #[must_use]
    pub fn order_by(mut self, order: &str) -> Self {
        self.order = order.to_string();
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
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

        let mut sql = String::with_capacity(64);
        sql.push_str("select ");
        sql.push_str(&self.fields);
        sql.push_str(" from ");
        driver.push_quoted(&mut sql, &self.core.table);
        if self.where_clause.is_set() {
            sql.push_str(" where ");
            sql.push_str(&self.where_clause.cond);
        }
        if !self.order.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&self.order);
        }
        if let Some(limit) = self.limit {
            let _ = write!(sql, " limit {limit}");
        }
        if let Some(offset) = self.offset {
            let _ = write!(sql, " offset {offset}");
        }
        (sql, self.where_clause.args.clone())
    }

    /// Executes the query and materializes every row.
    ///
    /// # Errors
    /// Returns any backend error.
    pub async fn query(&self) -> Result<ResultSet, DbError> {
        let (sql, args) = self.parse();
        self.core.run_query(&sql, &args).await
    }

    /// Executes the query and converts each row into a record.
    ///
    /// # Errors
    /// Returns backend errors and conversion failures.
    pub async fn find<T: DeserializeOwned>(&self) -> Result<Vec<T>, DbError> {
        let rs = self.query().await?;
        rows_to_records(&rs)
    }
}
