use std::collections::HashMap;
use std::sync::Arc;

use crate::value::SqlValue;

/// One result row. Column names are shared across every row of a result
/// set; values are stored by position in column order.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<SqlValue>,
    index: Arc<HashMap<String, usize>>,
}

impl Row {
    /// Builds a row from a shared column header and positional values.
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let index = Arc::new(build_index(&columns));
        Row {
            columns,
            values,
            index,
        }
    }

    pub(crate) fn with_index(
        columns: Arc<Vec<String>>,
        index: Arc<HashMap<String, usize>>,
        values: Vec<SqlValue>,
    ) -> Self {
        Row {
            columns,
            values,
            index,
        }
    }

    /// An empty row, grown with [`Row::push`].
    #[must_use]
    pub fn empty() -> Self {
        Row {
            columns: Arc::new(Vec::new()),
            values: Vec::new(),
            index: Arc::new(HashMap::new()),
        }
    }

    /// Builds a row from name/value pairs, keeping their order.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, SqlValue)>) -> Self {
        let mut row = Row::empty();
        for (column, value) in pairs {
            row.push(column, value);
        }
        row
    }

    /// Appends a column. If the name is already present its value is
    /// replaced instead, keeping column names unique.
    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        let column = column.into();
        if let Some(&pos) = self.index.get(&column) {
            self.values[pos] = value;
            return;
        }
        let pos = self.values.len();
        Arc::make_mut(&mut self.index).insert(column.clone(), pos);
        Arc::make_mut(&mut self.columns).push(column);
        self.values.push(value);
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column by name.
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Value of a column by name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.column_index(column).and_then(|i| self.values.get(i))
    }

    /// Value of a column by position.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Iterates name/value pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

fn build_index(columns: &[String]) -> HashMap<String, usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

/// A fully materialized query result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>) -> Self {
        let index = Arc::new(build_index(&columns));
        ResultSet {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(columns: Arc<Vec<String>>, capacity: usize) -> Self {
        let mut rs = ResultSet::new(columns);
        rs.rows.reserve(capacity);
        rs
    }

    /// Appends a row of positional values sharing this set's header.
    pub fn push_values(&mut self, values: Vec<SqlValue>) {
        self.rows.push(Row::with_index(
            self.columns.clone(),
            self.index.clone(),
            values,
        ));
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
