use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DbError;
use crate::row::{ResultSet, Row};
use crate::value::SqlValue;

/// A single-pass supply of raw rows behind a [`RowCursor`].
///
/// Implementations wrap whatever a backend hands out while rows are being
/// streamed. `release` returns the underlying resources; the cursor
/// guarantees it is called exactly once, on exhaustion, on the first row
/// error, or when the cursor is dropped early.
pub trait RowSource {
    /// Column names, captured once when the source is opened.
    fn columns(&self) -> Arc<Vec<String>>;

    /// Next row of positional values, or `None` when exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError>;

    /// Returns the underlying resources.
    fn release(&mut self);
}

/// Forward-only iterator over the rows of one query.
///
/// Yields `Result<Row, DbError>`; after the first error the cursor is
/// fused and yields nothing further.
pub struct RowCursor<S: RowSource> {
    source: S,
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    released: bool,
    done: bool,
}

impl<S: RowSource> RowCursor<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        let columns = source.columns();
        let index = Arc::new(
            columns
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );
        RowCursor {
            source,
            columns,
            index,
            released: false,
            done: false,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the source's resources early. Safe to call more than once;
    /// only the first call reaches the source.
    pub fn release(&mut self) {
        self.done = true;
        self.release_once();
    }

    /// Pulls every remaining row into a [`ResultSet`].
    ///
    /// # Errors
    /// Returns the first row error; the source is released either way.
    pub fn drain(mut self) -> Result<ResultSet, DbError> {
        let mut rs = ResultSet::new(self.columns.clone());
        while let Some(row) = self.next() {
            rs.push_values(row?.values().to_vec());
        }
        Ok(rs)
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
        }
    }
}

impl<S: RowSource> Iterator for RowCursor<S> {
    type Item = Result<Row, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_row() {
            Ok(Some(values)) => Some(Ok(Row::with_index(
                self.columns.clone(),
                self.index.clone(),
                values,
            ))),
            Ok(None) => {
                self.done = true;
                self.release_once();
                None
            }
            Err(err) => {
                self.done = true;
                self.release_once();
                Some(Err(err))
            }
        }
    }
}

impl<S: RowSource> Drop for RowCursor<S> {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        rows: Vec<Result<Vec<SqlValue>, DbError>>,
        releases: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn new(rows: Vec<Result<Vec<SqlValue>, DbError>>) -> (Self, Arc<AtomicUsize>) {
            let releases = Arc::new(AtomicUsize::new(0));
            (
                MockSource {
                    rows,
                    releases: releases.clone(),
                },
                releases,
            )
        }
    }

    impl RowSource for MockSource {
        fn columns(&self) -> Arc<Vec<String>> {
            Arc::new(vec!["n".to_string()])
        }

        fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
            if self.rows.is_empty() {
                return Ok(None);
            }
            self.rows.remove(0).map(Some)
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn exhaustion_releases_exactly_once() {
        let (source, releases) = MockSource::new(vec![
            Ok(vec![SqlValue::Int(1)]),
            Ok(vec![SqlValue::Int(2)]),
        ]);
        let mut cursor = RowCursor::new(source);

        assert_eq!(
            cursor.next().unwrap().unwrap().get("n"),
            Some(&SqlValue::Int(1))
        );
        assert_eq!(
            cursor.next().unwrap().unwrap().get("n"),
            Some(&SqlValue::Int(2))
        );
        assert!(cursor.next().is_none());
        assert!(cursor.next().is_none());
        drop(cursor);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn early_drop_releases_exactly_once() {
        let (source, releases) = MockSource::new(vec![
            Ok(vec![SqlValue::Int(1)]),
            Ok(vec![SqlValue::Int(2)]),
        ]);
        let mut cursor = RowCursor::new(source);
        let _ = cursor.next();
        drop(cursor);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn row_error_fuses_the_cursor_and_releases_once() {
        let (source, releases) = MockSource::new(vec![
            Ok(vec![SqlValue::Int(1)]),
            Err(DbError::Execution("boom".to_string())),
            Ok(vec![SqlValue::Int(3)]),
        ]);
        let mut cursor = RowCursor::new(source);

        assert!(cursor.next().unwrap().is_ok());
        assert!(cursor.next().unwrap().is_err());
        assert!(cursor.next().is_none());
        drop(cursor);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_collects_rows_and_releases() {
        let (source, releases) = MockSource::new(vec![
            Ok(vec![SqlValue::Int(1)]),
            Ok(vec![SqlValue::Int(2)]),
        ]);
        let rs = RowCursor::new(source).drain().unwrap();

        assert_eq!(rs.len(), 2);
        assert_eq!(rs.columns(), ["n"]);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_release_stops_iteration() {
        let (source, releases) = MockSource::new(vec![Ok(vec![SqlValue::Int(1)])]);
        let mut cursor = RowCursor::new(source);
        cursor.release();

        assert!(cursor.next().is_none());
        drop(cursor);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
