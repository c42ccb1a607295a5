//! Execution boundary between the query builders and the data source.
//!
//! Builders produce a [`BuiltQuery`]; only an implementation of
//! [`QueryExecutor`] ever runs it.

pub mod sqlite;

use rusqlite::types::Value;

use crate::analytics::types::{AnalyticsResult, BuiltQuery};

pub use sqlite::SqliteStorage;

/// One result row, cell by cell.
pub type Row = Vec<Value>;

/// Runs a built query and returns every row.
///
/// Implementations acquire whatever resource they need per call and release
/// it before returning, on success and failure alike.
pub trait QueryExecutor {
    fn fetch(&self, query: &BuiltQuery) -> AnalyticsResult<Vec<Row>>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn fetch(&self, query: &BuiltQuery) -> AnalyticsResult<Vec<Row>> {
        (**self).fetch(query)
    }
}
