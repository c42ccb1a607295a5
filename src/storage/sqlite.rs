//! SQLite-backed dataset storage.
//!
//! Queries run on a fresh read-only connection per call; the connection is
//! dropped before `fetch` returns, so nothing is held between tool calls.
//! Writes only happen through the explicit import path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};
use tracing::{debug, info};

use super::{QueryExecutor, Row};
use crate::analytics::schema::DATASET_TABLE;
use crate::analytics::types::{AnalyticsError, AnalyticsResult, BuiltQuery};
use crate::model::MarketingRecord;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS marketing_data (
    year INTEGER,
    quarter TEXT,
    month TEXT,
    week INTEGER,
    date TEXT,
    country TEXT,
    media_category TEXT,
    media_name TEXT,
    communication TEXT,
    campaign_category TEXT,
    product TEXT,
    campaign_name TEXT,
    revenue REAL,
    cost REAL,
    profit REAL,
    roi REAL,
    margin REAL,
    quarter_number INTEGER,
    month_number INTEGER,
    month_name TEXT
);
CREATE INDEX IF NOT EXISTS idx_marketing_data_year ON marketing_data(year);
";

fn db_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> AnalyticsError {
    move |e| AnalyticsError::Db(format!("{context}: {e}"))
}

/// Check whether a table exists in the database.
pub fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |_| Ok(()),
    )
    .is_ok()
}

/// Handle to the SQLite file holding `marketing_data`.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    path: PathBuf,
}

impl SqliteStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect_read_only(&self) -> AnalyticsResult<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            AnalyticsError::Db(format!(
                "Failed to open dataset at {}: {e}",
                self.path.display()
            ))
        })
    }

    fn connect_writable(&self) -> AnalyticsResult<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AnalyticsError::Artifact {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(&self.path).map_err(db_err("Failed to open dataset"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(db_err("Failed to create schema"))?;
        Ok(conn)
    }

    /// Create the table (if needed) and append records in one transaction.
    pub fn insert_records(&self, records: &[MarketingRecord]) -> AnalyticsResult<usize> {
        let mut conn = self.connect_writable()?;
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin import transaction"))?;
        insert_all(&tx, records)?;
        tx.commit().map_err(db_err("Failed to commit import"))?;
        Ok(records.len())
    }

    /// Load a CSV extract whose header names match the dataset columns.
    ///
    /// Unknown columns are ignored and missing ones stored as NULL.
    pub fn import_csv(&self, csv_path: &Path) -> AnalyticsResult<usize> {
        let start = Instant::now();
        let mut reader = csv::Reader::from_path(csv_path)?;
        let records = reader
            .deserialize::<MarketingRecord>()
            .collect::<Result<Vec<_>, _>>()?;
        let inserted = self.insert_records(&records)?;
        info!(
            rows = inserted,
            source = %csv_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "imported marketing dataset"
        );
        Ok(inserted)
    }
}

impl QueryExecutor for SqliteStorage {
    fn fetch(&self, query: &BuiltQuery) -> AnalyticsResult<Vec<Row>> {
        let conn = self.connect_read_only()?;
        run_query(&conn, query)
    }
}

/// Run a built query on an open connection and collect every cell.
pub fn run_query(conn: &Connection, query: &BuiltQuery) -> AnalyticsResult<Vec<Row>> {
    let start = Instant::now();
    if !table_exists(conn, DATASET_TABLE) {
        return Err(AnalyticsError::MissingTable(DATASET_TABLE.into()));
    }

    let mut stmt = conn
        .prepare(&query.sql)
        .map_err(db_err("Failed to prepare analytics query"))?;
    let columns = stmt.column_count();

    let rows = stmt
        .query_map(params_from_iter(query.params.iter()), |row| {
            (0..columns)
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()
        })
        .map_err(db_err("Analytics query failed"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err("Row read error"))?;

    debug!(
        sql = %query.sql,
        params = query.params.len(),
        rows = rows.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "executed analytics query"
    );
    Ok(rows)
}

fn insert_all(conn: &Connection, records: &[MarketingRecord]) -> AnalyticsResult<()> {
    let mut stmt = conn
        .prepare(&format!(
            "INSERT INTO {DATASET_TABLE} ({}) VALUES ({})",
            MarketingRecord::COLUMNS.join(", "),
            (1..=MarketingRecord::COLUMNS.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .map_err(db_err("Failed to prepare insert"))?;
    for r in records {
        stmt.execute(params![
            r.year,
            r.quarter,
            r.month,
            r.week,
            r.date,
            r.country,
            r.media_category,
            r.media_name,
            r.communication,
            r.campaign_category,
            r.product,
            r.campaign_name,
            r.revenue,
            r.cost,
            r.profit,
            r.roi,
            r.margin,
            r.quarter_number,
            r.month_number,
            r.month_name,
        ])
        .map_err(db_err("Failed to insert record"))?;
    }
    Ok(())
}

/// In-memory executor seeded with records, for unit tests.
#[cfg(test)]
pub(crate) struct MemoryExecutor(Connection);

#[cfg(test)]
impl MemoryExecutor {
    pub(crate) fn seeded(records: &[MarketingRecord]) -> Self {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        insert_all(&conn, records).unwrap();
        Self(conn)
    }

    pub(crate) fn without_table() -> Self {
        Self(Connection::open_in_memory().unwrap())
    }
}

#[cfg(test)]
impl QueryExecutor for MemoryExecutor {
    fn fetch(&self, query: &BuiltQuery) -> AnalyticsResult<Vec<Row>> {
        run_query(&self.0, query)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
