//! SQL query builders for the aggregate tools.
//!
//! Builders are pure: they turn a validated request into a [`BuiltQuery`]
//! whose only identifiers come from the schema registry and whose literals
//! are all bind parameters. `run_*` hands the query to a [`QueryExecutor`]
//! and shapes the rows into an [`Outcome`].

use rusqlite::types::Value;
use tracing::debug;

use super::predicate::Predicate;
use super::schema::DATASET_TABLE;
use super::types::*;
use crate::storage::{QueryExecutor, Row};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn where_sql(predicate: Option<&Predicate>, params: &mut Vec<Value>) -> String {
    match predicate {
        Some(p) => format!(" WHERE {}", p.compile(params)),
        None => String::new(),
    }
}

/// Shape the `[value, matched_rows]` row of a scalar-style query.
///
/// No matched rows, or an aggregate that is NULL (every metric value was
/// NULL), both yield [`Outcome::Empty`]. `COUNT` over matched rows with
/// only NULL metrics is a legitimate `0`.
fn scalar_outcome(rows: &[Row]) -> Outcome {
    let Some(row) = rows.first() else {
        return Outcome::Empty;
    };
    let matched = match row.get(1) {
        Some(Value::Integer(n)) => *n,
        _ => 0,
    };
    if matched == 0 {
        return Outcome::Empty;
    }
    match row.first().and_then(AggValue::from_sql) {
        Some(v) => Outcome::Scalar(v),
        None => Outcome::Empty,
    }
}

fn grouped_outcome(rows: Vec<Row>) -> Outcome {
    if rows.is_empty() {
        return Outcome::Empty;
    }
    Outcome::Rows(
        rows.iter()
            .map(|row| GroupRow {
                key: row.first().and_then(value_to_key),
                value: row.get(1).and_then(AggValue::from_sql),
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Scalar aggregate
// ---------------------------------------------------------------------------

/// `SELECT AGG(metric) AS value, COUNT(*) AS matched_rows FROM marketing_data [WHERE ...]`
pub fn build_scalar(req: &ScalarRequest) -> BuiltQuery {
    let mut params = Vec::new();
    let where_clause = where_sql(req.predicate.as_ref(), &mut params);
    let sql = format!(
        "SELECT {} AS value, COUNT(*) AS matched_rows FROM {DATASET_TABLE}{where_clause}",
        req.agg.apply(req.metric)
    );
    BuiltQuery::new(sql, params)
}

pub fn run_scalar(exec: &dyn QueryExecutor, req: &ScalarRequest) -> AnalyticsResult<Outcome> {
    let query = build_scalar(req);
    debug!(metric = %req.metric, agg = %req.agg, sql = %query.sql, "scalar aggregate");
    let rows = exec.fetch(&query)?;
    Ok(scalar_outcome(&rows))
}

// ---------------------------------------------------------------------------
// Grouped aggregate
// ---------------------------------------------------------------------------

/// Grouped aggregate with ordering and an optional row limit.
///
/// Without a group column this is the scalar query: one row, one value.
/// With one, ORDER BY follows the aggregate in the requested direction
/// (ties broken by group key ascending) and LIMIT is applied only when set.
pub fn build_grouped(req: &GroupedRequest) -> BuiltQuery {
    let Some(group) = req.group_by else {
        return build_scalar(&ScalarRequest {
            metric: req.metric,
            agg: req.agg,
            predicate: req.predicate.clone(),
        });
    };

    let mut params = Vec::new();
    let where_clause = where_sql(req.predicate.as_ref(), &mut params);
    let agg = req.agg.apply(req.metric);
    let g = group.column();
    let mut sql = format!(
        "SELECT {g}, {agg} AS value FROM {DATASET_TABLE}{where_clause} \
         GROUP BY {g} ORDER BY {agg} {}, {g} ASC",
        req.order.sql()
    );
    if let Some(limit) = req.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    BuiltQuery::new(sql, params)
}

pub fn run_grouped(exec: &dyn QueryExecutor, req: &GroupedRequest) -> AnalyticsResult<Outcome> {
    let query = build_grouped(req);
    debug!(
        metric = %req.metric,
        agg = %req.agg,
        group_by = ?req.group_by,
        limit = ?req.limit,
        sql = %query.sql,
        "grouped aggregate"
    );
    let rows = exec.fetch(&query)?;
    Ok(if req.group_by.is_some() {
        grouped_outcome(rows)
    } else {
        scalar_outcome(&rows)
    })
}

// ---------------------------------------------------------------------------
// Parameterized structured aggregate
// ---------------------------------------------------------------------------

/// Equality filters only; every value is a bind parameter.
pub fn build_filtered(req: &FilteredRequest) -> BuiltQuery {
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for (column, value) in &req.filters {
        params.push(value.to_sql_value());
        parts.push(format!("{} = ?{}", column.column(), params.len()));
    }
    let where_clause = if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    };
    let sql = format!(
        "SELECT {} AS value, COUNT(*) AS matched_rows FROM {DATASET_TABLE}{where_clause}",
        req.agg.apply(req.metric)
    );
    BuiltQuery::new(sql, params)
}

pub fn run_filtered(exec: &dyn QueryExecutor, req: &FilteredRequest) -> AnalyticsResult<Outcome> {
    let query = build_filtered(req);
    debug!(
        metric = %req.metric,
        agg = %req.agg,
        filters = req.filters.len(),
        sql = %query.sql,
        "filtered aggregate"
    );
    let rows = exec.fetch(&query)?;
    Ok(scalar_outcome(&rows))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
