//! Time-series builder for `plot_trend`.
//!
//! Sums every requested metric per time bucket and orders buckets by the
//! dimension's chronological key, never by label text.

use serde::Serialize;
use tracing::debug;

use super::schema::{DATASET_TABLE, Metric, TimeDimension, month_ordinal};
use super::types::{AggValue, AnalyticsResult, BuiltQuery, TrendRequest, value_to_key};
use crate::storage::QueryExecutor;

/// One time bucket: its label and one sum per requested metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub label: String,
    /// Aligned with [`TrendSeries::metrics`]; `None` when every value was NULL.
    pub values: Vec<Option<f64>>,
}

/// Chronologically ordered multi-metric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub dimension: TimeDimension,
    pub metrics: Vec<Metric>,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values of one metric column, NULL sums as NaN.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| p.values.get(index).copied().flatten().unwrap_or(f64::NAN))
            .collect()
    }
}

/// `SELECT dim[, companions], SUM(m1) AS m1, ... GROUP BY dim[, companions] ORDER BY sort_key ASC`
pub fn build_trend(req: &TrendRequest) -> BuiltQuery {
    let dim = req.dimension.column();
    let mut select = vec![dim.to_string()];
    let mut group = vec![dim.to_string()];
    for companion in req.dimension.companion_columns() {
        select.push((*companion).to_string());
        group.push((*companion).to_string());
    }
    select.extend(req.metrics.iter().map(|m| format!("SUM({m}) AS {m}")));

    let mut params = Vec::new();
    let where_clause = match &req.predicate {
        Some(p) => format!(" WHERE {}", p.compile(&mut params)),
        None => String::new(),
    };
    let sql = format!(
        "SELECT {} FROM {DATASET_TABLE}{where_clause} GROUP BY {} ORDER BY {} ASC",
        select.join(", "),
        group.join(", "),
        req.dimension.sort_column()
    );
    BuiltQuery::new(sql, params)
}

fn calendar_rank(label: &str) -> u32 {
    month_ordinal(label).unwrap_or(u32::MAX)
}

/// Run the trend query and materialise the series.
///
/// Buckets whose dimension value is NULL are dropped. For `month_name` the
/// series is re-sorted by calendar month so that rows with a missing or
/// inconsistent `month_number` still land in order.
pub fn run_trend(exec: &dyn QueryExecutor, req: &TrendRequest) -> AnalyticsResult<TrendSeries> {
    let query = build_trend(req);
    debug!(
        metrics = req.metrics.len(),
        dimension = %req.dimension,
        sql = %query.sql,
        "trend query"
    );
    let rows = exec.fetch(&query)?;
    let offset = 1 + req.dimension.companion_columns().len();

    let mut points: Vec<TrendPoint> = rows
        .iter()
        .filter_map(|row| {
            let label = row.first().and_then(value_to_key)?;
            let values = (0..req.metrics.len())
                .map(|i| {
                    row.get(offset + i)
                        .and_then(AggValue::from_sql)
                        .map(|v| v.as_f64())
                })
                .collect();
            Some(TrendPoint { label, values })
        })
        .collect();

    if req.dimension == TimeDimension::MonthName {
        points.sort_by_key(|p| calendar_rank(&p.label));
    }

    Ok(TrendSeries {
        dimension: req.dimension,
        metrics: req.metrics.clone(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use crate::analytics::validate::validate_trend;
    use crate::model::MarketingRecord;
    use crate::storage::sqlite::MemoryExecutor;

    fn month(name: &str, number: i64, year: i64, revenue: f64, cost: f64) -> MarketingRecord {
        MarketingRecord {
            year: Some(year),
            month_name: Some(name.into()),
            month_number: Some(number),
            quarter_number: Some((number - 1) / 3 + 1),
            revenue: Some(revenue),
            cost: Some(cost),
            ..Default::default()
        }
    }

    fn fixture() -> MemoryExecutor {
        MemoryExecutor::seeded(&[
            month("March", 3, 2023, 30.0, 3.0),
            month("January", 1, 2023, 10.0, 1.0),
            month("February", 2, 2023, 20.0, 2.0),
            month("January", 1, 2023, 5.0, 0.5),
            month("December", 12, 2022, 99.0, 9.0),
            month("August", 8, 2023, 80.0, 8.0),
        ])
    }

    #[test]
    fn month_trend_sql_groups_with_month_number() {
        let req = validate_trend("revenue,cost", "month_name", "year = 2023").unwrap();
        let q = build_trend(&req);
        assert_eq!(
            q.sql,
            "SELECT month_name, month_number, SUM(revenue) AS revenue, SUM(cost) AS cost \
             FROM marketing_data WHERE year = ?1 GROUP BY month_name, month_number \
             ORDER BY month_number ASC"
        );
        assert_eq!(q.params, vec![Value::Integer(2023)]);
    }

    #[test]
    fn months_come_back_in_calendar_order() {
        let req = validate_trend("revenue", "month_name", "year = 2023").unwrap();
        let series = run_trend(&fixture(), &req).unwrap();
        let labels: Vec<_> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["January", "February", "March", "August"]);
        assert_eq!(series.points[0].values, vec![Some(15.0)]);
    }

    #[test]
    fn months_sort_even_without_month_number() {
        let exec = MemoryExecutor::seeded(&[
            MarketingRecord {
                month_name: Some("March".into()),
                revenue: Some(1.0),
                ..Default::default()
            },
            MarketingRecord {
                month_name: Some("January".into()),
                revenue: Some(2.0),
                ..Default::default()
            },
        ]);
        let req = validate_trend("revenue", "month_name", "").unwrap();
        let series = run_trend(&exec, &req).unwrap();
        let labels: Vec<_> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["January", "March"]);
    }

    #[test]
    fn year_trend_has_multiple_metrics() {
        let req = validate_trend("cost, revenue", "year", "").unwrap();
        let series = run_trend(&fixture(), &req).unwrap();
        assert_eq!(series.metrics, vec![Metric::Cost, Metric::Revenue]);
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].label, "2022");
        assert_eq!(series.points[1].values, vec![Some(14.5), Some(145.0)]);
        assert_eq!(series.column(1), vec![99.0, 145.0]);
    }

    #[test]
    fn no_matching_rows_gives_empty_series() {
        let req = validate_trend("revenue", "quarter_number", "year = 1990").unwrap();
        assert!(run_trend(&fixture(), &req).unwrap().is_empty());
    }
}
