//! Shared types for the analytics tools.
//!
//! Typed requests are produced only by [`super::validate`]; builders consume
//! them and hand back an [`Outcome`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use rusqlite::types::Value;
use serde::Serialize;

use super::predicate::Predicate;
use super::schema::{AggFn, CategoryColumn, ColumnKind, FilterColumn, Metric, TimeDimension};

/// Reply text for every "no matching rows" outcome.
pub const EMPTY_RESULT: &str = "No results found.";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A tool call the engine refuses to run.
///
/// Rejections are not failures of the engine: the tool surface turns them
/// into reply text so the model can correct the call and try again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Invalid metric: {given}. Allowed: {allowed}")]
    InvalidMetric { given: String, allowed: String },
    #[error("Invalid aggregation: {given}. Allowed: {allowed}")]
    InvalidAggregation { given: String, allowed: String },
    #[error("Invalid {kind} dimension: {given}. Allowed: {allowed}")]
    InvalidDimension {
        kind: &'static str,
        given: String,
        allowed: String,
    },
    #[error("Invalid filter column: {given}. Allowed: {allowed}")]
    InvalidFilterColumn { given: String, allowed: String },
    #[error("Invalid filter value for {column}: {reason}")]
    InvalidFilterValue { column: &'static str, reason: String },
    #[error("Invalid where_clause: {reason}")]
    InvalidPredicate { reason: String },
    #[error("At least one metric is required. Allowed: {allowed}")]
    EmptyMetricList { allowed: String },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl Rejection {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMetric { .. } => "invalid_metric",
            Self::InvalidAggregation { .. } => "invalid_aggregation",
            Self::InvalidDimension { .. } => "invalid_dimension",
            Self::InvalidFilterColumn { .. } => "invalid_filter_column",
            Self::InvalidFilterValue { .. } => "invalid_filter_value",
            Self::InvalidPredicate { .. } => "invalid_predicate",
            Self::EmptyMetricList { .. } => "empty_metric_list",
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
        }
    }

    pub(crate) fn predicate(reason: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            reason: reason.into(),
        }
    }
}

/// Engine failure that is not the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// The dataset table is missing; the database has not been imported.
    #[error("table '{0}' does not exist; run 'insights import' first")]
    MissingTable(String),
    /// A database query failed.
    #[error("analytics db error: {0}")]
    Db(String),
    #[error("failed to write artifact `{path}`: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to render chart: {0}")]
    Render(#[from] image::ImageError),
}

/// Convenience alias.
pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

// ---------------------------------------------------------------------------
// Built query
// ---------------------------------------------------------------------------

/// SQL text plus positional bind values (`?1`, `?2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BuiltQuery {
    pub fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

// ---------------------------------------------------------------------------
// Typed requests
// ---------------------------------------------------------------------------

/// Sort direction for grouped results.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn from_desc_flag(order_desc: bool) -> Self {
        if order_desc { Self::Desc } else { Self::Asc }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::Desc => "DESC",
            Self::Asc => "ASC",
        }
    }
}

/// Single aggregate with an optional free-text predicate.
#[derive(Debug, Clone)]
pub struct ScalarRequest {
    pub metric: Metric,
    pub agg: AggFn,
    pub predicate: Option<Predicate>,
}

/// Aggregate with optional grouping, ordering and row limit.
#[derive(Debug, Clone)]
pub struct GroupedRequest {
    pub metric: Metric,
    pub agg: AggFn,
    pub group_by: Option<FilterColumn>,
    pub predicate: Option<Predicate>,
    pub order: SortOrder,
    /// `None` means unbounded.
    pub limit: Option<u32>,
}

/// Equality filter value, already coerced to the column's storage class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
}

impl FilterValue {
    /// Coerce a raw argument to the storage class of `column`.
    ///
    /// Integer columns accept integral JSON numbers and numeric strings;
    /// anything else is kept as text and bound as such, so it simply
    /// matches nothing. Text columns always bind text. `null`, arrays and
    /// objects are rejected.
    pub fn for_column(column: FilterColumn, raw: &serde_json::Value) -> Result<Self, Rejection> {
        let text = match raw {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => {
                return Err(Rejection::InvalidFilterValue {
                    column: column.column(),
                    reason: "null is not a value; use where_clause with IS NULL".into(),
                });
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(Rejection::InvalidFilterValue {
                    column: column.column(),
                    reason: "expected a string or number".into(),
                });
            }
        };
        Ok(match column.kind() {
            ColumnKind::Integer => match text.trim().parse::<i64>() {
                Ok(i) => Self::Integer(i),
                Err(_) => Self::Text(text),
            },
            ColumnKind::Text => Self::Text(text),
        })
    }

    pub fn to_sql_value(&self) -> Value {
        match self {
            Self::Integer(i) => Value::Integer(*i),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }
}

/// Raw `column -> value` filter object as it arrives in a tool call.
pub type FilterRequestMap = serde_json::Map<String, serde_json::Value>;

/// Aggregate restricted by bound equality filters only.
#[derive(Debug, Clone)]
pub struct FilteredRequest {
    pub metric: Metric,
    pub agg: AggFn,
    pub filters: BTreeMap<FilterColumn, FilterValue>,
}

/// Multi-metric SUM over a time dimension.
#[derive(Debug, Clone)]
pub struct TrendRequest {
    pub metrics: Vec<Metric>,
    pub dimension: TimeDimension,
    pub predicate: Option<Predicate>,
}

/// Two-metric scatter over the in-memory snapshot.
#[derive(Debug, Clone)]
pub struct RelationshipRequest {
    pub x: Metric,
    pub y: Metric,
    pub category: Option<CategoryColumn>,
    pub year: Option<i64>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A computed aggregate value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggValue {
    Integer(i64),
    Real(f64),
}

impl AggValue {
    pub(crate) fn from_sql(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(Self::Integer(*i)),
            Value::Real(f) => Some(Self::Real(*f)),
            Value::Text(s) => s.trim().parse::<f64>().ok().map(Self::Real),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(i) => *i as f64,
            Self::Real(f) => *f,
        }
    }
}

impl fmt::Display for AggValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(v) => format_real(*v, f),
        }
    }
}

fn format_real(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

/// One `(group, value)` pair of a grouped aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    /// Group key as text; `None` when the group column was NULL.
    pub key: Option<String>,
    /// `None` when every metric value in the group was NULL.
    pub value: Option<AggValue>,
}

impl fmt::Display for GroupRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key.as_deref().unwrap_or("null");
        match &self.value {
            Some(v) => write!(f, "({key}, {v})"),
            None => write!(f, "({key}, null)"),
        }
    }
}

/// Result of an aggregate tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Outcome {
    /// Exactly one value.
    Scalar(AggValue),
    /// Ordered groups in query-result order.
    Rows(Vec<GroupRow>),
    /// No rows matched.
    Empty,
}

impl Outcome {
    /// Plain-text rendering handed back to the model.
    pub fn render(&self) -> String {
        match self {
            Self::Scalar(v) => v.to_string(),
            Self::Rows(rows) => rows
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Empty => EMPTY_RESULT.to_string(),
        }
    }
}

/// Render a SQL cell as a group key.
pub(crate) fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(AggValue::Real(*f).to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_values_keep_a_decimal_point() {
        assert_eq!(AggValue::Real(1200.0).to_string(), "1200.0");
        assert_eq!(AggValue::Real(12.5).to_string(), "12.5");
        assert_eq!(AggValue::Integer(7).to_string(), "7");
    }

    #[test]
    fn empty_outcome_renders_sentinel() {
        assert_eq!(Outcome::Empty.render(), EMPTY_RESULT);
    }

    #[test]
    fn rows_render_one_pair_per_line() {
        let out = Outcome::Rows(vec![
            GroupRow {
                key: Some("online".into()),
                value: Some(AggValue::Real(10.5)),
            },
            GroupRow {
                key: None,
                value: None,
            },
        ]);
        assert_eq!(out.render(), "(online, 10.5)\n(null, null)");
    }

    #[test]
    fn filter_value_coerces_integer_columns() {
        let v = FilterValue::for_column(FilterColumn::Year, &serde_json::json!("2023")).unwrap();
        assert_eq!(v, FilterValue::Integer(2023));
        let v = FilterValue::for_column(FilterColumn::Year, &serde_json::json!(2022)).unwrap();
        assert_eq!(v, FilterValue::Integer(2022));
    }

    #[test]
    fn filter_value_binds_text_for_text_columns() {
        let v = FilterValue::for_column(FilterColumn::Country, &serde_json::json!(45)).unwrap();
        assert_eq!(v, FilterValue::Text("45".into()));
        let v = FilterValue::for_column(FilterColumn::Product, &serde_json::json!(1.5)).unwrap();
        assert_eq!(v, FilterValue::Text("1.5".into()));
        assert_eq!(v.to_sql_value(), Value::Text("1.5".into()));
    }

    #[test]
    fn filter_value_rejects_null_and_containers() {
        for raw in [
            serde_json::json!(null),
            serde_json::json!(["DK"]),
            serde_json::json!({"eq": "DK"}),
        ] {
            let err = FilterValue::for_column(FilterColumn::Country, &raw).unwrap_err();
            assert_eq!(err.code(), "invalid_filter_value");
        }
    }

    #[test]
    fn filter_value_keeps_garbage_as_text() {
        let v = FilterValue::for_column(FilterColumn::Year, &serde_json::json!("2023; DROP"))
            .unwrap();
        assert_eq!(v, FilterValue::Text("2023; DROP".into()));
    }

    #[test]
    fn rejection_codes_are_stable() {
        let r = Rejection::predicate("bad");
        assert_eq!(r.code(), "invalid_predicate");
        assert_eq!(r.to_string(), "Invalid where_clause: bad");
    }

    #[test]
    fn outcome_json_is_tagged() {
        let json = serde_json::to_value(Outcome::Scalar(AggValue::Integer(3))).unwrap();
        assert_eq!(json["kind"], "scalar");
        assert_eq!(json["data"], 3);
        let json = serde_json::to_value(Outcome::Empty).unwrap();
        assert_eq!(json["kind"], "empty");
    }
}
