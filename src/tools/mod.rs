//! The tool surface called by the language model.
//!
//! Each tool records itself in the [`UsageLog`], validates its raw
//! arguments, runs the matching builder and returns a [`ToolReply`].
//! Rejected arguments come back as a reply, not an error; only data-source
//! and artifact failures surface as [`AnalyticsError`].

pub mod definitions;

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::analytics::export::{TrendArtifacts, write_trend_artifacts};
use crate::analytics::query::{run_filtered, run_grouped, run_scalar};
use crate::analytics::relationship::{RelationshipReport, plot_relationship};
use crate::analytics::snapshot::DatasetSnapshot;
use crate::analytics::trend::{TrendSeries, run_trend};
use crate::analytics::types::{
    AnalyticsResult, EMPTY_RESULT, FilterRequestMap, Outcome, Rejection,
};
use crate::analytics::validate;
use crate::audit::UsageLog;
use crate::storage::QueryExecutor;

pub use definitions::{ToolDefinition, definitions};

pub const AGGREGATE_SIMPLE_WHERE: &str = "aggregate_metric_simple_where";
pub const AGGREGATE_WITH_GROUPING: &str = "aggregate_with_grouping";
pub const AGGREGATE_FILTERED: &str = "aggregate_metric_filtered";
pub const PLOT_TREND: &str = "plot_trend";
pub const PLOT_RELATIONSHIP: &str = "plot_relationship";

pub const TOOL_NAMES: [&str; 5] = [
    AGGREGATE_SIMPLE_WHERE,
    AGGREGATE_WITH_GROUPING,
    AGGREGATE_FILTERED,
    PLOT_TREND,
    PLOT_RELATIONSHIP,
];

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// What a tool hands back. [`ToolReply::render`] is the text the model sees.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolReply {
    Aggregate { outcome: Outcome },
    Trend {
        series: TrendSeries,
        artifacts: TrendArtifacts,
    },
    Relationship { report: RelationshipReport },
    /// No rows matched, from any tool.
    Empty,
    Rejected { code: &'static str, message: String },
}

impl ToolReply {
    pub fn render(&self) -> String {
        match self {
            Self::Aggregate { outcome } => outcome.render(),
            Self::Trend { artifacts, .. } => format!(
                "Plot generated successfully. Data saved to {} and chart to {}.",
                artifacts.csv.display(),
                artifacts.png.display()
            ),
            Self::Relationship { report } => report.confirmation(),
            Self::Empty => EMPTY_RESULT.to_string(),
            Self::Rejected { message, .. } => message.clone(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl From<Outcome> for ToolReply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Empty => Self::Empty,
            outcome => Self::Aggregate { outcome },
        }
    }
}

impl From<Rejection> for ToolReply {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected {
            code: rejection.code(),
            message: rejection.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SimpleWhereArgs {
    metric: String,
    agg: String,
    #[serde(default)]
    where_clause: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupingArgs {
    metric: String,
    agg: String,
    #[serde(default)]
    group_by: Option<String>,
    #[serde(default)]
    where_clause: Option<String>,
    #[serde(default)]
    order_desc: Option<bool>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FilteredArgs {
    metric: String,
    agg: String,
    #[serde(default)]
    filters: Option<FilterRequestMap>,
}

#[derive(Debug, Deserialize)]
struct TrendArgs {
    metrics: String,
    time_dimension: String,
    #[serde(default)]
    where_clause: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelationshipArgs {
    x: String,
    y: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    year: Option<i64>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: serde_json::Value) -> Result<T, Rejection> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| Rejection::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// ToolBox
// ---------------------------------------------------------------------------

/// The five tools bound to one data source, audit log and output directory.
pub struct ToolBox<E> {
    executor: E,
    log: UsageLog,
    output_dir: PathBuf,
    snapshot: OnceCell<DatasetSnapshot>,
}

impl<E: QueryExecutor> ToolBox<E> {
    pub fn new(executor: E, log: UsageLog, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            log,
            output_dir: output_dir.into(),
            snapshot: OnceCell::new(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn log(&self) -> &UsageLog {
        &self.log
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn rejected(&self, tool: &str, rejection: Rejection) -> ToolReply {
        info!(tool, code = rejection.code(), reason = %rejection, "tool call rejected");
        rejection.into()
    }

    /// Single aggregate with an optional `where_clause`.
    pub fn aggregate_metric_simple_where(
        &self,
        metric: &str,
        agg: &str,
        where_clause: &str,
    ) -> AnalyticsResult<ToolReply> {
        self.log.record(
            AGGREGATE_SIMPLE_WHERE,
            json!({"metric": metric, "agg": agg, "where_clause": where_clause}),
        );
        let req = match validate::validate_scalar(metric, agg, where_clause) {
            Ok(req) => req,
            Err(r) => return Ok(self.rejected(AGGREGATE_SIMPLE_WHERE, r)),
        };
        Ok(run_scalar(&self.executor, &req)?.into())
    }

    /// Grouped, ordered, optionally limited aggregate.
    pub fn aggregate_with_grouping(
        &self,
        metric: &str,
        agg: &str,
        group_by: &str,
        where_clause: &str,
        order_desc: bool,
        limit: i64,
    ) -> AnalyticsResult<ToolReply> {
        self.log.record(
            AGGREGATE_WITH_GROUPING,
            json!({
                "metric": metric,
                "agg": agg,
                "group_by": group_by,
                "where_clause": where_clause,
                "order_desc": order_desc,
                "limit": limit,
            }),
        );
        let req = match validate::validate_grouped(
            metric,
            agg,
            group_by,
            where_clause,
            order_desc,
            limit,
        ) {
            Ok(req) => req,
            Err(r) => return Ok(self.rejected(AGGREGATE_WITH_GROUPING, r)),
        };
        Ok(run_grouped(&self.executor, &req)?.into())
    }

    /// Aggregate restricted by bound equality filters.
    pub fn aggregate_metric_filtered(
        &self,
        metric: &str,
        agg: &str,
        filters: &FilterRequestMap,
    ) -> AnalyticsResult<ToolReply> {
        self.log.record(
            AGGREGATE_FILTERED,
            json!({"metric": metric, "agg": agg, "filters": filters}),
        );
        let req = match validate::validate_filtered(metric, agg, filters) {
            Ok(req) => req,
            Err(r) => return Ok(self.rejected(AGGREGATE_FILTERED, r)),
        };
        Ok(run_filtered(&self.executor, &req)?.into())
    }

    /// Chronological multi-metric trend, persisted as CSV and PNG.
    pub fn plot_trend(
        &self,
        metrics: &str,
        time_dimension: &str,
        where_clause: &str,
    ) -> AnalyticsResult<ToolReply> {
        self.log.record(
            PLOT_TREND,
            json!({
                "metrics": metrics,
                "time_dimension": time_dimension,
                "where_clause": where_clause,
            }),
        );
        let req = match validate::validate_trend(metrics, time_dimension, where_clause) {
            Ok(req) => req,
            Err(r) => return Ok(self.rejected(PLOT_TREND, r)),
        };
        let series = run_trend(&self.executor, &req)?;
        if series.is_empty() {
            debug!(tool = PLOT_TREND, "no data; skipping artifacts");
            return Ok(ToolReply::Empty);
        }
        let artifacts = write_trend_artifacts(&series, where_clause, &self.output_dir)?;
        Ok(ToolReply::Trend { series, artifacts })
    }

    /// Scatter of two metrics over the dataset snapshot.
    ///
    /// The snapshot is loaded on first use and reused for later calls.
    pub fn plot_relationship(
        &self,
        x: &str,
        y: &str,
        category: &str,
        year: Option<i64>,
    ) -> AnalyticsResult<ToolReply> {
        self.log.record(
            PLOT_RELATIONSHIP,
            json!({"x": x, "y": y, "category": category, "year": year}),
        );
        let req = match validate::validate_relationship(x, y, category, year) {
            Ok(req) => req,
            Err(r) => return Ok(self.rejected(PLOT_RELATIONSHIP, r)),
        };
        let snapshot = self
            .snapshot
            .get_or_try_init(|| DatasetSnapshot::load(&self.executor))?;
        Ok(match plot_relationship(snapshot, &req) {
            Some(report) => ToolReply::Relationship { report },
            None => ToolReply::Empty,
        })
    }

    /// Invoke a tool by name with JSON arguments.
    ///
    /// Unknown tools and arguments that do not fit the tool's signature are
    /// rejected before the call is recorded.
    pub fn dispatch(&self, name: &str, args: serde_json::Value) -> AnalyticsResult<ToolReply> {
        debug!(tool = name, "dispatch");
        let parsed = match name {
            AGGREGATE_SIMPLE_WHERE => parse_args::<SimpleWhereArgs>(name, args).map(|a| {
                self.aggregate_metric_simple_where(
                    &a.metric,
                    &a.agg,
                    a.where_clause.as_deref().unwrap_or_default(),
                )
            }),
            AGGREGATE_WITH_GROUPING => parse_args::<GroupingArgs>(name, args).map(|a| {
                self.aggregate_with_grouping(
                    &a.metric,
                    &a.agg,
                    a.group_by.as_deref().unwrap_or_default(),
                    a.where_clause.as_deref().unwrap_or_default(),
                    a.order_desc.unwrap_or(true),
                    a.limit.unwrap_or(0),
                )
            }),
            AGGREGATE_FILTERED => parse_args::<FilteredArgs>(name, args).map(|a| {
                self.aggregate_metric_filtered(&a.metric, &a.agg, &a.filters.unwrap_or_default())
            }),
            PLOT_TREND => parse_args::<TrendArgs>(name, args).map(|a| {
                self.plot_trend(
                    &a.metrics,
                    &a.time_dimension,
                    a.where_clause.as_deref().unwrap_or_default(),
                )
            }),
            PLOT_RELATIONSHIP => parse_args::<RelationshipArgs>(name, args).map(|a| {
                self.plot_relationship(
                    &a.x,
                    &a.y,
                    a.category.as_deref().unwrap_or_default(),
                    a.year,
                )
            }),
            other => Err(Rejection::UnknownTool(other.to_string())),
        };
        match parsed {
            Ok(result) => result,
            Err(r) => Ok(self.rejected(name, r)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarketingRecord;
    use crate::storage::sqlite::MemoryExecutor;
    use tempfile::TempDir;

    fn rec(year: i64, media: &str, revenue: f64, profit: f64) -> MarketingRecord {
        MarketingRecord {
            year: Some(year),
            media_category: Some(media.into()),
            revenue: Some(revenue),
            profit: Some(profit),
            cost: Some(revenue - profit),
            month_name: Some("March".into()),
            month_number: Some(3),
            ..Default::default()
        }
    }

    fn toolbox(dir: &TempDir) -> ToolBox<MemoryExecutor> {
        let exec = MemoryExecutor::seeded(&[
            rec(2022, "online", 500.0, 50.0),
            rec(2023, "online", 700.0, 80.0),
            rec(2023, "tv", 500.0, 120.0),
        ]);
        ToolBox::new(exec, UsageLog::new(), dir.path().join("plots"))
    }

    #[test]
    fn simple_where_end_to_end() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb
            .aggregate_metric_simple_where("revenue", "sum", "year = 2023")
            .unwrap();
        assert_eq!(reply.render(), "1200.0");
        assert_eq!(tb.log().len(), 1);
    }

    #[test]
    fn rejections_are_text_and_still_logged() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb
            .aggregate_metric_simple_where("salary", "sum", "")
            .unwrap();
        assert!(reply.is_rejected());
        assert!(reply.render().starts_with("Invalid metric: salary"));

        let reply = tb
            .aggregate_metric_simple_where("revenue", "sum", "1=1; DROP TABLE marketing_data")
            .unwrap();
        assert!(reply.render().starts_with("Invalid where_clause"));
        assert_eq!(tb.log().len(), 2);
    }

    #[test]
    fn every_empty_outcome_renders_the_same() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let replies = [
            tb.aggregate_metric_simple_where("revenue", "sum", "year = 1990").unwrap(),
            tb.aggregate_with_grouping("revenue", "sum", "country", "year = 1990", true, 0)
                .unwrap(),
            tb.aggregate_metric_filtered(
                "revenue",
                "sum",
                json!({"year": 1990}).as_object().unwrap(),
            )
            .unwrap(),
            tb.plot_trend("revenue", "year", "year = 1990").unwrap(),
            tb.plot_relationship("cost", "revenue", "", Some(1990)).unwrap(),
        ];
        for reply in &replies {
            assert!(matches!(reply, ToolReply::Empty));
            assert_eq!(reply.render(), EMPTY_RESULT);
        }
        assert!(!tb.output_dir().exists());
    }

    #[test]
    fn trend_writes_artifacts() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb.plot_trend("revenue,profit", "year", "").unwrap();
        let ToolReply::Trend { artifacts, series } = &reply else {
            panic!("expected trend, got {reply:?}");
        };
        assert_eq!(series.points.len(), 2);
        assert!(artifacts.csv.exists());
        assert!(artifacts.png.exists());
        assert!(reply.render().starts_with("Plot generated successfully."));
    }

    #[test]
    fn dispatch_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb
            .dispatch(
                AGGREGATE_WITH_GROUPING,
                json!({"metric": "profit", "agg": "sum", "group_by": "media_category"}),
            )
            .unwrap();
        assert_eq!(reply.render(), "(online, 130.0)\n(tv, 120.0)");
        let entry = &tb.log().snapshot()[0];
        assert_eq!(entry.tool_name, AGGREGATE_WITH_GROUPING);
        assert_eq!(entry.metadata["order_desc"], true);
        assert_eq!(entry.metadata["limit"], 0);
    }

    #[test]
    fn dispatch_accepts_null_optionals() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb
            .dispatch(
                AGGREGATE_SIMPLE_WHERE,
                json!({"metric": "revenue", "agg": "count", "where_clause": null}),
            )
            .unwrap();
        assert_eq!(reply.render(), "3");

        let reply = tb
            .dispatch(
                AGGREGATE_WITH_GROUPING,
                json!({
                    "metric": "profit",
                    "agg": "sum",
                    "group_by": "media_category",
                    "order_desc": null,
                    "limit": null,
                }),
            )
            .unwrap();
        assert_eq!(reply.render(), "(online, 130.0)\n(tv, 120.0)");
        assert_eq!(tb.log().len(), 2);
        let entry = &tb.log().snapshot()[1];
        assert_eq!(entry.metadata["order_desc"], true);
        assert_eq!(entry.metadata["limit"], 0);
    }

    #[test]
    fn dispatch_rejects_unknown_tool_and_bad_args_without_logging() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb.dispatch("run_sql", json!({"query": "SELECT 1"})).unwrap();
        assert_eq!(reply.render(), "Unknown tool: run_sql");

        let reply = tb
            .dispatch(AGGREGATE_WITH_GROUPING, json!({"metric": "profit", "agg": "sum", "limit": "ten"}))
            .unwrap();
        let ToolReply::Rejected { code, .. } = reply else {
            panic!("expected rejection");
        };
        assert_eq!(code, "invalid_arguments");
        assert!(tb.log().is_empty());
    }

    #[test]
    fn relationship_reuses_snapshot() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let first = tb
            .plot_relationship("cost", "revenue", "media_category", None)
            .unwrap();
        assert_eq!(
            first.render(),
            "Relationship plot of revenue vs cost by media_category rendered: 2 series, 3 points."
        );
        tb.plot_relationship("cost", "profit", "", Some(2023)).unwrap();
        assert!(tb.snapshot.get().is_some());
        assert_eq!(tb.log().len(), 2);
    }

    #[test]
    fn reply_json_is_tagged() {
        let dir = TempDir::new().unwrap();
        let tb = toolbox(&dir);
        let reply = tb
            .aggregate_metric_simple_where("profit", "max", "")
            .unwrap();
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["status"], "aggregate");
        assert_eq!(v["outcome"]["kind"], "scalar");
        assert_eq!(v["outcome"]["data"], 120.0);
    }
}
