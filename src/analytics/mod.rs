//! Constrained analytics over the `marketing_data` table.
//!
//! # Module structure
//!
//! - [`schema`]: allowlisted metrics, aggregations and dimensions
//! - [`predicate`]: parser for the free-text `where_clause` argument
//! - [`validate`]: raw tool arguments → typed requests
//! - [`query`]: scalar, grouped and filtered aggregate builders
//! - [`trend`] / [`export`]: time series and their CSV/PNG artifacts
//! - [`snapshot`] / [`relationship`]: in-memory scatter plots
//! - [`chart`]: PNG rasterizer shared by both plot kinds, with a small
//!   bitmap font for titles, ticks and legends
//! - [`types`]: requests, outcomes, error types

pub mod chart;
pub mod export;
mod font;
pub mod predicate;
pub mod query;
pub mod relationship;
pub mod schema;
pub mod snapshot;
pub mod trend;
pub mod types;
pub mod validate;

pub use predicate::Predicate;
pub use relationship::RelationshipReport;
pub use schema::{AggFn, CategoryColumn, FilterColumn, Metric, TimeDimension};
pub use snapshot::DatasetSnapshot;
pub use trend::{TrendPoint, TrendSeries};
pub use types::{
    AggValue, AnalyticsError, AnalyticsResult, BuiltQuery, EMPTY_RESULT, GroupRow, Outcome,
    Rejection,
};
