//! Schema registry for the `marketing_data` table.
//!
//! Every identifier that can reach a SQL string lives here as an enum variant.
//! The validator parses raw tool arguments into these types, so a query
//! builder can only ever name a column that appears in this file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::Rejection;

/// The one table the engine is allowed to read.
pub const DATASET_TABLE: &str = "marketing_data";

fn allowed_list(names: impl IntoIterator<Item = &'static str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// Numeric column eligible as an aggregation target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Revenue,
    Cost,
    Profit,
    Roi,
    Margin,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Revenue,
        Metric::Cost,
        Metric::Profit,
        Metric::Roi,
        Metric::Margin,
    ];

    /// SQL column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Cost => "cost",
            Self::Profit => "profit",
            Self::Roi => "roi",
            Self::Margin => "margin",
        }
    }

    pub fn allowed() -> String {
        allowed_list(Self::ALL.iter().map(Metric::column))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.column() == needle)
            .ok_or_else(|| Rejection::InvalidMetric {
                given: s.trim().to_string(),
                allowed: Self::allowed(),
            })
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregation function applied to a metric.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFn {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggFn {
    pub const ALL: [AggFn; 5] = [AggFn::Sum, AggFn::Avg, AggFn::Min, AggFn::Max, AggFn::Count];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }

    /// Render `AGG(metric)`.
    pub fn apply(&self, metric: Metric) -> String {
        format!("{}({})", self.name().to_ascii_uppercase(), metric.column())
    }

    pub fn allowed() -> String {
        allowed_list(Self::ALL.iter().map(AggFn::name))
    }
}

impl fmt::Display for AggFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggFn {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == needle)
            .ok_or_else(|| Rejection::InvalidAggregation {
                given: s.trim().to_string(),
                allowed: Self::allowed(),
            })
    }
}

// ---------------------------------------------------------------------------
// Filter / group dimensions
// ---------------------------------------------------------------------------

/// Storage class of a dimension column, used when binding filter values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

/// Column allowed in equality filters and `GROUP BY`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterColumn {
    Year,
    QuarterNumber,
    MonthNumber,
    MonthName,
    Country,
    MediaCategory,
    MediaName,
    CampaignName,
    CampaignCategory,
    Product,
}

impl FilterColumn {
    pub const ALL: [FilterColumn; 10] = [
        FilterColumn::Year,
        FilterColumn::QuarterNumber,
        FilterColumn::MonthNumber,
        FilterColumn::MonthName,
        FilterColumn::Country,
        FilterColumn::MediaCategory,
        FilterColumn::MediaName,
        FilterColumn::CampaignName,
        FilterColumn::CampaignCategory,
        FilterColumn::Product,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::QuarterNumber => "quarter_number",
            Self::MonthNumber => "month_number",
            Self::MonthName => "month_name",
            Self::Country => "country",
            Self::MediaCategory => "media_category",
            Self::MediaName => "media_name",
            Self::CampaignName => "campaign_name",
            Self::CampaignCategory => "campaign_category",
            Self::Product => "product",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Year | Self::QuarterNumber | Self::MonthNumber => ColumnKind::Integer,
            _ => ColumnKind::Text,
        }
    }

    pub fn allowed() -> String {
        allowed_list(Self::ALL.iter().map(FilterColumn::column))
    }

    fn lookup(s: &str) -> Option<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.column() == needle)
    }

    /// Parse a column used as a structured-filter key.
    pub fn parse_filter_key(s: &str) -> Result<Self, Rejection> {
        Self::lookup(s).ok_or_else(|| Rejection::InvalidFilterColumn {
            given: s.trim().to_string(),
            allowed: Self::allowed(),
        })
    }
}

impl fmt::Display for FilterColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Parsing as a group-by dimension; filter keys use [`FilterColumn::parse_filter_key`].
impl FromStr for FilterColumn {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| Rejection::InvalidDimension {
            kind: "group",
            given: s.trim().to_string(),
            allowed: Self::allowed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Time dimensions
// ---------------------------------------------------------------------------

/// Column allowed to drive a chronological trend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDimension {
    MonthName,
    QuarterNumber,
    Year,
    Date,
}

impl TimeDimension {
    pub const ALL: [TimeDimension; 4] = [
        TimeDimension::MonthName,
        TimeDimension::QuarterNumber,
        TimeDimension::Year,
        TimeDimension::Date,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::MonthName => "month_name",
            Self::QuarterNumber => "quarter_number",
            Self::Year => "year",
            Self::Date => "date",
        }
    }

    /// Column whose ascending order is chronological for this dimension.
    ///
    /// `month_name` sorts by `month_number`; ISO dates already sort
    /// lexically in calendar order.
    pub fn sort_column(&self) -> &'static str {
        match self {
            Self::MonthName => "month_number",
            other => other.column(),
        }
    }

    /// Extra columns that must be co-grouped with the dimension so that
    /// ordering by [`sort_column`](Self::sort_column) is well defined.
    pub fn companion_columns(&self) -> &'static [&'static str] {
        match self {
            Self::MonthName => &["month_number"],
            _ => &[],
        }
    }

    pub fn allowed() -> String {
        allowed_list(Self::ALL.iter().map(TimeDimension::column))
    }
}

impl fmt::Display for TimeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for TimeDimension {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.column() == needle)
            .ok_or_else(|| Rejection::InvalidDimension {
                kind: "time",
                given: s.trim().to_string(),
                allowed: Self::allowed(),
            })
    }
}

// ---------------------------------------------------------------------------
// Category columns (relationship segmentation)
// ---------------------------------------------------------------------------

/// Categorical column that can split a relationship plot into series.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryColumn {
    Country,
    MediaCategory,
    MediaName,
    CampaignName,
    CampaignCategory,
    Product,
}

impl CategoryColumn {
    pub const ALL: [CategoryColumn; 6] = [
        CategoryColumn::Country,
        CategoryColumn::MediaCategory,
        CategoryColumn::MediaName,
        CategoryColumn::CampaignName,
        CategoryColumn::CampaignCategory,
        CategoryColumn::Product,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::MediaCategory => "media_category",
            Self::MediaName => "media_name",
            Self::CampaignName => "campaign_name",
            Self::CampaignCategory => "campaign_category",
            Self::Product => "product",
        }
    }

    pub fn allowed() -> String {
        allowed_list(Self::ALL.iter().map(CategoryColumn::column))
    }
}

impl fmt::Display for CategoryColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for CategoryColumn {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.column() == needle)
            .ok_or_else(|| Rejection::InvalidDimension {
                kind: "category",
                given: s.trim().to_string(),
                allowed: Self::allowed(),
            })
    }
}

// ---------------------------------------------------------------------------
// Month names
// ---------------------------------------------------------------------------

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar ordinal (1-based) of an English month name.
pub fn month_ordinal(name: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name.trim()))
        .map(|i| i as u32 + 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
