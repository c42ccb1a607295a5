//! Argument validation for the analytics tools.
//!
//! Each `validate_*` function takes the raw arguments of one tool and either
//! returns the typed request the builders consume or the first [`Rejection`]
//! encountered. Checks run in a fixed order (metric, aggregation, dimension,
//! filters, predicate) so the caller always sees the most basic mistake first.
//!
//! Validation is pure: no I/O, no logging, no query construction.

use std::collections::BTreeMap;

use super::predicate::Predicate;
use super::schema::{AggFn, CategoryColumn, FilterColumn, Metric, TimeDimension};
use super::types::{
    FilterRequestMap, FilterValue, FilteredRequest, GroupedRequest, Rejection,
    RelationshipRequest, ScalarRequest, SortOrder, TrendRequest,
};

fn optional(raw: &str) -> Option<&str> {
    let t = raw.trim();
    if t.is_empty() { None } else { Some(t) }
}

/// Validate a comma-separated metric list; blanks are skipped and repeats
/// collapsed, keeping first-seen order.
pub fn validate_metric_list(raw: &str) -> Result<Vec<Metric>, Rejection> {
    let mut metrics = Vec::new();
    for part in raw.split(',').filter_map(optional) {
        let metric: Metric = part.parse()?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    if metrics.is_empty() {
        return Err(Rejection::EmptyMetricList {
            allowed: Metric::allowed(),
        });
    }
    Ok(metrics)
}

/// `aggregate_metric_simple_where` arguments.
pub fn validate_scalar(metric: &str, agg: &str, where_clause: &str) -> Result<ScalarRequest, Rejection> {
    let metric: Metric = metric.parse()?;
    let agg: AggFn = agg.parse()?;
    let predicate = Predicate::parse(where_clause)?;
    Ok(ScalarRequest {
        metric,
        agg,
        predicate,
    })
}

/// `aggregate_with_grouping` arguments.
///
/// `limit <= 0` means unbounded.
pub fn validate_grouped(
    metric: &str,
    agg: &str,
    group_by: &str,
    where_clause: &str,
    order_desc: bool,
    limit: i64,
) -> Result<GroupedRequest, Rejection> {
    let metric: Metric = metric.parse()?;
    let agg: AggFn = agg.parse()?;
    let group_by = optional(group_by)
        .map(str::parse::<FilterColumn>)
        .transpose()?;
    let predicate = Predicate::parse(where_clause)?;
    let limit = if limit > 0 {
        Some(u32::try_from(limit).unwrap_or(u32::MAX))
    } else {
        None
    };
    Ok(GroupedRequest {
        metric,
        agg,
        group_by,
        predicate,
        order: SortOrder::from_desc_flag(order_desc),
        limit,
    })
}

/// `aggregate_metric_filtered` arguments.
///
/// Keys are checked against the filter-column allowlist; values are coerced
/// to the column's storage class and later bound as parameters.
pub fn validate_filtered(
    metric: &str,
    agg: &str,
    filters: &FilterRequestMap,
) -> Result<FilteredRequest, Rejection> {
    let metric: Metric = metric.parse()?;
    let agg: AggFn = agg.parse()?;
    let mut typed = BTreeMap::new();
    for (key, raw) in filters {
        let column = FilterColumn::parse_filter_key(key)?;
        typed.insert(column, FilterValue::for_column(column, raw)?);
    }
    Ok(FilteredRequest {
        metric,
        agg,
        filters: typed,
    })
}

/// `plot_trend` arguments.
pub fn validate_trend(
    metrics: &str,
    time_dimension: &str,
    where_clause: &str,
) -> Result<TrendRequest, Rejection> {
    let metrics = validate_metric_list(metrics)?;
    let dimension: TimeDimension = time_dimension.parse()?;
    let predicate = Predicate::parse(where_clause)?;
    Ok(TrendRequest {
        metrics,
        dimension,
        predicate,
    })
}

/// `plot_relationship` arguments.
pub fn validate_relationship(
    x: &str,
    y: &str,
    category: &str,
    year: Option<i64>,
) -> Result<RelationshipRequest, Rejection> {
    let x: Metric = x.parse()?;
    let y: Metric = y.parse()?;
    let category = optional(category)
        .map(str::parse::<CategoryColumn>)
        .transpose()?;
    Ok(RelationshipRequest {
        x,
        y,
        category,
        year,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
