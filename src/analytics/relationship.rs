//! Two-metric scatter over the dataset snapshot.

use image::RgbImage;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use super::chart::{Chart, Series};
use super::schema::{CategoryColumn, Metric};
use super::snapshot::DatasetSnapshot;
use super::types::RelationshipRequest;
use crate::model::MarketingRecord;

/// Summary of one rendered relationship plot.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipReport {
    pub x: Metric,
    pub y: Metric,
    pub category: Option<CategoryColumn>,
    pub year: Option<i64>,
    /// Series labels in plot order; empty for an unsegmented plot.
    pub labels: Vec<String>,
    pub points: usize,
    #[serde(skip)]
    pub image: RgbImage,
}

impl RelationshipReport {
    pub fn series_count(&self) -> usize {
        if self.category.is_some() { self.labels.len() } else { 1 }
    }

    pub fn confirmation(&self) -> String {
        let scope = match self.year {
            Some(y) => format!(" for {y}"),
            None => String::new(),
        };
        let by = match self.category {
            Some(c) => format!(" by {c}"),
            None => String::new(),
        };
        format!(
            "Relationship plot of {} vs {}{by}{scope} rendered: {} series, {} points.",
            self.y,
            self.x,
            self.series_count(),
            self.points
        )
    }
}

fn xy(rows: &[&MarketingRecord], x: Metric, y: Metric) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|r| Some((r.metric(x)?, r.metric(y)?)))
        .collect()
}

/// Build the plot, or `None` when no rows survive the year filter.
///
/// With a category, each distinct non-blank value becomes one labelled
/// series, sorted by label; rows without a category value are left out,
/// and a year where no row has one is empty too.
pub fn plot_relationship(
    snapshot: &DatasetSnapshot,
    req: &RelationshipRequest,
) -> Option<RelationshipReport> {
    let rows = snapshot.filter_year(req.year);
    if rows.is_empty() {
        return None;
    }

    let series: Vec<Series> = match req.category {
        Some(category) => rows
            .iter()
            .filter_map(|r| r.category(category).map(|c| (c.to_string(), *r)))
            .into_group_map()
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .map(|(label, group)| Series {
                label: Some(label),
                points: xy(&group, req.x, req.y),
            })
            .collect(),
        None => vec![Series {
            label: None,
            points: xy(&rows, req.x, req.y),
        }],
    };
    if series.is_empty() {
        return None;
    }

    let labels: Vec<String> = series.iter().filter_map(|s| s.label.clone()).collect();
    let points = series.iter().map(|s| s.points.len()).sum();
    debug!(
        x = %req.x,
        y = %req.y,
        series = series.len(),
        points,
        "relationship plot"
    );
    let image = Chart::scatter(series)
        .with_title(format!("{} vs {}", req.y, req.x))
        .with_axis_labels(req.x.column(), req.y.column())
        .render();

    Some(RelationshipReport {
        x: req.x,
        y: req.y,
        category: req.category,
        year: req.year,
        labels,
        points,
        image,
    })
}
