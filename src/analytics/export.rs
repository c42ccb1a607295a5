//! Trend artifacts: a CSV table and a PNG line chart per series.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use super::chart::{Chart, Series};
use super::trend::TrendSeries;
use super::types::{AnalyticsError, AnalyticsResult};

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("artifact name regex"));

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(text: &str) -> String {
    UNSAFE_CHARS.replace_all(text, "_").into_owned()
}

/// Deterministic base name `{metrics}_{dimension}_{predicate}`.
///
/// The predicate is trimmed first, so surrounding whitespace never changes
/// the name.
pub fn artifact_stem(series: &TrendSeries, predicate_text: &str) -> String {
    let metrics = series
        .metrics
        .iter()
        .map(|m| m.column())
        .collect::<Vec<_>>()
        .join("_");
    format!(
        "{metrics}_{}_{}",
        series.dimension.column(),
        sanitize(predicate_text.trim())
    )
}

/// Paths written for one trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendArtifacts {
    pub csv: PathBuf,
    pub png: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> AnalyticsError + '_ {
    move |source| AnalyticsError::Artifact {
        path: path.to_path_buf(),
        source,
    }
}

fn write_csv(series: &TrendSeries, path: &Path) -> AnalyticsResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![series.dimension.column()];
    header.extend(series.metrics.iter().map(|m| m.column()));
    writer.write_record(&header)?;
    for point in &series.points {
        let mut record = vec![point.label.clone()];
        record.extend(
            point
                .values
                .iter()
                .map(|v| v.map(|f| f.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush().map_err(io_err(path))?;
    Ok(())
}

fn line_chart(series: &TrendSeries, predicate_text: &str) -> Chart {
    let metrics = series
        .metrics
        .iter()
        .map(|m| m.column())
        .collect::<Vec<_>>()
        .join(", ");
    let dimension = series.dimension.column();
    let mut title = format!("{metrics} over {dimension}");
    if !predicate_text.trim().is_empty() {
        title.push_str(&format!(" for {}", predicate_text.trim()));
    }
    let ticks = series
        .points
        .iter()
        .enumerate()
        .map(|(x, p)| (x as f64, p.label.clone()))
        .collect();

    Chart::line(
        series
            .metrics
            .iter()
            .enumerate()
            .map(|(i, metric)| Series {
                label: Some(metric.column().to_string()),
                points: series
                    .column(i)
                    .into_iter()
                    .enumerate()
                    .map(|(x, y)| (x as f64, y))
                    .collect(),
            })
            .collect(),
    )
    .with_title(title)
    .with_axis_labels(dimension, "value")
    .with_x_ticks(ticks)
}

/// Write the CSV and PNG for a non-empty series into `dir`.
///
/// Existing files with the same stem are overwritten.
pub fn write_trend_artifacts(
    series: &TrendSeries,
    predicate_text: &str,
    dir: &Path,
) -> AnalyticsResult<TrendArtifacts> {
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;
    let stem = artifact_stem(series, predicate_text);
    let artifacts = TrendArtifacts {
        csv: dir.join(format!("{stem}.csv")),
        png: dir.join(format!("{stem}.png")),
    };

    write_csv(series, &artifacts.csv)?;
    let png = line_chart(series, predicate_text).to_png()?;
    std::fs::write(&artifacts.png, png).map_err(io_err(&artifacts.png))?;

    info!(
        csv = %artifacts.csv.display(),
        png = %artifacts.png.display(),
        points = series.points.len(),
        "wrote trend artifacts"
    );
    Ok(artifacts)
}
