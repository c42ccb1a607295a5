//! In-memory copy of the dataset for plots that work on raw rows.

use rusqlite::types::Value;
use tracing::debug;

use super::schema::DATASET_TABLE;
use super::types::{AnalyticsResult, BuiltQuery};
use crate::model::MarketingRecord;
use crate::storage::QueryExecutor;

fn int(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Integer(i) => Some(*i),
        Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn real(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(f) => Some(*f),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

fn record_from_row(row: &[Value]) -> MarketingRecord {
    let at = |i: usize| row.get(i);
    MarketingRecord {
        year: int(at(0)),
        quarter: text(at(1)),
        month: text(at(2)),
        week: int(at(3)),
        date: text(at(4)),
        country: text(at(5)),
        media_category: text(at(6)),
        media_name: text(at(7)),
        communication: text(at(8)),
        campaign_category: text(at(9)),
        product: text(at(10)),
        campaign_name: text(at(11)),
        revenue: real(at(12)),
        cost: real(at(13)),
        profit: real(at(14)),
        roi: real(at(15)),
        margin: real(at(16)),
        quarter_number: int(at(17)),
        month_number: int(at(18)),
        month_name: text(at(19)),
    }
}

/// Every row of `marketing_data`, loaded once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSnapshot {
    records: Vec<MarketingRecord>,
}

impl DatasetSnapshot {
    pub fn from_records(records: Vec<MarketingRecord>) -> Self {
        Self { records }
    }

    pub fn load(exec: &dyn QueryExecutor) -> AnalyticsResult<Self> {
        let query = BuiltQuery::new(
            format!(
                "SELECT {} FROM {DATASET_TABLE}",
                MarketingRecord::COLUMNS.join(", ")
            ),
            Vec::new(),
        );
        let rows = exec.fetch(&query)?;
        let records: Vec<_> = rows.iter().map(|r| record_from_row(r)).collect();
        debug!(rows = records.len(), "loaded dataset snapshot");
        Ok(Self { records })
    }

    /// Rows for one year, or all rows when `year` is `None`.
    pub fn filter_year(&self, year: Option<i64>) -> Vec<&MarketingRecord> {
        self.records
            .iter()
            .filter(|r| year.is_none() || r.year == year)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::MemoryExecutor;

    #[test]
    fn load_round_trips_every_column() {
        let rec = MarketingRecord {
            year: Some(2023),
            quarter: Some("2023 Q1".into()),
            month: Some("2023M01".into()),
            week: Some(2),
            date: Some("2023-01-09".into()),
            country: Some("DK".into()),
            media_category: Some("online".into()),
            media_name: Some("Google".into()),
            communication: Some("Search".into()),
            campaign_category: Some("Brand".into()),
            product: Some("Product 1".into()),
            campaign_name: Some("Winter".into()),
            revenue: Some(100.0),
            cost: Some(40.0),
            profit: Some(60.0),
            roi: Some(1.5),
            margin: Some(0.6),
            quarter_number: Some(1),
            month_number: Some(1),
            month_name: Some("January".into()),
        };
        let exec = MemoryExecutor::seeded(&[rec.clone(), MarketingRecord::default()]);
        let snap = DatasetSnapshot::load(&exec).unwrap();
        assert_eq!(snap.records, vec![rec, MarketingRecord::default()]);
    }

    #[test]
    fn filter_year() {
        let snap = DatasetSnapshot::from_records(vec![
            MarketingRecord {
                year: Some(2022),
                ..Default::default()
            },
            MarketingRecord {
                year: Some(2023),
                ..Default::default()
            },
        ]);
        assert_eq!(snap.filter_year(None).len(), 2);
        assert_eq!(snap.filter_year(Some(2023)).len(), 1);
        assert!(snap.filter_year(Some(1999)).is_empty());
    }
}
