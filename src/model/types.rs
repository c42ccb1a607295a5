//! Row model of the `marketing_data` table.

use serde::{Deserialize, Serialize};

use crate::analytics::schema::{CategoryColumn, Metric};

/// One row of the marketing dataset.
///
/// Every column is optional: extracts routinely carry blank cells or omit
/// columns, and the engine treats a missing value as SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketingRecord {
    pub year: Option<i64>,
    /// e.g. "2020 Q3"
    pub quarter: Option<String>,
    /// e.g. "2020M08"
    pub month: Option<String>,
    pub week: Option<i64>,
    /// ISO date (`YYYY-MM-DD`).
    pub date: Option<String>,
    pub country: Option<String>,
    pub media_category: Option<String>,
    pub media_name: Option<String>,
    pub communication: Option<String>,
    pub campaign_category: Option<String>,
    pub product: Option<String>,
    pub campaign_name: Option<String>,
    pub revenue: Option<f64>,
    pub cost: Option<f64>,
    pub profit: Option<f64>,
    pub roi: Option<f64>,
    pub margin: Option<f64>,
    /// 1-4
    pub quarter_number: Option<i64>,
    /// 1-12
    pub month_number: Option<i64>,
    /// e.g. "August"
    pub month_name: Option<String>,
}

impl MarketingRecord {
    /// Column order used for import and snapshot loading.
    pub const COLUMNS: [&'static str; 20] = [
        "year",
        "quarter",
        "month",
        "week",
        "date",
        "country",
        "media_category",
        "media_name",
        "communication",
        "campaign_category",
        "product",
        "campaign_name",
        "revenue",
        "cost",
        "profit",
        "roi",
        "margin",
        "quarter_number",
        "month_number",
        "month_name",
    ];

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Revenue => self.revenue,
            Metric::Cost => self.cost,
            Metric::Profit => self.profit,
            Metric::Roi => self.roi,
            Metric::Margin => self.margin,
        }
    }

    /// Category value, with blank strings treated as missing.
    pub fn category(&self, column: CategoryColumn) -> Option<&str> {
        let value = match column {
            CategoryColumn::Country => &self.country,
            CategoryColumn::MediaCategory => &self.media_category,
            CategoryColumn::MediaName => &self.media_name,
            CategoryColumn::CampaignName => &self.campaign_name,
            CategoryColumn::CampaignCategory => &self.campaign_category,
            CategoryColumn::Product => &self.product,
        };
        value.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_category_is_missing() {
        let rec = MarketingRecord {
            country: Some("  ".into()),
            product: Some("Product 1".into()),
            ..Default::default()
        };
        assert_eq!(rec.category(CategoryColumn::Country), None);
        assert_eq!(rec.category(CategoryColumn::Product), Some("Product 1"));
        assert_eq!(rec.category(CategoryColumn::MediaName), None);
    }

    #[test]
    fn metric_accessor_matches_fields() {
        let rec = MarketingRecord {
            revenue: Some(10.0),
            margin: Some(0.2),
            ..Default::default()
        };
        assert_eq!(rec.metric(Metric::Revenue), Some(10.0));
        assert_eq!(rec.metric(Metric::Margin), Some(0.2));
        assert_eq!(rec.metric(Metric::Cost), None);
    }
}
