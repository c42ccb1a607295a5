use campaign_insights::model::MarketingRecord;
use campaign_insights::storage::SqliteStorage;
use std::path::PathBuf;
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

#[allow(dead_code)]
struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }

    pub fn remove(key: &str) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::remove_var(key) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Deterministic `marketing_data` row generator.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: MarketingRecord,
}

#[allow(dead_code)]
impl RecordBuilder {
    pub fn new(year: i64, month_number: i64) -> Self {
        let month_name = campaign_insights::analytics::schema::MONTH_NAMES
            [(month_number as usize).clamp(1, 12) - 1];
        let quarter_number = (month_number - 1) / 3 + 1;
        Self {
            record: MarketingRecord {
                year: Some(year),
                quarter: Some(format!("{year} Q{quarter_number}")),
                month: Some(format!("{year}M{month_number:02}")),
                week: Some((month_number - 1) * 4 + 1),
                date: Some(format!("{year}-{month_number:02}-01")),
                country: Some("DK".into()),
                media_category: Some("online".into()),
                media_name: Some("Google".into()),
                communication: Some("Search".into()),
                campaign_category: Some("Brand".into()),
                product: Some("Product 1".into()),
                campaign_name: Some("Always On".into()),
                revenue: Some(0.0),
                cost: Some(0.0),
                profit: Some(0.0),
                roi: Some(0.0),
                margin: Some(0.0),
                quarter_number: Some(quarter_number),
                month_number: Some(month_number),
                month_name: Some(month_name.into()),
            },
        }
    }

    /// Sets revenue and cost; profit, roi and margin follow from them.
    pub fn money(mut self, revenue: f64, cost: f64) -> Self {
        let profit = revenue - cost;
        self.record.revenue = Some(revenue);
        self.record.cost = Some(cost);
        self.record.profit = Some(profit);
        self.record.roi = Some(if cost == 0.0 { 0.0 } else { profit / cost });
        self.record.margin = Some(if revenue == 0.0 { 0.0 } else { profit / revenue });
        self
    }

    pub fn country(mut self, country: Option<&str>) -> Self {
        self.record.country = country.map(Into::into);
        self
    }

    pub fn media_category(mut self, media: &str) -> Self {
        self.record.media_category = Some(media.into());
        self
    }

    pub fn product(mut self, product: &str) -> Self {
        self.record.product = Some(product.into());
        self
    }

    pub fn build(self) -> MarketingRecord {
        self.record
    }
}

/// Temp directory holding a seeded database and an output directory.
#[allow(dead_code)]
pub struct Dataset {
    pub dir: TempDir,
    pub storage: SqliteStorage,
}

#[allow(dead_code)]
impl Dataset {
    pub fn seeded(records: &[MarketingRecord]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let storage = SqliteStorage::new(dir.path().join("marketing.db"));
        storage.insert_records(records).expect("seed dataset");
        Self { dir, storage }
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage.path().to_path_buf()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("plots_output")
    }
}

/// Two years across four media categories.
///
/// 2023 revenue totals 1200.0; 2022 totals 450.0. Summed 2023 profit by
/// media category: tv 300, online 250, print 120, radio 30.
#[allow(dead_code)]
pub fn standard_records() -> Vec<MarketingRecord> {
    vec![
        RecordBuilder::new(2022, 1).money(200.0, 150.0).build(),
        RecordBuilder::new(2022, 6).money(250.0, 100.0).media_category("tv").build(),
        RecordBuilder::new(2023, 1).money(300.0, 150.0).build(),
        RecordBuilder::new(2023, 2)
            .money(100.0, 0.0)
            .media_category("online")
            .country(Some("SE"))
            .build(),
        RecordBuilder::new(2023, 3).money(400.0, 100.0).media_category("tv").build(),
        RecordBuilder::new(2023, 8)
            .money(200.0, 80.0)
            .media_category("print")
            .product("Product 2")
            .build(),
        RecordBuilder::new(2023, 11)
            .money(200.0, 170.0)
            .media_category("radio")
            .country(None)
            .build(),
    ]
}
