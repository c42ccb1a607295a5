mod util;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;
use util::{Dataset, standard_records};

fn base_cmd(temp_home: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("insights"));
    // Keep the user's config and .env out of the picture.
    cmd.current_dir(temp_home);
    cmd.env("HOME", temp_home);
    cmd.env("XDG_CONFIG_HOME", temp_home.join(".config"));
    cmd.env("XDG_DATA_HOME", temp_home.join(".local/share"));
    cmd.env("INSIGHTS_OUTPUT_DIR", temp_home.join("plots"));
    cmd.env_remove("INSIGHTS_DB_PATH");
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn tools_lists_every_definition() {
    let tmp = TempDir::new().unwrap();
    base_cmd(tmp.path())
        .arg("tools")
        .assert()
        .success()
        .stdout(contains("\"aggregate_metric_simple_where\""))
        .stdout(contains("\"aggregate_with_grouping\""))
        .stdout(contains("\"aggregate_metric_filtered\""))
        .stdout(contains("\"plot_trend\""))
        .stdout(contains("\"plot_relationship\""));
}

#[test]
fn scalar_prints_the_aggregate() {
    let ds = Dataset::seeded(&standard_records());
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args(["scalar", "revenue", "sum", "--where", "year = 2023"])
        .assert()
        .success()
        .stdout("1200.0\n");
}

#[test]
fn grouped_honours_limit_and_order() {
    let ds = Dataset::seeded(&standard_records());
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args([
            "grouped",
            "profit",
            "sum",
            "--group-by",
            "media_category",
            "--limit",
            "3",
        ])
        .assert()
        .success()
        .stdout("(tv, 450.0)\n(online, 300.0)\n(print, 120.0)\n");
}

#[test]
fn filtered_reads_column_value_pairs() {
    let ds = Dataset::seeded(&standard_records());
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args([
            "filtered",
            "revenue",
            "sum",
            "--filter",
            "year=2022",
            "--filter",
            "media_category=tv",
        ])
        .assert()
        .success()
        .stdout("250.0\n");
}

#[test]
fn rejected_call_exits_four_with_reply_on_stdout() {
    let ds = Dataset::seeded(&standard_records());
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args(["scalar", "clicks", "sum"])
        .assert()
        .code(4)
        .stdout(contains("Invalid metric: clicks"))
        .stderr(contains("error:").not());
}

#[test]
fn json_mode_tags_the_reply() {
    let ds = Dataset::seeded(&standard_records());
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args(["--json", "scalar", "revenue", "sum", "--where", "year = 2030"])
        .assert()
        .success()
        .stdout(contains("\"status\": \"empty\""));
}

#[test]
fn call_dispatches_raw_arguments() {
    let ds = Dataset::seeded(&standard_records());
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args([
            "call",
            "aggregate_metric_simple_where",
            r#"{"metric": "revenue", "agg": "count"}"#,
        ])
        .assert()
        .success()
        .stdout("7\n");

    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args(["call", "drop_everything"])
        .assert()
        .code(4)
        .stdout(contains("Unknown tool: drop_everything"));

    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .args(["call", "plot_trend", "{not json"])
        .assert()
        .code(2)
        .stderr(contains("not valid JSON"));
}

#[test]
fn missing_table_exits_one_with_hint() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("blank.db");
    rusqlite::Connection::open(&db).unwrap();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["scalar", "revenue", "sum"])
        .assert()
        .code(1)
        .stderr(contains("marketing_data"))
        .stderr(contains("insights import"));
}

#[test]
fn missing_table_json_error_payload() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("blank.db");
    rusqlite::Connection::open(&db).unwrap();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["--json", "scalar", "revenue", "sum"])
        .assert()
        .code(1)
        .stderr(contains("\"kind\":\"missing_table\""));
}

#[test]
fn import_then_trend_writes_artifacts() {
    let tmp = TempDir::new().unwrap();
    let csv_path = tmp.path().join("extract.csv");
    fs::write(
        &csv_path,
        "year,month_number,month_name,revenue,cost\n\
         2023,3,March,30,10\n\
         2023,1,January,10,4\n\
         2023,2,February,20,8\n",
    )
    .unwrap();
    let db = tmp.path().join("data/marketing.db");

    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .arg("import")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(contains("Imported 3 rows"));

    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["trend", "revenue,cost", "month_name"])
        .assert()
        .success()
        .stdout(contains("Plot generated successfully."));

    let plots = tmp.path().join("plots");
    let csv = fs::read_to_string(plots.join("revenue_cost_month_name_.csv")).unwrap();
    assert_eq!(
        csv,
        "month_name,revenue,cost\nJanuary,10,4\nFebruary,20,8\nMarch,30,10\n"
    );
    let png = fs::read(plots.join("revenue_cost_month_name_.png")).unwrap();
    assert_eq!(&png[..4], b"\x89PNG");
}

#[test]
fn output_dir_flag_beats_environment() {
    let ds = Dataset::seeded(&standard_records());
    let out = ds.dir.path().join("elsewhere");
    base_cmd(ds.dir.path())
        .arg("--db")
        .arg(ds.db_path())
        .arg("--output-dir")
        .arg(&out)
        .args(["trend", "revenue", "year"])
        .assert()
        .success();
    assert!(out.join("revenue_year_.csv").exists());
    assert!(!ds.dir.path().join("plots").exists());
}
