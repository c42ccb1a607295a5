mod util;

use campaign_insights::config::{AppConfig, ENV_DB_PATH, ENV_OUTPUT_DIR};
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;
use util::EnvGuard;

fn clear_overrides() -> (EnvGuard, EnvGuard) {
    (EnvGuard::remove(ENV_DB_PATH), EnvGuard::remove(ENV_OUTPUT_DIR))
}

#[test]
#[serial]
fn config_path_follows_xdg_config_home() {
    let tmp = TempDir::new().unwrap();
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", tmp.path().to_string_lossy());
    assert_eq!(
        AppConfig::config_path().unwrap(),
        tmp.path().join("campaign-insights/config.toml")
    );
}

#[test]
#[serial]
fn load_reads_file_from_xdg_location() {
    let tmp = TempDir::new().unwrap();
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", tmp.path().to_string_lossy());
    let _clear = clear_overrides();

    let written = AppConfig {
        database_path: PathBuf::from("/srv/marketing.db"),
        output_dir: PathBuf::from("/srv/plots"),
    };
    written
        .save_to(&tmp.path().join("campaign-insights/config.toml"))
        .unwrap();

    assert_eq!(AppConfig::load().unwrap(), written);
}

#[test]
#[serial]
fn environment_overrides_the_file() {
    let tmp = TempDir::new().unwrap();
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", tmp.path().to_string_lossy());
    std::fs::create_dir_all(tmp.path().join("campaign-insights")).unwrap();
    std::fs::write(
        tmp.path().join("campaign-insights/config.toml"),
        "database_path = \"/from/file.db\"\n",
    )
    .unwrap();
    let _db = EnvGuard::set(ENV_DB_PATH, "/from/env.db");
    let _out = EnvGuard::set(ENV_OUTPUT_DIR, "env_plots");

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.database_path, PathBuf::from("/from/env.db"));
    assert_eq!(cfg.output_dir, PathBuf::from("env_plots"));
}

#[test]
#[serial]
fn malformed_file_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", tmp.path().to_string_lossy());
    std::fs::create_dir_all(tmp.path().join("campaign-insights")).unwrap();
    std::fs::write(
        tmp.path().join("campaign-insights/config.toml"),
        "database_path = [1, 2",
    )
    .unwrap();
    let _clear = clear_overrides();

    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().starts_with("Failed to parse config file"), "{err}");
}
