//! Configuration resolution tests
//!
//! Covers ENV → TOML → default priority and graceful handling of a missing
//! config file.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Every test that touches HTS_* or the legacy deployment variables is
//! marked #[serial].

use hts_common::config::{
    config_file_path, load_toml_config, AppConfig, StageModels, TomlConfig, CONFIG_PATH_ENV,
};
use hts_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MANAGED_VARS: &[&str] = &[
    "HTS_ORACLE_API_KEY",
    "GOOGLE_API_KEY",
    "HTS_DUTY_RATE_API_KEY",
    "SIMPLEDUTY_API_KEY",
    "HTS_SUGGESTION_ORG_ID",
    "TARIFFY_ORG_ID",
    "HTS_SUGGESTION_API_KEY",
    "TARIFFY_API_KEY",
    "HTS_PORT",
    "PORT",
    "HTS_MAX_CONCURRENT_ITEMS",
    "HTS_DATA_DIR",
    "HTS_REPORTS_DIR",
    CONFIG_PATH_ENV,
];

fn clear_env() {
    for name in MANAGED_VARS {
        env::remove_var(name);
    }
}

fn toml_with_oracle_key() -> TomlConfig {
    toml::from_str(
        r#"
        [oracle]
        api_key = "toml-oracle-key"
        "#,
    )
    .unwrap()
}

#[test]
#[serial]
fn test_missing_oracle_key_is_config_error() {
    clear_env();

    let result = AppConfig::resolve(&TomlConfig::default());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_defaults_applied_with_only_oracle_key() {
    clear_env();

    let config = AppConfig::resolve(&toml_with_oracle_key()).unwrap();

    assert_eq!(config.oracle.api_key, "toml-oracle-key");
    assert_eq!(config.port, 8080);
    assert_eq!(config.oracle.max_attempts, 3);
    assert_eq!(config.oracle.models, StageModels::default());
    assert_eq!(config.batch.max_concurrent_items, 4);
    assert_eq!(config.duty_rates.destination_country, "US");
    assert_eq!(config.catalog.rows_path, PathBuf::from("files/htsdata.json"));
    assert_eq!(config.catalog.excluded_chapters, vec!["98", "99"]);
    assert!(config.duty_rates.api_key.is_none());
    assert!(config.suggestions.api_key.is_none());
}

#[test]
#[serial]
fn test_environment_overrides_toml() {
    clear_env();
    env::set_var("HTS_ORACLE_API_KEY", "env-oracle-key");
    env::set_var("PORT", "9090");
    env::set_var("SIMPLEDUTY_API_KEY", "legacy-duty-key");
    env::set_var("HTS_MAX_CONCURRENT_ITEMS", "2");

    let config = AppConfig::resolve(&toml_with_oracle_key()).unwrap();

    assert_eq!(config.oracle.api_key, "env-oracle-key");
    assert_eq!(config.port, 9090);
    assert_eq!(config.duty_rates.api_key.as_deref(), Some("legacy-duty-key"));
    assert_eq!(config.batch.max_concurrent_items, 2);

    clear_env();
}

#[test]
#[serial]
fn test_whitespace_env_value_is_ignored() {
    clear_env();
    env::set_var("HTS_ORACLE_API_KEY", "   ");

    let config = AppConfig::resolve(&toml_with_oracle_key()).unwrap();
    assert_eq!(config.oracle.api_key, "toml-oracle-key");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_port_rejected() {
    clear_env();
    env::set_var("HTS_PORT", "not-a-port");

    let result = AppConfig::resolve(&toml_with_oracle_key());
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn test_zero_concurrency_rejected() {
    clear_env();

    let mut toml_config = toml_with_oracle_key();
    toml_config.batch.max_concurrent_items = Some(0);

    assert!(matches!(
        AppConfig::resolve(&toml_config),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert!(config.port.is_none());
    assert!(config.oracle.api_key.is_none());
}

#[test]
fn test_invalid_config_file_is_toml_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"eighty\"").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_config_file_path_priority() {
    clear_env();

    let explicit = Path::new("/tmp/explicit.toml");
    assert_eq!(config_file_path(Some(explicit)), explicit);

    env::set_var(CONFIG_PATH_ENV, "/tmp/from-env.toml");
    assert_eq!(config_file_path(None), PathBuf::from("/tmp/from-env.toml"));

    clear_env();
    assert!(config_file_path(None).ends_with("config.toml") || config_file_path(None).ends_with("hts-classifier.toml"));
}
