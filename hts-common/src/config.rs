//! Configuration loading and resolution
//!
//! Every setting resolves with ENV → TOML → compiled default priority.
//! The result is one immutable [`AppConfig`] built at startup and handed to
//! every component constructor; nothing below the binary reads the
//! environment on its own.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "HTS_CONFIG";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_ORACLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_DUTY_RATE_BASE_URL: &str = "https://www.api.simplyduty.com/api";
const DEFAULT_SUGGESTION_BASE_URL: &str = "https://api.tariffy.net/v1";

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub reports_dir: Option<PathBuf>,
    pub catalog: CatalogToml,
    pub oracle: OracleToml,
    pub duty_rates: DutyRateToml,
    pub suggestions: SuggestionToml,
    pub batch: BatchToml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogToml {
    pub rows_path: Option<PathBuf>,
    pub chapter_titles_path: Option<PathBuf>,
    pub chapter_listing_path: Option<PathBuf>,
    pub excluded_chapters: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleToml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chapter_model: Option<String>,
    pub short_code_model: Option<String>,
    pub full_code_model: Option<String>,
    pub final_model: Option<String>,
    pub extraction_model: Option<String>,
    pub max_attempts: Option<u32>,
    pub requests_per_second: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyRateToml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub destination_country: Option<String>,
    pub requests_per_second: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionToml {
    pub organization_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub region: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchToml {
    pub max_concurrent_items: Option<usize>,
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    /// Directory finished batch reports are written to
    pub reports_dir: PathBuf,
    pub catalog: CatalogConfig,
    pub oracle: OracleConfig,
    pub duty_rates: DutyRateConfig,
    pub suggestions: SuggestionConfig,
    pub batch: BatchConfig,
}

/// Catalog snapshot locations
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Raw catalog rows (JSON array)
    pub rows_path: PathBuf,
    /// Chapter code → title (JSON object)
    pub chapter_titles_path: PathBuf,
    /// Front-matter chapter listing shown to the chapter-select stage
    pub chapter_listing_path: Option<PathBuf>,
    /// Administrative chapters dropped before enrichment
    pub excluded_chapters: Vec<String>,
}

/// Language-model oracle settings
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: StageModels,
    /// Attempts per oracle call before the last error surfaces
    pub max_attempts: u32,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

/// Model used by each funnel stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageModels {
    pub chapter: String,
    pub short_code: String,
    pub full_code: String,
    pub final_select: String,
    pub extraction: String,
}

impl Default for StageModels {
    fn default() -> Self {
        Self {
            chapter: "gemini-2.0-flash".to_string(),
            short_code: "gemini-2.0-flash".to_string(),
            full_code: "gemini-2.0-flash-thinking-exp-01-21".to_string(),
            final_select: "gemini-2.5-flash-preview-04-17".to_string(),
            extraction: "gemini-2.0-flash".to_string(),
        }
    }
}

/// Remote duty-rate service settings
#[derive(Debug, Clone)]
pub struct DutyRateConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Destination country for every lookup (ISO alpha-2)
    pub destination_country: String,
    pub requests_per_second: u32,
}

/// Remote catalog-suggestion service settings
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    pub organization_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
    pub region: String,
    pub language: String,
}

/// Batch fan-out settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Cap on simultaneously in-flight descriptions
    pub max_concurrent_items: usize,
}

impl AppConfig {
    /// Resolve the configuration from the environment and a parsed TOML file
    pub fn resolve(toml_config: &TomlConfig) -> Result<Self> {
        let oracle_api_key = resolve_secret(
            "oracle API key",
            &["HTS_ORACLE_API_KEY", "GOOGLE_API_KEY"],
            toml_config.oracle.api_key.as_deref(),
        )
        .ok_or_else(|| {
            Error::Config(
                "Oracle API key not configured. Set one of:\n\
                 1. Environment: HTS_ORACLE_API_KEY=your-key (or GOOGLE_API_KEY)\n\
                 2. TOML config: [oracle] api_key = \"your-key\""
                    .to_string(),
            )
        })?;

        let duty_rate_api_key = resolve_secret(
            "duty-rate API key",
            &["HTS_DUTY_RATE_API_KEY", "SIMPLEDUTY_API_KEY"],
            toml_config.duty_rates.api_key.as_deref(),
        );
        if duty_rate_api_key.is_none() {
            warn!("Duty-rate API key not configured; every rate will resolve to the unavailable sentinel");
        }

        let suggestion_org = resolve_secret(
            "suggestion organization id",
            &["HTS_SUGGESTION_ORG_ID", "TARIFFY_ORG_ID"],
            toml_config.suggestions.organization_id.as_deref(),
        );
        let suggestion_key = resolve_secret(
            "suggestion API key",
            &["HTS_SUGGESTION_API_KEY", "TARIFFY_API_KEY"],
            toml_config.suggestions.api_key.as_deref(),
        );
        if suggestion_org.is_none() || suggestion_key.is_none() {
            warn!("Suggestion service credentials incomplete; suggested codes will be unavailable");
        }

        let port = match env_value(&["HTS_PORT", "PORT"]) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("Invalid port {:?}: {}", raw, e)))?,
            None => toml_config.port.unwrap_or(DEFAULT_PORT),
        };

        let max_concurrent_items = match env_value(&["HTS_MAX_CONCURRENT_ITEMS"]) {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                Error::Config(format!("Invalid HTS_MAX_CONCURRENT_ITEMS {:?}: {}", raw, e))
            })?,
            None => toml_config.batch.max_concurrent_items.unwrap_or(4),
        };
        if max_concurrent_items == 0 {
            return Err(Error::Config(
                "max_concurrent_items must be at least 1".to_string(),
            ));
        }

        let catalog = &toml_config.catalog;
        let data_dir = env_value(&["HTS_DATA_DIR"])
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("files"));

        let models = {
            let defaults = StageModels::default();
            let o = &toml_config.oracle;
            StageModels {
                chapter: o.chapter_model.clone().unwrap_or(defaults.chapter),
                short_code: o.short_code_model.clone().unwrap_or(defaults.short_code),
                full_code: o.full_code_model.clone().unwrap_or(defaults.full_code),
                final_select: o.final_model.clone().unwrap_or(defaults.final_select),
                extraction: o.extraction_model.clone().unwrap_or(defaults.extraction),
            }
        };

        let config = AppConfig {
            port,
            bind_address: toml_config
                .bind_address
                .clone()
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            reports_dir: env_value(&["HTS_REPORTS_DIR"])
                .map(PathBuf::from)
                .or_else(|| toml_config.reports_dir.clone())
                .unwrap_or_else(|| PathBuf::from("reports")),
            catalog: CatalogConfig {
                rows_path: catalog
                    .rows_path
                    .clone()
                    .unwrap_or_else(|| data_dir.join("htsdata.json")),
                chapter_titles_path: catalog
                    .chapter_titles_path
                    .clone()
                    .unwrap_or_else(|| data_dir.join("chapter_desc.json")),
                chapter_listing_path: catalog.chapter_listing_path.clone().or_else(|| {
                    let default = data_dir.join("chapter_headers_final.txt");
                    default.exists().then_some(default)
                }),
                excluded_chapters: catalog
                    .excluded_chapters
                    .clone()
                    .unwrap_or_else(|| vec!["98".to_string(), "99".to_string()]),
            },
            oracle: OracleConfig {
                api_key: oracle_api_key,
                base_url: toml_config
                    .oracle
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ORACLE_BASE_URL.to_string()),
                models,
                max_attempts: toml_config.oracle.max_attempts.unwrap_or(3).max(1),
                requests_per_second: toml_config.oracle.requests_per_second.unwrap_or(10).max(1),
                timeout_secs: toml_config.oracle.timeout_secs.unwrap_or(120),
            },
            duty_rates: DutyRateConfig {
                api_key: duty_rate_api_key,
                base_url: toml_config
                    .duty_rates
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DUTY_RATE_BASE_URL.to_string()),
                destination_country: toml_config
                    .duty_rates
                    .destination_country
                    .clone()
                    .unwrap_or_else(|| "US".to_string()),
                requests_per_second: toml_config.duty_rates.requests_per_second.unwrap_or(5).max(1),
            },
            suggestions: SuggestionConfig {
                organization_id: suggestion_org,
                api_key: suggestion_key,
                base_url: toml_config
                    .suggestions
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SUGGESTION_BASE_URL.to_string()),
                region: toml_config
                    .suggestions
                    .region
                    .clone()
                    .unwrap_or_else(|| "usa".to_string()),
                language: toml_config
                    .suggestions
                    .language
                    .clone()
                    .unwrap_or_else(|| "en".to_string()),
            },
            batch: BatchConfig { max_concurrent_items },
        };

        info!(
            port = config.port,
            rows = %config.catalog.rows_path.display(),
            max_concurrent_items = config.batch.max_concurrent_items,
            "Configuration resolved"
        );

        Ok(config)
    }
}

/// Load the TOML config file.
///
/// A missing file is not an error: a warning is logged and defaults apply.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded config file {}", path.display());
    Ok(config)
}

/// Config file path: explicit argument → `HTS_CONFIG` → platform config dir
pub fn config_file_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .map(|d| d.join("hts-classifier").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("hts-classifier.toml"))
}

/// Validate a secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve a secret from the environment, then TOML.
///
/// Warns when more than one source carries a value.
fn resolve_secret(label: &str, env_names: &[&str], toml_value: Option<&str>) -> Option<String> {
    let env_key = env_value(env_names);
    let toml_key = toml_value.filter(|k| is_valid_key(k)).map(str::to_string);

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} found in environment and TOML config. Using environment (highest priority).",
            label
        );
    }

    env_key.or(toml_key)
}

fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| is_valid_key(value))
}
