//! Configuration loader
//!
//! Loads [`AppConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Environment variables, if `HEATMAPP_API_URL` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. JSON or TOML, picked by file extension
//!
//! ## Environment Variables
//! - `HEATMAPP_API_URL`: API base URL (required)
//! - `HEATMAPP_API_TIMEOUT_MS`: per-request timeout in milliseconds
//! - `HEATMAPP_LOG_LEVEL`: default tracing filter directive
//! - `HEATMAPP_LOG_FORMAT`: `compact`, `pretty` or `json`
//!
//! ## File Locations
//! `heatmapp.{json,toml}` then `config.{json,toml}`, looked up in the
//! working directory and up to two of its parents, then next to the
//! executable and up to two of its parents.

use std::path::{Path, PathBuf};

use heatmapp_domain::{ApiConfig, AppConfig, HeatmappError, LogFormat, LoggingConfig, Result};

pub const ENV_API_URL: &str = "HEATMAPP_API_URL";
pub const ENV_API_TIMEOUT_MS: &str = "HEATMAPP_API_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "HEATMAPP_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "HEATMAPP_LOG_FORMAT";

const CONFIG_FILE_NAMES: [&str; 4] = ["heatmapp.json", "heatmapp.toml", "config.json", "config.toml"];

/// Load configuration from the environment, falling back to a file
///
/// # Errors
/// Returns `HeatmappError::Config` if neither source yields a valid
/// configuration, or if the environment is present but invalid.
pub fn load() -> Result<AppConfig> {
    if std::env::var_os(ENV_API_URL).is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    tracing::debug!("{ENV_API_URL} not set, looking for a config file");
    load_from_file(None)
}

/// Load configuration from environment variables
///
/// Settings without a variable keep their defaults.
///
/// # Errors
/// Returns `HeatmappError::Config` if `HEATMAPP_API_URL` is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<AppConfig> {
    let base_url = env_var(ENV_API_URL)?;

    let mut api = ApiConfig::new(base_url);
    if let Some(timeout) = optional_env_var(ENV_API_TIMEOUT_MS) {
        api.timeout_ms = timeout.trim().parse::<u64>().map_err(|e| {
            HeatmappError::Config(format!("Invalid {ENV_API_TIMEOUT_MS} '{timeout}': {e}"))
        })?;
    }

    let mut logging = LoggingConfig::default();
    if let Some(level) = optional_env_var(ENV_LOG_LEVEL) {
        logging.level = level;
    }
    if let Some(format) = optional_env_var(ENV_LOG_FORMAT) {
        logging.format = format
            .parse::<LogFormat>()
            .map_err(|e| HeatmappError::Config(format!("Invalid {ENV_LOG_FORMAT}: {e}")))?;
    }

    Ok(AppConfig { api, logging, ..AppConfig::default() })
}

/// Load configuration from a file
///
/// With `None`, the first file found by [`probe_config_paths`] is used.
///
/// # Errors
/// Returns `HeatmappError::Config` if the file is missing, unreadable, or
/// cannot be parsed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HeatmappError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            HeatmappError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HeatmappError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HeatmappError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HeatmappError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(HeatmappError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations, if any
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots.iter().flat_map(|root| candidates_under(root)).find(|path| path.is_file())
}

fn candidates_under(root: &Path) -> Vec<PathBuf> {
    root.ancestors()
        .take(3)
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .collect()
}

fn env_var(key: &str) -> Result<String> {
    optional_env_var(key).ok_or_else(|| {
        HeatmappError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Set and non-blank
fn optional_env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
