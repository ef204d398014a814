//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file if one is present (existing variables win)
//! 2. Attempts to load from environment variables
//! 3. If `DEALFLOW_DB_PATH` is missing, falls back to loading from file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `DEALFLOW_DB_PATH`: Database file path (required)
//! - `DEALFLOW_DB_POOL_SIZE`: Connection pool size
//! - `DEALFLOW_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `DEALFLOW_LOG_LEVEL`: Fallback tracing filter when `RUST_LOG` is unset
//! - `DEALFLOW_LOG_JSON`: Emit JSON log lines (true/false)
//! - `DEALFLOW_DEFAULT_COMPANY`: Company used when nothing else names one
//! - `DEALFLOW_OFFER_VALIDITY_DAYS`: Days from sent date to expiration
//! - `DEALFLOW_FILES_ROOT`: Root directory for attachments
//!
//! Companies are not configurable through the environment; the built-in
//! set is used unless a config file lists them.
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `dealflow.{json,toml}` in the
//! current directory, its parent and grandparent, then the same names next
//! to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use dealflow_domain::{Config, DealflowError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "dealflow.json", "dealflow.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// database path is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `DealflowError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value cannot be parsed
pub fn load() -> Result<Config> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!(error = %err, "Ignoring unreadable .env file");
        }
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `DEALFLOW_DB_PATH` is required; everything else falls back to the
/// defaults of [`Config::with_database_path`].
///
/// # Errors
/// Returns `DealflowError::Config` if the database path is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::with_database_path(env_var("DEALFLOW_DB_PATH")?);

    if let Some(pool_size) = env_parse::<u32>("DEALFLOW_DB_POOL_SIZE", "pool size")? {
        config.database.pool_size = pool_size;
    }
    config.database.encryption_key = std::env::var("DEALFLOW_DB_ENCRYPTION_KEY").ok();

    if let Ok(level) = std::env::var("DEALFLOW_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("DEALFLOW_LOG_JSON", false);

    if let Ok(company) = std::env::var("DEALFLOW_DEFAULT_COMPANY") {
        config.numbering.default_company = company;
    }
    if let Some(days) = env_parse::<i64>("DEALFLOW_OFFER_VALIDITY_DAYS", "offer validity days")? {
        config.numbering.offer_validity_days = days;
    }
    if let Ok(root) = std::env::var("DEALFLOW_FILES_ROOT") {
        config.files.root = root;
    }

    validate(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `DealflowError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DealflowError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DealflowError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DealflowError::Config(format!("Failed to read config file: {e}")))?;

    validate(parse_config(&contents, &config_path)?)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `DealflowError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DealflowError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DealflowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DealflowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// The default company must be one of the configured companies.
fn validate(config: Config) -> Result<Config> {
    let default_company = &config.numbering.default_company;
    if !config.companies.iter().any(|company| &company.id == default_company) {
        return Err(DealflowError::Config(format!(
            "default company '{default_company}' is not configured"
        )));
    }
    if config.numbering.offer_validity_days <= 0 {
        return Err(DealflowError::Config("offer validity days must be positive".into()));
    }
    Ok(config)
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut bases = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        bases.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    bases
        .iter()
        .flat_map(|base| CONFIG_FILE_NAMES.iter().map(move |name| base.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `DealflowError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        DealflowError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable.
fn env_parse<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| DealflowError::Config(format!("Invalid {what}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
