//! Configuration structures
//!
//! Loaded by `dealflow-infra` from environment variables or a TOML/JSON file.
//! Every section has defaults so a file only needs the values it overrides.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COMPANY_ID, DEFAULT_LOG_LEVEL, DEFAULT_OFFER_VALIDITY_DAYS, DEFAULT_POOL_SIZE,
};
use crate::types::{CompanyProfile, UserRef};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub numbering: NumberingConfig,
    #[serde(default = "default_companies")]
    pub companies: Vec<CompanyConfig>,
    #[serde(default)]
    pub files: FileStorageConfig,
}

impl Config {
    /// Configuration with the given database path and defaults elsewhere.
    pub fn with_database_path(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                path: path.into(),
                pool_size: DEFAULT_POOL_SIZE,
                encryption_key: None,
            },
            logging: LoggingConfig::default(),
            numbering: NumberingConfig::default(),
            companies: default_companies(),
            files: FileStorageConfig::default(),
        }
    }

    /// Company profiles derived from the `companies` section.
    pub fn company_profiles(&self) -> Vec<CompanyProfile> {
        self.companies.iter().map(CompanyConfig::to_profile).collect()
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// SQLCipher key; plain SQLite when absent.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

/// Numbering and offer validity settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Company used when neither the request nor the customer names one.
    #[serde(default = "default_company")]
    pub default_company: String,
    /// Days from sent date to default expiration date.
    #[serde(default = "default_validity_days")]
    pub offer_validity_days: i64,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self { default_company: default_company(), offer_validity_days: default_validity_days() }
    }
}

/// One organisational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfig {
    pub id: String,
    pub prefix: String,
    #[serde(default)]
    pub default_responsible_id: Option<String>,
    #[serde(default)]
    pub default_responsible_name: Option<String>,
}

impl CompanyConfig {
    fn new(id: &str, prefix: &str) -> Self {
        Self {
            id: id.to_string(),
            prefix: prefix.to_string(),
            default_responsible_id: None,
            default_responsible_name: None,
        }
    }

    /// Profile handed to services through the company directory.
    pub fn to_profile(&self) -> CompanyProfile {
        CompanyProfile {
            id: self.id.clone(),
            prefix: self.prefix.to_uppercase(),
            default_responsible: self.default_responsible_id.as_ref().map(|id| UserRef {
                id: id.clone(),
                display_name: self.default_responsible_name.clone().unwrap_or_else(|| id.clone()),
            }),
        }
    }
}

/// Local file storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStorageConfig {
    pub root: String,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self { root: "files".to_string() }
    }
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_company() -> String {
    DEFAULT_COMPANY_ID.to_string()
}

const fn default_validity_days() -> i64 {
    DEFAULT_OFFER_VALIDITY_DAYS
}

/// The six built-in companies and their number prefixes.
pub fn default_companies() -> Vec<CompanyConfig> {
    vec![
        CompanyConfig::new("stalbygg", "ST"),
        CompanyConfig::new("hybridbygg", "HB"),
        CompanyConfig::new("industri", "IN"),
        CompanyConfig::new("tak", "TK"),
        CompanyConfig::new("montasje", "MO"),
        CompanyConfig::new("gruppen", "GR"),
    ]
}
