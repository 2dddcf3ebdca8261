//! Store configuration loaded from `<store>/solvestat.toml`.
//!
//! The file is optional. A missing file yields [`Config::default`]; a file
//! that does not parse is a validation error.

use crate::core::error::SolvestatError;
use crate::plugins::content::ContentKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "solvestat.toml";

/// Environment variable overriding `[log].level`.
pub const LOG_ENV: &str = "SOLVESTAT_LOG";

/// Statistics rows older than this are stale.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 86_400;

/// Rows kept for the top reacted posts page; also the largest accepted `count`.
pub const DEFAULT_REACTED_PAGE: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub content: ContentKind,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: i64,
    pub reacted_page: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            reacted_page: DEFAULT_REACTED_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), SolvestatError> {
        if self.cache.ttl_secs <= 0 {
            return Err(SolvestatError::ValidationError(format!(
                "cache.ttl_secs must be positive, got {}",
                self.cache.ttl_secs
            )));
        }
        if self.cache.reacted_page == 0 {
            return Err(SolvestatError::ValidationError(
                "cache.reacted_page must be at least 1".to_string(),
            ));
        }
        if self.content.item_class.trim().is_empty() || self.content.comment_class.trim().is_empty()
        {
            return Err(SolvestatError::ValidationError(
                "content.item_class and content.comment_class must be set".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config, SolvestatError> {
    let config: Config =
        toml::from_str(content).map_err(|e| SolvestatError::ValidationError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load `solvestat.toml` from the store root. No file means defaults.
pub fn load_config(root: &Path) -> Result<Config, SolvestatError> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&config_path).map_err(SolvestatError::IoError)?;
    parse_config(&content)
}
