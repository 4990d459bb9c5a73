//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default location of the local message database.
pub const DEFAULT_DB_PATH: &str = "./data/mail-rules.db";

/// Default location of the rule document.
pub const DEFAULT_RULES_PATH: &str = "./rules.json";

/// Runtime configuration, built from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Path of the JSON rule document.
    pub rules_path: PathBuf,
    /// Messages dispatched concurrently during a run.
    pub max_concurrent_messages: usize,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for the rolling log file. No file logging when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            max_concurrent_messages: 1,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("MAIL_RULES_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let rules_path = lookup("MAIL_RULES_RULES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.rules_path);

        let max_concurrent_messages = match lookup("MAIL_RULES_MAX_CONCURRENT") {
            Some(raw) => parse_concurrency(&raw)?,
            None => defaults.max_concurrent_messages,
        };

        let log_level = lookup("MAIL_RULES_LOG_LEVEL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.log_level);

        let log_dir = lookup("MAIL_RULES_LOG_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            db_path,
            rules_path,
            max_concurrent_messages,
            log_level,
            log_dir,
        })
    }
}

fn parse_concurrency(raw: &str) -> Result<usize, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "MAIL_RULES_MAX_CONCURRENT".to_string(),
        message,
    };
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|e| invalid(format!("'{raw}' is not a number: {e}")))?;
    if value == 0 {
        return Err(invalid("must be at least 1".to_string()));
    }
    Ok(value)
}
