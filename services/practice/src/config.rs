//! Application Configuration Module
//!
//! Loads the gateway location, the bearer credential and the log level from
//! environment variables (optionally seeded from a `.env` file) into a single
//! struct handed to `main`.

use interview_core::gateway::DEFAULT_BASE_URL;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// Question generation and answer processing can take a while on a cold backend.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub token: SecretString,
    pub http_timeout: Duration,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid number provided for {var}: {value}")]
    InvalidNumber { var: String, value: String },
    #[error("Could not read env file: {0}")]
    EnvFile(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `INTERVIEW_TOKEN`: Bearer credential for the API gateway. Required.
    // *   `INTERVIEW_API_BASE_URL`: (Optional) Gateway base URL. Defaults to the hosted gateway.
    // *   `INTERVIEW_HTTP_TIMEOUT_SECS`: (Optional) Per-request timeout. Defaults to 60.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`Config::from_env`], but values in `path` take precedence over the
    /// process environment.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let mut file_vars = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(|e| ConfigError::EnvFile(e.to_string()))? {
            let (key, value) = item.map_err(|e| ConfigError::EnvFile(e.to_string()))?;
            file_vars.insert(key, value);
        }
        Self::from_lookup(|key| file_vars.get(key).cloned().or_else(|| env::var(key).ok()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("INTERVIEW_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("INTERVIEW_TOKEN".to_string()))?;

        let api_base_url =
            lookup("INTERVIEW_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http_timeout = match lookup("INTERVIEW_HTTP_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber {
                        var: "INTERVIEW_HTTP_TIMEOUT_SECS".to_string(),
                        value: value.clone(),
                    })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_base_url,
            token: SecretString::from(token),
            http_timeout,
            log_level,
        })
    }
}
