//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;
use vector_core::plan_request::{
    VolumePolicy, DEFAULT_EXERCISES_PER_SUB_REGION, DEFAULT_MODEL, DEFAULT_WORK_SECONDS_PER_SET,
};
use vector_core::RetryPolicy;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub allowed_origin: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub generation_model: String,
    pub retry_policy: RetryPolicy,
    pub volume_policy: VolumePolicy,
    pub provider_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = var_or("ALLOWED_ORIGIN", "http://localhost:3000");

        // --- Generation Provider ---
        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        let gemini_base_url = var_or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com");
        let generation_model = var_or("GENERATION_MODEL", DEFAULT_MODEL);

        let max_attempts = parse_count(&lookup, "GENERATION_MAX_ATTEMPTS", 3)?;
        let base_delay_ms = parse_number(&lookup, "GENERATION_BASE_DELAY_MS", 2000)?;
        let retry_policy = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        };

        let work_seconds_per_set =
            parse_count(&lookup, "WORK_SECONDS_PER_SET", DEFAULT_WORK_SECONDS_PER_SET)?;
        let volume_policy = match var_or("VOLUME_POLICY", "time_budget").to_lowercase().as_str() {
            "time_budget" => VolumePolicy::TimeBudget {
                work_seconds_per_set,
            },
            "per_sub_region" => VolumePolicy::PerSubRegion {
                exercises_per_sub_region: DEFAULT_EXERCISES_PER_SUB_REGION,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "VOLUME_POLICY".to_string(),
                    format!("'{}' is not one of time_budget, per_sub_region", other),
                ))
            }
        };

        let provider_timeout =
            Duration::from_secs(parse_number(&lookup, "PROVIDER_TIMEOUT_SECS", 60)?);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            gemini_api_key,
            gemini_base_url,
            generation_model,
            retry_policy,
            volume_policy,
            provider_timeout,
        })
    }
}

fn parse_number<F>(lookup: &F, name: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a number", raw))
        }),
    }
}

/// A positive count that fits in a `u32`.
fn parse_count<F>(lookup: &F, name: &str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_number(lookup, name, u64::from(default))?;
    let count = u32::try_from(value).map_err(|_| {
        ConfigError::InvalidValue(name.to_string(), format!("{} is too large", value))
    })?;
    if count == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(count)
}
