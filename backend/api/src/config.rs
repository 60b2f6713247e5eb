//! Service configuration, read from the environment with defaults.

use crate::errors::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Lifetime of issued bearer tokens, in seconds
    pub token_ttl_secs: i64,
    /// Mark new campaigns as verified on creation
    pub auto_verify_campaigns: bool,
    /// Seconds between sweeps of expired bearer tokens
    pub token_purge_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./edurelief.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid API_PORT".to_string()))?,
            token_ttl_secs: env_var("TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .ok()
                .filter(|ttl: &i64| *ttl > 0)
                .ok_or_else(|| ApiError::Config("Invalid TOKEN_TTL_SECS".to_string()))?,
            auto_verify_campaigns: parse_flag(
                &env_var("AUTO_VERIFY_CAMPAIGNS").unwrap_or_else(|_| "true".to_string()),
            )
            .ok_or_else(|| ApiError::Config("Invalid AUTO_VERIFY_CAMPAIGNS".to_string()))?,
            token_purge_interval_secs: env_var("TOKEN_PURGE_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid TOKEN_PURGE_INTERVAL_SECS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ApiError::Config(format!("Missing env var: {key}")))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
