use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::client::{BreakerSettings, RetryPolicy};
use crate::services::ProcessorSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub gateway_a_url: String,
    pub gateway_b_url: String,
    pub dispatch_timeout_secs: u64,
    pub max_concurrent_dispatches: usize,
    pub cb_failure_threshold: u32,
    pub cb_open_timeout_secs: u64,
    pub cb_reset_interval_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_interval_ms: u64,
    pub http_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            gateway_a_url: gateway_url(&lookup, "GATEWAY_A_URL")?,
            gateway_b_url: gateway_url(&lookup, "GATEWAY_B_URL")?,
            dispatch_timeout_secs: parse_or(&lookup, "DISPATCH_TIMEOUT_SECS", 30)?,
            max_concurrent_dispatches: parse_or(&lookup, "MAX_CONCURRENT_DISPATCHES", 64)?,
            cb_failure_threshold: parse_or(&lookup, "CB_FAILURE_THRESHOLD", 3)?,
            cb_open_timeout_secs: parse_or(&lookup, "CB_OPEN_TIMEOUT_SECS", 5)?,
            cb_reset_interval_secs: parse_or(&lookup, "CB_RESET_INTERVAL_SECS", 60)?,
            retry_max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 5)?,
            retry_initial_interval_ms: parse_or(&lookup, "RETRY_INITIAL_INTERVAL_MS", 500)?,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", 10)?,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        };

        if config.cb_failure_threshold == 0 {
            anyhow::bail!("CB_FAILURE_THRESHOLD must be at least 1");
        }
        if config.retry_max_attempts == 0 {
            anyhow::bail!("RETRY_MAX_ATTEMPTS must be at least 1");
        }
        if config.max_concurrent_dispatches == 0 {
            anyhow::bail!("MAX_CONCURRENT_DISPATCHES must be at least 1");
        }

        Ok(config)
    }

    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.cb_failure_threshold,
            open_timeout: Duration::from_secs(self.cb_open_timeout_secs),
            reset_interval: Duration::from_secs(self.cb_reset_interval_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            initial_interval: Duration::from_millis(self.retry_initial_interval_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            dispatch_timeout: Duration::from_secs(self.dispatch_timeout_secs),
            max_concurrent_dispatches: self.max_concurrent_dispatches,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        None => Ok(default),
    }
}

fn gateway_url<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).with_context(|| format!("{} must be set", key))?;
    let url = Url::parse(raw.trim()).with_context(|| format!("{} is not a valid URL", key))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{} must use http or https", key);
    }

    Ok(raw.trim().trim_end_matches('/').to_string())
}
