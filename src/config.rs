// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the credibility gate.
//!
//! Every field has a serde default so a partial config deserializes
//! cleanly. [`Config::from_env`] fills the struct from process
//! environment variables (and a `.env` file, when one exists).

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Paths the router always serves.
pub const RESERVED_PATHS: &[&str] = &["/", "/health", "/v1/analyze"];

/// Configuration for the credibility gate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Credential configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Shared-secret credential configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected credential. `None` means the server is misconfigured.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Header carrying the client credential (default: x-api-key)
    #[serde(default = "default_header_name")]
    pub header_name: String,
}

// Keeps the secret out of logs and panic messages.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("header_name", &self.header_name)
            .finish()
    }
}

/// Per-tier fixed-window limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Standard tier requests per window per client (default: 30)
    #[serde(default = "default_standard_per_window")]
    pub standard_per_window: u32,

    /// Pro tier requests per window per client (default: 5)
    #[serde(default = "default_pro_per_window")]
    pub pro_per_window: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Interval between purges of expired windows in seconds (default: 60)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Key clients by the first X-Forwarded-For hop instead of the peer
    /// address (default: false)
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_header_name() -> String {
    "x-api-key".to_string()
}

fn default_standard_per_window() -> u32 {
    30
}

fn default_pro_per_window() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            header_name: default_header_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            standard_per_window: default_standard_per_window(),
            pro_per_window: default_pro_per_window(),
            window_secs: default_window_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            trust_forwarded_for: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl AuthConfig {
    /// Parsed credential header name.
    pub fn header(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|e| {
            ConfigError::InvalidValue {
                var: "API_KEY_HEADER",
                value: self.header_name.clone(),
                reason: e.to_string(),
            }
        })
    }
}

impl MetricsConfig {
    /// The endpoint path must be absolute and must not shadow a built-in route.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = if !self.path.starts_with('/') {
            "path must start with '/'"
        } else if RESERVED_PATHS.contains(&self.path.as_str()) {
            "path is already served by another route"
        } else {
            return Ok(());
        };
        Err(ConfigError::InvalidValue {
            var: "METRICS_PATH",
            value: self.path.clone(),
            reason: reason.to_string(),
        })
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the cleanup interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Config {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check values that parse but cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.header()?;
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "RATE_LIMIT_WINDOW_SECS",
                value: "0".to_string(),
                reason: "window must be at least one second".to_string(),
            });
        }
        if self.metrics.enabled {
            self.metrics.validate()?;
        }
        Ok(())
    }

    /// Load configuration from environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are
    /// rejected, as is anything [`Config::validate`] refuses. An empty
    /// `API_KEY` counts as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("HOST").filter(|v| !v.trim().is_empty()) {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }

        config.auth.api_key = lookup("API_KEY").filter(|k| !k.is_empty());
        if let Some(header) = lookup("API_KEY_HEADER").filter(|v| !v.trim().is_empty()) {
            config.auth.header_name = header.trim().to_ascii_lowercase();
        }

        let rl = &mut config.rate_limit;
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_STANDARD")? {
            rl.standard_per_window = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_PRO")? {
            rl.pro_per_window = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_WINDOW_SECS")? {
            rl.window_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_CLEANUP_SECS")? {
            rl.cleanup_interval_secs = v;
        }
        if let Some(v) = parse_bool_var(&lookup, "TRUST_FORWARDED_FOR")? {
            rl.trust_forwarded_for = v;
        }
        if let Some(v) = parse_bool_var(&lookup, "METRICS_ENABLED")? {
            config.metrics.enabled = v;
        }
        if let Some(path) = lookup("METRICS_PATH") {
            config.metrics.path = path.trim().to_string();
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn parse_bool_var<F>(lookup: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                var,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}
