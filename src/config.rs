//! Configuration parsing and management

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Environment variable holding the comma-delimited whitelist.
pub const WHITELIST_ENV: &str = "WHITELIST";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Whitelisted `host:port` entries, matched verbatim
    #[serde(default)]
    pub whitelist: Vec<String>,
}

/// Proxy-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Address to bind the proxy server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional JSONL audit log of every decision
    #[serde(default)]
    pub audit_log: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            audit_log: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Split a comma-delimited whitelist exactly as given.
///
/// No trimming and no dropping of empty segments: `"a:80,,b:80"` yields three
/// entries, the middle one empty.
pub fn parse_whitelist(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid TOML: {}", e)))
    }

    /// Create a configuration with just a bind address and whitelist
    pub fn minimal(bind_address: String, whitelist: Vec<String>) -> Self {
        Self {
            proxy: ProxyConfig { bind_address },
            logging: LoggingConfig::default(),
            whitelist,
        }
    }

    /// Replace the whitelist with a raw comma-delimited value (CLI flag or
    /// environment). An empty value is treated as unset and leaves the
    /// current list alone.
    pub fn apply_whitelist_override(&mut self, raw: Option<&str>) {
        if let Some(raw) = raw.filter(|r| !r.is_empty()) {
            self.whitelist = parse_whitelist(raw);
        }
    }

    /// The configured whitelist, or an error if none was given.
    pub fn whitelist_entries(&self) -> Result<&[String]> {
        if self.whitelist.is_empty() {
            return Err(Error::config(format!("{} not set", WHITELIST_ENV)));
        }
        Ok(&self.whitelist)
    }
}
