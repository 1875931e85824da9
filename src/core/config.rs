//! Configuration management for tickwise.
//!
//! This module provides application configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults
//!
//! The retention rules themselves live in a separate `graphite_rollup`
//! XML document referenced from here (see [`crate::rollup`]).

use crate::core::{Result, TickwiseError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for tickwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retention rules configuration
    pub rollup: RollupConfig,
    /// Reply rendering configuration
    pub render: RenderConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Retention rules configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    /// Path of the `graphite_rollup` XML document
    pub rules: PathBuf,
    /// Quiet period before a modified rules file is reloaded
    #[serde(with = "humantime_serde")]
    pub reload_debounce: Duration,
}

/// Reply rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Capacity of the buffered reply sink in bytes
    pub buffer_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rollup: RollupConfig::default(),
            render: RenderConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for RollupConfig {
    fn default() -> Self {
        RollupConfig {
            rules: PathBuf::from("/etc/tickwise/rollup.xml"),
            reload_debounce: Duration::from_secs(1),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            buffer_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rollup.rules.as_os_str().is_empty() {
            return Err(TickwiseError::config("rollup.rules must not be empty"));
        }

        if self.render.buffer_size == 0 {
            return Err(TickwiseError::config("render.buffer_size must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| TickwiseError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the rules file
    pub fn rules_path(mut self, path: PathBuf) -> Self {
        self.config.rollup.rules = path;
        self
    }

    /// Set the reply buffer size
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.render.buffer_size = bytes;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
