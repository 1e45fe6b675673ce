//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Focus polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Poll interval for the focused application in milliseconds.
    #[serde(default = "default_focus_poll_ms")]
    pub poll_interval_ms: u64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_focus_poll_ms(),
        }
    }
}

impl FocusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Idle detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    /// When false, time is counted whenever an application has focus.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Input idle threshold in seconds.
    #[serde(default = "default_idle_threshold")]
    pub threshold_seconds: u64,
    /// Check interval in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_seconds: default_idle_threshold(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

impl IdleConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_seconds)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Usage menu configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Applications with less than this many minutes are not listed.
    #[serde(default = "default_min_minutes")]
    pub min_minutes: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            min_minutes: default_min_minutes(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Data directory for the event journal.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Append focus/idle events to a daily JSONL journal.
    #[serde(default)]
    pub journal: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            level: default_log_level(),
            format: LogFormat::default(),
            journal: false,
        }
    }
}

impl LoggingConfig {
    /// Returns the journal directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

// Default value functions
fn default_focus_poll_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_idle_threshold() -> u64 {
    300
}

fn default_check_interval_ms() -> u64 {
    1000
}

fn default_min_minutes() -> f64 {
    1.0
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dwell"))
        .unwrap_or_else(|| PathBuf::from(".dwell"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                Some(PathBuf::from("config/default.toml")),
                dirs::config_dir().map(|d| d.join("dwell/config.toml")),
            ];

            let mut loaded = None;
            for path in default_paths.iter().flatten() {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        // Expand home directory in data_dir
        config.logging.data_dir = expand_tilde(&config.logging.data_dir);

        Ok(config)
    }

    /// Apply `DWELL_*` overrides looked up through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DWELL_FOCUS_POLL_MS").and_then(|v| v.parse().ok()) {
            self.focus.poll_interval_ms = v;
        }
        if let Some(v) = lookup("DWELL_IDLE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.idle.enabled = v;
        }
        if let Some(v) = lookup("DWELL_IDLE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.idle.threshold_seconds = v;
        }
        if let Some(v) = lookup("DWELL_MIN_MINUTES").and_then(|v| v.parse().ok()) {
            self.display.min_minutes = v;
        }
        if let Some(v) = lookup("DWELL_DATA_DIR") {
            self.logging.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DWELL_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("DWELL_JOURNAL").and_then(|v| parse_bool(&v)) {
            self.logging.journal = v;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.focus.poll_interval_ms == 0 {
            anyhow::bail!("Focus poll interval must be greater than 0");
        }
        if self.idle.threshold_seconds == 0 {
            anyhow::bail!("Idle threshold must be greater than 0");
        }
        if self.idle.check_interval_ms == 0 {
            anyhow::bail!("Idle check interval must be greater than 0");
        }
        if !self.display.min_minutes.is_finite() || self.display.min_minutes < 0.0 {
            anyhow::bail!("Minimum displayed minutes must be a non-negative number");
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
