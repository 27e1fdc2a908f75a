//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and scanning behavior settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Settings applied to newly tracked pages
    #[serde(default)]
    pub defaults: PageDefaults,

    /// Background autoscan settings
    #[serde(default)]
    pub autoscan: AutoscanConfig,

    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.user_agent.trim().is_empty() {
            return Err(AppError::validation("scanner.user_agent is empty"));
        }
        if self.scanner.timeout_secs == 0 {
            return Err(AppError::validation("scanner.timeout_secs must be > 0"));
        }
        if self.autoscan.poll_interval_secs == 0 {
            return Err(AppError::validation(
                "autoscan.poll_interval_secs must be > 0",
            ));
        }
        if self.defaults.encoding.trim().is_empty() {
            return Err(AppError::validation(
                "defaults.encoding is empty (use \"auto\")",
            ));
        }
        match self.storage.backend {
            StorageBackend::Local => {}
            StorageBackend::S3 if cfg!(feature = "s3") => {}
            StorageBackend::S3 => {
                return Err(AppError::validation(
                    "storage.backend = \"s3\" requires the s3 feature",
                ));
            }
        }
        Ok(())
    }
}

/// HTTP client and scanning behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause between two pages of one batch in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Compare visible text only (scripts, styles and tags removed)
    #[serde(default = "defaults::enabled")]
    pub compare_text_only: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: 0,
            compare_text_only: true,
        }
    }
}

/// Settings copied into every newly tracked page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDefaults {
    #[serde(default = "defaults::change_threshold")]
    pub change_threshold: u32,

    #[serde(default = "defaults::scan_rate_minutes")]
    pub scan_rate_minutes: u32,

    #[serde(default = "defaults::enabled")]
    pub ignore_numbers: bool,

    #[serde(default = "defaults::encoding")]
    pub encoding: String,

    #[serde(default = "defaults::enabled")]
    pub highlight_changes: bool,

    #[serde(default = "defaults::highlight_colour")]
    pub highlight_colour: String,

    #[serde(default = "defaults::enabled")]
    pub mark_changes: bool,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            change_threshold: defaults::change_threshold(),
            scan_rate_minutes: defaults::scan_rate_minutes(),
            ignore_numbers: true,
            encoding: defaults::encoding(),
            highlight_changes: true,
            highlight_colour: defaults::highlight_colour(),
            mark_changes: true,
        }
    }
}

/// Background autoscan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscanConfig {
    /// How often `watch` looks for due pages
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for AutoscanConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::poll_interval(),
        }
    }
}

/// Which key-value store backs pages and snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Scanner defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; UpdateScanner/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn enabled() -> bool {
        true
    }

    // Page defaults
    pub fn change_threshold() -> u32 {
        100
    }
    pub fn scan_rate_minutes() -> u32 {
        60 * 24
    }
    pub fn encoding() -> String {
        "auto".into()
    }
    pub fn highlight_colour() -> String {
        "#ffff66".into()
    }

    pub fn poll_interval() -> u64 {
        60
    }
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.scanner.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.scanner.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_field_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scanner]
            request_delay_ms = 250

            [defaults]
            change_threshold = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.request_delay_ms, 250);
        assert_eq!(config.scanner.timeout_secs, 30);
        assert!(config.scanner.compare_text_only);
        assert_eq!(config.defaults.change_threshold, 5);
        assert_eq!(config.defaults.scan_rate_minutes, 1440);
        assert!(config.defaults.ignore_numbers);
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.toml");

        let mut config = Config::default();
        config.autoscan.poll_interval_secs = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.autoscan.poll_interval_secs, 5);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
