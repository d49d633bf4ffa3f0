//! Configuration for sandbox sessions
//!
//! Defaults are usable as-is; a TOML file and `CONSOLEBOX_*` environment
//! variables can override them. Durations are plain millisecond counts.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Environment variable error: {message}")]
    EnvError { message: String },

    #[error("IO error reading config file: {message}")]
    IoError { message: String },

    #[error("Configuration parsing error: {message}")]
    ParseError { message: String },
}

/// Session and isolation domain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock budget for one execution
    pub time_budget_ms: u64,
    /// How often the supervisor checks a running invocation
    pub poll_interval_ms: u64,
    /// Where staged artifacts are written
    pub work_dir: PathBuf,
    /// Report warnings with error severity
    pub warnings_as_errors: bool,
    /// Deepest user call chain before the interpreter gives up
    pub max_call_depth: usize,
    /// Extra read-only paths granted to isolation domains
    pub dependency_paths: Vec<PathBuf>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            time_budget_ms: 10_000,
            poll_interval_ms: 100,
            work_dir: env::temp_dir().join("consolebox").join("TempCompilation"),
            warnings_as_errors: false,
            max_call_depth: 256,
            dependency_paths: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl SandboxConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// File (if any), then environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CONSOLEBOX_*` overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_var("CONSOLEBOX_TIME_BUDGET_MS")? {
            self.time_budget_ms = parse_var("CONSOLEBOX_TIME_BUDGET_MS", &value)?;
        }

        if let Some(value) = read_var("CONSOLEBOX_POLL_INTERVAL_MS")? {
            self.poll_interval_ms = parse_var("CONSOLEBOX_POLL_INTERVAL_MS", &value)?;
        }

        if let Some(value) = read_var("CONSOLEBOX_WORK_DIR")? {
            self.work_dir = PathBuf::from(value);
        }

        if let Some(value) = read_var("CONSOLEBOX_WARNINGS_AS_ERRORS")? {
            self.warnings_as_errors = parse_var("CONSOLEBOX_WARNINGS_AS_ERRORS", &value)?;
        }

        if let Some(value) = read_var("CONSOLEBOX_MAX_CALL_DEPTH")? {
            self.max_call_depth = parse_var("CONSOLEBOX_MAX_CALL_DEPTH", &value)?;
        }

        if let Some(value) = read_var("LOG_LEVEL")? {
            self.logging.level = value;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_budget_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "time_budget_ms".to_string(),
                reason: "Time budget must be > 0".to_string(),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_ms".to_string(),
                reason: "Poll interval must be > 0".to_string(),
            });
        }

        if self.work_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "work_dir".to_string(),
            });
        }

        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_call_depth".to_string(),
                reason: "Call depth must be > 0".to_string(),
            });
        }

        for path in &self.dependency_paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "dependency_paths".to_string(),
                    reason: "dependency_paths cannot contain empty paths".to_string(),
                });
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                reason: format!("Must be one of: {}", valid_levels.join(", ")),
            });
        }

        Ok(())
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn read_var(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::EnvError {
            message: format!("{} is not valid unicode", key),
        }),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("Cannot parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.time_budget_ms, 10_000);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(config.work_dir.ends_with("TempCompilation"));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("CONSOLEBOX_TIME_BUDGET_MS", "2500");
        env::set_var("CONSOLEBOX_WARNINGS_AS_ERRORS", "true");
        env::set_var("LOG_LEVEL", "debug");

        let config = SandboxConfig::from_env().unwrap();
        assert_eq!(config.time_budget_ms, 2500);
        assert!(config.warnings_as_errors);
        assert_eq!(config.logging.level, "debug");

        env::remove_var("CONSOLEBOX_TIME_BUDGET_MS");
        env::remove_var("CONSOLEBOX_WARNINGS_AS_ERRORS");
        env::remove_var("LOG_LEVEL");
    }

    #[test]
    #[serial]
    fn test_invalid_env_value() {
        env::set_var("CONSOLEBOX_POLL_INTERVAL_MS", "soon");
        let result = SandboxConfig::from_env();
        env::remove_var("CONSOLEBOX_POLL_INTERVAL_MS");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = SandboxConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = SandboxConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time_budget_ms = 750\n\n[logging]\nformat = \"json\"").unwrap();

        let config = SandboxConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.time_budget_ms, 750);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time_budget_ms = \"ten\"").unwrap();
        assert!(matches!(
            SandboxConfig::from_file(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
