//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hubcore.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use hubcore_domain::startlevel::STARTLEVEL_COMPLETE;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Start-level sequence settings.
    pub startup: StartupConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Start-level sequence configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Level the daemon climbs to once wired.
    pub target_startlevel: u32,
    /// Pause between two announced levels, in milliseconds.
    pub step_delay_ms: u64,
}

impl Config {
    /// Load configuration from `hubcore.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hubcore.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HUBCORE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("HUBCORE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("HUBCORE_TARGET_STARTLEVEL") {
            match val.parse() {
                Ok(level) => self.startup.target_startlevel = level,
                Err(_) => {
                    tracing::warn!(value = %val, "ignoring non-numeric HUBCORE_TARGET_STARTLEVEL");
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let target = self.startup.target_startlevel;
        if target == 0 || target > STARTLEVEL_COMPLETE {
            return Err(ConfigError::Validation(format!(
                "target start level must be within 1..={STARTLEVEL_COMPLETE}, got {target}"
            )));
        }
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation(
                "database url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.startup.step_delay_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:hubcore.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hubcored=info,hubcore=info".to_string(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            target_startlevel: STARTLEVEL_COMPLETE,
            step_delay_ms: 0,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:hubcore.db?mode=rwc");
        assert_eq!(config.startup.target_startlevel, 100);
        assert_eq!(config.step_delay(), Duration::ZERO);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.startup.target_startlevel, 100);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [startup]
            target_startlevel = 80
            step_delay_ms = 250
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database_url(), "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.startup.target_startlevel, 80);
        assert_eq!(config.step_delay(), Duration::from_millis(250));
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.startup.target_startlevel, 100);
    }

    #[test]
    fn should_reject_out_of_range_target_startlevel() {
        let mut config = Config::default();
        config.startup.target_startlevel = 0;
        assert!(config.validate().is_err());

        config.startup.target_startlevel = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_empty_database_url() {
        let mut config = Config::default();
        config.database.url.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
