//! Daemon configuration parsing.
//!
//! The daemon reads a small TOML file naming the database location and the
//! weekly trigger slot. Every field has a default; an empty file is a valid
//! configuration.

use std::path::{Path, PathBuf};

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML was invalid.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The parsed values failed validation.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub store: StoreSection,

    /// Weekly trigger settings.
    #[serde(default)]
    pub schedule: ScheduleSection,
}

impl DaemonConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string and validates it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.trigger().map(|_| ())
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Path of the `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Weekly trigger settings.
///
/// The default cadence is Sunday 20:00 UTC, allocating the upcoming
/// Monday through Friday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSection {
    /// Day of week the weekly run fires on, e.g. `sun` or `sunday`.
    #[serde(default = "default_weekday")]
    pub weekday: String,

    /// Hour of day (UTC) the weekly run fires at.
    #[serde(default = "default_hour_utc")]
    pub hour_utc: u8,
}

impl ScheduleSection {
    /// The trigger weekday, parsed.
    pub fn weekday(&self) -> Result<Weekday, ConfigError> {
        self.weekday.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "schedule.weekday is not a weekday name: {:?}",
                self.weekday
            ))
        })
    }

    /// The full trigger slot, parsed and validated.
    pub fn trigger(&self) -> Result<(Weekday, NaiveTime), ConfigError> {
        let weekday = self.weekday()?;
        let time = NaiveTime::from_hms_opt(u32::from(self.hour_utc), 0, 0).ok_or_else(|| {
            ConfigError::Validation(format!(
                "schedule.hour_utc must be 0..=23, got {}",
                self.hour_utc
            ))
        })?;
        Ok((weekday, time))
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            weekday: default_weekday(),
            hour_utc: default_hour_utc(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("parkd.sqlite3")
}

fn default_weekday() -> String {
    "sun".to_string()
}

const fn default_hour_utc() -> u8 {
    20
}
