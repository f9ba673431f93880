//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono_tz::Tz;
use ev_core::{SourcePolicies, SourceType};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// IANA time zone that calendar windows are computed in.
    pub timezone: String,
    /// Source type recorded for newly declared patterns.
    pub source_type: SourceType,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("timezone", &self.timezone)
            .field("source_type", &self.source_type)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("ev.db"),
            timezone: system_timezone(),
            source_type: SourceType::Kafka,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (EV_*)
        figment = figment.merge(Env::prefixed("EV_"));

        figment.extract()
    }

    /// Parses the configured time zone.
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone {:?}: {err}", self.timezone))
    }

    /// Calendar deadline policies in the configured time zone.
    pub fn policies(&self) -> anyhow::Result<SourcePolicies> {
        Ok(SourcePolicies::calendar(self.tz()?))
    }
}

/// System time zone name, or UTC when it cannot be determined.
fn system_timezone() -> String {
    iana_time_zone::get_timezone()
        .ok()
        .filter(|name| name.parse::<Tz>().is_ok())
        .unwrap_or_else(|| "UTC".to_string())
}

/// Returns the platform-specific config directory for ev.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ev"))
}

/// Returns the platform-specific data directory for ev.
///
/// On Linux: `~/.local/share/ev`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ev"))
}
