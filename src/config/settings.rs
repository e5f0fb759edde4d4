//! Application settings loaded from a TOML file with environment overrides.
//!
//! The settings file is optional; every field has a default. `DATABASE_URL` and
//! `ADMIN_TELEGRAM_IDS` override the file when set. Secrets (`TELEGRAM_TOKEN`,
//! `ADMIN_PASSWORD`) are never read from here; they are loaded from the environment
//! directly before use.

use crate::auth::AllowList;
use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Structure of the whole settings file
#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    /// Storage settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Admin access settings
    #[serde(default)]
    pub admin: AdminSettings,
    /// Reservation expiry sweep settings
    #[serde(default)]
    pub expiry: ExpirySettings,
}

/// `[database]` table
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// `SeaORM` connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// `[admin]` table
#[derive(Debug, Deserialize)]
pub struct AdminSettings {
    /// Username accepted by the static credential path
    #[serde(default = "default_admin_username")]
    pub username: String,
    /// Telegram user ids allowed to administer raffles
    #[serde(default)]
    pub telegram_ids: Vec<i64>,
}

/// `[expiry]` table
#[derive(Debug, Deserialize)]
pub struct ExpirySettings {
    /// Whether the binary runs the periodic sweep at all
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

const fn default_sweep_interval() -> u64 {
    300
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            telegram_ids: Vec::new(),
        }
    }
}

impl Default for ExpirySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sweep_interval(),
        }
    }
}

impl Settings {
    /// Allow-list built from the configured admin ids.
    #[must_use]
    pub fn allow_list(&self) -> AllowList {
        AllowList::from_ids(self.admin.telegram_ids.iter().copied())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(ids) = std::env::var("ADMIN_TELEGRAM_IDS") {
            self.admin.telegram_ids = AllowList::parse(&ids).ids().collect();
        }
    }
}

/// Parses settings from TOML text without touching the environment.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from `path`, falling back to defaults when the file does not exist,
/// then applies environment overrides.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or is not valid TOML.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let mut settings = if path.exists() {
        debug!("Loading settings from {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read settings file {path:?}: {e}"),
        })?;
        parse_settings(&contents)?
    } else {
        info!("No settings file at {:?}, using defaults", path);
        Settings::default()
    };
    settings.apply_env_overrides();
    Ok(settings)
}
