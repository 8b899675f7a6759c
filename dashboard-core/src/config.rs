use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::model::Position;

pub const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Overrides `api_url` when set.
pub const API_URL_ENV: &str = "WEATHER_API_URL";
/// Overrides `api_key` when set.
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Default location used when no coordinates are given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the OpenWeather data API.
    pub api_url: Option<String>,

    pub api_key: Option<String>,

    pub request_timeout_secs: Option<u64>,

    /// Example TOML:
    /// [location]
    /// latitude = 30.49
    /// longitude = -86.45
    pub location: Option<LocationConfig>,
}

/// Everything the HTTP source needs, resolved from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Config {
    /// Load config from disk and apply environment overrides.
    ///
    /// Meant to be called once at startup.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&Self::config_file_path()?)?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Load config from `path`, or return an empty default if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-dashboard", "weather-dashboard")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Replace `api_url` / `api_key` with non-empty values from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(API_URL_ENV) {
            tracing::debug!(url = %url, "using API URL from environment");
            self.api_url = Some(url);
        }
        if let Some(key) = non_empty(API_KEY_ENV) {
            tracing::debug!("using API key from environment");
            self.api_key = Some(key);
        }
    }

    /// Resolve connection settings, filling in defaults.
    pub fn api_settings(&self) -> Result<ApiSettings> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured.\n\
                     Hint: run `weather-dashboard configure` or set {API_KEY_ENV}."
                )
            })?;

        let base_url = self
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(ApiSettings {
            base_url,
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    /// The stored default location, if any and valid.
    pub fn default_position(&self) -> Result<Option<Position>> {
        self.location
            .map(|loc| Position::new(loc.latitude, loc.longitude))
            .transpose()
            .context("Invalid [location] in config file")
    }

    pub fn set_location(&mut self, position: Position) {
        self.location = Some(LocationConfig {
            latitude: position.latitude,
            longitude: position.longitude,
        });
    }
}
