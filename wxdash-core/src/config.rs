use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::model::Coordinates;

pub const DEFAULT_TIME_ZONE: &str = "Asia/Seoul";

/// Weather provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// Extra attempts after the first failed fetch.
    pub retries: u32,
    /// Delay before the first retry; doubled for every further attempt.
    pub retry_delay_ms: u64,
    /// How long a fetched view is served from cache.
    pub stale_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            retries: 3,
            retry_delay_ms: 1000,
            stale_secs: 60,
        }
    }
}

/// Reverse/forward geocoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub country_codes: String,
    /// Prepended to a directory label before a forward lookup.
    pub search_prefix: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("wxdash/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_language: "ko".to_string(),
            country_codes: "kr".to_string(),
            search_prefix: "대한민국".to_string(),
        }
    }
}

/// Stand-in for the platform location service.
///
/// Without both coordinates the service is reported as unsupported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timeout_secs: u64,
    pub maximum_age_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            timeout_secs: 10,
            maximum_age_secs: 60,
        }
    }
}

impl LocationConfig {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_secs(self.maximum_age_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub path: Option<PathBuf>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// time_zone = "Asia/Seoul"
///
/// [location]
/// latitude = 37.5665
/// longitude = 126.978
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub time_zone: String,
    pub weather: WeatherConfig,
    pub geocoder: GeocoderConfig,
    pub location: LocationConfig,
    pub storage: PathConfig,
    pub directory: PathConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            weather: WeatherConfig::default(),
            geocoder: GeocoderConfig::default(),
            location: LocationConfig::default(),
            storage: PathConfig::default(),
            directory: PathConfig::default(),
        }
    }
}

impl Config {
    /// The configured IANA time zone.
    pub fn time_zone(&self) -> Result<Tz> {
        self.time_zone.parse::<Tz>().map_err(|_| {
            anyhow!(
                "Unknown time zone '{}'.\n\
                 Hint: use an IANA name such as `Asia/Seoul` or `Europe/Berlin`.",
                self.time_zone
            )
        })
    }

    pub fn set_time_zone(&mut self, tz: Tz) {
        self.time_zone = tz.name().to_string();
    }

    pub fn set_location(&mut self, coords: Option<Coordinates>) {
        self.location.latitude = coords.map(|c| c.lat);
        self.location.longitude = coords.map(|c| c.lon);
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
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

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "wxdash", "wxdash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Durable favorites file; `[storage] path` wins over the platform data dir.
    pub fn storage_file_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("storage.json")),
        }
    }
}
