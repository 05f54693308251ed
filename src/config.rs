use std::fs;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{Coordinates, DaysBack, RegionCode};
use crate::ebird::DEFAULT_BASE_URL;
use crate::error::SightingsError;

pub const CONFIG_FILE: &str = "sightings.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub home_state: Option<String>,
    #[serde(default)]
    pub home_location: Option<LocationEntry>,
    #[serde(default)]
    pub radius_km: Option<u32>,
    #[serde(default)]
    pub days_back: Option<u32>,
    #[serde(default)]
    pub ebird_base_url: Option<String>,
    #[serde(default)]
    pub rare_list_url: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_increment: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LocationEntry {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub home_state: RegionCode,
    pub home_location: Option<Coordinates>,
    pub radius_km: u32,
    pub days_back: DaysBack,
    pub ebird_base_url: String,
    pub rare_list_url: Option<String>,
    pub page_size: usize,
    pub page_increment: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SightingsError> {
        let config_path = match path {
            Some(path) => {
                let path = Utf8PathBuf::from(path);
                if !path.as_std_path().exists() {
                    return Err(SightingsError::MissingConfig(path.into_std_path_buf()));
                }
                Some(path)
            }
            None => Self::default_paths()
                .into_iter()
                .find(|path| path.as_std_path().exists()),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| SightingsError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SightingsError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn default_paths() -> Vec<Utf8PathBuf> {
        let mut paths = vec![Utf8PathBuf::from(CONFIG_FILE)];
        if let Some(dirs) = ProjectDirs::from("org", "birdclub", "birdclub-sightings")
            && let Ok(dir) = Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf())
        {
            paths.push(dir.join(CONFIG_FILE));
        }
        paths
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SightingsError> {
        let home_state: RegionCode = config.home_state.as_deref().unwrap_or("US-VA").parse()?;
        if home_state.state().as_ref() != Some(&home_state) {
            return Err(SightingsError::InvalidRegionCode(home_state.to_string()));
        }

        let home_location = config
            .home_location
            .map(|entry| Coordinates::new(entry.lat, entry.lng))
            .transpose()?;

        let days_back = match config.days_back {
            Some(days) => DaysBack::try_from(days)?,
            None => DaysBack::default(),
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            home_state,
            home_location,
            radius_km: config.radius_km.unwrap_or(25).clamp(1, 50),
            days_back,
            ebird_base_url: config
                .ebird_base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            rare_list_url: config.rare_list_url.filter(|url| !url.trim().is_empty()),
            page_size: config.page_size.unwrap_or(20).max(1),
            page_increment: config.page_increment.unwrap_or(20).max(1),
        })
    }
}
