use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File};
use ecocompteur_client::{
    config_flow::UserInput, setup::SetupOptions, DEFAULT_FAILURE_THRESHOLD, DEFAULT_SCAN_INTERVAL,
    DEFAULT_TIMEOUT,
};
use serde::Deserialize;

const CONFIG_PATH_VAR: &str = "ECOCOMPTEUR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "ecocompteur";

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default)]
    pub devices: Vec<DeviceSettings>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceSettings {
    pub host: String,
    pub name: Option<String>,
}

impl Settings {
    /// Reads the settings file (optional) then `ECOCOMPTEUR__*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let s = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("ECOCOMPTEUR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }

    pub fn setup_options(&self) -> SetupOptions {
        SetupOptions {
            scan_interval: Duration::from_secs(self.scan_interval_secs.max(1)),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            failure_threshold: self.failure_threshold.max(1),
        }
    }
}

impl DeviceSettings {
    pub fn user_input(&self) -> UserInput {
        UserInput {
            host: self.host.clone(),
            name: self.name.clone(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("ecocompteur-entries.json")
}

const fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

const fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}
