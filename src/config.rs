use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::LaplineError;
use crate::telemetry::{DEFAULT_PORT, recorder::DEFAULT_POLL_INTERVAL_MS};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// UDP port the game sends telemetry to
    pub port: u16,
    pub poll_interval_ms: u64,
    pub calibration_dir: Option<PathBuf>,
    pub geometry_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            calibration_dir: None,
            geometry_dir: None,
            export_dir: None,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf, LaplineError> {
        Ok(dirs::config_dir()
            .ok_or(LaplineError::NoConfigDir)?
            .join("lapline")
            .join(CONFIG_FILE_NAME))
    }

    /// Load the user's config file, `None` if there isn't one yet.
    pub fn from_local_file() -> Result<Option<Self>, LaplineError> {
        Self::from_file(&Self::config_path()?)
    }

    pub fn from_file(config_path: &Path) -> Result<Option<Self>, LaplineError> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)
            .map_err(|e| LaplineError::ConfigIO { source: e })?;
        serde_json::from_reader(file)
            .map(Some)
            .map_err(|e| LaplineError::ConfigSerialize { source: e })
    }

    pub fn save(&self) -> Result<(), LaplineError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), LaplineError> {
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LaplineError::ConfigIO { source: e })?;
            }
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| LaplineError::ConfigIO { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| LaplineError::ConfigSerialize { source: e })
    }
}
