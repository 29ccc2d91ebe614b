// Per-track calibration aligning recorded world coordinates with reference geometry

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::LaplineError;
use crate::track::{Point2D, storage_file_name};

/// Linear transform applied to a recorded path: rotate, scale, reflect, translate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    #[serde(rename = "tx")]
    pub translate_x: f32,
    #[serde(rename = "ty")]
    pub translate_y: f32,
    pub scale: f32,
    /// Counter-clockwise rotation in degrees
    #[serde(rename = "rotation")]
    pub rotation_degrees: f32,
    pub reflect_x: bool,
    pub reflect_y: bool,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self::identity()
    }
}

impl CalibrationSettings {
    pub fn identity() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
            rotation_degrees: 0.0,
            reflect_x: false,
            reflect_y: false,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn apply(&self, point: Point2D) -> Point2D {
        let (sin, cos) = self.rotation_degrees.to_radians().sin_cos();
        let mut x = point.x * cos - point.y * sin;
        let mut y = point.x * sin + point.y * cos;

        x *= self.scale;
        y *= self.scale;

        if self.reflect_x {
            x = -x;
        }
        if self.reflect_y {
            y = -y;
        }

        Point2D::new(x + self.translate_x, y + self.translate_y)
    }
}

/// Source of per-track calibration settings.
pub trait CalibrationStore {
    /// Load the calibration for a track, `None` when the track has none.
    fn load_calibration(&self, track_id: &str)
    -> Result<Option<CalibrationSettings>, LaplineError>;
}

/// Calibration stored as one JSON object per track in a directory.
pub struct FileCalibrationStore {
    storage_path: PathBuf,
}

impl FileCalibrationStore {
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }

    /// Default location under the user's data directory.
    pub fn default_storage_path() -> Result<PathBuf, LaplineError> {
        let app_data_dir = dirs::data_dir().ok_or(LaplineError::NoConfigDir)?;
        Ok(app_data_dir.join("lapline").join("calibration"))
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn file_path_for_track(&self, track_id: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.json", storage_file_name(track_id)))
    }

    /// Write the calibration for a track, creating the directory if needed.
    pub fn save(&self, track_id: &str, settings: &CalibrationSettings) -> Result<(), LaplineError> {
        if !self.storage_path.exists() {
            fs::create_dir_all(&self.storage_path)
                .map_err(|e| LaplineError::CalibrationIo { source: e })?;
        }
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| LaplineError::CalibrationParse { source: e })?;
        fs::write(self.file_path_for_track(track_id), content)
            .map_err(|e| LaplineError::CalibrationIo { source: e })
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn load_calibration(
        &self,
        track_id: &str,
    ) -> Result<Option<CalibrationSettings>, LaplineError> {
        let file_path = self.file_path_for_track(track_id);
        if !file_path.exists() {
            debug!("No calibration file at {file_path:?}");
            return Ok(None);
        }

        let content = fs::read_to_string(&file_path)
            .map_err(|e| LaplineError::CalibrationIo { source: e })?;
        let settings = serde_json::from_str(&content)
            .map_err(|e| LaplineError::CalibrationParse { source: e })?;
        Ok(Some(settings))
    }
}
