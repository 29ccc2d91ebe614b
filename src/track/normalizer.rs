use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::LaplineError;
use crate::telemetry::Sample;

use super::{CalibrationSettings, CalibrationStore, GeometryStore, Point2D, ReferenceGeometry};

/// A stretch of the recorded path that strays furthest from the raceline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationSegment {
    /// Index of the first path point in the segment
    pub start_index: usize,
    /// Index of the last path point in the segment (inclusive)
    pub end_index: usize,
    pub max_deviation: f32,
}

/// Scores a normalized path against a raceline. Implemented outside this crate.
pub trait DeviationAnalyzer {
    /// Return the `n` worst segments, worst first.
    fn worst_sections(
        &self,
        player_path: &[Point2D],
        raceline: &[Point2D],
        n: usize,
    ) -> Result<Vec<DeviationSegment>, LaplineError>;
}

/// One lap transformed into the reference track's coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLap {
    pub track_id: String,
    pub lap_number: u8,
    pub calibration: CalibrationSettings,
    pub path: Vec<Point2D>,
    pub reference: ReferenceGeometry,
}

impl NormalizedLap {
    /// Hand the path and raceline over to a deviation analyzer.
    pub fn worst_sections(
        &self,
        analyzer: &dyn DeviationAnalyzer,
        n: usize,
    ) -> Result<Vec<DeviationSegment>, LaplineError> {
        analyzer.worst_sections(&self.path, &self.reference.raceline, n)
    }
}

/// Aligns a recorded lap with a track's reference geometry.
pub struct CoordinateNormalizer<C, G> {
    calibration: C,
    geometry: G,
}

impl<C: CalibrationStore, G: GeometryStore> CoordinateNormalizer<C, G> {
    pub fn new(calibration: C, geometry: G) -> Self {
        Self {
            calibration,
            geometry,
        }
    }

    /// Transform the samples of `lap_number` with the track's calibration and
    /// attach the track's reference geometry.
    ///
    /// # Errors
    ///
    /// Fails when the buffer has no samples for the lap, or when the track has
    /// no usable reference geometry. A missing or broken calibration is not an
    /// error, the identity transform is used instead.
    pub fn normalize(
        &self,
        buffer: &[Sample],
        lap_number: u8,
    ) -> Result<NormalizedLap, LaplineError> {
        let lap: Vec<&Sample> = buffer
            .iter()
            .filter(|s| s.lap_number == lap_number)
            .collect();
        let first = lap
            .first()
            .ok_or(LaplineError::NoLapData { lap_number })?;
        if first.track_id.is_empty() {
            return Err(LaplineError::MissingTrack);
        }
        let track_id = first.track_id.clone();

        let calibration = self.calibration_for(&track_id);
        let path = lap
            .iter()
            .map(|s| calibration.apply(Point2D::new(s.x, s.y)))
            .collect::<Vec<_>>();

        let reference = self
            .geometry
            .load_geometry(&track_id)?
            .ok_or_else(|| LaplineError::GeometryMissing {
                track_id: track_id.clone(),
            })?;
        reference
            .validate()
            .map_err(|reason| LaplineError::GeometryInvalid {
                track_id: track_id.clone(),
                reason,
            })?;

        info!(
            "Normalized lap {lap_number} on {track_id}: {} points, raceline of {}",
            path.len(),
            reference.raceline.len()
        );
        Ok(NormalizedLap {
            track_id,
            lap_number,
            calibration,
            path,
            reference,
        })
    }

    fn calibration_for(&self, track_id: &str) -> CalibrationSettings {
        match self.calibration.load_calibration(track_id) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                warn!("No calibration for track {track_id}, using identity transform");
                CalibrationSettings::identity()
            }
            Err(e) => {
                warn!("Invalid calibration for track {track_id} ({e}), using identity transform");
                CalibrationSettings::identity()
            }
        }
    }
}
