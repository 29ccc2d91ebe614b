// Track reference data and lap normalization
// Calibration and geometry are loaded per track from external stores; the
// normalizer combines them with a recorded lap

pub mod calibration;
pub mod geometry;
pub mod normalizer;

pub use calibration::{CalibrationSettings, CalibrationStore, FileCalibrationStore};
pub use geometry::{FileGeometryStore, GeometryStore, Point2D, ReferenceGeometry};
pub use normalizer::{CoordinateNormalizer, DeviationAnalyzer, DeviationSegment, NormalizedLap};

/// File stem used for a track in the on-disk stores and session exports.
/// Path separators and dots never survive, so the result is a single path
/// component.
pub fn storage_file_name(track_id: &str) -> String {
    track_id
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
