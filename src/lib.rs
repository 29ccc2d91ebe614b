// Library interface for lapline
// Exposes the recorder, lap analysis, export and normalization to the CLI and
// to integration tests

pub mod analysis;
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod track;
pub mod writer;

// Re-export commonly used types
pub use analysis::{LapSummary, average_speed, fastest_lap, lap_boundaries, top_speed};
pub use config::AppConfig;
pub use errors::LaplineError;
pub use telemetry::{
    LAP_SENTINEL, LapSegmenter, Packet, RecorderEvent, Sample, Session, SessionRecorder,
    SessionStatus,
};
pub use track::{
    CalibrationSettings, CoordinateNormalizer, DeviationAnalyzer, DeviationSegment,
    FileCalibrationStore, FileGeometryStore, NormalizedLap, Point2D, ReferenceGeometry,
};
pub use writer::{export_file_name, export_session, import_session};
