// Error types for lapline

use snafu::Snafu;
use std::{io, path::PathBuf};

#[derive(Debug, Snafu)]
pub enum LaplineError {
    // Errors for the session recorder
    #[snafu(display("Session recorder is already running"))]
    AlreadyRunning,
    #[snafu(display("Unable to bind telemetry socket on port {port}"))]
    SocketBind { port: u16, source: io::Error },
    #[snafu(display("Unable to configure telemetry socket"))]
    SocketConfig { source: io::Error },
    #[snafu(display("Unable to spawn recorder worker thread"))]
    WorkerSpawn { source: io::Error },
    #[snafu(display("Recorder worker thread panicked"))]
    RecorderPanicked,

    // Normalization errors
    #[snafu(display("No data for lap {lap_number}"))]
    NoLapData { lap_number: u8 },
    #[snafu(display("Lap samples carry no track identifier"))]
    MissingTrack,
    #[snafu(display("No reference geometry for track {track_id}"))]
    GeometryMissing { track_id: String },
    #[snafu(display("Reference geometry for track {track_id} is invalid: {reason}"))]
    GeometryInvalid { track_id: String, reason: String },
    #[snafu(display("Error reading reference geometry"))]
    GeometryIo { source: io::Error },
    #[snafu(display("Deviation analysis failed: {reason}"))]
    Deviation { reason: String },

    // Calibration errors, these never escape the normalizer
    #[snafu(display("Error reading calibration file"))]
    CalibrationIo { source: io::Error },
    #[snafu(display("Error parsing calibration file"))]
    CalibrationParse { source: serde_json::Error },

    // Errors for the session exporter
    #[snafu(display("Error writing session file {}", path.display()))]
    ExportIo { path: PathBuf, source: io::Error },
    #[snafu(display("Error reading session file {}", path.display()))]
    ImportIo { path: PathBuf, source: io::Error },
    #[snafu(display("Invalid session file line {line}: {reason}"))]
    ImportParse { line: usize, reason: String },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIO { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerialize { source: serde_json::Error },
}
