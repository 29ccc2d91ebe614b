use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use log::info;

use crate::{LaplineError, telemetry::Sample, track::storage_file_name};

pub const EXPORT_HEADER: [&str; 4] = [
    "trackId",
    "lap_number",
    "world_position_X",
    "world_position_Y",
];

/// File name for a recorded session, safe to join onto an export directory
/// whatever the track id sent by the game.
pub fn export_file_name(track_id: Option<&str>, timestamp: u64) -> String {
    let track = track_id
        .map(storage_file_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{track}_{timestamp}.csv")
}

/// Write a session buffer as tab-separated text, one row per sample.
///
/// Lap numbers are written 1-based. The destination directory is created if
/// needed and an existing file is replaced.
pub fn export_session(buffer: &[Sample], file: &Path) -> Result<(), LaplineError> {
    let io_error = |e: std::io::Error| LaplineError::ExportIo {
        path: file.to_path_buf(),
        source: e,
    };

    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let session_file = File::create(file).map_err(io_error)?;
    let mut session_writer = BufWriter::new(session_file);
    writeln!(session_writer, "{}", EXPORT_HEADER.join("\t")).map_err(io_error)?;
    for sample in buffer {
        // f32 Display never uses exponents or locale separators
        writeln!(
            session_writer,
            "{}\t{}\t{}\t{}",
            sample.track_id,
            u16::from(sample.lap_number) + 1,
            sample.x,
            sample.y
        )
        .map_err(io_error)?;
    }
    session_writer.flush().map_err(io_error)?;

    info!("Exported {} samples to {:?}", buffer.len(), file);
    Ok(())
}

/// Read back a file written by [`export_session`].
///
/// Only track, lap and position survive the export, speed and lap time are zero.
pub fn import_session(file: &Path) -> Result<Vec<Sample>, LaplineError> {
    let session_file = File::open(file).map_err(|e| LaplineError::ImportIo {
        path: file.to_path_buf(),
        source: e,
    })?;

    let mut samples = Vec::new();
    for (index, line) in BufReader::new(session_file).lines().enumerate() {
        let line = line.map_err(|e| LaplineError::ImportIo {
            path: file.to_path_buf(),
            source: e,
        })?;
        let line_no = index + 1;
        let line = line.trim_end_matches('\r');
        if line.is_empty() || (line_no == 1 && line.starts_with(EXPORT_HEADER[0])) {
            continue;
        }
        samples.push(parse_line(line, line_no)?);
    }
    Ok(samples)
}

fn parse_line(line: &str, line_no: usize) -> Result<Sample, LaplineError> {
    let parse_error = |reason: String| LaplineError::ImportParse {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let [track_id, lap, x, y] = fields.as_slice() else {
        return Err(parse_error(format!(
            "expected {} fields, found {}",
            EXPORT_HEADER.len(),
            fields.len()
        )));
    };

    let lap = lap
        .parse::<u16>()
        .map_err(|e| parse_error(format!("lap number {lap:?}: {e}")))?;
    let lap_number = lap
        .checked_sub(1)
        .and_then(|l| u8::try_from(l).ok())
        .ok_or_else(|| parse_error(format!("lap number {lap} out of range")))?;
    let x = x
        .parse::<f32>()
        .map_err(|e| parse_error(format!("x {x:?}: {e}")))?;
    let y = y
        .parse::<f32>()
        .map_err(|e| parse_error(format!("y {y:?}: {e}")))?;

    Ok(Sample {
        lap_number,
        track_id: track_id.to_string(),
        x,
        y,
        ..Default::default()
    })
}
