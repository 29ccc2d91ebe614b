use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};
use lapline::{
    AppConfig, CalibrationSettings, CoordinateNormalizer, FileCalibrationStore, FileGeometryStore,
    LaplineError, RecorderEvent, Sample, SessionRecorder, analysis, export_file_name,
    export_session, import_session,
};
use log::{error, info, warn};

const EVENT_WAIT_MS: u64 = 200;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record telemetry until Ctrl-C or a track change, then export the session
    Record {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Align one lap of an exported session with the track's reference geometry
    Normalize {
        #[arg(short, long)]
        input: PathBuf,

        /// Lap number as written in the exported file
        #[arg(short, long)]
        lap: u16,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the laps contained in an exported session
    Summary {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Store the calibration for a track
    Calibrate {
        #[arg(short, long)]
        track: String,

        #[arg(long, default_value_t = 0.)]
        tx: f32,

        #[arg(long, default_value_t = 0.)]
        ty: f32,

        #[arg(long, default_value_t = 1.)]
        scale: f32,

        #[arg(long, default_value_t = 0.)]
        rotation: f32,

        #[arg(long)]
        reflect_x: bool,

        #[arg(long)]
        reflect_y: bool,
    },
}

fn record(config: &AppConfig, port: u16, output: Option<PathBuf>) -> Result<(), LaplineError> {
    let stop_requested = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop_requested);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!("Could not set Ctrl-C handler, recording will only end on track change: {e}");
    }

    let (events_tx, events_rx) = mpsc::channel::<RecorderEvent>();
    let mut recorder = SessionRecorder::new()
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
        .with_events(events_tx);
    recorder.start(port)?;
    println!("Recording on port {port}, press Ctrl-C to stop");

    while !stop_requested.load(Ordering::SeqCst) {
        match events_rx.recv_timeout(Duration::from_millis(EVENT_WAIT_MS)) {
            Ok(RecorderEvent::Halted) => break,
            Ok(event) => info!("{event:?}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let session = recorder.stop()?;
    print_summary(&session.buffer);
    if session.buffer.is_empty() {
        println!("Nothing recorded");
        return Ok(());
    }

    let output = match output {
        Some(output) => output,
        None => default_export_path(config, session.track_id.as_deref())?,
    };
    export_session(&session.buffer, &output)?;
    println!("Session written to {}", output.display());
    Ok(())
}

fn default_export_path(config: &AppConfig, track_id: Option<&str>) -> Result<PathBuf, LaplineError> {
    let export_dir = match &config.export_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .ok_or(LaplineError::NoConfigDir)?
            .join("lapline")
            .join("sessions"),
    };
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Ok(export_dir.join(export_file_name(track_id, timestamp)))
}

fn normalize(
    config: &AppConfig,
    input: &Path,
    lap: u16,
    output: Option<PathBuf>,
) -> Result<(), LaplineError> {
    let buffer = import_session(input)?;
    let lap_number = lap
        .checked_sub(1)
        .and_then(|l| u8::try_from(l).ok())
        .ok_or(LaplineError::NoLapData { lap_number: 0 })?;

    let calibration_dir = match &config.calibration_dir {
        Some(dir) => dir.clone(),
        None => FileCalibrationStore::default_storage_path()?,
    };
    let geometry_dir = match &config.geometry_dir {
        Some(dir) => dir.clone(),
        None => FileGeometryStore::default_storage_path()?,
    };
    let normalizer = CoordinateNormalizer::new(
        FileCalibrationStore::new(calibration_dir),
        FileGeometryStore::new(geometry_dir),
    );
    let normalized = normalizer.normalize(&buffer, lap_number)?;

    let io_error = |e: io::Error| LaplineError::ExportIo {
        path: output.clone().unwrap_or_else(|| PathBuf::from("-")),
        source: e,
    };
    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(io_error)?)),
        None => Box::new(io::stdout().lock()),
    };
    writeln!(writer, "x\ty").map_err(io_error)?;
    for point in &normalized.path {
        writeln!(writer, "{}\t{}", point.x, point.y).map_err(io_error)?;
    }
    writer.flush().map_err(io_error)?;

    info!(
        "Lap {lap} normalized against a raceline of {} points",
        normalized.reference.raceline.len()
    );
    Ok(())
}

fn print_summary(buffer: &[Sample]) {
    let laps = analysis::lap_boundaries(buffer);
    println!("{} samples over {} lap changes", buffer.len(), laps.len());
    for summary in analysis::lap_summaries(buffer) {
        println!(
            "lap {:>3}: {:>6} samples, avg {:>6.1} m/s, top {:>6.1} m/s, best {}",
            u16::from(summary.lap_number) + 1,
            summary.samples,
            summary.average_speed,
            summary.top_speed,
            summary
                .best_lap_time
                .map(|t| format!("{t:.3}s"))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    if let Some(fastest) = analysis::fastest_lap(buffer) {
        println!("fastest lap: {}", u16::from(fastest) + 1);
    }
}

fn summary(input: &Path) -> Result<(), LaplineError> {
    let buffer = import_session(input)?;
    print_summary(&buffer);
    Ok(())
}

fn calibrate(
    config: &AppConfig,
    track: &str,
    settings: CalibrationSettings,
) -> Result<(), LaplineError> {
    let calibration_dir = match &config.calibration_dir {
        Some(dir) => dir.clone(),
        None => FileCalibrationStore::default_storage_path()?,
    };
    FileCalibrationStore::new(calibration_dir).save(track, &settings)?;
    println!("Calibration saved for {track}");
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    let config = match AppConfig::from_local_file() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring unreadable config file: {e}");
            AppConfig::default()
        }
    };

    let result = match cli.command {
        Commands::Record { port, output } => record(&config, port.unwrap_or(config.port), output),
        Commands::Normalize { input, lap, output } => normalize(&config, &input, lap, output),
        Commands::Summary { input } => summary(&input),
        Commands::Calibrate {
            track,
            tx,
            ty,
            scale,
            rotation,
            reflect_x,
            reflect_y,
        } => calibrate(
            &config,
            &track,
            CalibrationSettings {
                translate_x: tx,
                translate_y: ty,
                scale,
                rotation_degrees: rotation,
                reflect_x,
                reflect_y,
            },
        ),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
