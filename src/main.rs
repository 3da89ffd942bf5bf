//! # Geo Detector
//!
//! Track the Maidenhead grid square and county/city of a serial GPS receiver.
//!
//! Reads NMEA sentences from the configured serial port (or replays a
//! captured sentence log), resolves every position fix against the region
//! boundary file and records the resulting events as JSON Lines.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use geo_detector::config::{Config, LoggingConfig};
use geo_detector::events::EventSink;
use geo_detector::geo::SharedRegions;
use geo_detector::replay::ReplayDriver;
use geo_detector::serial::SerialOpener;
use geo_detector::session::{LinkState, SessionHandle, SessionTimings};
use geo_detector::telemetry::{record_events, EventRecorder, RotatingLog};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main log file name inside the log directory
const MAIN_LOG_FILE: &str = "geo-detector.log";

/// Raw sentence capture file name inside the log directory
const NMEA_CAPTURE_FILE: &str = "nmea.txt";

/// Main entry point for Geo Detector
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, else `config/default.toml`)
///    - Set up console, file and raw sentence logging
///    - Load the region boundary file and start the event recorder
///
/// 2. **Run**
///    - Replay the configured sentence log, or
///    - Open the serial link and stream until Ctrl+C or the link goes idle
///
/// 3. **Graceful Shutdown**
///    - Stop the link session (closes the port)
///    - Flush the event recorder
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    let _log_guards = init_logging(&config.logging)?;
    info!("Geo Detector v{} starting...", env!("CARGO_PKG_VERSION"));

    let recorder = match &config.events.jsonl_dir {
        Some(dir) => EventRecorder::rotating(RotatingLog::new(
            dir,
            config.events.max_records_per_file,
            config.events.max_files_to_keep,
        )?),
        None => EventRecorder::stdout(),
    };
    let (events, event_rx) = EventSink::channel();
    let recorder_task = tokio::spawn(record_events(event_rx, recorder));

    let regions = SharedRegions::default();
    if let Some(file) = &config.regions.file {
        // Failures are reported as status events; run on without regions
        let _ = regions.load_file(file, &events);
    }

    match &config.replay.file {
        Some(file) => {
            let driver = ReplayDriver::new(regions, events.clone())
                .with_line_delay(Duration::from_millis(config.replay.line_delay_ms));
            match driver.replay_file(file).await {
                Ok(summary) => info!(
                    "Replayed {} lines ({} fixes, {} rejected)",
                    summary.lines, summary.fixes, summary.rejected
                ),
                Err(e) => error!("Replay of {} failed: {}", file, e),
            }
        }
        None => run_live(&config, regions, events.clone()).await?,
    }

    drop(events);
    let recorded = recorder_task.await?;
    info!("Recorded {} events", recorded);

    Ok(())
}

/// Run the link session until Ctrl+C or until it falls back to Idle
async fn run_live(config: &Config, regions: SharedRegions, events: EventSink) -> Result<()> {
    let session = SessionHandle::spawn(
        SerialOpener::from_config(&config.serial),
        SessionTimings::from(config),
        regions,
        events,
    );

    if config.serial.auto_open {
        session.open()?;
    } else {
        info!("auto_open disabled, link stays idle");
    }

    let mut state = session.subscribe();
    let went_idle = async {
        let _ = state.wait_for(|s| *s != LinkState::Idle).await;
        let _ = state.wait_for(|s| *s == LinkState::Idle).await;
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C, shutting down...");
        }
        _ = went_idle => info!("Link session went idle, shutting down..."),
    }

    session.stop().await;
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::load(path).with_context(|| format!("Failed to load configuration from {}", path))
    } else {
        eprintln!("Configuration {} not found, using defaults", path);
        Ok(Config::default())
    }
}

/// Install console, main log file and raw sentence capture layers.
///
/// The returned guards flush the file writers when dropped.
fn init_logging(config: &LoggingConfig) -> Result<Vec<WorkerGuard>> {
    let level: LevelFilter = config.level.parse::<tracing::Level>()?.into();
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},nmea=off", level)));

    let mut guards = Vec::new();
    let (main_layer, nmea_layer) = match &config.log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, MAIN_LOG_FILE));
            guards.push(guard);
            let main_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(
                    Targets::new()
                        .with_default(level)
                        .with_target("nmea", LevelFilter::OFF),
                );

            let nmea_layer = if config.nmea_capture {
                let (writer, guard) = tracing_appender::non_blocking(
                    tracing_appender::rolling::never(dir, NMEA_CAPTURE_FILE),
                );
                guards.push(guard);
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .without_time()
                        .with_level(false)
                        .with_target(false)
                        .with_writer(writer)
                        .with_filter(Targets::new().with_target("nmea", LevelFilter::INFO)),
                )
            } else {
                None
            };

            (Some(main_layer), nmea_layer)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(console_filter))
        .with(main_layer)
        .with(nmea_layer)
        .init();

    Ok(guards)
}
