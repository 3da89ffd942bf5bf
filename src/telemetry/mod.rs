//! # Telemetry Module
//!
//! Records detector events as JSONL (JSON Lines).
//!
//! This module handles:
//! - Formatting each event with a UTC timestamp
//! - Writing to stdout or to rotating log files
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::GeoEvent;

/// File name prefix of rotated event logs
pub const EVENT_FILE_PREFIX: &str = "events";

/// File extension of rotated event logs
pub const EVENT_FILE_EXTENSION: &str = "jsonl";

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a GeoEvent,
}

/// Encode one event as a single JSON line (without newline)
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use geo_detector::events::GeoEvent;
/// use geo_detector::telemetry::encode_record;
///
/// let at = Utc.with_ymd_and_hms(2019, 3, 22, 15, 40, 7).unwrap();
/// let line = encode_record(&GeoEvent::ReplayDone, at).unwrap();
/// assert_eq!(line, r#"{"timestamp":"2019-03-22T15:40:07Z","event":"replay_done"}"#);
/// ```
pub fn encode_record(event: &GeoEvent, timestamp: DateTime<Utc>) -> Result<String> {
    let line = serde_json::to_string(&EventRecord { timestamp, event }).map_err(io::Error::from)?;
    Ok(line)
}

/// JSONL files rotated by record count
#[derive(Debug)]
pub struct RotatingLog {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    current: Option<BufWriter<File>>,
    written: usize,
    sequence: u64,
}

impl RotatingLog {
    /// Create the log directory if needed; the first file opens on the first record.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created
    pub fn new<P: Into<PathBuf>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            current: None,
            written: 0,
            sequence: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one line, rotating first when the current file is full
    pub fn write_record(&mut self, line: &str) -> Result<()> {
        if self.current.is_none() || self.written >= self.max_records_per_file {
            self.rotate()?;
        }
        if let Some(writer) = self.current.as_mut() {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
            self.written += 1;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }

        self.sequence += 1;
        let name = format!(
            "{}_{}_{:04}.{}",
            EVENT_FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.sequence,
            EVENT_FILE_EXTENSION
        );
        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Recording events to {}", path.display());

        self.current = Some(BufWriter::new(file));
        self.written = 0;
        self.prune()
    }

    /// Delete the oldest event logs beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_event_log(path))
            .collect();
        files.sort();

        let excess = files.len().saturating_sub(self.max_files_to_keep);
        for old in &files[..excess] {
            debug!("Removing old event log {}", old.display());
            fs::remove_file(old)?;
        }
        Ok(())
    }
}

fn is_event_log(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with(EVENT_FILE_PREFIX));
    let extension_matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext == EVENT_FILE_EXTENSION);
    name_matches && extension_matches
}

enum Output {
    Stream(Box<dyn Write + Send>),
    Rotating(RotatingLog),
}

/// Writes events as JSON Lines
pub struct EventRecorder {
    output: Output,
    records: u64,
}

impl EventRecorder {
    /// Record to standard output
    pub fn stdout() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Output::Stream(writer),
            records: 0,
        }
    }

    pub fn rotating(log: RotatingLog) -> Self {
        Self {
            output: Output::Rotating(log),
            records: 0,
        }
    }

    /// Record one event stamped with the current time
    pub fn record(&mut self, event: &GeoEvent) -> Result<()> {
        let line = encode_record(event, Utc::now())?;
        match &mut self.output {
            Output::Stream(writer) => {
                writeln!(writer, "{}", line)?;
                writer.flush()?;
            }
            Output::Rotating(log) => log.write_record(&line)?,
        }
        self.records += 1;
        Ok(())
    }

    /// Number of events recorded so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

/// Record events until every sender is dropped.
///
/// # Returns
///
/// * `u64` - Number of events recorded
pub async fn record_events(
    mut events: mpsc::UnboundedReceiver<GeoEvent>,
    mut recorder: EventRecorder,
) -> u64 {
    while let Some(event) = events.recv().await {
        if let Err(e) = recorder.record(&event) {
            warn!("Failed to record event: {}", e);
        }
    }
    debug!("Event stream closed after {} records", recorder.records());
    recorder.records()
}
