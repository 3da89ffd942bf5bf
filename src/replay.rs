//! # Replay Driver
//!
//! Feeds a recorded sentence log through the same pipeline as the live link.
//!
//! This module handles:
//! - Reading a capture file line by line
//! - Optional per-line throttling
//! - Reporting completion with a `ReplayDone` event

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::{EventSink, GeoEvent};
use crate::geo::SharedRegions;
use crate::session::FixPipeline;

/// Counters for a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Lines read from the log
    pub lines: usize,
    /// Lines that produced a valid RMC or GGA fix
    pub fixes: usize,
    /// Lines dropped as undecodable
    pub rejected: usize,
}

/// Replays sentence logs against the shared region set
#[derive(Debug, Clone)]
pub struct ReplayDriver {
    regions: SharedRegions,
    events: EventSink,
    line_delay: Duration,
}

impl ReplayDriver {
    pub fn new(regions: SharedRegions, events: EventSink) -> Self {
        Self {
            regions,
            events,
            line_delay: Duration::ZERO,
        }
    }

    /// Pause before each line, approximating the live sentence rate
    pub fn with_line_delay(mut self, line_delay: Duration) -> Self {
        self.line_delay = line_delay;
        self
    }

    /// Replay every line of `reader`.
    ///
    /// Undecodable lines are dropped; only read errors end the replay early.
    pub async fn replay<R>(&self, reader: R) -> Result<ReplaySummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut reader = reader;
        let mut pipeline = FixPipeline::new(self.regions.clone(), self.events.clone());
        let mut summary = ReplaySummary::default();
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer).await? == 0 {
                break;
            }
            if !self.line_delay.is_zero() {
                tokio::time::sleep(self.line_delay).await;
            }
            summary.lines += 1;

            let line = match std::str::from_utf8(&buffer) {
                Ok(text) => text.trim(),
                Err(e) => {
                    warn!("Replay line {} is not valid text: {}", summary.lines, e);
                    self.events.placeholders();
                    summary.rejected += 1;
                    continue;
                }
            };

            match pipeline.process_line(line) {
                Ok(outcome) if outcome.is_fix() => summary.fixes += 1,
                Ok(_) => {}
                Err(e) => {
                    debug!("Dropping replay line {}: {}", summary.lines, e);
                    summary.rejected += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Replay a log file, always finishing with a `ReplayDone` event.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened or read
    pub async fn replay_file<P: AsRef<Path>>(&self, path: P) -> Result<ReplaySummary> {
        let path = path.as_ref();
        self.events
            .status(format!("Replaying {} NMEA GPS file", path.display()));

        let result = match File::open(path).await {
            Ok(file) => self.replay(BufReader::new(file)).await,
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(summary) => self.events.status(format!(
                "Replay complete ({} lines, {} fixes)",
                summary.lines, summary.fixes
            )),
            Err(e) => self
                .events
                .status(format!("Replay of {} failed: {}", path.display(), e)),
        }
        self.events.emit(GeoEvent::ReplayDone);

        result
    }

    /// Replay a log file on its own task
    pub fn spawn(self, path: impl Into<PathBuf>) -> JoinHandle<Result<ReplaySummary>> {
        let path = path.into();
        tokio::spawn(async move { self.replay_file(path).await })
    }
}
