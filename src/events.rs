//! # Detector Events
//!
//! Named events published to whoever presents the detector's output.
//!
//! Events are serialisable so the binary can write them as JSON Lines.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::geo::RegionLabel;
use crate::nmea::protocol::RawPosition;

/// Shown in place of the grid and region while the link delivers garbage.
pub const PLACEHOLDER: &str = "-";

/// Bitmask describing what changed with the latest position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ChangeFlags(u8);

impl ChangeFlags {
    /// Nothing changed
    pub const NONE: Self = Self(0x0);
    /// Grid locator changed
    pub const GRID: Self = Self(0x1);
    /// Region changed
    pub const REGION: Self = Self(0x2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for ChangeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Time reported by the receiver.
///
/// A bare time of day is reported until an RMC sentence has supplied a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FixTime {
    DateTime(DateTime<Utc>),
    TimeOfDay(NaiveTime),
}

impl fmt::Display for FixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixTime::DateTime(timestamp) => write!(f, "{}", timestamp.format("%Y/%m/%d %H:%M:%S UTC")),
            FixTime::TimeOfDay(time) => write!(f, "{} UTC", time.format("%H:%M:%S")),
        }
    }
}

/// Events emitted by the link session and the replay driver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GeoEvent {
    /// Current 6-character grid locator
    Grid { grid: String },
    /// Current region
    Region { name: String, abbreviation: String },
    /// Receiver time
    Time { time: FixTime },
    /// Position fields as received
    RawCoordinate { position: RawPosition },
    /// Free text progress or error message
    Status { message: String },
    /// Grid and/or region differ from the previous fix
    Changed { flags: ChangeFlags },
    /// A replay has finished
    ReplayDone,
}

/// Sending half of the event stream.
///
/// Emitting never fails: once the consumer is gone events are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<GeoEvent>,
}

impl EventSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GeoEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: GeoEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event consumer closed, dropping event");
        }
    }

    /// Log a message and publish it as a status event.
    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.emit(GeoEvent::Status { message });
    }

    pub fn grid(&self, grid: impl Into<String>) {
        self.emit(GeoEvent::Grid { grid: grid.into() });
    }

    pub fn region(&self, label: &RegionLabel) {
        self.emit(GeoEvent::Region {
            name: label.name.clone(),
            abbreviation: label.abbreviation.clone(),
        });
    }

    /// Blank out grid and region after unusable link data.
    pub fn placeholders(&self) {
        self.grid(PLACEHOLDER);
        self.region(&RegionLabel::placeholder());
    }
}
