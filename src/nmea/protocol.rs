//! # NMEA Sentence Definitions
//!
//! Tags and typed fixes for the two sentence kinds the detector consumes.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::geo::Coordinate;

/// Every sentence starts with this character, followed by the 5-character tag.
pub const NMEA_SENTENCE_START: char = '$';

/// Length of the talker + sentence identifier tag (e.g. `GPRMC`).
pub const NMEA_TAG_LEN: usize = 5;

/// Tags decoded as recommended-minimum (date/time) sentences.
pub const NMEA_RMC_TAGS: &[&str] = &["GPRMC", "GNRMC"];

/// Tags decoded as fix (position) sentences.
pub const NMEA_GGA_TAGS: &[&str] = &["GPGGA", "GNGGA"];

/// RMC field holding the `HHMMSS.ss` time of day.
pub const RMC_FIELD_TIME: usize = 1;
/// RMC field holding the `DDMMYY` date.
pub const RMC_FIELD_DATE: usize = 9;

/// GGA field holding the `HHMMSS.ss` time of day.
pub const GGA_FIELD_TIME: usize = 1;
/// GGA field holding the `DDMM.mmmm` latitude.
pub const GGA_FIELD_LAT: usize = 2;
/// GGA field holding the latitude hemisphere (`N`/`S`).
pub const GGA_FIELD_LAT_HEMISPHERE: usize = 3;
/// GGA field holding the `DDDMM.mmmm` longitude.
pub const GGA_FIELD_LON: usize = 4;
/// GGA field holding the longitude hemisphere (`E`/`W`).
pub const GGA_FIELD_LON_HEMISPHERE: usize = 5;

/// Dates carry a two digit year; the century is fixed.
pub const NMEA_CENTURY: i32 = 2000;

/// Sentence kinds understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentenceKind {
    /// Recommended minimum data: carries the calendar date and time
    Rmc,
    /// Fix data: carries time of day and position
    Gga,
}

impl SentenceKind {
    /// Look up the sentence kind for a 5-character tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if NMEA_RMC_TAGS.contains(&tag) {
            Some(SentenceKind::Rmc)
        } else if NMEA_GGA_TAGS.contains(&tag) {
            Some(SentenceKind::Gga)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SentenceKind::Rmc => "RMC",
            SentenceKind::Gga => "GGA",
        }
    }
}

impl fmt::Display for SentenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position fields exactly as they appeared in a GGA sentence.
///
/// Kept alongside the decoded [`Coordinate`] so consumers can show what the
/// receiver actually reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawPosition {
    /// Latitude as `DDMM.mmmm`
    pub latitude: String,
    /// `N` or `S`
    pub lat_hemisphere: String,
    /// Longitude as `DDDMM.mmmm`
    pub longitude: String,
    /// `E` or `W`
    pub lon_hemisphere: String,
}

impl fmt::Display for RawPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}  {}{}",
            self.latitude, self.lat_hemisphere, self.longitude, self.lon_hemisphere
        )
    }
}

/// A single decoded sentence.
///
/// RMC fixes only carry the date and time; GGA fixes only carry the time of
/// day and the position. Callers merge the GGA time of day into the date of
/// the most recent RMC.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionFix {
    /// Date and time from an RMC sentence
    Rmc {
        /// UTC date-time
        timestamp: DateTime<Utc>,
    },
    /// Time of day and position from a GGA sentence
    Gga {
        /// UTC time of day, `None` when the receiver left the field empty
        time: Option<NaiveTime>,
        /// Decimal degrees
        coordinate: Coordinate,
        /// Undecoded position fields
        raw: RawPosition,
    },
}

impl PositionFix {
    pub fn kind(&self) -> SentenceKind {
        match self {
            PositionFix::Rmc { .. } => SentenceKind::Rmc,
            PositionFix::Gga { .. } => SentenceKind::Gga,
        }
    }
}
