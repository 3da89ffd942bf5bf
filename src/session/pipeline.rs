//! # Fix Pipeline
//!
//! Decode → locate → resolve → publish, shared by the live session and
//! replays.
//!
//! This module handles:
//! - Merging the GGA time of day into the last RMC date
//! - Computing the grid locator and region for each GGA position
//! - Publishing events and the change bitmask

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::events::{ChangeFlags, EventSink, FixTime, GeoEvent};
use crate::geo::{grid_locator, GeofenceResolver, RegionLabel, Resolution, SharedRegions};
use crate::nmea::decoder::decode_sentence;
use crate::nmea::protocol::PositionFix;

/// What a processed line amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Not an RMC or GGA sentence
    Ignored,
    /// RMC date/time accepted
    TimeSynced,
    /// GGA carried the (0, 0) no-fix coordinate
    NoFix,
    /// GGA position located and resolved
    Located(PositionUpdate),
}

impl LineOutcome {
    /// True for outcomes that count as a valid fix
    pub fn is_fix(&self) -> bool {
        matches!(self, LineOutcome::TimeSynced | LineOutcome::Located(_))
    }
}

/// Result of locating one GGA position
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub grid: String,
    pub region: RegionLabel,
    pub changed: ChangeFlags,
}

/// Stateful per-stream fix processor
#[derive(Debug)]
pub struct FixPipeline {
    resolver: GeofenceResolver,
    events: EventSink,
    date: Option<NaiveDate>,
    last_grid: Option<String>,
    last_region: Option<String>,
}

impl FixPipeline {
    pub fn new(regions: SharedRegions, events: EventSink) -> Self {
        Self {
            resolver: GeofenceResolver::new(regions),
            events,
            date: None,
            last_grid: None,
            last_region: None,
        }
    }

    /// Decode one sentence line and publish what it yields.
    ///
    /// # Errors
    ///
    /// Returns the decoder error for malformed RMC/GGA sentences; nothing is
    /// published for them.
    pub fn process_line(&mut self, line: &str) -> Result<LineOutcome> {
        match decode_sentence(line)? {
            Some(fix) => Ok(self.apply(fix)),
            None => Ok(LineOutcome::Ignored),
        }
    }

    /// Publish a decoded fix
    pub fn apply(&mut self, fix: PositionFix) -> LineOutcome {
        match fix {
            PositionFix::Rmc { timestamp } => {
                self.date = Some(timestamp.date_naive());
                self.events.emit(GeoEvent::Time {
                    time: FixTime::DateTime(timestamp),
                });
                LineOutcome::TimeSynced
            }
            PositionFix::Gga {
                time,
                coordinate,
                raw,
            } => {
                if let Some(time) = time {
                    self.events.emit(GeoEvent::Time {
                        time: self.merge_time(time),
                    });
                }
                self.events.emit(GeoEvent::RawCoordinate { position: raw });

                let Some(resolution) = self.resolver.resolve(coordinate) else {
                    debug!("No-fix coordinate, skipping");
                    return LineOutcome::NoFix;
                };
                if let Resolution::Unknown { first_miss: true } = resolution {
                    self.events.emit(GeoEvent::Status {
                        message: "Coordinate did not match boundary file".to_string(),
                    });
                }

                let grid = grid_locator(coordinate);
                let region = resolution.label();
                let changed = self.track_changes(&grid, &region);

                self.events.grid(grid.clone());
                self.events.region(&region);
                if !changed.is_empty() {
                    self.events.emit(GeoEvent::Changed { flags: changed });
                    info!("{} {}({})", grid, region.name, region.abbreviation);
                }

                LineOutcome::Located(PositionUpdate {
                    grid,
                    region,
                    changed,
                })
            }
        }
    }

    fn merge_time(&self, time: NaiveTime) -> FixTime {
        match self.date {
            Some(date) => FixTime::DateTime(Utc.from_utc_datetime(&date.and_time(time))),
            None => FixTime::TimeOfDay(time),
        }
    }

    fn track_changes(&mut self, grid: &str, region: &RegionLabel) -> ChangeFlags {
        let mut changed = ChangeFlags::NONE;
        if self.last_grid.as_deref() != Some(grid) {
            changed.insert(ChangeFlags::GRID);
            self.last_grid = Some(grid.to_string());
        }
        if self.last_region.as_deref() != Some(region.abbreviation.as_str()) {
            changed.insert(ChangeFlags::REGION);
            self.last_region = Some(region.abbreviation.clone());
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Coordinate, Region, RegionSet};
    use tokio::sync::mpsc::UnboundedReceiver;

    const RMC: &str = "$GPRMC,154007.00,A,3835.17128,N,07745.57692,W,0.070,,220319,,,A*67";
    const GGA: &str = "$GPGGA,002852.00,3835.14680,N,07745.58318,W,1,03,5.60,127.9,M,-34.5,M,,*61";
    const GGA_NO_FIX: &str = "$GPGGA,002853.00,0000.00000,N,00000.00000,E,0,00,99.9,,M,,M,,*48";
    const GGA_SYDNEY: &str = "$GNGGA,120000.00,3351.50000,S,15112.60000,E,1,08,0.9,20.0,M,,M,,*4F";

    fn fauquier() -> SharedRegions {
        let region = Region::new(
            "Fauquier",
            "FAU",
            vec![
                Coordinate::new(-78.0, 38.0),
                Coordinate::new(-78.0, 39.0),
                Coordinate::new(-77.0, 39.0),
                Coordinate::new(-77.0, 38.0),
            ],
        )
        .unwrap();
        SharedRegions::new(RegionSet::new(vec![region]))
    }

    fn drain(rx: &mut UnboundedReceiver<GeoEvent>) -> Vec<GeoEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_rmc_then_gga() {
        let (events, mut rx) = EventSink::channel();
        let mut pipeline = FixPipeline::new(fauquier(), events);

        assert_eq!(pipeline.process_line(RMC).unwrap(), LineOutcome::TimeSynced);
        let outcome = pipeline.process_line(GGA).unwrap();

        let expected = PositionUpdate {
            grid: "FM18co".to_string(),
            region: RegionLabel::new("Fauquier", "FAU"),
            changed: ChangeFlags::GRID | ChangeFlags::REGION,
        };
        assert_eq!(outcome, LineOutcome::Located(expected));

        let published = drain(&mut rx);
        assert_eq!(published.len(), 6);
        match &published[1] {
            GeoEvent::Time { time: FixTime::DateTime(ts) } => {
                assert_eq!(ts.to_string(), "2019-03-22 00:28:52 UTC");
            }
            other => panic!("Expected merged date-time, got: {:?}", other),
        }
        assert!(matches!(published[2], GeoEvent::RawCoordinate { .. }));
        assert_eq!(published[3], GeoEvent::Grid { grid: "FM18co".to_string() });
        assert_eq!(
            published[4],
            GeoEvent::Region { name: "Fauquier".to_string(), abbreviation: "FAU".to_string() }
        );
        assert_eq!(published[5], GeoEvent::Changed { flags: ChangeFlags::GRID | ChangeFlags::REGION });
    }

    #[test]
    fn test_repeat_fix_reports_no_change() {
        let (events, mut rx) = EventSink::channel();
        let mut pipeline = FixPipeline::new(fauquier(), events);

        pipeline.process_line(GGA).unwrap();
        drain(&mut rx);

        match pipeline.process_line(GGA).unwrap() {
            LineOutcome::Located(update) => assert!(update.changed.is_empty()),
            other => panic!("Expected located fix, got: {:?}", other),
        }
        assert!(!drain(&mut rx).iter().any(|e| matches!(e, GeoEvent::Changed { .. })));
    }

    #[test]
    fn test_gga_before_rmc_reports_time_of_day() {
        let (events, mut rx) = EventSink::channel();
        let mut pipeline = FixPipeline::new(fauquier(), events);

        pipeline.process_line(GGA).unwrap();
        assert_eq!(
            drain(&mut rx)[0],
            GeoEvent::Time { time: FixTime::TimeOfDay(NaiveTime::from_hms_opt(0, 28, 52).unwrap()) }
        );
    }

    #[test]
    fn test_no_fix_is_skipped() {
        let (events, mut rx) = EventSink::channel();
        let mut pipeline = FixPipeline::new(fauquier(), events);

        assert_eq!(pipeline.process_line(GGA_NO_FIX).unwrap(), LineOutcome::NoFix);
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, GeoEvent::Grid { .. } | GeoEvent::Region { .. })));
    }

    #[test]
    fn test_unmatched_fix_reports_unknown_once() {
        let (events, mut rx) = EventSink::channel();
        let mut pipeline = FixPipeline::new(fauquier(), events);

        pipeline.process_line(GGA_SYDNEY).unwrap();
        pipeline.process_line(GGA_SYDNEY).unwrap();

        let published = drain(&mut rx);
        let statuses = published
            .iter()
            .filter(|e| matches!(e, GeoEvent::Status { .. }))
            .count();
        assert_eq!(statuses, 1);
        assert!(published.contains(&GeoEvent::Region {
            name: "Unknown".to_string(),
            abbreviation: "UNK".to_string(),
        }));
        assert!(published.contains(&GeoEvent::Grid { grid: "QF56od".to_string() }));
    }

    #[test]
    fn test_other_sentences_ignored() {
        let (events, mut rx) = EventSink::channel();
        let mut pipeline = FixPipeline::new(fauquier(), events);

        assert_eq!(
            pipeline.process_line("$GPGSA,A,3,10,,,*0E").unwrap(),
            LineOutcome::Ignored
        );
        assert!(pipeline.process_line("$GPRMC,,V,,,,,,,,,,N*53").is_err());
        assert!(drain(&mut rx).is_empty());
    }
}
