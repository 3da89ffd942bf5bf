//! # Geo Detector Library
//!
//! Track the Maidenhead grid square and county/city of a serial GPS receiver.
//!
//! This library provides the NMEA sentence decoder, the grid locator, region
//! geofencing and the link session that ties them to a live receiver or a
//! recorded sentence log.

pub mod config;
pub mod error;
pub mod events;
pub mod geo;
pub mod nmea;
pub mod replay;
pub mod serial;
pub mod session;
pub mod telemetry;
