//! # NMEA Module
//!
//! Decoding of the positioning sentences received from the GPS receiver.
//!
//! This module handles:
//! - Classifying lines by their 5-character tag
//! - RMC decoding (UTC date and time)
//! - GGA decoding (time of day and position)
//! - Degrees/minutes to decimal degrees conversion

pub mod protocol;
pub mod decoder;
