//! # Geo Module
//!
//! Everything that turns a decoded coordinate into a location label.
//!
//! This module handles:
//! - Maidenhead grid locator calculation
//! - Region polygons and the containment rule used by the boundary files
//! - Loading region sets from placemark (KML) files
//! - Resolving a coordinate to exactly one region

pub mod grid;
pub mod region;
pub mod kml;
pub mod resolver;

use serde::Serialize;

pub use grid::grid_locator;
pub use region::{Region, RegionLabel, RegionSet, SharedRegions};
pub use resolver::{GeofenceResolver, Resolution};

/// Geographic position in signed decimal degrees.
///
/// Longitude is the `x` axis and latitude the `y` axis in all polygon math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    /// Longitude in [-180, 180)
    pub lon: f64,
    /// Latitude in [-90, 90)
    pub lat: f64,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// `(0, 0)` is what receivers report before they have a fix.
    pub fn is_origin(&self) -> bool {
        self.lon == 0.0 && self.lat == 0.0
    }
}
