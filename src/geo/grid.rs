//! # Maidenhead Grid Locator
//!
//! Converts a coordinate to a 6-character Maidenhead locator.
//!
//! | Level | Size (lon x lat) | Characters |
//! |-------|------------------|------------|
//! | Field | 20° x 10° | `A`-`R` |
//! | Square | 2° x 1° | `0`-`9` |
//! | Subsquare | 5' x 2.5' | `a`-`x` |
//!
//! ## Usage
//!
//! ```
//! use geo_detector::geo::{grid_locator, Coordinate};
//!
//! assert_eq!(grid_locator(Coordinate::new(-76.0, 38.0)), "FM28aa");
//! ```

use super::Coordinate;

/// Field size in degrees (longitude, latitude).
pub const FIELD_SIZE: (f64, f64) = (20.0, 10.0);
/// Square size in degrees (longitude, latitude).
pub const SQUARE_SIZE: (f64, f64) = (2.0, 1.0);
/// Subsquare size in degrees (longitude, latitude).
pub const SUBSQUARE_SIZE: (f64, f64) = (2.0 / 24.0, 1.0 / 24.0);

/// Compute the 6-character locator for a coordinate.
///
/// Output order is longitude field, latitude field, longitude square,
/// latitude square, longitude subsquare, latitude subsquare.
///
/// The coordinate must lie within longitude [-180, 180) and latitude
/// [-90, 90); the sentence decoder only produces such coordinates.
#[must_use]
pub fn grid_locator(coord: Coordinate) -> String {
    // Move the origin to the south-west corner of the world
    let (lon_field, lon_square, lon_sub) = split_axis(coord.lon + 180.0, 0);
    let (lat_field, lat_square, lat_sub) = split_axis(coord.lat + 90.0, 1);

    [
        char::from(b'A' + lon_field),
        char::from(b'A' + lat_field),
        char::from(b'0' + lon_square),
        char::from(b'0' + lat_square),
        char::from(b'a' + lon_sub),
        char::from(b'a' + lat_sub),
    ]
    .iter()
    .collect()
}

/// Field, square and subsquare indices along one axis (0 = lon, 1 = lat).
fn split_axis(shifted: f64, axis: usize) -> (u8, u8, u8) {
    let (field_size, square_size, sub_size) = if axis == 0 {
        (FIELD_SIZE.0, SQUARE_SIZE.0, SUBSQUARE_SIZE.0)
    } else {
        (FIELD_SIZE.1, SQUARE_SIZE.1, SUBSQUARE_SIZE.1)
    };

    let field = (shifted / field_size).floor();
    let square = ((shifted - field * field_size) / square_size).floor();
    let sub = ((shifted - field * field_size - square * square_size) / sub_size).floor();

    (field as u8, square as u8, sub as u8)
}
