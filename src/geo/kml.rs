//! # Placemark Region Loader
//!
//! Reads region outer boundaries from a KML placemark file.
//!
//! Each placemark label has the form `<DisplayName>=<ABR> <suffix>`. Only
//! suffix `1` marks an outer boundary; other suffixes are inner rings or
//! annotations and are skipped. Coordinates are whitespace separated
//! `lon,lat[,alt]` tuples. A placemark may carry several `<coordinates>`
//! blocks, one per polygon of a multi-part region.
//!
//! ```text
//! <Placemark>
//!   <name>Fauquier=FAU 1</name>
//!   <coordinates>
//!     -77.96,38.93 -77.53,38.84 -77.64,38.47
//!   </coordinates>
//! </Placemark>
//! ```

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::region::MIN_RING_POINTS;
use super::{Coordinate, Region};
use crate::error::{GeoDetectorError, Result};

fn placemark_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<Placemark\b[^>]*>(.*?)</Placemark>").expect("valid placemark regex")
    })
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<name>(.*?)</name>").expect("valid name regex"))
}

fn coordinates_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<coordinates>(.*?)</coordinates>").expect("valid coordinates regex")
    })
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+?)=(\w{3}) 1$").expect("valid label regex"))
}

/// Split a placemark label into display name and abbreviation.
///
/// Returns `None` unless the label marks an outer boundary (suffix `1`).
///
/// # Examples
///
/// ```
/// use geo_detector::geo::kml::parse_label;
///
/// assert_eq!(
///     parse_label("Fauquier=FAU 1"),
///     Some(("Fauquier".to_string(), "FAU".to_string()))
/// );
/// assert_eq!(parse_label("Fauquier=FAU 2"), None);
/// ```
pub fn parse_label(text: &str) -> Option<(String, String)> {
    let caps = label_pattern().captures(text.trim())?;
    Some((caps[1].trim().to_string(), caps[2].to_string()))
}

/// Read and parse a region file.
///
/// # Errors
///
/// Returns `RegionSource` if the file cannot be read or holds an
/// unparseable coordinate.
pub fn load_regions<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        GeoDetectorError::RegionSource(format!("cannot read {}: {}", path.display(), e))
    })?;
    let regions = parse_regions(&contents)?;
    info!("Region file {} loaded ({} regions)", path.display(), regions.len());
    Ok(regions)
}

/// Parse the outer boundary of every labelled placemark, in file order.
///
/// Every `<coordinates>` block of a placemark is closed and chained into
/// the same region.
pub fn parse_regions(document: &str) -> Result<Vec<Region>> {
    let mut regions = Vec::new();

    for placemark in placemark_pattern().captures_iter(document) {
        let body = &placemark[1];

        let Some((name, abbreviation)) = name_pattern()
            .captures_iter(body)
            .find_map(|caps| parse_label(&caps[1]))
        else {
            continue;
        };

        let mut rings = Vec::new();
        for block in coordinates_pattern().captures_iter(body) {
            let points = parse_coordinates(&block[1]).map_err(|e| {
                GeoDetectorError::RegionSource(format!("{} ({}): {}", name, abbreviation, e))
            })?;
            if points.len() < MIN_RING_POINTS {
                warn!(
                    "{} ({}) boundary block has {} points, skipping",
                    name,
                    abbreviation,
                    points.len()
                );
                continue;
            }
            rings.push(points);
        }

        if rings.is_empty() {
            warn!("Region {} ({}) has no usable coordinates, skipping", name, abbreviation);
            continue;
        }

        debug!("Loading {} ({}), {} boundary blocks", abbreviation, name, rings.len());
        match Region::from_rings(name, abbreviation, rings) {
            Ok(region) => regions.push(region),
            Err(e) => warn!("Skipping region: {}", e),
        }
    }

    Ok(regions)
}

fn parse_coordinates(text: &str) -> std::result::Result<Vec<Coordinate>, String> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let lon = parts.next().and_then(|v| v.parse::<f64>().ok());
            let lat = parts.next().and_then(|v| v.parse::<f64>().ok());
            match (lon, lat) {
                (Some(lon), Some(lat)) => Ok(Coordinate::new(lon, lat)),
                _ => Err(format!("invalid coordinate {:?}", tuple)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://earth.google.com/kml/2.1">
<Document>
  <Placemark>
    <name>Fauquier=FAU 1</name>
    <Polygon><outerBoundaryIs><LinearRing><coordinates>
      -77.96,38.93
      -77.53,38.84
      -77.64,38.47
      -78.00,38.60
    </coordinates></LinearRing></outerBoundaryIs></Polygon>
  </Placemark>
  <Placemark>
    <name>Fauquier=FAU 2</name>
    <coordinates>-77.8,38.7 -77.7,38.7 -77.7,38.6</coordinates>
  </Placemark>
  <Placemark id="city">
    <name>Manassas City=MNC 1</name>
    <coordinates>-77.49,38.76,0 -77.44,38.77,0 -77.45,38.73,0</coordinates>
  </Placemark>
  <Placemark>
    <name>Sliver=SLV 1</name>
    <coordinates>-77.0,38.0 -77.1,38.1</coordinates>
  </Placemark>
</Document>
</kml>"#;

    #[test]
    fn test_parse_label() {
        assert_eq!(
            parse_label(" Prince William=PWM 1 "),
            Some(("Prince William".to_string(), "PWM".to_string()))
        );
        assert_eq!(parse_label("Fauquier=FAU 10"), None);
        assert_eq!(parse_label("Fauquier=FA 1"), None);
        assert_eq!(parse_label("Fauquier"), None);
    }

    #[test]
    fn test_parse_regions_outer_boundaries_only() {
        let regions = parse_regions(DOCUMENT).unwrap();
        let abbreviations: Vec<&str> = regions.iter().map(|r| r.abbreviation()).collect();
        assert_eq!(abbreviations, vec!["FAU", "MNC"]);

        let fauquier = &regions[0];
        assert_eq!(fauquier.name(), "Fauquier");
        assert_eq!(fauquier.ring().len(), 5);
        assert_eq!(fauquier.first_vertex(), Coordinate::new(-77.96, 38.93));
        assert_eq!(fauquier.ring()[4], fauquier.first_vertex());

        // Altitude is ignored
        assert_eq!(regions[1].first_vertex(), Coordinate::new(-77.49, 38.76));
    }

    #[test]
    fn test_parse_regions_multi_polygon() {
        let document = r#"<Placemark>
  <name>Islands=ISL 1</name>
  <MultiGeometry>
    <Polygon><coordinates>0,0 0,10 10,10 10,0</coordinates></Polygon>
    <Polygon><coordinates>20,20 20,30 30,30 30,20</coordinates></Polygon>
    <Polygon><coordinates>40,40 41,41</coordinates></Polygon>
  </MultiGeometry>
</Placemark>"#;
        let regions = parse_regions(document).unwrap();
        assert_eq!(regions.len(), 1);

        let islands = &regions[0];
        assert_eq!(islands.ring().len(), 10);
        assert_eq!(islands.ring()[4], Coordinate::new(0.0, 0.0));
        assert_eq!(islands.ring()[9], Coordinate::new(20.0, 20.0));
        assert!(islands.contains(Coordinate::new(5.0, 4.0)));
        assert!(islands.contains(Coordinate::new(25.0, 25.0)));
    }

    #[test]
    fn test_parse_regions_bad_coordinate() {
        let document = "<Placemark><name>Bad=BAD 1</name>\
                        <coordinates>-77.0,38.0 x,y -77.1,38.1</coordinates></Placemark>";
        assert!(matches!(
            parse_regions(document),
            Err(GeoDetectorError::RegionSource(_))
        ));
    }

    #[test]
    fn test_load_regions_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();
        file.flush().unwrap();

        let regions = load_regions(file.path()).unwrap();
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_load_regions_missing_file() {
        let result = load_regions("/nonexistent/boundaries.kml");
        assert!(matches!(result, Err(GeoDetectorError::RegionSource(_))));
    }
}
