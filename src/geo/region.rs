//! # Regions
//!
//! Named boundary polygons and the set they are resolved against.
//!
//! ## Containment rule
//!
//! [`Region::contains`] is not a textbook crossing-number test. For every
//! edge of the closed ring that spans the point's longitude it scores +1 when
//! the edge lies on or above the point and -1 when it lies below, then
//! reports containment when `(matched_edges - |score|) % 4 != 0`. Existing
//! boundary files were tuned against this exact behavior, including exact
//! vertex hits, so it must not be swapped for a "better" algorithm.

use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::{kml, Coordinate};
use crate::error::{GeoDetectorError, Result};
use crate::events::{EventSink, PLACEHOLDER};

/// Minimum number of distinct ring points before closing.
pub const MIN_RING_POINTS: usize = 3;

/// Display name and abbreviation of a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionLabel {
    pub name: String,
    pub abbreviation: String,
}

impl RegionLabel {
    pub fn new(name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbreviation: abbreviation.into(),
        }
    }

    /// Returned when a coordinate matches no region.
    pub fn unknown() -> Self {
        Self::new("Unknown", "UNK")
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER, PLACEHOLDER)
    }
}

/// A named polygon with a closed outer ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    label: RegionLabel,
    ring: Vec<Coordinate>,
}

impl Region {
    /// Create a region from its open ring; the ring is closed here.
    ///
    /// # Errors
    ///
    /// Returns `RegionSource` if fewer than three points are given.
    pub fn new(
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        points: Vec<Coordinate>,
    ) -> Result<Self> {
        Self::from_rings(name, abbreviation, vec![points])
    }

    /// Create a region from several open rings (e.g. a county with islands).
    ///
    /// Each ring is closed on its own first point and the closed rings are
    /// chained in order into one boundary.
    ///
    /// # Errors
    ///
    /// Returns `RegionSource` if no ring is given or any ring has fewer than
    /// three points.
    pub fn from_rings(
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        rings: Vec<Vec<Coordinate>>,
    ) -> Result<Self> {
        let label = RegionLabel::new(name, abbreviation);
        if rings.is_empty() {
            return Err(GeoDetectorError::RegionSource(format!(
                "{} ({}) has no boundary",
                label.name, label.abbreviation
            )));
        }

        let mut boundary = Vec::with_capacity(rings.iter().map(|r| r.len() + 1).sum());
        for mut points in rings {
            if points.len() < MIN_RING_POINTS {
                return Err(GeoDetectorError::RegionSource(format!(
                    "{} ({}) has {} points, at least {} required",
                    label.name,
                    label.abbreviation,
                    points.len(),
                    MIN_RING_POINTS
                )));
            }
            points.push(points[0]);
            boundary.append(&mut points);
        }

        Ok(Self { label, ring: boundary })
    }

    pub fn label(&self) -> &RegionLabel {
        &self.label
    }

    pub fn name(&self) -> &str {
        &self.label.name
    }

    pub fn abbreviation(&self) -> &str {
        &self.label.abbreviation
    }

    /// Closed ring; the first and last points are equal.
    pub fn ring(&self) -> &[Coordinate] {
        &self.ring
    }

    pub fn first_vertex(&self) -> Coordinate {
        self.ring[0]
    }

    /// Parity containment test over consecutive ring edges.
    pub fn contains(&self, point: Coordinate) -> bool {
        let (x, y) = (point.lon, point.lat);
        let mut score: i64 = 0;
        let mut matched: i64 = 0;

        for edge in self.ring.windows(2) {
            let (p1, p2) = (edge[0], edge[1]);

            let edge_y = if x == p1.lon {
                p1.lat
            } else if x == p2.lon {
                p2.lat
            } else if (x >= p1.lon && x <= p2.lon) || (x >= p2.lon && x <= p1.lon) {
                // y = mx + b through both vertices
                let m = (p2.lat - p1.lat) / (p2.lon - p1.lon);
                let b = p1.lat - m * p1.lon;
                m * x + b
            } else {
                continue;
            };

            score += if edge_y >= y { 1 } else { -1 };
            matched += 1;
        }

        (matched - score.abs()) % 4 != 0
    }
}

/// Ordered collection of regions, replaced wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Load the outer boundaries from a placemark file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(kml::load_regions(path)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Handle to the active region set, shared by the session and replays.
///
/// Readers take an `Arc` snapshot, so a reload never tears a set that is
/// being iterated.
#[derive(Debug, Clone, Default)]
pub struct SharedRegions {
    active: Arc<RwLock<Arc<RegionSet>>>,
}

impl SharedRegions {
    pub fn new(set: RegionSet) -> Self {
        Self {
            active: Arc::new(RwLock::new(Arc::new(set))),
        }
    }

    pub fn snapshot(&self) -> Arc<RegionSet> {
        Arc::clone(&self.active.read())
    }

    pub fn replace(&self, set: RegionSet) {
        *self.active.write() = Arc::new(set);
    }

    /// Load a region file and install it.
    ///
    /// On failure the current set stays installed and a status event
    /// reports the problem.
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of regions loaded
    pub fn load_file<P: AsRef<Path>>(&self, path: P, events: &EventSink) -> Result<usize> {
        let path = path.as_ref();
        match RegionSet::load(path) {
            Ok(set) => {
                let count = set.len();
                self.replace(set);
                events.status(format!("Loaded {} regions from {}", count, path.display()));
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Failed to load region file {}: {}", path.display(), e);
                events.status(format!("Error reading region file [{}]!", path.display()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str, abbr: &str, min: f64, max: f64) -> Region {
        Region::new(
            name,
            abbr,
            vec![
                Coordinate::new(min, min),
                Coordinate::new(min, max),
                Coordinate::new(max, max),
                Coordinate::new(max, min),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ring_is_closed() {
        let region = square("Square", "SQR", 0.0, 10.0);
        let ring = region.ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[ring.len() - 1]);
        assert_eq!(region.first_vertex(), Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_too_few_points() {
        let result = Region::new(
            "Line",
            "LIN",
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)],
        );
        assert!(matches!(result, Err(GeoDetectorError::RegionSource(_))));
    }

    #[test]
    fn test_square_containment() {
        let region = square("Square", "SQR", 0.0, 10.0);
        assert!(region.contains(Coordinate::new(5.0, 5.0)));
        assert!(!region.contains(Coordinate::new(15.0, 15.0)));
        assert!(!region.contains(Coordinate::new(5.0, 15.0)));
        assert!(!region.contains(Coordinate::new(5.0, -1.0)));
    }

    #[test]
    fn test_boundary_coincidences() {
        let region = square("Square", "SQR", 0.0, 10.0);
        // On the western edge: two vertex hits and one spanning edge
        assert!(region.contains(Coordinate::new(0.0, 5.0)));
        // On a corner three edges match, all above, and (3 - 3) % 4 == 0
        assert!(!region.contains(Coordinate::new(0.0, 0.0)));
    }

    #[test]
    fn test_triangle_containment() {
        let region = Region::new(
            "Triangle",
            "TRI",
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(5.0, 10.0),
                Coordinate::new(10.0, 0.0),
            ],
        )
        .unwrap();
        assert!(region.contains(Coordinate::new(5.0, 2.0)));
        assert!(!region.contains(Coordinate::new(1.0, 8.0)));
    }

    #[test]
    fn test_multi_ring_region() {
        let ring = |lo: f64, hi: f64| {
            vec![
                Coordinate::new(lo, lo),
                Coordinate::new(lo, hi),
                Coordinate::new(hi, hi),
                Coordinate::new(hi, lo),
            ]
        };
        let region = Region::from_rings("Islands", "ISL", vec![ring(0.0, 10.0), ring(20.0, 30.0)]).unwrap();

        assert_eq!(region.ring().len(), 10);
        assert_eq!(region.ring()[4], Coordinate::new(0.0, 0.0));
        assert_eq!(region.ring()[9], Coordinate::new(20.0, 20.0));
        assert!(region.contains(Coordinate::new(5.0, 4.0)));
        assert!(region.contains(Coordinate::new(25.0, 25.0)));
        assert!(!region.contains(Coordinate::new(15.0, 25.0)));

        assert!(matches!(
            Region::from_rings("Empty", "EMP", vec![]),
            Err(GeoDetectorError::RegionSource(_))
        ));
    }

    #[test]
    fn test_shared_regions_swap() {
        let shared = SharedRegions::default();
        assert!(shared.snapshot().is_empty());

        let before = shared.snapshot();
        shared.replace(RegionSet::new(vec![square("Square", "SQR", 0.0, 10.0)]));

        // Old snapshots are unaffected by the swap
        assert!(before.is_empty());
        assert_eq!(shared.snapshot().len(), 1);
    }

    #[test]
    fn test_load_missing_file_keeps_current_set() {
        let shared = SharedRegions::new(RegionSet::new(vec![square("Square", "SQR", 0.0, 10.0)]));
        let (events, mut rx) = EventSink::channel();

        let result = shared.load_file("/nonexistent/regions.kml", &events);
        assert!(matches!(result, Err(GeoDetectorError::RegionSource(_))));
        assert_eq!(shared.snapshot().len(), 1);

        match rx.try_recv().unwrap() {
            crate::events::GeoEvent::Status { message } => {
                assert!(message.contains("/nonexistent/regions.kml"));
            }
            other => panic!("Expected status event, got: {:?}", other),
        }
    }
}
