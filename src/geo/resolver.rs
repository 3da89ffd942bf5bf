//! # Geofence Resolver
//!
//! Resolves a coordinate to exactly one region of the active set.
//!
//! When several regions match (a city nested in a county, or overlapping
//! counties) every ordered pair `(a, b)` is tested: if `a` does not contain
//! the first vertex of `b`, `a` becomes the candidate. The last candidate in
//! iteration order wins, falling back to the first match.

use tracing::warn;

use super::{Coordinate, Region, RegionLabel, RegionSet, SharedRegions};

/// Outcome of resolving one coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The coordinate lies in this region
    Matched(RegionLabel),
    /// No region contains the coordinate
    Unknown {
        /// True for the first miss after a successful resolution
        first_miss: bool,
    },
}

impl Resolution {
    /// Region label to publish; the `Unknown`/`UNK` sentinel for misses.
    pub fn label(&self) -> RegionLabel {
        match self {
            Resolution::Matched(label) => label.clone(),
            Resolution::Unknown { .. } => RegionLabel::unknown(),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

/// Resolves coordinates against the shared region set.
///
/// Holds the miss-warning state: the first miss of a streak is reported,
/// repeats stay quiet until a coordinate resolves again.
#[derive(Debug, Clone)]
pub struct GeofenceResolver {
    regions: SharedRegions,
    miss_reported: bool,
}

impl GeofenceResolver {
    pub fn new(regions: SharedRegions) -> Self {
        Self {
            regions,
            miss_reported: false,
        }
    }

    /// Resolve a coordinate.
    ///
    /// Returns `None` for the `(0, 0)` no-fix coordinate, which callers skip.
    pub fn resolve(&mut self, coord: Coordinate) -> Option<Resolution> {
        if coord.is_origin() {
            return None;
        }

        let set = self.regions.snapshot();
        match select_region(&set, coord) {
            Some(region) => {
                self.miss_reported = false;
                Some(Resolution::Matched(region.label().clone()))
            }
            None => {
                let first_miss = !self.miss_reported;
                if first_miss {
                    warn!(
                        "Coordinate ({:.6}, {:.6}) did not match any region",
                        coord.lon, coord.lat
                    );
                    self.miss_reported = true;
                }
                Some(Resolution::Unknown { first_miss })
            }
        }
    }
}

/// Pick the single region containing `coord`, applying the overlap tie-break.
pub fn select_region(set: &RegionSet, coord: Coordinate) -> Option<&Region> {
    let matches: Vec<&Region> = set.iter().filter(|r| r.contains(coord)).collect();

    match matches.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut chosen = None;
            for (i, outer) in matches.iter().enumerate() {
                for (j, other) in matches.iter().enumerate() {
                    if i != j && !outer.contains(other.first_vertex()) {
                        chosen = Some(*outer);
                    }
                }
            }
            chosen.or_else(|| matches.first().copied())
        }
    }
}
