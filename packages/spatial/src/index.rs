//! R-tree index over region polygons.

use std::collections::BTreeMap;

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

use crate::Region;

/// A region polygon stored in the R-tree.
struct RegionEntry {
    id: String,
    area_m2: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-polygon index over a set of regions.
///
/// Regions may overlap (e.g. place-of-use polygons that share parcels), so
/// lookups return every containing region rather than the first match.
pub struct RegionIndex {
    tree: RTree<RegionEntry>,
    areas: BTreeMap<String, f64>,
}

impl RegionIndex {
    /// Builds the index.
    #[must_use]
    pub fn new(regions: &[Region]) -> Self {
        let entries: Vec<RegionEntry> = regions
            .iter()
            .map(|region| RegionEntry {
                id: region.id().to_string(),
                area_m2: region.area_m2(),
                envelope: compute_envelope(region.geometry()),
                polygon: region.geometry().clone(),
            })
            .collect();

        let areas = entries.iter().map(|e| (e.id.clone(), e.area_m2)).collect();

        log::debug!("Indexed {} regions", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
            areas,
        }
    }

    /// Identifiers of every region containing (`x`, `y`), sorted.
    #[must_use]
    pub fn regions_containing(&self, x: f64, y: f64) -> Vec<&str> {
        let point = geo::Point::new(x, y);
        let query_env = AABB::from_point([x, y]);

        let mut ids: Vec<&str> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Area in square metres of region `id`.
    #[must_use]
    pub fn area_m2(&self, id: &str) -> Option<f64> {
        self.areas.get(id).copied()
    }

    /// Every indexed region id with its area, sorted by id.
    pub fn areas(&self) -> impl Iterator<Item = (&str, f64)> {
        self.areas.iter().map(|(id, area)| (id.as_str(), *area))
    }

    /// Number of indexed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Computes the axis-aligned bounding box of a multi-polygon for the R-tree.
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rect;

    fn index() -> RegionIndex {
        RegionIndex::new(&[
            Region::new("a", rect(0.0, 0.0, 100.0, 100.0)).unwrap(),
            Region::new("b", rect(50.0, 0.0, 150.0, 100.0)).unwrap(),
            Region::new("c", rect(500.0, 500.0, 600.0, 600.0)).unwrap(),
        ])
    }

    #[test]
    fn overlapping_regions_all_match() {
        let index = index();
        assert_eq!(index.regions_containing(75.0, 50.0), vec!["a", "b"]);
        assert_eq!(index.regions_containing(25.0, 50.0), vec!["a"]);
        assert!(index.regions_containing(300.0, 300.0).is_empty());
    }

    #[test]
    fn areas_are_looked_up_by_id() {
        let index = index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.area_m2("c"), Some(10_000.0));
        assert_eq!(index.area_m2("missing"), None);
        let ids: Vec<&str> = index.areas().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
