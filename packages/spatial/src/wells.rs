//! Groundwater well attribution.
//!
//! Wells are points with an optional reported pumping volume. A well is
//! attributed to every region that contains it; only wells reporting a
//! positive volume are counted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::index::RegionIndex;

/// Cubic metres per acre-foot.
pub const ACRE_FEET_TO_CUBIC_METRES: f64 = 1233.48;

/// One reported well for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellRecord {
    pub id: String,
    pub year: i32,
    pub x: f64,
    pub y: f64,
    /// Reported volume in source units; `None` when not reported.
    pub volume: Option<f64>,
}

/// Per-region well summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellStats {
    /// Wells with positive reported volume.
    pub count: u32,
    /// Total volume in cubic metres.
    pub volume_m3: f64,
    /// `volume_m3` divided by region area, in metres of water depth.
    pub volume_per_area_m: f64,
}

/// Summarises `year`'s wells for every indexed region.
///
/// Every region appears in the result, with zero stats when no well falls
/// inside it. `unit_factor` converts source volume units to cubic metres.
#[must_use]
pub fn well_stats(
    index: &RegionIndex,
    wells: &[WellRecord],
    year: i32,
    unit_factor: f64,
) -> BTreeMap<String, WellStats> {
    let mut stats: BTreeMap<String, WellStats> = index
        .areas()
        .map(|(id, _)| (id.to_string(), WellStats::default()))
        .collect();

    for well in wells.iter().filter(|w| w.year == year) {
        let Some(volume) = well.volume.filter(|v| *v > 0.0 && v.is_finite()) else {
            continue;
        };
        for region_id in index.regions_containing(well.x, well.y) {
            if let Some(entry) = stats.get_mut(region_id) {
                entry.count += 1;
                entry.volume_m3 += volume * unit_factor;
            }
        }
    }

    for (id, entry) in &mut stats {
        if let Some(area) = index.area_m2(id)
            && area > 0.0
        {
            entry.volume_per_area_m = entry.volume_m3 / area;
        }
    }

    log::debug!(
        "Attributed {} wells for {year} across {} regions",
        wells.iter().filter(|w| w.year == year).count(),
        stats.len()
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Region;
    use crate::test_support::rect;

    fn well(id: &str, year: i32, x: f64, y: f64, volume: Option<f64>) -> WellRecord {
        WellRecord {
            id: id.to_string(),
            year,
            x,
            y,
            volume,
        }
    }

    fn index() -> RegionIndex {
        RegionIndex::new(&[
            Region::new("a", rect(0.0, 0.0, 1000.0, 1000.0)).unwrap(),
            Region::new("b", rect(500.0, 0.0, 1500.0, 1000.0)).unwrap(),
            Region::new("c", rect(5000.0, 5000.0, 6000.0, 6000.0)).unwrap(),
        ])
    }

    #[test]
    fn counts_only_positive_volume_wells_of_the_year() {
        let wells = vec![
            well("w1", 2015, 100.0, 100.0, Some(10.0)),
            well("w2", 2015, 700.0, 100.0, Some(5.0)),
            well("w3", 2015, 200.0, 200.0, Some(0.0)),
            well("w4", 2015, 300.0, 300.0, None),
            well("w5", 2014, 100.0, 100.0, Some(99.0)),
        ];
        let stats = well_stats(&index(), &wells, 2015, ACRE_FEET_TO_CUBIC_METRES);

        let a = stats["a"];
        assert_eq!(a.count, 2);
        assert!((a.volume_m3 - 15.0 * ACRE_FEET_TO_CUBIC_METRES).abs() < 1e-9);
        assert!((a.volume_per_area_m - a.volume_m3 / 1_000_000.0).abs() < 1e-12);

        assert_eq!(stats["b"].count, 1);
        assert_eq!(stats["c"], WellStats::default());
    }

    #[test]
    fn every_region_is_reported_without_wells() {
        let stats = well_stats(&index(), &[], 2015, 1.0);
        assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
