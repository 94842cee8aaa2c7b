//! Grouped zonal sums and zonal means.
//!
//! Regions are sampled on a lattice of spacing `scale` aligned to the raster
//! origin. Each lattice point whose centre falls strictly inside a region
//! reads the pixel under it. At `scale` equal to the native pixel size every
//! lattice point is a pixel centre, so a grouped sum is exactly the sum of
//! weights of the pixels whose centres lie in the region. Coarser scales
//! approximate the same sum with fewer samples.

use std::collections::BTreeMap;

use cropstats_raster_models::{GeoTransform, Grid};
use cropstats_spatial::Region;
use cropstats_zonal_models::{CategoryCode, ZonalSum};
use geo::Contains;

use crate::AggregationError;

/// Sums `weight` per (region, category of `categorical`).
///
/// A sample contributes `weight_density × scale²`, where `weight_density` is
/// the weight pixel's value divided by the native pixel area. Masked
/// categorical or weight pixels contribute nothing. Output is sorted by
/// region id then category, and zero sums are omitted.
///
/// # Errors
///
/// Returns [`AggregationError::InvalidScale`] for a non-positive or
/// non-finite scale and [`AggregationError::IncompatibleExtents`] if the two
/// grids differ in geometry.
pub fn grouped_zonal_sum(
    categorical: &Grid<CategoryCode>,
    weight: &Grid<f64>,
    regions: &[Region],
    scale: f64,
) -> Result<Vec<ZonalSum>, AggregationError> {
    validate_scale(scale)?;
    if !categorical.same_geometry(weight) {
        return Err(AggregationError::IncompatibleExtents {
            message: "categorical and weight rasters differ".to_string(),
        });
    }

    let native_area = categorical.transform().pixel_area();
    let sample_area = scale * scale;
    let mut sums: BTreeMap<(&str, CategoryCode), f64> = BTreeMap::new();

    for region in regions {
        let mut samples = 0_usize;
        for_each_sample(categorical.transform(), region, scale, |x, y| {
            let Some((row, col)) = categorical.cell_index(x, y) else {
                return;
            };
            samples += 1;
            if let (Some(code), Some(w)) = (categorical.get(row, col), weight.get(row, col))
                && w.is_finite()
            {
                *sums.entry((region.id(), code)).or_insert(0.0) += w / native_area * sample_area;
            }
        });
        log::trace!("Region '{}': {samples} samples at {scale} m", region.id());
    }

    Ok(sums
        .into_iter()
        .filter(|(_, sum)| *sum != 0.0)
        .map(|((region_id, category), sum)| ZonalSum {
            region_id: region_id.to_string(),
            category,
            sum,
        })
        .collect())
}

/// Mean of the unmasked pixels of `raster` sampled inside `region`.
///
/// Returns `Ok(None)` when no unmasked pixel is sampled.
///
/// # Errors
///
/// Returns [`AggregationError::InvalidScale`] for a non-positive or
/// non-finite scale.
pub fn zonal_mean(raster: &Grid<f64>, region: &Region, scale: f64) -> Result<Option<f64>, AggregationError> {
    validate_scale(scale)?;

    let mut total = 0.0;
    let mut count = 0_u32;
    for_each_sample(raster.transform(), region, scale, |x, y| {
        if let Some(v) = raster.sample(x, y)
            && v.is_finite()
        {
            total += v;
            count += 1;
        }
    });

    Ok((count > 0).then(|| total / f64::from(count)))
}

fn validate_scale(scale: f64) -> Result<(), AggregationError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(AggregationError::InvalidScale { scale })
    }
}

/// Calls `f` with every lattice point inside `region`'s bounding box whose
/// centre lies strictly inside the region.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn for_each_sample(transform: &GeoTransform, region: &Region, scale: f64, mut f: impl FnMut(f64, f64)) {
    let Some(bounds) = region.bounds() else {
        return;
    };

    let col_lo = ((bounds.min().x - transform.origin_x) / scale - 0.5).ceil().max(0.0);
    let col_hi = ((bounds.max().x - transform.origin_x) / scale - 0.5).floor();
    let row_lo = ((transform.origin_y - bounds.max().y) / scale - 0.5).ceil().max(0.0);
    let row_hi = ((transform.origin_y - bounds.min().y) / scale - 0.5).floor();
    if col_hi < col_lo || row_hi < row_lo {
        return;
    }

    let geometry = region.geometry();
    for row in (row_lo as i64)..=(row_hi as i64) {
        let y = (row as f64 + 0.5).mul_add(-scale, transform.origin_y);
        for col in (col_lo as i64)..=(col_hi as i64) {
            let x = (col as f64 + 0.5).mul_add(scale, transform.origin_x);
            if geometry.contains(&geo::Point::new(x, y)) {
                f(x, y);
            }
        }
    }
}
