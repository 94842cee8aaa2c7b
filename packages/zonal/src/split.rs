//! Irrigation status splitting.
//!
//! An indicator raster flags irrigated pixels with `1`. Indicator no-data and
//! any other value count as not irrigated, so every unmasked categorical
//! pixel lands in exactly one of the two views and their zonal sums add up
//! to the unsplit total.

use cropstats_raster_models::Grid;
use cropstats_zonal_models::CategoryCode;
use geo::{Contains, MultiPolygon};
use ndarray::{Array2, Zip};

use crate::AggregationError;

/// Indicator value marking an irrigated pixel.
pub const IRRIGATED: u8 = 1;

/// Irrigated and rainfed views of one categorical raster.
#[derive(Debug, Clone, PartialEq)]
pub struct IrrigationSplit {
    pub irrigated: Grid<CategoryCode>,
    pub rainfed: Grid<CategoryCode>,
}

/// Splits `categorical` by `indicator`.
///
/// When `eligibility` is given, indicator pixels whose centre lies outside it
/// count as not irrigated (e.g. only land with a water right can be flagged).
///
/// # Errors
///
/// Returns [`AggregationError::IncompatibleExtents`] if the rasters differ in
/// geometry.
pub fn split(
    categorical: &Grid<CategoryCode>,
    indicator: &Grid<u8>,
    eligibility: Option<&MultiPolygon<f64>>,
) -> Result<IrrigationSplit, AggregationError> {
    if !categorical.same_geometry(indicator) {
        return Err(AggregationError::IncompatibleExtents {
            message: "categorical and irrigation indicator rasters differ".to_string(),
        });
    }

    let flags = irrigated_flags(indicator, eligibility);
    let transform = *categorical.transform();

    let irrigated = Grid::from_array(
        transform,
        Zip::from(categorical.cells())
            .and(&flags)
            .map_collect(|cell, &flagged| if flagged { *cell } else { None }),
    );
    let rainfed = Grid::from_array(
        transform,
        Zip::from(categorical.cells())
            .and(&flags)
            .map_collect(|cell, &flagged| if flagged { None } else { *cell }),
    );

    log::trace!(
        "Split {} pixels: {} irrigated, {} rainfed",
        categorical.valid_count(),
        irrigated.valid_count(),
        rainfed.valid_count()
    );

    Ok(IrrigationSplit { irrigated, rainfed })
}

/// Irrigated flag per pixel, with no-data unmasked to `false`.
fn irrigated_flags(indicator: &Grid<u8>, eligibility: Option<&MultiPolygon<f64>>) -> Array2<bool> {
    let transform = indicator.transform();
    Zip::indexed(indicator.cells()).map_collect(|(row, col), cell| {
        if *cell != Some(IRRIGATED) {
            return false;
        }
        eligibility.is_none_or(|geometry| {
            let (x, y) = transform.cell_center(row, col);
            geometry.contains(&geo::Point::new(x, y))
        })
    })
}
