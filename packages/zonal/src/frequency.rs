//! Multi-year irrigation frequency.

use cropstats_raster_models::Grid;
use cropstats_zonal_models::CategoryCode;
use ndarray::{Array2, Zip};

use crate::AggregationError;
use crate::split::IRRIGATED;

/// Counts, per pixel, the years flagged irrigated across `indicators`.
///
/// Pixels irrigated in `min_years` years or fewer are masked, so feeding the
/// result to the zonal aggregator gives the area irrigated more often than
/// the threshold. The count is returned as a category so it can be grouped
/// directly. Indicator no-data counts as not irrigated.
///
/// # Errors
///
/// Returns [`AggregationError::EmptyStack`] for an empty slice and
/// [`AggregationError::IncompatibleExtents`] if the grids differ in geometry.
pub fn irrigation_frequency(
    indicators: &[Grid<u8>],
    min_years: u16,
) -> Result<Grid<CategoryCode>, AggregationError> {
    let Some(first) = indicators.first() else {
        return Err(AggregationError::EmptyStack {
            operation: "irrigation_frequency",
        });
    };

    let mut counts = Array2::<u16>::zeros(first.cells().dim());

    for (year_index, grid) in indicators.iter().enumerate() {
        if !grid.same_geometry(first) {
            return Err(AggregationError::IncompatibleExtents {
                message: format!("indicator {year_index} differs from the first"),
            });
        }
        Zip::from(&mut counts).and(grid.cells()).for_each(|count, cell| {
            if *cell == Some(IRRIGATED) {
                *count += 1;
            }
        });
    }

    Ok(Grid::from_array(
        *first.transform(),
        counts.mapv(|count| (count > min_years).then_some(count)),
    ))
}

#[cfg(test)]
mod tests {
    use cropstats_raster_models::GeoTransform;
    use ndarray::array;

    use super::*;

    fn year(cells: [Option<u8>; 3]) -> Grid<u8> {
        Grid::from_cells(GeoTransform::square(0.0, 30.0, 30.0), 3, 1, cells.to_vec()).unwrap()
    }

    #[test]
    fn masks_pixels_at_or_below_threshold() {
        let stack = [
            year([Some(1), Some(1), None]),
            year([Some(1), Some(0), Some(1)]),
            year([Some(1), Some(1), None]),
        ];
        let out = irrigation_frequency(&stack, 1).unwrap();
        assert_eq!(out.cells(), &array![[Some(3), Some(2), None]]);

        let strict = irrigation_frequency(&stack, 2).unwrap();
        assert_eq!(strict.cells(), &array![[Some(3), None, None]]);
    }

    #[test]
    fn empty_stack_is_rejected() {
        assert!(matches!(
            irrigation_frequency(&[], 1),
            Err(AggregationError::EmptyStack { .. })
        ));
    }
}
