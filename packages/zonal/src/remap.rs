//! Category remapping.

use std::collections::BTreeMap;

use cropstats_raster_models::Grid;
use cropstats_zonal_models::CategoryCode;

/// Maps listed codes to new codes and masks every other pixel.
///
/// With identity pairs this keeps only the listed classes (e.g. the major
/// crops of interest); mapping every listed code to `1` produces a binary
/// class layer.
#[must_use]
pub fn remap(grid: &Grid<CategoryCode>, pairs: &[(CategoryCode, CategoryCode)]) -> Grid<CategoryCode> {
    let table: BTreeMap<CategoryCode, CategoryCode> = pairs.iter().copied().collect();
    grid.map(|code| table.get(&code).copied())
}

#[cfg(test)]
mod tests {
    use cropstats_raster_models::GeoTransform;
    use ndarray::array;

    use super::*;

    fn grid() -> Grid<CategoryCode> {
        Grid::from_cells(
            GeoTransform::square(0.0, 30.0, 30.0),
            5,
            1,
            vec![Some(1), Some(2), Some(176), None, Some(36)],
        )
        .unwrap()
    }

    #[test]
    fn keeps_listed_classes_only() {
        let major = [1, 4, 5, 24, 36, 176].map(|c| (c, c));
        let out = remap(&grid(), &major);
        assert_eq!(out.cells(), &array![[Some(1), None, Some(176), None, Some(36)]]);
    }

    #[test]
    fn collapses_to_binary_layer() {
        let binary = [1, 4, 5, 24, 36, 176].map(|c| (c, 1));
        let out = remap(&grid(), &binary);
        assert_eq!(out.cells(), &array![[Some(1), None, Some(1), None, Some(1)]]);
    }
}
