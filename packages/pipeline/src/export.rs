//! Composite rasters handed to the export collaborator.

use cropstats_raster_models::MultiBandRaster;

use crate::config::ExportConfig;

/// One year's composite bands with the export settings to write them with.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeExport {
    pub year: i32,
    pub raster: MultiBandRaster,
    /// Output pixel size in metres.
    pub scale: f64,
    /// Output coordinate reference system (e.g. `"EPSG:5070"`).
    pub crs: String,
}

impl CompositeExport {
    /// Builds the export for `year` when the config requests it.
    #[must_use]
    pub fn for_year(config: &ExportConfig, year: i32, raster: &MultiBandRaster) -> Option<Self> {
        if raster.is_empty() || !config.composite_years.contains(&year) {
            return None;
        }
        Some(Self {
            year,
            raster: raster.clone(),
            scale: config.scale,
            crs: config.crs.clone(),
        })
    }

    /// Suggested file stem, e.g. `composites_2015`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("composites_{}", self.year)
    }
}

#[cfg(test)]
mod tests {
    use cropstats_raster_models::{GeoTransform, Grid};

    use super::*;

    fn config() -> ExportConfig {
        ExportConfig {
            crs: "EPSG:5070".to_string(),
            scale: 30.0,
            composite_years: vec![2015],
        }
    }

    #[test]
    fn only_configured_years_are_exported() {
        let mut raster = MultiBandRaster::new();
        raster.push("pr_ann", Grid::filled(GeoTransform::square(0.0, 0.0, 4000.0), 1, 1, Some(400.0)));

        let export = CompositeExport::for_year(&config(), 2015, &raster).unwrap();
        assert_eq!(export.crs, "EPSG:5070");
        assert_eq!(export.file_stem(), "composites_2015");
        assert!(CompositeExport::for_year(&config(), 2014, &raster).is_none());
        assert!(CompositeExport::for_year(&config(), 2015, &MultiBandRaster::new()).is_none());
    }
}
