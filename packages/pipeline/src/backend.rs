//! Raster and vector data access.
//!
//! The pipeline never reads storage directly. Everything it needs for one
//! task comes through a [`Backend`], and the two zonal primitives default to
//! the local implementations so a backend only has to serve data.
//! [`MemoryBackend`] serves data already held in memory.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cropstats_climate_models::ResolvedWindow;
use cropstats_raster_models::{Grid, ImageCollection};
use cropstats_spatial::Region;
use cropstats_spatial::wells::WellRecord;
use cropstats_zonal::aggregate;
use cropstats_zonal_models::{CategoryCode, ZonalSum};
use geo::MultiPolygon;
use thiserror::Error;

/// Errors that can occur while talking to a backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// A failure worth retrying (timeouts, rate limits, busy workers).
    #[error("Transient backend error: {message}")]
    Transient {
        /// Description of what went wrong.
        message: String,
    },

    /// A failure that will not go away on retry (missing layer, bad
    /// request).
    #[error("Backend error: {message}")]
    Persistent {
        /// Description of what went wrong.
        message: String,
    },
}

impl BackendError {
    /// Returns `true` if the error is likely transient and worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Persistent {
            message: format!("{what} not found"),
        }
    }
}

/// Source of regions, rasters and well records.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Region polygon by id.
    async fn region(&self, id: &str) -> Result<Region, BackendError>;

    /// Categorical land-cover raster of `layer` for `year`.
    async fn categorical(&self, layer: &str, year: i32) -> Result<Grid<CategoryCode>, BackendError>;

    /// Binary irrigation indicator raster of `layer` for `year`.
    async fn indicator(&self, layer: &str, year: i32) -> Result<Grid<u8>, BackendError>;

    /// Geometry where irrigation may be flagged.
    async fn eligibility(&self, layer: &str) -> Result<MultiPolygon<f64>, BackendError>;

    /// Images of `dataset` inside `window`.
    async fn collection(&self, dataset: &str, window: &ResolvedWindow) -> Result<ImageCollection, BackendError>;

    /// Well records reported for `year`.
    async fn wells(&self, year: i32) -> Result<Vec<WellRecord>, BackendError>;

    /// Grouped (region, category) sums of `weight`.
    ///
    /// The default computes locally on the calling task. Backends that want
    /// CPU parallelism across a batch override this and [`Backend::zonal_mean`].
    async fn grouped_zonal_sum(
        &self,
        categorical: &Grid<CategoryCode>,
        weight: &Grid<f64>,
        regions: &[Region],
        scale: f64,
    ) -> Result<Vec<ZonalSum>, BackendError> {
        aggregate::grouped_zonal_sum(categorical, weight, regions, scale).map_err(|e| {
            BackendError::Persistent {
                message: e.to_string(),
            }
        })
    }

    /// Mean of `raster` over `region`.
    async fn zonal_mean(&self, raster: &Grid<f64>, region: &Region, scale: f64) -> Result<Option<f64>, BackendError> {
        aggregate::zonal_mean(raster, region, scale).map_err(|e| BackendError::Persistent {
            message: e.to_string(),
        })
    }
}

/// In-memory backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    regions: BTreeMap<String, Region>,
    categorical: BTreeMap<(String, i32), Grid<CategoryCode>>,
    indicators: BTreeMap<(String, i32), Grid<u8>>,
    eligibility: BTreeMap<String, MultiPolygon<f64>>,
    collections: BTreeMap<String, ImageCollection>,
    wells: Vec<WellRecord>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.insert(region.id().to_string(), region);
        self
    }

    #[must_use]
    pub fn with_categorical(mut self, layer: &str, year: i32, grid: Grid<CategoryCode>) -> Self {
        self.categorical.insert((layer.to_string(), year), grid);
        self
    }

    #[must_use]
    pub fn with_indicator(mut self, layer: &str, year: i32, grid: Grid<u8>) -> Self {
        self.indicators.insert((layer.to_string(), year), grid);
        self
    }

    #[must_use]
    pub fn with_eligibility(mut self, layer: &str, geometry: MultiPolygon<f64>) -> Self {
        self.eligibility.insert(layer.to_string(), geometry);
        self
    }

    /// Registers the full image stack of `dataset`; windows are cut from it
    /// on request.
    #[must_use]
    pub fn with_collection(mut self, dataset: &str, stack: ImageCollection) -> Self {
        self.collections.insert(dataset.to_string(), stack);
        self
    }

    #[must_use]
    pub fn with_wells(mut self, wells: Vec<WellRecord>) -> Self {
        self.wells.extend(wells);
        self
    }

    /// Ids of every registered region.
    #[must_use]
    pub fn region_ids(&self) -> Vec<String> {
        self.regions.keys().cloned().collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn region(&self, id: &str) -> Result<Region, BackendError> {
        self.regions
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("region '{id}'")))
    }

    async fn categorical(&self, layer: &str, year: i32) -> Result<Grid<CategoryCode>, BackendError> {
        self.categorical
            .get(&(layer.to_string(), year))
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("layer '{layer}' for {year}")))
    }

    async fn indicator(&self, layer: &str, year: i32) -> Result<Grid<u8>, BackendError> {
        self.indicators
            .get(&(layer.to_string(), year))
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("layer '{layer}' for {year}")))
    }

    async fn eligibility(&self, layer: &str) -> Result<MultiPolygon<f64>, BackendError> {
        self.eligibility
            .get(layer)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("eligibility layer '{layer}'")))
    }

    async fn collection(&self, dataset: &str, window: &ResolvedWindow) -> Result<ImageCollection, BackendError> {
        self.collections
            .get(dataset)
            .map(|stack| stack.filter_date(window.start, window.end))
            .ok_or_else(|| BackendError::not_found(format!("dataset '{dataset}'")))
    }

    async fn wells(&self, year: i32) -> Result<Vec<WellRecord>, BackendError> {
        Ok(self.wells.iter().filter(|w| w.year == year).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cropstats_raster_models::{GeoTransform, Image};
    use geo::{LineString, Polygon};

    use super::*;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (60.0, 0.0), (60.0, 60.0), (0.0, 60.0), (0.0, 0.0)]),
            vec![],
        )])
    }

    fn backend() -> MemoryBackend {
        let t = GeoTransform::square(0.0, 60.0, 30.0);
        let day = |m, d| {
            Image::new(NaiveDate::from_ymd_opt(2010, m, d).unwrap()).with_band("pr", Grid::filled(t, 2, 2, Some(1.0)))
        };
        MemoryBackend::new()
            .with_region(Region::new("R1", square()).unwrap())
            .with_categorical("cdl", 2010, Grid::filled(t, 2, 2, Some(1)))
            .with_collection("gridmet", ImageCollection::new(vec![day(4, 30), day(5, 1), day(10, 14)]))
    }

    #[tokio::test]
    async fn serves_registered_data() {
        let backend = backend();
        assert_eq!(backend.region("R1").await.unwrap().id(), "R1");
        assert_eq!(backend.categorical("cdl", 2010).await.unwrap().valid_count(), 4);
        assert_eq!(backend.region_ids(), vec!["R1".to_string()]);
    }

    #[tokio::test]
    async fn missing_data_is_persistent() {
        let backend = backend();
        let err = backend.categorical("cdl", 2011).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(backend.region("R9").await.is_err());
    }

    #[tokio::test]
    async fn collection_is_cut_to_window() {
        let window = ResolvedWindow {
            name: "main".to_string(),
            year: 2010,
            start: NaiveDate::from_ymd_opt(2010, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2010, 10, 15).unwrap(),
        };
        let stack = backend().collection("gridmet", &window).await.unwrap();
        assert_eq!(stack.len(), 2);
    }

    #[tokio::test]
    async fn default_zonal_primitives_run_locally() {
        let backend = backend();
        let region = backend.region("R1").await.unwrap();
        let cat = backend.categorical("cdl", 2010).await.unwrap();
        let weight = Grid::pixel_area(&cat);
        let sums = backend
            .grouped_zonal_sum(&cat, &weight, std::slice::from_ref(&region), 30.0)
            .await
            .unwrap();
        assert_eq!(sums.len(), 1);
        assert!((sums[0].sum - 3600.0).abs() < 1e-9);

        let mean = backend.zonal_mean(&weight, &region, 30.0).await.unwrap();
        assert_eq!(mean, Some(900.0));

        let err = backend.grouped_zonal_sum(&cat, &weight, &[region], -1.0).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
