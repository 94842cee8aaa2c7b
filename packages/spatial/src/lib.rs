#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region geometry and spatial lookups.
//!
//! Regions are polygons in a projected, metre-based coordinate system, so
//! planar area and perimeter are reported in square metres and metres.
//! [`index::RegionIndex`] provides R-tree backed point-in-polygon lookups
//! used to attribute wells to regions, [`shape`] computes perimeter/area
//! metrics, and [`wells`] summarises pumping records per region.

pub mod index;
pub mod shape;
pub mod wells;

use geo::{Area, BoundingRect, Contains, MultiPolygon, Rect};
use geojson::GeoJson;
use thiserror::Error;

/// Errors that can occur while loading or validating regions.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// `GeoJSON` text could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// A region has no usable polygon geometry.
    #[error("Invalid geometry for region '{region_id}': {message}")]
    InvalidGeometry {
        /// Offending region.
        region_id: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// A named polygon region with derived area and perimeter.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    id: String,
    geometry: MultiPolygon<f64>,
    area_m2: f64,
    perimeter_m: f64,
}

impl Region {
    /// Builds a region, deriving its area and perimeter.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if the geometry is empty or
    /// encloses no area.
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Result<Self, SpatialError> {
        let id = id.into();
        let area_m2 = geometry.unsigned_area();
        if geometry.0.is_empty() || !area_m2.is_finite() || area_m2 <= 0.0 {
            return Err(SpatialError::InvalidGeometry {
                region_id: id,
                message: "geometry encloses no area".to_string(),
            });
        }
        let perimeter_m = shape::perimeter(&geometry);
        Ok(Self {
            id,
            geometry,
            area_m2,
            perimeter_m,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    #[must_use]
    pub const fn area_m2(&self) -> f64 {
        self.area_m2
    }

    #[must_use]
    pub const fn perimeter_m(&self) -> f64 {
        self.perimeter_m
    }

    /// Bounding rectangle of the geometry.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Whether map coordinate (`x`, `y`) lies strictly inside the region.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.geometry.contains(&geo::Point::new(x, y))
    }
}

/// Loads regions from `GeoJSON` text.
///
/// Accepts a `FeatureCollection`, a single `Feature`, or a bare geometry.
/// Each feature's identifier is read from the `id_property` property
/// (string or number), falling back to the feature `id` and then to its
/// position in the collection. Features without polygon geometry are
/// skipped with a warning.
///
/// # Errors
///
/// Returns [`SpatialError`] if the text is not valid `GeoJSON` or a polygon
/// feature encloses no area.
pub fn regions_from_geojson(text: &str, id_property: &str) -> Result<Vec<Region>, SpatialError> {
    let geojson: GeoJson = text.parse().map_err(Box::new)?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => {
            let Some(mp) = geometry_to_multipolygon(geometry) else {
                return Err(SpatialError::InvalidGeometry {
                    region_id: "0".to_string(),
                    message: "not a Polygon or MultiPolygon".to_string(),
                });
            };
            return Ok(vec![Region::new("0", mp)?]);
        }
    };

    let mut regions = Vec::with_capacity(features.len());
    for (i, feature) in features.into_iter().enumerate() {
        let id = feature
            .property(id_property)
            .and_then(|v| v.as_str().map(String::from).or_else(|| v.as_number().map(ToString::to_string)))
            .or_else(|| feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            }))
            .unwrap_or_else(|| i.to_string());

        let Some(mp) = feature.geometry.and_then(geometry_to_multipolygon) else {
            log::warn!("Skipping feature '{id}': no Polygon or MultiPolygon geometry");
            continue;
        };

        regions.push(Region::new(id, mp)?);
    }

    Ok(regions)
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn geometry_to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::rect;
    use super::*;

    #[test]
    fn region_derives_area_and_perimeter() {
        let region = Region::new("sq", rect(0.0, 0.0, 1000.0, 2000.0)).unwrap();
        assert!((region.area_m2() - 2_000_000.0).abs() < 1e-6);
        assert!((region.perimeter_m() - 6000.0).abs() < 1e-6);
        assert!(region.contains_point(500.0, 500.0));
        assert!(!region.contains_point(1500.0, 500.0));
    }

    #[test]
    fn empty_region_is_rejected() {
        let err = Region::new("empty", MultiPolygon(vec![])).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidGeometry { .. }));
    }

    #[test]
    fn loads_feature_collection_ids() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"masterid": "target"},
                    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"masterid": 9},
                    "geometry": {"type": "MultiPolygon", "coordinates": [[[[20,0],[30,0],[30,10],[20,10],[20,0]]]]}
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [1, 1]}
                }
            ]
        }"#;
        let regions = regions_from_geojson(text, "masterid").unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id(), "target");
        assert_eq!(regions[1].id(), "9");
        assert!((regions[1].area_m2() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_geojson() {
        assert!(matches!(
            regions_from_geojson("{not json", "id"),
            Err(SpatialError::GeoJson(_))
        ));
    }
}
