//! Perimeter / area shape metrics.
//!
//! "Shoreline density" is perimeter divided by area (1/m). For a given area
//! a circle minimises it, and a thin rectangle with a fixed short side gives
//! a practical upper reference. Comparing a candidate control region against
//! a target region on this metric is part of choosing comparable regions.

use std::f64::consts::PI;

use geo::{Area, LineString, MultiPolygon};
use serde::Serialize;

use crate::Region;

/// Default short side of the thin-rectangle reference, in metres.
pub const DEFAULT_SHORT_SIDE_M: f64 = 1000.0;

/// Total ring length of a multi-polygon, exterior and interior rings.
#[must_use]
pub fn perimeter(geometry: &MultiPolygon<f64>) -> f64 {
    geometry
        .0
        .iter()
        .map(|polygon| {
            ring_length(polygon.exterior())
                + polygon.interiors().iter().map(ring_length).sum::<f64>()
        })
        .sum()
}

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

/// Density of a circle with area `area_m2`: `2 / sqrt(A / π)`.
#[must_use]
pub fn circle_density(area_m2: f64) -> f64 {
    2.0 / (area_m2 / PI).sqrt()
}

/// Density of a rectangle of area `area_m2` whose short side is
/// `short_side_m`: `2/w + 2w/A`.
#[must_use]
pub fn thin_rectangle_density(area_m2: f64, short_side_m: f64) -> f64 {
    2.0 / short_side_m + 2.0 * short_side_m / area_m2
}

/// Perimeter, area and their ratio for one geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeMetrics {
    pub perimeter_m: f64,
    pub area_m2: f64,
    /// `perimeter_m / area_m2`; zero for an empty geometry.
    pub density: f64,
}

impl ShapeMetrics {
    /// Computes metrics for a raw geometry.
    #[must_use]
    pub fn of(geometry: &MultiPolygon<f64>) -> Self {
        Self::from_parts(perimeter(geometry), geometry.unsigned_area())
    }

    /// Metrics of an already-validated region.
    #[must_use]
    pub fn from_region(region: &Region) -> Self {
        Self::from_parts(region.perimeter_m(), region.area_m2())
    }

    fn from_parts(perimeter_m: f64, area_m2: f64) -> Self {
        let density = if area_m2 > 0.0 {
            perimeter_m / area_m2
        } else {
            0.0
        };
        Self {
            perimeter_m,
            area_m2,
            density,
        }
    }

    /// Reference bounds for a region of this area.
    #[must_use]
    pub fn bounds(&self, short_side_m: f64) -> ShapeBounds {
        ShapeBounds::for_area(self.area_m2, short_side_m)
    }
}

/// Circle (lower) and thin rectangle (upper) reference densities for one
/// area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeBounds {
    pub circle: f64,
    pub thin_rectangle: f64,
}

impl ShapeBounds {
    #[must_use]
    pub fn for_area(area_m2: f64, short_side_m: f64) -> Self {
        Self {
            circle: circle_density(area_m2),
            thin_rectangle: thin_rectangle_density(area_m2, short_side_m),
        }
    }

    /// Whether `density` lies between the references (inclusive, with a
    /// small relative tolerance).
    #[must_use]
    pub fn contains(&self, density: f64) -> bool {
        let lo = self.circle.min(self.thin_rectangle);
        let hi = self.circle.max(self.thin_rectangle);
        let tol = hi * 1e-9;
        density >= lo - tol && density <= hi + tol
    }
}

/// Candidate-vs-target comparison on shoreline density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeComparison {
    pub target: ShapeMetrics,
    pub candidate: ShapeMetrics,
    /// `candidate.density - target.density`.
    pub density_difference: f64,
    /// `candidate.density / target.density`; `None` if the target density
    /// is zero.
    pub density_ratio: Option<f64>,
}

impl ShapeComparison {
    #[must_use]
    pub fn new(target: ShapeMetrics, candidate: ShapeMetrics) -> Self {
        let density_ratio = if target.density > 0.0 {
            Some(candidate.density / target.density)
        } else {
            None
        };
        Self {
            target,
            candidate,
            density_difference: candidate.density - target.density,
            density_ratio,
        }
    }
}
