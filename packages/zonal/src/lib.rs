#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zonal statistics over categorical rasters.
//!
//! [`aggregate::grouped_zonal_sum`] sums an area-weight raster per region
//! and category, [`split::split`] divides a categorical raster into
//! irrigated and rainfed views, and [`frequency::irrigation_frequency`]
//! counts how often each pixel was irrigated across years.

pub mod aggregate;
pub mod frequency;
pub mod remap;
pub mod split;

use thiserror::Error;

/// Errors that can occur during zonal aggregation.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Sampling scale is zero, negative or not finite.
    #[error("Invalid sampling scale: {scale}")]
    InvalidScale {
        /// Rejected scale in metres.
        scale: f64,
    },

    /// Input rasters do not share one grid geometry.
    #[error("Incompatible raster extents: {message}")]
    IncompatibleExtents {
        /// Which inputs disagree.
        message: String,
    },

    /// An operation over a stack of rasters received none.
    #[error("No rasters supplied to {operation}")]
    EmptyStack {
        /// Operation that needed input.
        operation: &'static str,
    },
}
