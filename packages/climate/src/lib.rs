#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Seasonal window resolution and climate composites.
//!
//! [`window::resolve`] turns a named [`ClimateWindow`] into concrete dates
//! for a target year, including windows that start in the previous calendar
//! year. [`composite::build`] reduces a periodic raster stack over resolved
//! windows into a named multi-band raster.
//!
//! [`ClimateWindow`]: cropstats_climate_models::ClimateWindow

pub mod composite;
pub mod window;

use thiserror::Error;

/// Errors that can occur while resolving windows or building composites.
#[derive(Debug, Error)]
pub enum ClimateError {
    /// A window definition cannot be turned into a valid date range.
    #[error("Window config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// No image of the stack falls inside the window.
    #[error("No images between {start} and {end} for composite '{composite}'")]
    EmptyCollection {
        /// Composite being built.
        composite: String,
        /// Window start (inclusive).
        start: chrono::NaiveDate,
        /// Window end (exclusive).
        end: chrono::NaiveDate,
    },

    /// A variable requested by a composite is absent from every windowed
    /// image.
    #[error("Variable '{variable}' missing from stack for composite '{composite}'")]
    MissingVariable {
        /// Composite being built.
        composite: String,
        /// Missing variable name.
        variable: String,
    },

    /// Images of the stack do not share one grid geometry.
    #[error("Grids for composite '{composite}' have incompatible extents")]
    IncompatibleExtents {
        /// Composite being built.
        composite: String,
    },
}
