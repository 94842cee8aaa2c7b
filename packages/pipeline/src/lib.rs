#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Yearly crop-area and climate statistics for a set of regions.
//!
//! The pipeline expands the configured years, regions and irrigation
//! statuses into a task list, groups it into one batch per year and runs
//! each batch on a bounded worker pool. Each task fetches its inputs through
//! a [`backend::Backend`], computes categorical zonal sums, pivots them into
//! a schema-stable row and attaches climate composite means and well
//! statistics. Rows accumulate in a [`sink::RowSink`] and are finalised into
//! one [`WideTable`](cropstats_table::table::WideTable).

pub mod backend;
pub mod config;
pub mod export;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod sink;
pub mod task;

use cropstats_climate::ClimateError;
use cropstats_table::TableError;
use cropstats_zonal::AggregationError;
use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend error after retries.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Window or composite error.
    #[error(transparent)]
    Climate(#[from] ClimateError),

    /// Zonal aggregation error.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Pivot or table error.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A task asked for inputs its batch did not prepare.
    #[error("Task error: {message}")]
    Task {
        /// Description of what went wrong.
        message: String,
    },
}
