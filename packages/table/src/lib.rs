#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dense, schema-stable tables built from sparse zonal records.
//!
//! [`pivot::pivot`] turns the (region, category, area) triples of one
//! region/year/status into a [`WideRow`](cropstats_table_models::WideRow),
//! [`table::WideTable`] collects rows under a unique key and serialises them
//! to CSV, and [`baseline::baseline_means`] averages fields across years.

pub mod baseline;
pub mod pivot;
pub mod table;

use cropstats_table_models::RowKey;
use cropstats_zonal_models::CategoryCode;
use thiserror::Error;

/// Errors that can occur while building or reading tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// A record names a category outside the closed set.
    #[error("Category {category} is not part of the schema (row {key})")]
    SchemaViolation {
        /// Row being built.
        key: RowKey,
        /// Offending code.
        category: CategoryCode,
    },

    /// A record belongs to a different row than the one being built.
    #[error("Record for {record} passed to row {key}")]
    KeyMismatch {
        /// Row being built.
        key: RowKey,
        /// Key of the stray record.
        record: RowKey,
    },

    /// A record carries a negative or non-finite area.
    #[error("Invalid area {area_m2} for category {category} (row {key})")]
    InvalidArea {
        /// Row being built.
        key: RowKey,
        /// Category of the record.
        category: CategoryCode,
        /// Rejected value.
        area_m2: f64,
    },

    /// Two rows share one key.
    #[error("Duplicate row {key}")]
    DuplicateKey {
        /// Repeated key.
        key: RowKey,
    },

    /// A requested field is neither a category code nor an auxiliary field.
    #[error("Unknown field '{field}'")]
    UnknownField {
        /// Requested name.
        field: String,
    },

    /// Baseline period start is after its end.
    #[error("Invalid baseline period {start_year}..={end_year}")]
    InvalidPeriod {
        /// Period start.
        start_year: i32,
        /// Period end.
        end_year: i32,
    },

    /// A region has no rows inside the baseline period.
    #[error("Region '{region_id}' has no rows between {start_year} and {end_year}")]
    InsufficientData {
        /// Region lacking data.
        region_id: String,
        /// Period start.
        start_year: i32,
        /// Period end.
        end_year: i32,
    },

    /// A CSV file does not match the expected layout.
    #[error("Malformed CSV: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
