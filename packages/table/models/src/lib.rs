#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wide-table row and schema types.
//!
//! A [`WideSchema`] fixes the column layout of every row: the key columns,
//! one area column per category code in set order, then the auxiliary
//! scalar columns in the order they were declared. Rows built against the
//! same schema always expose the same columns, whether or not a category
//! was observed.

use std::fmt;

use cropstats_zonal_models::{CategoryCode, CategorySet, IrrigationStatus};
use serde::{Deserialize, Serialize};

/// Key columns shared by every wide row, in header order.
pub const KEY_COLUMNS: [&str; 3] = ["region_id", "year", "status"];

/// Unique key of a wide row. Orders by year, then region, then status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowKey {
    pub region_id: String,
    pub year: i32,
    pub status: IrrigationStatus,
}

impl RowKey {
    #[must_use]
    pub fn new(region_id: impl Into<String>, year: i32, status: IrrigationStatus) -> Self {
        Self {
            region_id: region_id.into(),
            year,
            status,
        }
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.year
            .cmp(&other.year)
            .then_with(|| self.region_id.cmp(&other.region_id))
            .then_with(|| self.status.cmp(&other.status))
    }
}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region_id, self.year, self.status)
    }
}

/// A named column of the schema, resolved to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Area column for the category at this position of the set.
    Category(usize),
    /// Auxiliary column at this position.
    Auxiliary(usize),
}

/// Error returned when a schema declares the same auxiliary column twice or
/// an auxiliary column that shadows a key or category column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// The clashing column name.
    pub column: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column '{}' declared more than once", self.column)
    }
}

impl std::error::Error for SchemaError {}

/// Fixed column layout: closed category set plus ordered auxiliary fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideSchema {
    categories: CategorySet,
    auxiliary: Vec<String>,
}

impl WideSchema {
    /// Builds a schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if an auxiliary name repeats or collides with
    /// a key or category column.
    pub fn new(categories: CategorySet, auxiliary: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, SchemaError> {
        let mut names: Vec<String> = Vec::new();
        for name in auxiliary {
            let name = name.into();
            let clashes = KEY_COLUMNS.contains(&name.as_str())
                || names.contains(&name)
                || name
                    .parse::<CategoryCode>()
                    .is_ok_and(|code| categories.contains(code));
            if clashes {
                return Err(SchemaError { column: name });
            }
            names.push(name);
        }
        Ok(Self {
            categories,
            auxiliary: names,
        })
    }

    #[must_use]
    pub const fn categories(&self) -> &CategorySet {
        &self.categories
    }

    #[must_use]
    pub fn auxiliary(&self) -> &[String] {
        &self.auxiliary
    }

    /// Resolves a column name (category code or auxiliary name).
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        if let Some(pos) = self.auxiliary.iter().position(|a| a == name) {
            return Some(Field::Auxiliary(pos));
        }
        name.parse::<CategoryCode>()
            .ok()
            .and_then(|code| self.categories.position(code))
            .map(Field::Category)
    }

    /// Full header: key columns, category codes, auxiliary names.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        KEY_COLUMNS
            .iter()
            .map(ToString::to_string)
            .chain(self.categories.codes().iter().map(ToString::to_string))
            .chain(self.auxiliary.iter().cloned())
            .collect()
    }
}

/// One dense, schema-stable row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WideRow {
    pub key: RowKey,
    /// Area in square metres per category, in category-set order.
    pub values: Vec<f64>,
    /// Auxiliary values in schema order; `None` is a missing value.
    pub auxiliary: Vec<Option<f64>>,
}

impl WideRow {
    /// A row with every category at zero and every auxiliary value missing.
    #[must_use]
    pub fn empty(schema: &WideSchema, key: RowKey) -> Self {
        Self {
            key,
            values: vec![0.0; schema.categories().len()],
            auxiliary: vec![None; schema.auxiliary().len()],
        }
    }

    /// Value of a resolved field; category fields are never missing.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Category(i) => self.values.get(i).copied(),
            Field::Auxiliary(i) => self.auxiliary.get(i).copied().flatten(),
        }
    }

    /// Data columns after the key, rendered for CSV output. Missing
    /// auxiliary values render as empty cells.
    #[must_use]
    pub fn record(&self) -> Vec<String> {
        [
            self.key.region_id.clone(),
            self.key.year.to_string(),
            self.key.status.to_string(),
        ]
        .into_iter()
        .chain(self.values.iter().map(ToString::to_string))
        .chain(
            self.auxiliary
                .iter()
                .map(|v| v.map_or_else(String::new, |v| v.to_string())),
        )
        .collect()
    }
}

/// Inclusive year range used for baseline means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselinePeriod {
    pub start_year: i32,
    pub end_year: i32,
}

impl BaselinePeriod {
    #[must_use]
    pub const fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
        }
    }

    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        year >= self.start_year && year <= self.end_year
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.start_year <= self.end_year
    }
}

/// Per-region baseline means over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineSummary {
    pub region_id: String,
    pub period: BaselinePeriod,
    /// Rows that fell inside the period.
    pub rows: usize,
    /// Requested field names, in request order.
    pub fields: Vec<String>,
    /// Mean per field; `None` when the field was missing in every row.
    pub means: Vec<Option<f64>>,
}

impl BaselineSummary {
    /// Mean for `field`, if it was requested and observed.
    #[must_use]
    pub fn mean(&self, field: &str) -> Option<f64> {
        self.fields
            .iter()
            .position(|f| f == field)
            .and_then(|i| self.means.get(i).copied().flatten())
    }
}
