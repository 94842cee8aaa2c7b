#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Category, irrigation status and zonal record types.
//!
//! The category domain is closed: a [`CategorySet`] is built once from the
//! externally supplied class list (e.g. the crop classes of interest) and
//! every table derived from zonal output exposes exactly those codes, in
//! that order, whether or not a given region/year observed them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A land-cover / crop class code of a categorical raster.
pub type CategoryCode = u16;

/// Irrigation status attached to zonal records and table rows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IrrigationStatus {
    /// Pixels flagged by the irrigation indicator.
    Irrigated,
    /// Pixels not flagged (including indicator no-data).
    Rainfed,
    /// Unsplit totals.
    None,
}

impl IrrigationStatus {
    /// All statuses in canonical order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

/// Error returned when building a [`CategorySet`] from a list containing
/// the same code twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCategoryError {
    /// The repeated code.
    pub code: CategoryCode,
}

impl std::fmt::Display for DuplicateCategoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "category code {} listed more than once", self.code)
    }
}

impl std::error::Error for DuplicateCategoryError {}

/// The closed, ordered category domain.
///
/// Order is the order the codes were supplied in and is the column order of
/// every wide table built from this set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    codes: Vec<CategoryCode>,
    positions: BTreeMap<CategoryCode, usize>,
}

impl CategorySet {
    /// Builds the set from an ordered code list.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateCategoryError`] if a code appears twice.
    pub fn new(codes: impl IntoIterator<Item = CategoryCode>) -> Result<Self, DuplicateCategoryError> {
        let mut ordered = Vec::new();
        let mut positions = BTreeMap::new();
        for code in codes {
            if positions.insert(code, ordered.len()).is_some() {
                return Err(DuplicateCategoryError { code });
            }
            ordered.push(code);
        }
        Ok(Self {
            codes: ordered,
            positions,
        })
    }

    /// Codes in column order.
    #[must_use]
    pub fn codes(&self) -> &[CategoryCode] {
        &self.codes
    }

    /// Column position of `code`, or `None` when outside the domain.
    #[must_use]
    pub fn position(&self, code: CategoryCode) -> Option<usize> {
        self.positions.get(&code).copied()
    }

    #[must_use]
    pub fn contains(&self, code: CategoryCode) -> bool {
        self.positions.contains_key(&code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// One (region, category, sum) triple produced by a grouped zonal sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonalSum {
    pub region_id: String,
    pub category: CategoryCode,
    pub sum: f64,
}

/// A zonal sum tagged with the year and irrigation status it was computed
/// for. Only produced for categories with non-zero area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonalRecord {
    /// Region identifier.
    pub region_id: String,
    /// Year of the categorical raster.
    pub year: i32,
    /// Class code.
    pub category: CategoryCode,
    /// Status view the area was computed from.
    pub status: IrrigationStatus,
    /// Area in square metres (never negative).
    pub area_m2: f64,
}

impl ZonalRecord {
    /// Tags a zonal sum with its year and status.
    #[must_use]
    pub fn from_sum(sum: ZonalSum, year: i32, status: IrrigationStatus) -> Self {
        Self {
            region_id: sum.region_id,
            year,
            category: sum.category,
            status,
            area_m2: sum.sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_set_preserves_supplied_order() {
        let set = CategorySet::new([1, 4, 5, 24, 36, 176]).unwrap();
        assert_eq!(set.codes(), &[1, 4, 5, 24, 36, 176]);
        assert_eq!(set.position(24), Some(3));
        assert_eq!(set.position(2), None);
        assert!(set.contains(176));
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn category_set_rejects_duplicates() {
        let err = CategorySet::new([1, 5, 1]).unwrap_err();
        assert_eq!(err.code, 1);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in IrrigationStatus::all() {
            let parsed: IrrigationStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(IrrigationStatus::Rainfed.as_ref(), "rainfed");
        assert!("dryland".parse::<IrrigationStatus>().is_err());
    }

    #[test]
    fn record_from_sum_keeps_values() {
        let record = ZonalRecord::from_sum(
            ZonalSum {
                region_id: "R1".to_string(),
                category: 5,
                sum: 50.0,
            },
            2015,
            IrrigationStatus::Irrigated,
        );
        assert_eq!(record.region_id, "R1");
        assert_eq!(record.year, 2015);
        assert_eq!(record.category, 5);
        assert_eq!(record.status, IrrigationStatus::Irrigated);
        assert!((record.area_m2 - 50.0).abs() < f64::EPSILON);
    }
}
