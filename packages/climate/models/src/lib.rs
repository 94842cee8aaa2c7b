#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Seasonal window and climate composite definitions.
//!
//! A [`ClimateWindow`] names a recurring date interval (e.g. the
//! "early season" from 1 December of the previous year to 30 April) and a
//! [`CompositeSpec`] names a derived band built by reducing a periodic
//! raster stack over one of those windows.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Error returned when a month-day string is malformed or names a day that
/// does not exist in any year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMonthDay {
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidMonthDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid month-day {:?}: expected \"-MM-DD\" naming a calendar day",
            self.value
        )
    }
}

impl std::error::Error for InvalidMonthDay {}

/// A calendar day without a year, written `-MM-DD` in configs.
///
/// `-02-29` is accepted here; whether it exists is decided per target year
/// when a window is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Creates a month-day, validating it against a leap year.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMonthDay`] if the month/day pair never occurs.
    pub fn new(month: u32, day: u32) -> Result<Self, InvalidMonthDay> {
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(InvalidMonthDay {
                value: format!("-{month:02}-{day:02}"),
            });
        }
        Ok(Self { month, day })
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    #[must_use]
    pub const fn day(self) -> u32 {
        self.day
    }

    /// The concrete date in `year`, or `None` for 29 February in a
    /// non-leap year.
    #[must_use]
    pub fn in_year(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = InvalidMonthDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMonthDay {
            value: s.to_string(),
        };
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('-').unwrap_or(trimmed);
        let (month, day) = body.split_once('-').ok_or_else(invalid)?;
        if month.len() != 2 || day.len() != 2 {
            return Err(invalid());
        }
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let day: u32 = day.parse().map_err(|_| invalid())?;
        Self::new(month, day).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthDay {
    type Error = InvalidMonthDay;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for MonthDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-{:02}-{:02}", self.month, self.day)
    }
}

/// Which calendar year a window starts in, relative to its target year.
///
/// Serialized as the integer offset (`0` or `-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum StartOffset {
    /// Window starts in the target year.
    SameYear,
    /// Window starts in the year before the target year (crossing-year
    /// window).
    PreviousYear,
}

impl StartOffset {
    /// Year offset applied to the target year.
    #[must_use]
    pub const fn years(self) -> i32 {
        match self {
            Self::SameYear => 0,
            Self::PreviousYear => -1,
        }
    }
}

impl TryFrom<i8> for StartOffset {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SameYear),
            -1 => Ok(Self::PreviousYear),
            other => Err(format!("start offset must be 0 or -1, got {other}")),
        }
    }
}

impl From<StartOffset> for i8 {
    fn from(value: StartOffset) -> Self {
        match value {
            StartOffset::SameYear => 0,
            StartOffset::PreviousYear => -1,
        }
    }
}

/// A named seasonal window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimateWindow {
    /// Window name referenced by composites (e.g. `"annual"`, `"early"`).
    pub name: String,
    /// Year of the start date relative to the target year.
    #[serde(default = "default_offset")]
    pub start_offset: StartOffset,
    /// First day of the window (inclusive).
    pub start: MonthDay,
    /// Day the window ends (exclusive), always in the target year.
    pub end: MonthDay,
}

const fn default_offset() -> StartOffset {
    StartOffset::SameYear
}

/// A window resolved to concrete dates for one target year.
///
/// The interval is half-open: `start <= date < end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub name: String,
    pub year: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ResolvedWindow {
    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Number of days covered; zero when the start is not before the end.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }
}

/// Per-pixel reduction applied across the images of a window.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Reducer {
    /// Total over the window (e.g. precipitation).
    Sum,
    /// Arithmetic mean over the window (e.g. drought index).
    Mean,
}

/// A derived band built from a periodic raster stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeSpec {
    /// One variable reduced over a window.
    Band {
        /// Output band name (e.g. `"pr_ann"`).
        name: String,
        /// Source stack identifier passed to the backend.
        dataset: String,
        /// Window name.
        window: String,
        /// Variable (band) of the stack to reduce.
        variable: String,
        /// Reduction mode.
        reducer: Reducer,
    },
    /// Two variables reduced over a window, then divided per pixel.
    Ratio {
        /// Output band name (e.g. `"aridity"`).
        name: String,
        /// Source stack identifier passed to the backend.
        dataset: String,
        /// Window name.
        window: String,
        /// Numerator variable.
        numerator: String,
        /// Denominator variable.
        denominator: String,
        /// Reduction mode applied to both variables before dividing.
        reducer: Reducer,
    },
}

impl CompositeSpec {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Band { name, .. } | Self::Ratio { name, .. } => name,
        }
    }

    #[must_use]
    pub fn dataset(&self) -> &str {
        match self {
            Self::Band { dataset, .. } | Self::Ratio { dataset, .. } => dataset,
        }
    }

    #[must_use]
    pub fn window(&self) -> &str {
        match self {
            Self::Band { window, .. } | Self::Ratio { window, .. } => window,
        }
    }
}
