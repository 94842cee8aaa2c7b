//! Resolution of named seasonal windows into concrete date ranges.
//!
//! A window with [`StartOffset::PreviousYear`] starts in the calendar year
//! before its target year, so the 2010 "annual" window `-12-01 .. -10-15`
//! runs from 2009-12-01 up to (but excluding) 2010-10-15. The end date is
//! always in the target year.

use cropstats_climate_models::{ClimateWindow, MonthDay, ResolvedWindow, StartOffset};

use crate::ClimateError;

/// Resolves `window` for `year` into a half-open `[start, end)` range.
///
/// # Errors
///
/// Returns [`ClimateError::Config`] if a month-day does not exist in the
/// year it resolves to (29 February outside leap years). A start on or after
/// the end is returned as is and selects no images.
pub fn resolve(window: &ClimateWindow, year: i32) -> Result<ResolvedWindow, ClimateError> {
    let start_year = year + window.start_offset.years();

    let start = window
        .start
        .in_year(start_year)
        .ok_or_else(|| ClimateError::Config {
            message: format!(
                "window '{}': start {} does not exist in {start_year}",
                window.name, window.start
            ),
        })?;
    let end = window.end.in_year(year).ok_or_else(|| ClimateError::Config {
        message: format!(
            "window '{}': end {} does not exist in {year}",
            window.name, window.end
        ),
    })?;

    Ok(ResolvedWindow {
        name: window.name.clone(),
        year,
        start,
        end,
    })
}

/// Resolves a window given as raw parts, as they appear in analysis
/// configs: an integer year offset (`0` or `-1`) and two `-MM-DD` strings.
///
/// # Errors
///
/// Returns [`ClimateError::Config`] if the offset is not `0`/`-1`, a
/// month-day is not a calendar date.
pub fn resolve_parts(
    name: &str,
    year: i32,
    start_offset: i8,
    start: &str,
    end: &str,
) -> Result<ResolvedWindow, ClimateError> {
    let config_err = |message: String| ClimateError::Config {
        message: format!("window '{name}': {message}"),
    };

    let window = ClimateWindow {
        name: name.to_string(),
        start_offset: StartOffset::try_from(start_offset).map_err(config_err)?,
        start: start
            .parse::<MonthDay>()
            .map_err(|e| config_err(e.to_string()))?,
        end: end
            .parse::<MonthDay>()
            .map_err(|e| config_err(e.to_string()))?,
    };

    resolve(&window, year)
}

/// Looks up a window by name.
///
/// # Errors
///
/// Returns [`ClimateError::Config`] if no window has that name.
pub fn find<'a>(windows: &'a [ClimateWindow], name: &str) -> Result<&'a ClimateWindow, ClimateError> {
    windows
        .iter()
        .find(|w| w.name == name)
        .ok_or_else(|| ClimateError::Config {
            message: format!("unknown window '{name}'"),
        })
}

/// Resolves every window for `year`, preserving order.
///
/// # Errors
///
/// Returns the first [`ClimateError::Config`] encountered.
pub fn resolve_all(windows: &[ClimateWindow], year: i32) -> Result<Vec<ResolvedWindow>, ClimateError> {
    windows.iter().map(|w| resolve(w, year)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::*;

    fn window(offset: StartOffset, start: &str, end: &str) -> ClimateWindow {
        ClimateWindow {
            name: "test".to_string(),
            start_offset: offset,
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
        }
    }

    #[test]
    fn previous_year_offset_moves_start_back() {
        let resolved = resolve(&window(StartOffset::PreviousYear, "-12-01", "-10-15"), 2010).unwrap();
        assert_eq!(resolved.start.year(), 2009);
        assert_eq!(resolved.start, NaiveDate::from_ymd_opt(2009, 12, 1).unwrap());
        assert_eq!(resolved.end, NaiveDate::from_ymd_opt(2010, 10, 15).unwrap());
    }

    #[test]
    fn same_year_offset_keeps_start_in_target_year() {
        let resolved = resolve(&window(StartOffset::SameYear, "-05-01", "-10-15"), 2010).unwrap();
        assert_eq!(resolved.start.year(), 2010);
        assert_eq!(resolved.days(), 167);
    }

    #[test]
    fn raw_parts_follow_offset() {
        let crossing = resolve_parts("annual", 2010, -1, "-12-01", "-10-15").unwrap();
        assert_eq!(crossing.start.year(), 2009);
        assert_eq!(crossing.end.year(), 2010);

        // Same month-days with offset 0 stay in the target year and match nothing.
        let same_year = resolve_parts("annual", 2010, 0, "-12-01", "-10-15").unwrap();
        assert_eq!(same_year.start.year(), 2010);
        assert_eq!(same_year.start, NaiveDate::from_ymd_opt(2010, 12, 1).unwrap());
        assert_eq!(same_year.days(), 0);
        assert!(!same_year.contains(NaiveDate::from_ymd_opt(2010, 12, 15).unwrap()));

        let same = resolve_parts("early", 2010, 0, "-01-01", "-04-30").unwrap();
        assert_eq!(same.start.year(), 2010);
    }

    #[test]
    fn invalid_month_day_is_config_error() {
        let err = resolve_parts("bad", 2010, 0, "-02-30", "-04-30").unwrap_err();
        assert!(matches!(err, ClimateError::Config { .. }));
        let err = resolve_parts("bad", 2010, 0, "-01-01", "-13-01").unwrap_err();
        assert!(matches!(err, ClimateError::Config { .. }));
        let err = resolve_parts("bad", 2010, 1, "-01-01", "-02-01").unwrap_err();
        assert!(matches!(err, ClimateError::Config { .. }));
    }

    #[test]
    fn leap_day_only_resolves_in_leap_years() {
        let w = window(StartOffset::SameYear, "-01-01", "-02-29");
        assert!(resolve(&w, 2012).is_ok());
        assert!(matches!(resolve(&w, 2013), Err(ClimateError::Config { .. })));
    }

    #[test]
    fn window_membership_is_half_open() {
        let resolved = resolve(&window(StartOffset::PreviousYear, "-12-01", "-04-30"), 2015).unwrap();
        assert!(resolved.contains(NaiveDate::from_ymd_opt(2014, 12, 1).unwrap()));
        assert!(resolved.contains(NaiveDate::from_ymd_opt(2015, 4, 29).unwrap()));
        assert!(!resolved.contains(NaiveDate::from_ymd_opt(2015, 4, 30).unwrap()));
        assert!(!resolved.contains(NaiveDate::from_ymd_opt(2014, 11, 30).unwrap()));
    }

    #[test]
    fn find_reports_unknown_names() {
        let windows = vec![window(StartOffset::SameYear, "-05-01", "-10-15")];
        assert!(find(&windows, "test").is_ok());
        assert!(matches!(find(&windows, "main"), Err(ClimateError::Config { .. })));
        assert_eq!(resolve_all(&windows, 2012).unwrap().len(), 1);
    }
}
