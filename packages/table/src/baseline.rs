//! Multi-year baseline means.

use std::collections::BTreeMap;

use cropstats_table_models::{BaselinePeriod, BaselineSummary, Field, WideRow, WideSchema};
use cropstats_zonal_models::IrrigationStatus;

use crate::TableError;

/// Averages `fields` per region over the rows whose year lies in `period`.
///
/// When `status` is given only rows with that status are considered. Missing
/// auxiliary values are skipped, so a field missing in every period row
/// yields `None`. Results are sorted by region id.
///
/// # Errors
///
/// Returns [`TableError::InvalidPeriod`] if the period is inverted,
/// [`TableError::UnknownField`] for a field the schema does not define and
/// [`TableError::InsufficientData`] if a region present in `rows` has no row
/// inside the period.
pub fn baseline_means<'a>(
    schema: &WideSchema,
    rows: impl IntoIterator<Item = &'a WideRow>,
    period: BaselinePeriod,
    fields: &[&str],
    status: Option<IrrigationStatus>,
) -> Result<Vec<BaselineSummary>, TableError> {
    if !period.is_valid() {
        return Err(TableError::InvalidPeriod {
            start_year: period.start_year,
            end_year: period.end_year,
        });
    }

    let resolved: Vec<Field> = fields
        .iter()
        .map(|name| {
            schema.field(name).ok_or_else(|| TableError::UnknownField {
                field: (*name).to_string(),
            })
        })
        .collect::<Result<_, _>>()?;

    let mut by_region: BTreeMap<&str, Vec<&WideRow>> = BTreeMap::new();
    for row in rows {
        if status.is_some_and(|s| s != row.key.status) {
            continue;
        }
        let group = by_region.entry(row.key.region_id.as_str()).or_default();
        if period.contains(row.key.year) {
            group.push(row);
        }
    }

    by_region
        .into_iter()
        .map(|(region_id, group)| {
            if group.is_empty() {
                return Err(TableError::InsufficientData {
                    region_id: region_id.to_string(),
                    start_year: period.start_year,
                    end_year: period.end_year,
                });
            }
            let means = resolved.iter().map(|field| mean(group.iter().filter_map(|row| row.get(*field)))).collect();
            log::debug!("Baseline for '{region_id}' over {} rows", group.len());
            Ok(BaselineSummary {
                region_id: region_id.to_string(),
                period,
                rows: group.len(),
                fields: fields.iter().map(ToString::to_string).collect(),
                means,
            })
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use cropstats_table_models::RowKey;
    use cropstats_zonal_models::CategorySet;

    use super::*;

    fn schema() -> WideSchema {
        WideSchema::new(CategorySet::new([1, 5]).unwrap(), ["pr_ann"]).unwrap()
    }

    fn row(region: &str, year: i32, status: IrrigationStatus, corn: f64, pr: Option<f64>) -> WideRow {
        WideRow {
            key: RowKey::new(region, year, status),
            values: vec![corn, 0.0],
            auxiliary: vec![pr],
        }
    }

    fn rows() -> Vec<WideRow> {
        vec![
            row("R1", 2008, IrrigationStatus::None, 10.0, Some(300.0)),
            row("R1", 2009, IrrigationStatus::None, 20.0, None),
            row("R1", 2010, IrrigationStatus::None, 30.0, Some(500.0)),
            row("R1", 2011, IrrigationStatus::None, 90.0, Some(900.0)),
            row("R1", 2009, IrrigationStatus::Irrigated, 7.0, None),
        ]
    }

    #[test]
    fn mean_over_period_is_arithmetic() {
        let rows = rows();
        let out = baseline_means(
            &schema(),
            &rows,
            BaselinePeriod::new(2008, 2010),
            &["1", "pr_ann"],
            Some(IrrigationStatus::None),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rows, 3);
        assert_eq!(out[0].mean("1"), Some(20.0));
        assert_eq!(out[0].mean("pr_ann"), Some(400.0));
    }

    #[test]
    fn field_missing_everywhere_is_none() {
        let rows = vec![row("R1", 2009, IrrigationStatus::None, 1.0, None)];
        let out = baseline_means(&schema(), &rows, BaselinePeriod::new(2008, 2012), &["pr_ann"], None).unwrap();
        assert_eq!(out[0].means, vec![None]);
    }

    #[test]
    fn region_without_period_rows_is_insufficient() {
        let mut rows = rows();
        rows.push(row("R2", 2015, IrrigationStatus::None, 1.0, None));
        let err = baseline_means(&schema(), &rows, BaselinePeriod::new(2008, 2012), &["1"], None).unwrap_err();
        assert!(matches!(err, TableError::InsufficientData { ref region_id, .. } if region_id == "R2"));
    }

    #[test]
    fn rejects_unknown_field_and_inverted_period() {
        let rows = rows();
        assert!(matches!(
            baseline_means(&schema(), &rows, BaselinePeriod::new(2008, 2012), &["24"], None),
            Err(TableError::UnknownField { .. })
        ));
        assert!(matches!(
            baseline_means(&schema(), &rows, BaselinePeriod::new(2012, 2008), &["1"], None),
            Err(TableError::InvalidPeriod { .. })
        ));
    }
}
