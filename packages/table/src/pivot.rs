//! Sparse-to-wide pivot.

use std::collections::BTreeMap;
use std::io;

use cropstats_table_models::{Field, RowKey, WideRow, WideSchema};
use cropstats_zonal_models::{CategoryCode, IrrigationStatus, ZonalRecord};
use serde::Deserialize;

use crate::TableError;
use crate::table::WideTable;

/// Builds the dense row for `key` from its sparse records.
///
/// Every category starts at zero and each record's area is added to its
/// column, so categories with no record read as `0` and repeated records for
/// one category are summed. Auxiliary fields start missing.
///
/// # Errors
///
/// Returns [`TableError::SchemaViolation`] for a code outside the set,
/// [`TableError::KeyMismatch`] for a record belonging to another row and
/// [`TableError::InvalidArea`] for a negative or non-finite area.
pub fn pivot(schema: &WideSchema, key: RowKey, records: &[ZonalRecord]) -> Result<WideRow, TableError> {
    let mut row = WideRow::empty(schema, key);

    for record in records {
        if record.region_id != row.key.region_id || record.year != row.key.year || record.status != row.key.status {
            return Err(TableError::KeyMismatch {
                key: row.key,
                record: RowKey::new(record.region_id.clone(), record.year, record.status),
            });
        }
        let Some(position) = schema.categories().position(record.category) else {
            return Err(TableError::SchemaViolation {
                key: row.key,
                category: record.category,
            });
        };
        if !record.area_m2.is_finite() || record.area_m2 < 0.0 {
            return Err(TableError::InvalidArea {
                key: row.key,
                category: record.category,
                area_m2: record.area_m2,
            });
        }
        row.values[position] += record.area_m2;
    }

    Ok(row)
}

/// Sets auxiliary field `name` on `row`.
///
/// # Errors
///
/// Returns [`TableError::UnknownField`] if `name` is not an auxiliary field
/// of the schema.
pub fn set_auxiliary(schema: &WideSchema, row: &mut WideRow, name: &str, value: Option<f64>) -> Result<(), TableError> {
    match schema.field(name) {
        Some(Field::Auxiliary(i)) => {
            row.auxiliary[i] = value.filter(|v| v.is_finite());
            Ok(())
        }
        _ => Err(TableError::UnknownField {
            field: name.to_string(),
        }),
    }
}

/// Groups records by row key and pivots each group into one table.
///
/// # Errors
///
/// Returns the first error produced by [`pivot`].
pub fn pivot_all(schema: &WideSchema, records: Vec<ZonalRecord>) -> Result<WideTable, TableError> {
    let mut groups: BTreeMap<RowKey, Vec<ZonalRecord>> = BTreeMap::new();
    for record in records {
        let key = RowKey::new(record.region_id.clone(), record.year, record.status);
        groups.entry(key).or_default().push(record);
    }

    let mut table = WideTable::new(schema.clone());
    for (key, group) in groups {
        table.insert(pivot(schema, key, &group)?)?;
    }
    log::debug!("Pivoted {} rows", table.len());
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct LongRecord {
    region_id: String,
    year: i32,
    status: IrrigationStatus,
    category: CategoryCode,
    area_m2: f64,
}

/// Reads long-format records (`region_id,year,status,category,area_m2`).
///
/// # Errors
///
/// Returns [`TableError::Csv`] if a line cannot be parsed.
pub fn read_long_records<R: io::Read>(reader: R) -> Result<Vec<ZonalRecord>, TableError> {
    let mut csv = csv::Reader::from_reader(reader);
    csv.deserialize::<LongRecord>()
        .map(|line| -> Result<ZonalRecord, TableError> {
            let line = line?;
            Ok(ZonalRecord {
                region_id: line.region_id,
                year: line.year,
                category: line.category,
                status: line.status,
                area_m2: line.area_m2,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use cropstats_zonal_models::CategorySet;

    use super::*;

    const MAJOR_CROPS: [CategoryCode; 6] = [1, 4, 5, 24, 36, 176];

    fn schema() -> WideSchema {
        WideSchema::new(CategorySet::new(MAJOR_CROPS).unwrap(), ["pr_ann"]).unwrap()
    }

    fn record(region: &str, year: i32, category: CategoryCode, area: f64) -> ZonalRecord {
        ZonalRecord {
            region_id: region.to_string(),
            year,
            category,
            status: IrrigationStatus::Irrigated,
            area_m2: area,
        }
    }

    #[test]
    fn pivots_major_crops_with_zero_fill() {
        let key = RowKey::new("R1", 2015, IrrigationStatus::Irrigated);
        let row = pivot(
            &schema(),
            key.clone(),
            &[record("R1", 2015, 1, 100.0), record("R1", 2015, 5, 50.0)],
        )
        .unwrap();
        assert_eq!(row.key, key);
        assert_eq!(row.values, vec![100.0, 0.0, 50.0, 0.0, 0.0, 0.0]);
        assert_eq!(row.auxiliary, vec![None]);
    }

    #[test]
    fn empty_records_give_all_zero_row() {
        let row = pivot(&schema(), RowKey::new("R1", 2015, IrrigationStatus::Irrigated), &[]).unwrap();
        assert!(row.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn duplicate_records_are_summed() {
        let row = pivot(
            &schema(),
            RowKey::new("R1", 2015, IrrigationStatus::Irrigated),
            &[record("R1", 2015, 24, 10.0), record("R1", 2015, 24, 5.0)],
        )
        .unwrap();
        assert_eq!(row.values[3], 15.0);
    }

    #[test]
    fn code_outside_set_is_a_schema_violation() {
        let err = pivot(
            &schema(),
            RowKey::new("R1", 2015, IrrigationStatus::Irrigated),
            &[record("R1", 2015, 2, 10.0)],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::SchemaViolation { category: 2, .. }));
    }

    #[test]
    fn stray_or_negative_records_are_rejected() {
        let key = RowKey::new("R1", 2015, IrrigationStatus::Irrigated);
        assert!(matches!(
            pivot(&schema(), key.clone(), &[record("R2", 2015, 1, 1.0)]),
            Err(TableError::KeyMismatch { .. })
        ));
        assert!(matches!(
            pivot(&schema(), key, &[record("R1", 2015, 1, -1.0)]),
            Err(TableError::InvalidArea { .. })
        ));
    }

    #[test]
    fn schema_is_stable_across_years() {
        // Each year sees a disjoint set of classes; every yearly file must
        // still carry the same columns in the same order.
        let years = [
            vec![record("R1", 2010, 1, 10.0), record("R1", 2010, 5, 5.0)],
            vec![record("R1", 2011, 176, 20.0)],
            vec![record("R1", 2012, 36, 30.0), record("R1", 2012, 24, 1.0)],
        ];

        let headers: Vec<String> = years
            .into_iter()
            .map(|records| {
                let mut out = Vec::new();
                pivot_all(&schema(), records).unwrap().write_csv(&mut out).unwrap();
                let text = String::from_utf8(out).unwrap();
                let mut lines = text.lines();
                let header = lines.next().unwrap().to_string();
                let row = lines.next().unwrap();
                assert_eq!(row.split(',').count(), header.split(',').count());
                header
            })
            .collect();

        assert_eq!(headers[0], "region_id,year,status,1,4,5,24,36,176,pr_ann");
        assert!(headers.iter().all(|h| *h == headers[0]));
    }

    #[test]
    fn set_auxiliary_requires_known_field() {
        let schema = schema();
        let mut row = WideRow::empty(&schema, RowKey::new("R1", 2015, IrrigationStatus::None));
        set_auxiliary(&schema, &mut row, "pr_ann", Some(412.5)).unwrap();
        assert_eq!(row.auxiliary, vec![Some(412.5)]);
        set_auxiliary(&schema, &mut row, "pr_ann", Some(f64::NAN)).unwrap();
        assert_eq!(row.auxiliary, vec![None]);
        assert!(matches!(
            set_auxiliary(&schema, &mut row, "1", Some(1.0)),
            Err(TableError::UnknownField { .. })
        ));
    }

    #[test]
    fn reads_long_csv() {
        let text = "region_id,year,status,category,area_m2\nR1,2015,irrigated,1,100\nR1,2015,rainfed,5,50.5\n";
        let records = read_long_records(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status, IrrigationStatus::Rainfed);
        assert_eq!(records[1].area_m2, 50.5);
    }
}
