//! Keyed collections of wide rows and their CSV form.

use std::collections::BTreeMap;
use std::io;

use cropstats_table_models::{KEY_COLUMNS, RowKey, WideRow, WideSchema};
use cropstats_zonal_models::{CategorySet, IrrigationStatus};

use crate::TableError;

/// Rows sharing one schema, unique by key and ordered by year, region,
/// status.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    schema: WideSchema,
    rows: BTreeMap<RowKey, WideRow>,
}

impl WideTable {
    #[must_use]
    pub const fn new(schema: WideSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &WideSchema {
        &self.schema
    }

    /// Adds a row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateKey`] if a row with the same key is
    /// already present and [`TableError::Malformed`] if the row was not built
    /// against this table's schema.
    pub fn insert(&mut self, row: WideRow) -> Result<(), TableError> {
        if row.values.len() != self.schema.categories().len()
            || row.auxiliary.len() != self.schema.auxiliary().len()
        {
            return Err(TableError::Malformed {
                message: format!("row {} does not match the table schema", row.key),
            });
        }
        if self.rows.contains_key(&row.key) {
            return Err(TableError::DuplicateKey { key: row.key });
        }
        self.rows.insert(row.key.clone(), row);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &RowKey) -> Option<&WideRow> {
        self.rows.get(key)
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &WideRow> {
        self.rows.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the header and every row as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Csv`] if writing fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), TableError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.schema.header())?;
        for row in self.rows.values() {
            csv.write_record(row.record())?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Reads a table written by [`WideTable::write_csv`].
    ///
    /// The header must start with the key columns followed by exactly the
    /// codes of `categories` in order; remaining columns are auxiliary
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Malformed`] if the header or a value does not
    /// fit the layout, [`TableError::DuplicateKey`] for repeated keys and
    /// [`TableError::Csv`] for unreadable input.
    pub fn read_csv<R: io::Read>(categories: &CategorySet, reader: R) -> Result<Self, TableError> {
        let mut csv = csv::Reader::from_reader(reader);
        let header: Vec<String> = csv.headers()?.iter().map(String::from).collect();

        let n_keys = KEY_COLUMNS.len();
        let n_codes = categories.len();
        let expected_codes: Vec<String> = categories.codes().iter().map(ToString::to_string).collect();
        if header.len() < n_keys + n_codes
            || header[..n_keys] != KEY_COLUMNS
            || header[n_keys..n_keys + n_codes] != expected_codes[..]
        {
            return Err(TableError::Malformed {
                message: format!("unexpected header {header:?}"),
            });
        }

        let schema = WideSchema::new(categories.clone(), header[n_keys + n_codes..].iter().cloned())
            .map_err(|e| TableError::Malformed {
                message: e.to_string(),
            })?;
        let mut table = Self::new(schema);

        for (line, record) in csv.records().enumerate() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default();
            let year = field(1).parse::<i32>().map_err(|e| malformed(line, &e))?;
            let status = field(2).parse::<IrrigationStatus>().map_err(|e| malformed(line, &e))?;
            let mut row = WideRow::empty(table.schema(), RowKey::new(field(0), year, status));

            for (i, value) in row.values.iter_mut().enumerate() {
                *value = field(n_keys + i).parse::<f64>().map_err(|e| malformed(line, &e))?;
            }
            for (i, value) in row.auxiliary.iter_mut().enumerate() {
                let cell = field(n_keys + n_codes + i);
                *value = if cell.is_empty() {
                    None
                } else {
                    Some(cell.parse::<f64>().map_err(|e| malformed(line, &e))?)
                };
            }
            table.insert(row)?;
        }

        Ok(table)
    }
}

fn malformed(line: usize, err: &dyn std::fmt::Display) -> TableError {
    TableError::Malformed {
        message: format!("data line {}: {err}", line + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> WideSchema {
        WideSchema::new(CategorySet::new([1, 5]).unwrap(), ["pr_ann"]).unwrap()
    }

    fn row(region: &str, year: i32, values: [f64; 2], pr: Option<f64>) -> WideRow {
        WideRow {
            key: RowKey::new(region, year, IrrigationStatus::None),
            values: values.to_vec(),
            auxiliary: vec![pr],
        }
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut table = WideTable::new(schema());
        table.insert(row("R1", 2010, [1.0, 2.0], None)).unwrap();
        let err = table.insert(row("R1", 2010, [3.0, 4.0], None)).unwrap_err();
        assert!(matches!(err, TableError::DuplicateKey { .. }));
    }

    #[test]
    fn rejects_rows_of_another_schema() {
        let mut table = WideTable::new(schema());
        let mut bad = row("R1", 2010, [1.0, 2.0], None);
        bad.values.push(3.0);
        assert!(matches!(table.insert(bad), Err(TableError::Malformed { .. })));
    }

    #[test]
    fn writes_fixed_header_in_key_order() {
        let mut table = WideTable::new(schema());
        table.insert(row("R2", 2010, [1.0, 0.0], Some(300.5))).unwrap();
        table.insert(row("R1", 2011, [0.0, 2.5], None)).unwrap();
        table.insert(row("R1", 2010, [4.0, 0.0], Some(280.0))).unwrap();

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "region_id,year,status,1,5,pr_ann\n\
             R1,2010,none,4,0,280\n\
             R2,2010,none,1,0,300.5\n\
             R1,2011,none,0,2.5,\n"
        );
    }

    #[test]
    fn reads_back_written_table() {
        let mut table = WideTable::new(schema());
        table.insert(row("R1", 2010, [4.0, 0.0], Some(280.0))).unwrap();
        table.insert(row("R1", 2011, [0.0, 2.5], None)).unwrap();
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();

        let read = WideTable::read_csv(&CategorySet::new([1, 5]).unwrap(), out.as_slice()).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn read_rejects_wrong_category_columns() {
        let text = "region_id,year,status,5,1\nR1,2010,none,0,0\n";
        let err = WideTable::read_csv(&CategorySet::new([1, 5]).unwrap(), text.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::Malformed { .. }));
    }
}
