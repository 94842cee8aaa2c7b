//! Shared row collection for concurrent tasks.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use cropstats_table::TableError;
use cropstats_table::table::WideTable;
use cropstats_table_models::{RowKey, WideRow, WideSchema};

/// Append-only, mutex-protected row store keyed by [`RowKey`].
///
/// Tasks push rows in completion order; ordering is applied only when the
/// sink is finalised.
#[derive(Debug, Default)]
pub struct RowSink {
    rows: Mutex<BTreeMap<RowKey, WideRow>>,
}

impl RowSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a completed row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateKey`] if a row with the same key was
    /// already pushed.
    pub fn push(&self, row: WideRow) -> Result<(), TableError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if rows.contains_key(&row.key) {
            return Err(TableError::DuplicateKey { key: row.key });
        }
        rows.insert(row.key.clone(), row);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves every row into a table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a row does not fit `schema`.
    pub fn finalize(self, schema: WideSchema) -> Result<WideTable, TableError> {
        let rows = self.rows.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut table = WideTable::new(schema);
        for row in rows.into_values() {
            table.insert(row)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use cropstats_zonal_models::{CategorySet, IrrigationStatus};

    use super::*;

    fn schema() -> WideSchema {
        WideSchema::new(CategorySet::new([1]).unwrap(), Vec::<String>::new()).unwrap()
    }

    #[test]
    fn duplicate_push_is_rejected() {
        let sink = RowSink::new();
        let key = RowKey::new("R1", 2010, IrrigationStatus::None);
        sink.push(WideRow::empty(&schema(), key.clone())).unwrap();
        assert!(matches!(
            sink.push(WideRow::empty(&schema(), key)),
            Err(TableError::DuplicateKey { .. })
        ));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn finalize_orders_rows() {
        let sink = RowSink::new();
        for (region, year) in [("b", 2011), ("a", 2011), ("b", 2010)] {
            sink.push(WideRow::empty(&schema(), RowKey::new(region, year, IrrigationStatus::None)))
                .unwrap();
        }
        let table = sink.finalize(schema()).unwrap();
        let keys: Vec<String> = table.rows().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["b/2010/none", "a/2011/none", "b/2011/none"]);
    }
}
