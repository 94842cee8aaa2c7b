//! Task planning.

use cropstats_table_models::RowKey;
use cropstats_zonal_models::IrrigationStatus;

/// All tasks of one year. Tasks within a batch share the year's rasters and
/// composites and run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub year: i32,
    pub tasks: Vec<RowKey>,
}

impl Batch {
    /// Whether any task needs the irrigated/rainfed split.
    #[must_use]
    pub fn needs_split(&self) -> bool {
        self.tasks.iter().any(|t| t.status != IrrigationStatus::None)
    }
}

/// Expands years × regions × statuses into one batch per year.
///
/// Batches are in year order; tasks within a batch are in region order, then
/// status order as given.
#[must_use]
pub fn plan(
    years: impl IntoIterator<Item = i32>,
    region_ids: &[String],
    statuses: &[IrrigationStatus],
) -> Vec<Batch> {
    let mut regions: Vec<&String> = region_ids.iter().collect();
    regions.sort();
    regions.dedup();

    years
        .into_iter()
        .map(|year| Batch {
            year,
            tasks: regions
                .iter()
                .flat_map(|region| statuses.iter().map(move |status| RowKey::new(region.as_str(), year, *status)))
                .collect(),
        })
        .collect()
}
