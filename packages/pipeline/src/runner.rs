//! Batch execution.

use std::collections::BTreeMap;
use std::sync::Arc;

use cropstats_climate::{composite, window};
use cropstats_climate_models::ResolvedWindow;
use cropstats_raster_models::{Grid, ImageCollection, MultiBandRaster};
use cropstats_spatial::index::RegionIndex;
use cropstats_spatial::wells::{WellRecord, well_stats};
use cropstats_table::pivot::{pivot, set_auxiliary};
use cropstats_table::table::WideTable;
use cropstats_table_models::{RowKey, WideRow, WideSchema};
use cropstats_zonal::frequency::irrigation_frequency;
use cropstats_zonal::remap::remap;
use cropstats_zonal::split::{IrrigationSplit, split};
use cropstats_zonal_models::{CategoryCode, IrrigationStatus, ZonalRecord};
use futures::stream::{self, StreamExt as _};
use tokio::sync::OnceCell;

use crate::PipelineError;
use crate::backend::Backend;
use crate::config::{AnalysisConfig, WELL_FIELDS};
use crate::export::CompositeExport;
use crate::progress::{ProgressCallback, null_progress};
use crate::retry::with_retry;
use crate::sink::RowSink;
use crate::task::{Batch, plan};

/// A task that could not produce its row.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub key: RowKey,
    pub error: Arc<PipelineError>,
}

/// Result of one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Tasks that failed; their siblings still ran.
    pub failures: Vec<TaskFailure>,
    /// Composites for the export collaborator, when the year is configured
    /// for export.
    pub export: Option<CompositeExport>,
}

/// Result of a full run.
#[derive(Debug)]
pub struct RunReport {
    pub table: WideTable,
    pub failures: Vec<TaskFailure>,
    pub exports: Vec<CompositeExport>,
}

/// Pixels irrigated in more than the configured number of years, with
/// their area weight. Built once per pipeline.
struct FrequencyLayer {
    counts: Grid<CategoryCode>,
    weight: Grid<f64>,
}

/// Inputs shared by every task of one year.
struct YearInputs<'a> {
    year: i32,
    categorical: Grid<CategoryCode>,
    split: Option<IrrigationSplit>,
    weight: Grid<f64>,
    composites: MultiBandRaster,
    frequency: Option<&'a FrequencyLayer>,
    wells: Vec<WellRecord>,
}

impl YearInputs<'_> {
    fn view(&self, status: IrrigationStatus) -> Result<&Grid<CategoryCode>, PipelineError> {
        match (status, &self.split) {
            (IrrigationStatus::None, _) => Ok(&self.categorical),
            (IrrigationStatus::Irrigated, Some(split)) => Ok(&split.irrigated),
            (IrrigationStatus::Rainfed, Some(split)) => Ok(&split.rainfed),
            (status, None) => Err(PipelineError::Task {
                message: format!("no irrigation split prepared for {} ({status})", self.year),
            }),
        }
    }
}

/// Runs configured analyses against a backend.
///
/// Within a batch, `pool.size` bounds how many backend calls are in flight.
/// The default zonal primitives of [`Backend`] compute on the calling task,
/// so with a local backend the pool overlaps data access, not CPU work.
pub struct Pipeline {
    config: AnalysisConfig,
    schema: WideSchema,
    remap: Option<Vec<(CategoryCode, CategoryCode)>>,
    frequency: OnceCell<FrequencyLayer>,
    backend: Arc<dyn Backend>,
    progress: Arc<dyn ProgressCallback>,
}

impl Pipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the config does not validate.
    pub fn new(config: AnalysisConfig, backend: Arc<dyn Backend>) -> Result<Self, PipelineError> {
        config.validate()?;
        let schema = config.schema()?;
        Ok(Self {
            remap: config.category_remap(),
            config,
            schema,
            frequency: OnceCell::new(),
            backend,
            progress: null_progress(),
        })
    }

    /// Replaces the progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[must_use]
    pub const fn schema(&self) -> &WideSchema {
        &self.schema
    }

    /// One batch per configured year over `region_ids`.
    #[must_use]
    pub fn plan(&self, region_ids: &[String]) -> Vec<Batch> {
        plan(self.config.years(), region_ids, &self.config.statuses)
    }

    /// Runs every batch in year order and finalises the table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Table`] if the collected rows cannot form a
    /// table. Individual task failures are reported in the
    /// [`RunReport`] instead.
    pub async fn run(&self, region_ids: &[String]) -> Result<RunReport, PipelineError> {
        let batches = self.plan(region_ids);
        let total: usize = batches.iter().map(|b| b.tasks.len()).sum();
        self.progress.set_total(total as u64);

        let sink = RowSink::new();
        let mut failures = Vec::new();
        let mut exports = Vec::new();

        for batch in &batches {
            let outcome = self.run_batch(batch, &sink).await;
            failures.extend(outcome.failures);
            exports.extend(outcome.export);
        }

        self.progress.finish(format!(
            "Finished {} batches, {} failed tasks",
            batches.len(),
            failures.len()
        ));

        Ok(RunReport {
            table: sink.finalize(self.schema.clone())?,
            failures,
            exports,
        })
    }

    /// Runs one batch, pushing completed rows into `sink`.
    ///
    /// A failure preparing the year's shared inputs fails every task of the
    /// batch; a failing task never cancels its siblings.
    pub async fn run_batch(&self, batch: &Batch, sink: &RowSink) -> BatchOutcome {
        log::info!("Batch {}: {} tasks", batch.year, batch.tasks.len());
        self.progress.set_message(format!("Processing {}", batch.year));

        let inputs = match self.prepare_year(batch).await {
            Ok(inputs) => inputs,
            Err(e) => {
                log::error!("Batch {} failed: {e}", batch.year);
                let error = Arc::new(e);
                self.progress.inc(batch.tasks.len() as u64);
                return BatchOutcome {
                    failures: batch
                        .tasks
                        .iter()
                        .map(|key| TaskFailure {
                            key: key.clone(),
                            error: Arc::clone(&error),
                        })
                        .collect(),
                    export: None,
                };
            }
        };

        let inputs = &inputs;
        let results: Vec<Result<(), TaskFailure>> = stream::iter(batch.tasks.iter().map(|key| async move {
            let result = match self.run_task(inputs, key).await {
                Ok(row) => sink.push(row).map_err(PipelineError::from),
                Err(e) => Err(e),
            };
            self.progress.inc(1);
            result.map_err(|e| {
                log::error!("Task {key} failed: {e}");
                TaskFailure {
                    key: key.clone(),
                    error: Arc::new(e),
                }
            })
        }))
        .buffer_unordered(self.config.pool.size)
        .collect()
        .await;

        BatchOutcome {
            failures: results.into_iter().filter_map(Result::err).collect(),
            export: CompositeExport::for_year(&self.config.export, batch.year, &inputs.composites),
        }
    }

    async fn prepare_year(&self, batch: &Batch) -> Result<YearInputs<'_>, PipelineError> {
        let year = batch.year;
        let retry = &self.config.retry;
        let layers = &self.config.layers;

        let mut categorical = with_retry(retry, "categorical layer", || {
            self.backend.categorical(&layers.categorical, year)
        })
        .await?;
        if let Some(pairs) = &self.remap {
            categorical = remap(&categorical, pairs);
        }

        let split = if batch.needs_split() {
            let indicator = with_retry(retry, "indicator layer", || {
                self.backend.indicator(&layers.indicator, year)
            })
            .await?;
            let eligibility = match &layers.eligibility {
                Some(layer) => Some(with_retry(retry, "eligibility layer", || self.backend.eligibility(layer)).await?),
                None => None,
            };
            Some(split(&categorical, &indicator, eligibility.as_ref())?)
        } else {
            None
        };

        let composites = self.build_composites(year).await?;

        let frequency = match &self.config.frequency {
            Some(settings) => Some(self.frequency_layer(settings.min_years).await?),
            None => None,
        };

        let wells = if self.config.wells.enabled {
            with_retry(retry, "wells", || self.backend.wells(year)).await?
        } else {
            Vec::new()
        };

        log::debug!(
            "Prepared {year}: {} composites, {} wells",
            composites.bands().len(),
            wells.len()
        );

        Ok(YearInputs {
            year,
            weight: Grid::pixel_area(&categorical),
            categorical,
            split,
            composites,
            frequency,
            wells,
        })
    }

    /// Builds the frequency layer from every configured year's indicator on
    /// first use. A failed build is not cached, so the next batch retries it.
    async fn frequency_layer(&self, min_years: u16) -> Result<&FrequencyLayer, PipelineError> {
        self.frequency
            .get_or_try_init(|| async {
                let layer = &self.config.layers.indicator;
                let mut indicators = Vec::new();
                for year in self.config.years() {
                    let indicator = with_retry(&self.config.retry, "indicator layer", || {
                        self.backend.indicator(layer, year)
                    })
                    .await?;
                    indicators.push(indicator);
                }
                let counts = irrigation_frequency(&indicators, min_years)?;
                log::info!(
                    "Frequency layer: {} pixels irrigated in more than {min_years} of {} years",
                    counts.valid_count(),
                    indicators.len()
                );
                Ok::<_, PipelineError>(FrequencyLayer {
                    weight: Grid::pixel_area(&counts),
                    counts,
                })
            })
            .await
    }

    async fn build_composites(&self, year: i32) -> Result<MultiBandRaster, PipelineError> {
        if self.config.composites.is_empty() {
            return Ok(MultiBandRaster::new());
        }

        let mut resolved: BTreeMap<String, ResolvedWindow> = BTreeMap::new();
        for spec in &self.config.composites {
            if !resolved.contains_key(spec.window()) {
                let window = window::resolve(window::find(&self.config.windows, spec.window())?, year)?;
                resolved.insert(window.name.clone(), window);
            }
        }

        let mut stacks: BTreeMap<(String, String), ImageCollection> = BTreeMap::new();
        for spec in &self.config.composites {
            let key = (spec.dataset().to_string(), spec.window().to_string());
            if stacks.contains_key(&key) {
                continue;
            }
            let window = resolved.get(spec.window()).ok_or_else(|| PipelineError::Task {
                message: format!("window '{}' not resolved", spec.window()),
            })?;
            let stack = with_retry(&self.config.retry, "climate collection", || {
                self.backend.collection(spec.dataset(), window)
            })
            .await?;
            stacks.insert(key, stack);
        }

        let mut inputs = Vec::with_capacity(self.config.composites.len());
        for spec in &self.config.composites {
            let key = (spec.dataset().to_string(), spec.window().to_string());
            if let (Some(stack), Some(window)) = (stacks.get(&key), resolved.get(spec.window())) {
                inputs.push((spec, stack, window));
            }
        }

        Ok(composite::build(inputs)?)
    }

    async fn run_task(&self, inputs: &YearInputs<'_>, key: &RowKey) -> Result<WideRow, PipelineError> {
        log::debug!("Task {key}");
        let retry = &self.config.retry;
        let region = with_retry(retry, "region", || self.backend.region(&key.region_id)).await?;
        let regions = std::slice::from_ref(&region);

        let view = inputs.view(key.status)?;
        let sums = with_retry(retry, "grouped zonal sum", || {
            self.backend
                .grouped_zonal_sum(view, &inputs.weight, regions, self.config.scales.categorical)
        })
        .await?;

        let records: Vec<ZonalRecord> = sums
            .into_iter()
            .map(|sum| ZonalRecord::from_sum(sum, key.year, key.status))
            .collect();
        let mut row = pivot(&self.schema, key.clone(), &records)?;

        for band in inputs.composites.bands() {
            let mean = with_retry(retry, "zonal mean", || {
                self.backend
                    .zonal_mean(&band.grid, &region, self.config.scales.climate)
            })
            .await?;
            set_auxiliary(&self.schema, &mut row, &band.name, mean)?;
        }

        if let (Some(settings), Some(layer)) = (&self.config.frequency, inputs.frequency) {
            let sums = with_retry(retry, "grouped zonal sum", || {
                self.backend
                    .grouped_zonal_sum(&layer.counts, &layer.weight, regions, self.config.scales.categorical)
            })
            .await?;
            let area: f64 = sums.iter().map(|s| s.sum).sum();
            set_auxiliary(&self.schema, &mut row, &settings.field, Some(area))?;
        }

        if self.config.wells.enabled {
            let index = RegionIndex::new(regions);
            let stats = well_stats(&index, &inputs.wells, key.year, self.config.wells.unit_factor)
                .remove(region.id())
                .unwrap_or_default();
            let values = [
                f64::from(stats.count),
                stats.volume_m3,
                stats.volume_per_area_m,
            ];
            for (name, value) in WELL_FIELDS.iter().zip(values) {
                set_auxiliary(&self.schema, &mut row, name, Some(value))?;
            }
        }

        Ok(row)
    }
}
