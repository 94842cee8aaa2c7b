//! Analysis configuration.
//!
//! The default analysis is embedded at compile time via [`include_str!`];
//! [`AnalysisConfig::from_path`] loads an operator-supplied file with the
//! same layout. Every loaded config is validated before use.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use cropstats_climate_models::{ClimateWindow, CompositeSpec};
use cropstats_table_models::{BaselinePeriod, WideSchema};
use cropstats_zonal_models::{CategoryCode, CategorySet, IrrigationStatus};
use serde::Deserialize;
use thiserror::Error;

/// Embedded default analysis.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Auxiliary column names produced by well attribution.
pub const WELL_FIELDS: [&str; 3] = ["wells", "volume_m3", "volume_per_area_m"];

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML did not match the expected layout.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The values are inconsistent.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

/// Names of the backend layers the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerConfig {
    /// Categorical land-cover layer.
    pub categorical: String,
    /// Binary irrigation indicator layer.
    pub indicator: String,
    /// Optional geometry limiting where irrigation can be flagged.
    #[serde(default)]
    pub eligibility: Option<String>,
    /// `[from, to]` pairs applied to the categorical layer before the
    /// split. Classes not listed are masked.
    #[serde(default)]
    pub remap: Vec<[CategoryCode; 2]>,
    /// Masks every class outside `categories` when no `remap` is given.
    #[serde(default)]
    pub mask_unlisted: bool,
}

/// Multi-year irrigation frequency column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrequencyConfig {
    /// Auxiliary column holding the area irrigated in more than
    /// `min_years` of the configured years.
    pub field: String,
    pub min_years: u16,
}

/// Sampling scales in metres.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScaleConfig {
    pub categorical: f64,
    pub climate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
    /// Concurrent tasks per batch.
    pub size: usize,
}

/// Backoff for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per backend call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub base_delay_ms: u64,
}

impl RetryConfig {
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Composite raster export settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportConfig {
    pub crs: String,
    pub scale: f64,
    /// Years whose composites are handed to the export collaborator.
    #[serde(default)]
    pub composite_years: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WellsConfig {
    pub enabled: bool,
    /// Factor converting reported volumes to cubic metres.
    pub unit_factor: f64,
}

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisConfig {
    pub start_year: i32,
    pub end_year: i32,
    /// Last year of the baseline period, which starts at `start_year`.
    pub baseline_cutoff: i32,
    pub categories: Vec<CategoryCode>,
    pub statuses: Vec<IrrigationStatus>,
    pub layers: LayerConfig,
    pub scales: ScaleConfig,
    #[serde(default)]
    pub windows: Vec<ClimateWindow>,
    #[serde(default)]
    pub composites: Vec<CompositeSpec>,
    pub pool: PoolConfig,
    pub retry: RetryConfig,
    pub export: ExportConfig,
    pub wells: WellsConfig,
    #[serde(default)]
    pub frequency: Option<FrequencyConfig>,
}

impl AnalysisConfig {
    /// The embedded default analysis.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded TOML is invalid.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Loads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text cannot be parsed or validated.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid { message }) };

        if self.start_year > self.end_year {
            return invalid(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            ));
        }
        if !(self.start_year..=self.end_year).contains(&self.baseline_cutoff) {
            return invalid(format!(
                "baseline_cutoff {} outside {}..={}",
                self.baseline_cutoff, self.start_year, self.end_year
            ));
        }
        if self.categories.is_empty() {
            return invalid("no categories configured".to_string());
        }
        if let Err(e) = CategorySet::new(self.categories.iter().copied()) {
            return invalid(e.to_string());
        }
        if self.statuses.is_empty() {
            return invalid("no statuses configured".to_string());
        }
        let mut statuses = BTreeSet::new();
        for status in &self.statuses {
            if !statuses.insert(*status) {
                return invalid(format!("status '{status}' listed more than once"));
            }
        }
        let mut sources = BTreeSet::new();
        for [from, to] in &self.layers.remap {
            if !sources.insert(*from) {
                return invalid(format!("layers.remap maps {from} more than once"));
            }
            if !self.categories.contains(to) {
                return invalid(format!("layers.remap target {to} is not a configured category"));
            }
        }
        if let Some(frequency) = &self.frequency
            && frequency.min_years >= self.year_count()
        {
            return invalid(format!(
                "frequency.min_years {} leaves no year above the threshold in {}..={}",
                frequency.min_years, self.start_year, self.end_year
            ));
        }
        for (name, scale) in [
            ("scales.categorical", self.scales.categorical),
            ("scales.climate", self.scales.climate),
            ("export.scale", self.export.scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                return invalid(format!("{name} must be positive, got {scale}"));
            }
        }
        if self.pool.size == 0 {
            return invalid("pool.size must be at least 1".to_string());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".to_string());
        }

        let mut windows = BTreeSet::new();
        for window in &self.windows {
            if !windows.insert(window.name.as_str()) {
                return invalid(format!("window '{}' defined more than once", window.name));
            }
        }
        let mut composites = BTreeSet::new();
        for composite in &self.composites {
            if !windows.contains(composite.window()) {
                return invalid(format!(
                    "composite '{}' references unknown window '{}'",
                    composite.name(),
                    composite.window()
                ));
            }
            if !composites.insert(composite.name()) {
                return invalid(format!("composite '{}' defined more than once", composite.name()));
            }
        }

        self.schema().map(|_| ())
    }

    /// Years to process, inclusive.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }

    fn year_count(&self) -> u16 {
        u16::try_from(self.years().count()).unwrap_or(u16::MAX)
    }

    /// Remap pairs for the categorical layer: the explicit `layers.remap`
    /// pairs, else identity pairs over `categories` when `mask_unlisted` is
    /// set.
    #[must_use]
    pub fn category_remap(&self) -> Option<Vec<(CategoryCode, CategoryCode)>> {
        if !self.layers.remap.is_empty() {
            return Some(self.layers.remap.iter().map(|[from, to]| (*from, *to)).collect());
        }
        self.layers
            .mask_unlisted
            .then(|| self.categories.iter().map(|c| (*c, *c)).collect())
    }

    #[must_use]
    pub const fn baseline_period(&self) -> BaselinePeriod {
        BaselinePeriod::new(self.start_year, self.baseline_cutoff)
    }

    /// The closed category domain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a code repeats.
    pub fn category_set(&self) -> Result<CategorySet, ConfigError> {
        CategorySet::new(self.categories.iter().copied()).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }

    /// Auxiliary columns: composite names in config order, the frequency
    /// field when configured, then well fields when enabled.
    #[must_use]
    pub fn auxiliary_fields(&self) -> Vec<String> {
        let composites = self.composites.iter().map(|c| c.name().to_string());
        let frequency = self.frequency.iter().map(|f| f.field.clone());
        let wells = WELL_FIELDS
            .iter()
            .filter(|_| self.wells.enabled)
            .map(ToString::to_string);
        composites.chain(frequency).chain(wells).collect()
    }

    /// Wide-table schema of every row this config produces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if categories repeat or auxiliary
    /// names clash.
    pub fn schema(&self) -> Result<WideSchema, ConfigError> {
        WideSchema::new(self.category_set()?, self.auxiliary_fields()).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_is_valid() {
        let config = AnalysisConfig::embedded().unwrap();
        assert_eq!(config.years().count(), 10);
        assert_eq!(config.baseline_period(), BaselinePeriod::new(2008, 2012));
        assert_eq!(config.windows.len(), 4);
        assert_eq!(config.composites.len(), 7);
        assert_eq!(config.statuses, vec![IrrigationStatus::Irrigated, IrrigationStatus::Rainfed]);
        for code in [1, 4, 5, 24, 36, 176] {
            assert!(config.categories.contains(&code));
        }
        assert!((config.export.scale - config.scales.climate).abs() < f64::EPSILON);

        let remap = config.category_remap().unwrap();
        assert_eq!(remap.len(), config.categories.len());
        assert!(remap.iter().all(|(from, to)| from == to));
        assert!(!remap.iter().any(|(from, _)| *from == 229));
    }

    #[test]
    fn embedded_schema_has_composites_then_wells() {
        let config = AnalysisConfig::embedded().unwrap();
        let schema = config.schema().unwrap();
        let aux = schema.auxiliary();
        assert_eq!(aux.first().map(String::as_str), Some("pr_ann"));
        assert_eq!(aux[config.composites.len()], "irrigated_frequent_m2");
        assert_eq!(&aux[aux.len() - 3..], WELL_FIELDS);
    }

    fn minimal(extra: &str) -> String {
        format!(
            r#"
            start_year = 2010
            end_year = 2012
            baseline_cutoff = 2011
            categories = [1, 5]
            statuses = ["none"]
            [layers]
            categorical = "cdl"
            indicator = "irr"
            [scales]
            categorical = 30.0
            climate = 4000.0
            [pool]
            size = 2
            [retry]
            max_attempts = 3
            base_delay_ms = 0
            [export]
            crs = "EPSG:5070"
            scale = 30.0
            [wells]
            enabled = false
            unit_factor = 1.0
            {extra}
            "#
        )
    }

    #[test]
    fn minimal_config_parses() {
        let config = AnalysisConfig::from_toml_str(&minimal("")).unwrap();
        assert!(config.layers.eligibility.is_none());
        assert!(config.auxiliary_fields().is_empty());
        assert!(config.category_remap().is_none());
        assert!(config.frequency.is_none());
    }

    #[test]
    fn rejects_duplicate_statuses() {
        let mut config = AnalysisConfig::from_toml_str(&minimal("")).unwrap();
        config.statuses = vec![IrrigationStatus::Irrigated, IrrigationStatus::Irrigated];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("irrigated"), "{err}");
        config.statuses = vec![IrrigationStatus::Irrigated, IrrigationStatus::Rainfed];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_remap_wins_over_mask_unlisted() {
        let mut config = AnalysisConfig::from_toml_str(&minimal("")).unwrap();
        config.layers.mask_unlisted = true;
        assert_eq!(config.category_remap(), Some(vec![(1, 1), (5, 5)]));

        config.layers.remap = vec![[1, 1], [26, 5], [225, 5]];
        assert!(config.validate().is_ok());
        assert_eq!(config.category_remap(), Some(vec![(1, 1), (26, 5), (225, 5)]));

        config.layers.remap = vec![[1, 1], [26, 24]];
        assert!(config.validate().is_err());
        config.layers.remap = vec![[1, 1], [1, 5]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn frequency_adds_a_column_and_bounds_its_threshold() {
        let extra = r#"
            [frequency]
            field = "irrigated_often_m2"
            min_years = 1
        "#;
        let mut config = AnalysisConfig::from_toml_str(&minimal(extra)).unwrap();
        assert_eq!(config.auxiliary_fields(), vec!["irrigated_often_m2".to_string()]);

        if let Some(frequency) = config.frequency.as_mut() {
            frequency.min_years = 3;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_composite_with_unknown_window() {
        let extra = r#"
            [[composites]]
            kind = "band"
            name = "pr_grow"
            dataset = "gridmet"
            window = "main"
            variable = "pr"
            reducer = "sum"
        "#;
        let err = AnalysisConfig::from_toml_str(&minimal(extra)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_cutoff_outside_range() {
        let mut config = AnalysisConfig::from_toml_str(&minimal("")).unwrap();
        config.baseline_cutoff = 2020;
        assert!(config.validate().is_err());
        config.baseline_cutoff = 2011;
        config.pool.size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_categories() {
        let mut config = AnalysisConfig::from_toml_str(&minimal("")).unwrap();
        config.categories = vec![1, 5, 1];
        assert!(config.validate().is_err());
    }
}
