#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Operator CLI for the cropstats toolchain.
//!
//! ```text
//! cropstats windows [--config PATH] [--year 2015]
//! cropstats shape --geojson regions.geojson [--target sheridan --candidate null_geo9]
//! cropstats pivot --input long.csv --output wide.csv [--config PATH]
//! cropstats baseline --input wide.csv --fields 1,5,pr_ann [--status irrigated]
//! ```
//!
//! Every subcommand reads the embedded default analysis unless `--config`
//! points at another TOML file.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cropstats_climate::window;
use cropstats_pipeline::config::AnalysisConfig;
use cropstats_spatial::regions_from_geojson;
use cropstats_spatial::shape::{DEFAULT_SHORT_SIDE_M, ShapeComparison, ShapeMetrics};
use cropstats_table::baseline::baseline_means;
use cropstats_table::pivot::{pivot_all, read_long_records};
use cropstats_table::table::WideTable;
use cropstats_table_models::{BaselinePeriod, WideSchema};
use cropstats_zonal_models::IrrigationStatus;

#[derive(Parser)]
#[command(name = "cropstats", about = "Crop area and climate statistics for irrigation regions")]
struct Cli {
    /// Analysis config (TOML); defaults to the embedded analysis
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the seasonal windows resolved for a year
    Windows {
        /// Target year (defaults to the config's last year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print perimeter/area metrics for every region of a GeoJSON file
    Shape {
        /// Regions in a projected, metre-based CRS
        #[arg(long)]
        geojson: PathBuf,
        /// Feature property holding the region id
        #[arg(long, default_value = "masterid")]
        id_property: String,
        /// Short side of the thin-rectangle reference, in metres
        #[arg(long, default_value_t = DEFAULT_SHORT_SIDE_M)]
        short_side: f64,
        /// Region to compare against
        #[arg(long, requires = "candidate")]
        target: Option<String>,
        /// Candidate control region
        #[arg(long, requires = "target")]
        candidate: Option<String>,
    },
    /// Pivot long-format zonal records into the wide table
    Pivot {
        /// CSV with region_id,year,status,category,area_m2
        #[arg(long)]
        input: PathBuf,
        /// Output CSV
        #[arg(long)]
        output: PathBuf,
    },
    /// Print per-region baseline means as JSON
    Baseline {
        /// Wide CSV written by `pivot` or the pipeline
        #[arg(long)]
        input: PathBuf,
        /// Fields to average (category codes or auxiliary names)
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
        /// Only average rows with this status
        #[arg(long)]
        status: Option<IrrigationStatus>,
        /// First baseline year (defaults to the config's start year)
        #[arg(long)]
        start: Option<i32>,
        /// Last baseline year (defaults to the config's baseline cutoff)
        #[arg(long)]
        end: Option<i32>,
    },
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::embedded()?,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Windows { year } => {
            let year = year.unwrap_or(config.end_year);
            println!("{:<12} {:<12} {:<12} DAYS", "WINDOW", "START", "END");
            for resolved in window::resolve_all(&config.windows, year)? {
                println!(
                    "{:<12} {:<12} {:<12} {}",
                    resolved.name,
                    resolved.start.to_string(),
                    resolved.end.to_string(),
                    resolved.days()
                );
            }
        }
        Commands::Shape {
            geojson,
            id_property,
            short_side,
            target,
            candidate,
        } => {
            let text = std::fs::read_to_string(&geojson)?;
            let regions = regions_from_geojson(&text, &id_property)?;

            println!(
                "{:<20} {:>14} {:>16} {:>12} {:>12} {:>12}",
                "REGION", "PERIMETER_M", "AREA_M2", "DENSITY", "CIRCLE", "RECTANGLE"
            );
            for region in &regions {
                let metrics = ShapeMetrics::from_region(region);
                let bounds = metrics.bounds(short_side);
                println!(
                    "{:<20} {:>14.1} {:>16.1} {:>12.6} {:>12.6} {:>12.6}",
                    region.id(),
                    metrics.perimeter_m,
                    metrics.area_m2,
                    metrics.density,
                    bounds.circle,
                    bounds.thin_rectangle
                );
            }

            if let (Some(target), Some(candidate)) = (target, candidate) {
                let find = |id: &str| {
                    regions
                        .iter()
                        .find(|r| r.id() == id)
                        .map(ShapeMetrics::from_region)
                        .ok_or_else(|| format!("region '{id}' not found in {}", geojson.display()))
                };
                let comparison = ShapeComparison::new(find(&target)?, find(&candidate)?);
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            }
        }
        Commands::Pivot { input, output } => {
            let records = read_long_records(BufReader::new(File::open(&input)?))?;
            let schema = WideSchema::new(config.category_set()?, Vec::<String>::new())?;
            let table = pivot_all(&schema, records)?;
            table.write_csv(BufWriter::new(File::create(&output)?))?;
            log::info!("Wrote {} rows to {}", table.len(), output.display());
        }
        Commands::Baseline {
            input,
            fields,
            status,
            start,
            end,
        } => {
            let table = WideTable::read_csv(&config.category_set()?, BufReader::new(File::open(&input)?))?;
            let default_period = config.baseline_period();
            let period = BaselinePeriod::new(
                start.unwrap_or(default_period.start_year),
                end.unwrap_or(default_period.end_year),
            );
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let summaries = baseline_means(table.schema(), table.rows(), period, &fields, status)?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}
