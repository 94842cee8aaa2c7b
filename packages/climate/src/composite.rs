//! Climate composites: per-pixel reductions of a periodic raster stack over
//! a resolved window.
//!
//! Masked pixels are skipped by both reducers. A pixel masked in every image
//! of the window stays masked, and a ratio pixel whose denominator reduces
//! to zero is masked rather than failing the composite. Downstream zonal
//! means skip masked pixels, so these surface as missing values.

use cropstats_climate_models::{CompositeSpec, Reducer, ResolvedWindow};
use cropstats_raster_models::{Grid, ImageCollection, MultiBandRaster};
use ndarray::{Array2, Zip};

use crate::ClimateError;

/// Builds one composite band.
///
/// # Errors
///
/// Returns [`ClimateError::EmptyCollection`] if no image falls inside the
/// window, [`ClimateError::MissingVariable`] if a required variable is
/// absent from every windowed image, or
/// [`ClimateError::IncompatibleExtents`] if the images disagree on grid
/// geometry.
pub fn composite(
    spec: &CompositeSpec,
    stack: &ImageCollection,
    window: &ResolvedWindow,
) -> Result<Grid<f64>, ClimateError> {
    let windowed = stack.filter_date(window.start, window.end);
    if windowed.is_empty() {
        return Err(ClimateError::EmptyCollection {
            composite: spec.name().to_string(),
            start: window.start,
            end: window.end,
        });
    }

    log::debug!(
        "Composite '{}' over {} ({} images, {} .. {})",
        spec.name(),
        window.name,
        windowed.len(),
        window.start,
        window.end
    );

    match spec {
        CompositeSpec::Band {
            name,
            variable,
            reducer,
            ..
        } => reduce_variable(name, &windowed, variable, *reducer),
        CompositeSpec::Ratio {
            name,
            numerator,
            denominator,
            reducer,
            ..
        } => {
            let num = reduce_variable(name, &windowed, numerator, *reducer)?;
            let den = reduce_variable(name, &windowed, denominator, *reducer)?;
            ratio(&num, &den).ok_or_else(|| ClimateError::IncompatibleExtents {
                composite: name.clone(),
            })
        }
    }
}

/// Builds every composite into one multi-band raster, bands in input order.
///
/// Each input pairs a spec with the stack of its dataset and its resolved
/// window. Inputs are independent, so callers may build different years
/// concurrently.
///
/// # Errors
///
/// Returns the first error produced by [`composite`], or
/// [`ClimateError::IncompatibleExtents`] if composites disagree on grid
/// geometry.
pub fn build<'a, I>(inputs: I) -> Result<MultiBandRaster, ClimateError>
where
    I: IntoIterator<Item = (&'a CompositeSpec, &'a ImageCollection, &'a ResolvedWindow)>,
{
    let mut raster = MultiBandRaster::new();
    for (spec, stack, window) in inputs {
        let band = composite(spec, stack, window)?;
        if let Some(first) = raster.bands().first()
            && !first.grid.same_geometry(&band)
        {
            return Err(ClimateError::IncompatibleExtents {
                composite: spec.name().to_string(),
            });
        }
        raster.push(spec.name(), band);
    }
    Ok(raster)
}

/// Reduces one variable across the (already windowed) stack.
fn reduce_variable(
    composite: &str,
    windowed: &ImageCollection,
    variable: &str,
    reducer: Reducer,
) -> Result<Grid<f64>, ClimateError> {
    let mut grids = windowed.select(variable);
    let Some(first) = grids.next() else {
        return Err(ClimateError::MissingVariable {
            composite: composite.to_string(),
            variable: variable.to_string(),
        });
    };

    let dim = first.cells().dim();
    let mut sums = Array2::<f64>::zeros(dim);
    let mut counts = Array2::<u32>::zeros(dim);

    for grid in std::iter::once(first).chain(grids) {
        if !grid.same_geometry(first) {
            return Err(ClimateError::IncompatibleExtents {
                composite: composite.to_string(),
            });
        }
        Zip::from(&mut sums)
            .and(&mut counts)
            .and(grid.cells())
            .for_each(|sum, count, cell| {
                if let Some(v) = cell
                    && v.is_finite()
                {
                    *sum += v;
                    *count += 1;
                }
            });
    }

    let cells = Zip::from(&sums)
        .and(&counts)
        .map_collect(|&sum, &count| match (count, reducer) {
            (0, _) => None,
            (_, Reducer::Sum) => Some(sum),
            (n, Reducer::Mean) => Some(sum / f64::from(n)),
        });

    Ok(Grid::from_array(*first.transform(), cells))
}

/// Per-pixel `num / den`; zero or masked denominators mask the pixel.
fn ratio(num: &Grid<f64>, den: &Grid<f64>) -> Option<Grid<f64>> {
    num.zip_map(den, |n, d| match (n, d) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    })
}
