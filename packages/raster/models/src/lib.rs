#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raster grid types shared across the cropstats toolchain.
//!
//! A [`Grid`] is a north-up array of optional cells placed in a projected,
//! metre-based coordinate system by a [`GeoTransform`]. A `None` cell is a
//! masked pixel: it is skipped by every reducer and is the missing-value
//! sentinel carried through composites and zonal statistics.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Placement of a north-up grid. Rows grow southward from `origin_y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner.
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner.
    pub origin_y: f64,
    /// Cell width in metres.
    pub pixel_width: f64,
    /// Cell height in metres.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Creates a transform with square cells of `pixel_size` metres.
    #[must_use]
    pub const fn square(origin_x: f64, origin_y: f64, pixel_size: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width: pixel_size,
            pixel_height: pixel_size,
        }
    }

    /// Area of one cell in square metres.
    #[must_use]
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// Map coordinate of the centre of cell (`row`, `col`).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            (col as f64 + 0.5).mul_add(self.pixel_width, self.origin_x),
            (row as f64 + 0.5).mul_add(-self.pixel_height, self.origin_y),
        )
    }
}

/// Axis-aligned bounds of a grid in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Error returned by [`Grid::from_cells`] when the cell count does not
/// match `width * height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShapeError {
    /// Number of cells the shape requires.
    pub expected: usize,
    /// Number of cells supplied.
    pub actual: usize,
}

impl std::fmt::Display for GridShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "grid shape needs {} cells but {} were supplied",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for GridShapeError {}

/// A single-band raster with optional (maskable) cells, indexed `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    transform: GeoTransform,
    cells: Array2<Option<T>>,
}

impl<T: Copy> Grid<T> {
    /// Creates a grid where every cell holds `value`.
    #[must_use]
    pub fn filled(transform: GeoTransform, width: usize, height: usize, value: Option<T>) -> Self {
        Self {
            transform,
            cells: Array2::from_elem((height, width), value),
        }
    }

    /// Creates a grid from row-major cells.
    ///
    /// # Errors
    ///
    /// Returns [`GridShapeError`] if `cells.len() != width * height`.
    pub fn from_cells(
        transform: GeoTransform,
        width: usize,
        height: usize,
        cells: Vec<Option<T>>,
    ) -> Result<Self, GridShapeError> {
        let actual = cells.len();
        let cells = Array2::from_shape_vec((height, width), cells).map_err(|_| GridShapeError {
            expected: width * height,
            actual,
        })?;
        Ok(Self { transform, cells })
    }

    /// Wraps an existing `(height, width)` array.
    #[must_use]
    pub const fn from_array(transform: GeoTransform, cells: Array2<Option<T>>) -> Self {
        Self { transform, cells }
    }

    #[must_use]
    pub const fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.cells.nrows()
    }

    #[must_use]
    pub const fn cells(&self) -> &Array2<Option<T>> {
        &self.cells
    }

    /// Value of cell (`row`, `col`); `None` when masked or out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.cells.get((row, col)).copied().flatten()
    }

    /// Overwrites cell (`row`, `col`). Out-of-range writes are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: Option<T>) {
        if let Some(cell) = self.cells.get_mut((row, col)) {
            *cell = value;
        }
    }

    /// Whether `other` covers exactly the same cells as `self`.
    #[must_use]
    pub fn same_geometry<U>(&self, other: &Grid<U>) -> bool {
        self.cells.dim() == other.cells.dim() && self.transform == other.transform
    }

    /// Grid bounds in map units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn extent(&self) -> Extent {
        let t = &self.transform;
        Extent {
            min_x: t.origin_x,
            max_x: (self.width() as f64).mul_add(t.pixel_width, t.origin_x),
            min_y: (self.height() as f64).mul_add(-t.pixel_height, t.origin_y),
            max_y: t.origin_y,
        }
    }

    /// Cell containing map coordinate (`x`, `y`), if inside the grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cell_index(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let t = &self.transform;
        let col = ((x - t.origin_x) / t.pixel_width).floor();
        let row = ((t.origin_y - y) / t.pixel_height).floor();
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height() || col >= self.width() {
            return None;
        }
        Some((row, col))
    }

    /// Value of the cell containing map coordinate (`x`, `y`).
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> Option<T> {
        self.cell_index(x, y).and_then(|(row, col)| self.get(row, col))
    }

    /// Number of unmasked cells.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Applies `f` to every unmasked cell; `f` may mask a cell by
    /// returning `None`.
    #[must_use]
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> Option<U>) -> Grid<U> {
        Grid {
            transform: self.transform,
            cells: self.cells.mapv(|c| c.and_then(&f)),
        }
    }

    /// Combines two grids cell by cell. Returns `None` when the grids do not
    /// share the same geometry.
    #[must_use]
    pub fn zip_map<U: Copy, V: Copy>(
        &self,
        other: &Grid<U>,
        f: impl Fn(Option<T>, Option<U>) -> Option<V>,
    ) -> Option<Grid<V>> {
        if !self.same_geometry(other) {
            return None;
        }
        Some(Grid {
            transform: self.transform,
            cells: Zip::from(&self.cells)
                .and(&other.cells)
                .map_collect(|a, b| f(*a, *b)),
        })
    }
}

impl Grid<f64> {
    /// Area-weight raster matching `like`: every cell holds the cell area in
    /// square metres.
    #[must_use]
    pub fn pixel_area<T: Copy>(like: &Grid<T>) -> Self {
        Self::filled(
            like.transform,
            like.width(),
            like.height(),
            Some(like.transform.pixel_area()),
        )
    }
}

/// A named band of a multi-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub grid: Grid<f64>,
}

/// An ordered set of named bands sharing one grid geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiBandRaster {
    bands: Vec<Band>,
}

impl MultiBandRaster {
    #[must_use]
    pub const fn new() -> Self {
        Self { bands: Vec::new() }
    }

    /// Appends a band, replacing any existing band of the same name in place.
    pub fn push(&mut self, name: impl Into<String>, grid: Grid<f64>) {
        let name = name.into();
        if let Some(existing) = self.bands.iter_mut().find(|b| b.name == name) {
            existing.grid = grid;
        } else {
            self.bands.push(Band { name, grid });
        }
    }

    #[must_use]
    pub fn band(&self, name: &str) -> Option<&Grid<f64>> {
        self.bands.iter().find(|b| b.name == name).map(|b| &b.grid)
    }

    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// One dated image of a periodic stack (e.g. one day of gridded weather),
/// holding one grid per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub date: NaiveDate,
    pub bands: BTreeMap<String, Grid<f64>>,
}

impl Image {
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            bands: BTreeMap::new(),
        }
    }

    /// Builder-style band insertion.
    #[must_use]
    pub fn with_band(mut self, variable: impl Into<String>, grid: Grid<f64>) -> Self {
        self.bands.insert(variable.into(), grid);
        self
    }
}

/// A periodic raster stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageCollection {
    images: Vec<Image>,
}

impl ImageCollection {
    #[must_use]
    pub const fn new(images: Vec<Image>) -> Self {
        Self { images }
    }

    #[must_use]
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images dated within the half-open range `[start, end)`.
    #[must_use]
    pub fn filter_date(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            images: self
                .images
                .iter()
                .filter(|img| img.date >= start && img.date < end)
                .cloned()
                .collect(),
        }
    }

    /// Grids of `variable` across the stack, skipping images without it.
    pub fn select<'a>(&'a self, variable: &'a str) -> impl Iterator<Item = &'a Grid<f64>> + 'a {
        self.images.iter().filter_map(move |img| img.bands.get(variable))
    }
}
