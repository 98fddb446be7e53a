//! Regularly spaced elevation grid with geo-referencing.
//!
//! Cell values are stored row-major in an [`ElevationArray`] indexed
//! `[[row, col]]`. Row 0 is the northernmost row. Coordinates of the grid
//! refer to cell centers: the center of the south-west cell is at
//! `(west, south)`, the center of the north-west cell at `(west, north)`.

use crate::types::{Elevation, ElevationArray, ReliefError, ReliefResult};
use ndarray::Array2;
use std::fmt;

/// Minimum number of columns and rows of a grid.
pub const MIN_GRID_SIZE: usize = 3;

/// Dense raster of elevation samples.
#[derive(Debug, Clone)]
pub struct Grid {
    values: ElevationArray,
    cell_size: f64,
    west: f64,
    south: f64,
}

impl Grid {
    /// Create a grid filled with zeros.
    pub fn new(cols: usize, rows: usize, cell_size: f64) -> ReliefResult<Self> {
        Self::validate(cols, rows, cell_size)?;
        Ok(Self {
            values: Array2::zeros((rows, cols)),
            cell_size,
            west: 0.0,
            south: 0.0,
        })
    }

    /// Create a grid from an existing (rows x cols) array.
    pub fn from_array(
        values: ElevationArray,
        cell_size: f64,
        west: f64,
        south: f64,
    ) -> ReliefResult<Self> {
        let (rows, cols) = values.dim();
        Self::validate(cols, rows, cell_size)?;
        Ok(Self {
            values,
            cell_size,
            west,
            south,
        })
    }

    /// Create a zero-filled grid with the shape and geo-reference of `template`.
    pub fn like(template: &Grid) -> Self {
        Self {
            values: Array2::zeros(template.values.dim()),
            cell_size: template.cell_size,
            west: template.west,
            south: template.south,
        }
    }

    fn validate(cols: usize, rows: usize, cell_size: f64) -> ReliefResult<()> {
        if cols < MIN_GRID_SIZE || rows < MIN_GRID_SIZE {
            return Err(ReliefError::InvalidArgument(format!(
                "grid of {}x{} cells is too small, at least {}x{} cells required",
                cols, rows, MIN_GRID_SIZE, MIN_GRID_SIZE
            )));
        }
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(ReliefError::InvalidArgument(format!(
                "cell size must be positive, got {}",
                cell_size
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    /// Distance between two neighboring columns or rows.
    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn set_west(&mut self, west: f64) {
        self.west = west;
    }

    pub fn set_south(&mut self, south: f64) {
        self.south = south;
    }

    pub fn north(&self) -> f64 {
        self.south + (self.rows() - 1) as f64 * self.cell_size
    }

    pub fn east(&self) -> f64 {
        self.west + (self.cols() - 1) as f64 * self.cell_size
    }

    /// Move the grid so that its northern border is at `north`.
    pub fn set_north(&mut self, north: f64) {
        self.south = north - (self.rows() - 1) as f64 * self.cell_size;
    }

    /// Value at `(col, row)`. Panics when out of bounds.
    #[inline]
    pub fn value(&self, col: usize, row: usize) -> Elevation {
        self.values[[row, col]]
    }

    /// Value at `(col, row)`, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> Option<Elevation> {
        self.values.get([row, col]).copied()
    }

    /// Set the value at `(col, row)`. Panics when out of bounds.
    #[inline]
    pub fn set_value(&mut self, col: usize, row: usize, value: Elevation) {
        self.values[[row, col]] = value;
    }

    /// Row-major view of all values.
    pub fn values(&self) -> &ElevationArray {
        &self.values
    }

    /// Mutable row-major view of all values. The shape cannot be changed.
    pub fn values_mut(&mut self) -> &mut ElevationArray {
        &mut self.values
    }

    pub fn into_array(self) -> ElevationArray {
        self.values
    }

    /// True if `other` has the same number of columns and rows and the same cell size.
    pub fn is_identical_in_size(&self, other: &Grid) -> bool {
        self.cols() == other.cols()
            && self.rows() == other.rows()
            && self.cell_size == other.cell_size
    }

    /// Describe the shape as used in error messages.
    pub fn shape_description(&self) -> String {
        format!("{}x{} cells of size {}", self.cols(), self.rows(), self.cell_size)
    }

    /// True if the grid has a positive cell size and a finite position.
    pub fn is_well_formed(&self) -> bool {
        self.cell_size > 0.0 && self.west.is_finite() && self.north().is_finite()
    }

    /// Number of void cells.
    pub fn void_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Minimum and maximum value. Void cells never win a comparison and are
    /// skipped. A grid without any valid value returns `(f32::MAX, -f32::MAX)`.
    pub fn min_max(&self) -> (Elevation, Elevation) {
        let mut min = Elevation::MAX;
        let mut max = -Elevation::MAX;
        for &v in self.values.iter() {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        (min, max)
    }

    /// Bilinear interpolation at geographic position `(x, y)`.
    ///
    /// Returns `NaN` if the four cells surrounding the position are not all
    /// inside the grid. The four corner values are blended as they are, so a
    /// void corner yields a void result.
    pub fn bilinear(&self, x: f64, y: f64) -> Elevation {
        let dx = (x - self.west) / self.cell_size;
        let dy = (self.north() - y) / self.cell_size;
        if !dx.is_finite() || !dy.is_finite() {
            return Elevation::NAN;
        }

        // column and row of the top left corner
        let col = dx.floor();
        let row = dy.floor();
        if col < 0.0 || row < 0.0 {
            return Elevation::NAN;
        }
        let (col, row) = (col as usize, row as usize);
        if col + 1 >= self.cols() || row + 1 >= self.rows() {
            return Elevation::NAN;
        }

        let rel_x = dx - col as f64;
        // relative vertical position measured upward from the bottom row
        let rel_y = 1.0 - (dy - row as f64);

        let h1 = self.values[[row + 1, col]] as f64; // bottom left
        let h2 = self.values[[row + 1, col + 1]] as f64; // bottom right
        let h3 = self.values[[row, col]] as f64; // top left
        let h4 = self.values[[row, col + 1]] as f64; // top right

        (h1 + (h2 - h1) * rel_x + (h3 - h1) * rel_y + (h1 - h2 - h3 + h4) * rel_x * rel_y)
            as Elevation
    }

    /// Slope (rise over run) using Horn's 3x3 method. Neighbor indices are
    /// clamped to the grid, so border cells are valid positions.
    pub fn slope(&self, col: usize, row: usize) -> f64 {
        let cols = self.cols();
        let rows = self.rows();
        let left = col.saturating_sub(1);
        let right = (col + 1).min(cols - 1);
        let top = row.saturating_sub(1);
        let bottom = (row + 1).min(rows - 1);
        self.horn_slope(left, col, right, top, row, bottom)
    }

    /// Slope for `col` in `[1, cols - 2]` and `row` in `[1, rows - 2]`.
    pub fn slope_inside_grid(&self, col: usize, row: usize) -> f64 {
        self.horn_slope(col - 1, col, col + 1, row - 1, row, row + 1)
    }

    fn horn_slope(
        &self,
        left: usize,
        col: usize,
        right: usize,
        top: usize,
        row: usize,
        bottom: usize,
    ) -> f64 {
        let v = |c: usize, r: usize| self.values[[r, c]] as f64;
        let a = v(left, top);
        let b = v(col, top);
        let c = v(right, top);
        let d = v(left, row);
        let f = v(right, row);
        let g = v(left, bottom);
        let h = v(col, bottom);
        let i = v(right, bottom);

        let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * self.cell_size);
        let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * self.cell_size);
        (dz_dx * dz_dx + dz_dy * dz_dy).sqrt()
    }

    /// Aspect angle in radians, counter-clockwise with east = 0. This is the
    /// direction of steepest ascent. Neighbor indices are clamped to the grid.
    pub fn aspect(&self, col: usize, row: usize) -> f64 {
        let left = col.saturating_sub(1);
        let right = (col + 1).min(self.cols() - 1);
        let top = row.saturating_sub(1);
        let bottom = (row + 1).min(self.rows() - 1);
        let w = self.values[[row, left]] as f64;
        let e = self.values[[row, right]] as f64;
        let s = self.values[[bottom, col]] as f64;
        let n = self.values[[top, col]] as f64;
        (n - s).atan2(e - w)
    }

    /// Aspect angle in radians at a geographic position, computed from four
    /// bilinear samples `sampling_dist` away from `(x, y)`.
    pub fn aspect_at(&self, x: f64, y: f64, sampling_dist: f64) -> f64 {
        let w = self.bilinear(x - sampling_dist, y) as f64;
        let e = self.bilinear(x + sampling_dist, y) as f64;
        let s = self.bilinear(x, y - sampling_dist) as f64;
        let n = self.bilinear(x, y + sampling_dist) as f64;
        (n - s).atan2(e - w)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = if self.cell_size < 1.0 { 6 } else { 1 };
        let (min, max) = self.min_max();
        writeln!(f, "Dimension: {} \u{00D7} {}", self.cols(), self.rows())?;
        writeln!(f, "Cell size: {:.*}", precision, self.cell_size)?;
        writeln!(f, "West: {:.*}", precision, self.west)?;
        writeln!(f, "East: {:.*}", precision, self.east())?;
        writeln!(f, "South: {:.*}", precision, self.south)?;
        writeln!(f, "North: {:.*}", precision, self.north())?;
        writeln!(f, "Minimum value: {}", min)?;
        write!(f, "Maximum value: {}", max)
    }
}
