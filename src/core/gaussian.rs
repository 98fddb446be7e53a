//! Gaussian pyramid: a stack of progressively low-pass filtered grids, each
//! with half the columns and rows of its predecessor.

use crate::core::laplacian::expand;
use crate::core::operator::{chunk_rows, par_for_each_row_chunk};
use crate::grid::Grid;
use crate::types::{Elevation, ReliefResult};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Weight of the center tap of the 5-tap filter.
pub const WA: f32 = 0.4;
/// Weight of the two taps next to the center.
pub const WB: f32 = 0.25;
/// Weight of the two outermost taps.
pub const WC: f32 = 0.05;

/// Separable 5-tap low-pass kernel, sums to 1.
const KERNEL: [f32; 5] = [WC, WB, WA, WB, WC];

/// Reduced levels must have more columns and rows than this.
pub const MIN_SIDE_LENGTH: usize = 2;

/// Parameters for building a Gaussian pyramid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyramidParams {
    /// Maximum number of levels, including the full resolution level
    pub max_levels: usize,
    /// A level is only added if it has at least this many cells
    pub min_cell_count: usize,
}

impl Default for PyramidParams {
    fn default() -> Self {
        Self {
            max_levels: 9999,
            min_cell_count: MIN_SIDE_LENGTH * MIN_SIDE_LENGTH,
        }
    }
}

/// Reduce a grid to half its columns and rows (floor division) by filtering
/// with the 5-tap kernel and keeping every second sample.
///
/// Void cells are excluded from the filter and the remaining weights are
/// re-normalized. A reduced cell is void only if all 25 taps are void.
/// Fails if the reduced grid would have fewer than 3 columns or rows, so a
/// grid needs at least 6 columns and rows. The halving rule itself holds for
/// any size of 5 or more, but a 5-wide grid would reduce to 2 columns, below
/// the smallest grid this crate allows. Pyramid building stops before that.
pub fn reduce(grid: &Grid) -> ReliefResult<Grid> {
    let cols = grid.cols();
    let rows = grid.rows();
    let mut reduced = Grid::new(cols / 2, rows / 2, grid.cell_size() * 2.0)?;
    reduced.set_west(grid.west());
    reduced.set_north(grid.north());

    let src = grid.values();
    let chunk = chunk_rows(reduced.rows());
    par_for_each_row_chunk(reduced.values_mut(), chunk, |first_row, mut dst| {
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let center_row = 2 * (first_row + r);
            for (c, d) in dst_row.iter_mut().enumerate() {
                let center_col = 2 * c;
                let mut sum = 0.0f32;
                let mut weight_sum = 0.0f32;
                for (kr, &wr) in KERNEL.iter().enumerate() {
                    let src_row = clamp_index(center_row + kr, 2, rows);
                    for (kc, &wc) in KERNEL.iter().enumerate() {
                        let src_col = clamp_index(center_col + kc, 2, cols);
                        let v = src[[src_row, src_col]];
                        if !v.is_nan() {
                            let w = wr * wc;
                            sum += w * v;
                            weight_sum += w;
                        }
                    }
                }
                *d = if weight_sum > 0.0 {
                    sum / weight_sum
                } else {
                    Elevation::NAN
                };
            }
        }
    });

    Ok(reduced)
}

/// `shifted - offset` clamped to `[0, len - 1]` (replicated border).
#[inline]
fn clamp_index(shifted: usize, offset: usize, len: usize) -> usize {
    shifted.saturating_sub(offset).min(len - 1)
}

/// Gaussian pyramid. Level 0 is the full resolution grid, the last level is
/// the coarsest.
#[derive(Debug, Clone)]
pub struct GaussianPyramid {
    levels: Vec<Grid>,
}

impl GaussianPyramid {
    /// Build a pyramid from `grid`, which becomes level 0.
    pub fn new(grid: Grid, params: &PyramidParams) -> ReliefResult<Self> {
        log::info!(
            "Building Gaussian pyramid for {}x{} grid",
            grid.cols(),
            grid.rows()
        );
        log::debug!("Pyramid parameters: {:?}", params);

        let max_levels = params.max_levels.max(1);
        let mut levels = vec![grid];
        loop {
            let last = &levels[levels.len() - 1];
            let new_cols = last.cols() / 2;
            let new_rows = last.rows() / 2;
            if new_cols <= MIN_SIDE_LENGTH
                || new_rows <= MIN_SIDE_LENGTH
                || new_cols * new_rows < params.min_cell_count
                || levels.len() >= max_levels
            {
                break;
            }
            let reduced = reduce(last)?;
            log::debug!(
                "Level {}: {}x{} cells, cell size {}",
                levels.len(),
                reduced.cols(),
                reduced.rows(),
                reduced.cell_size()
            );
            levels.push(reduced);
        }

        log::info!("Gaussian pyramid has {} levels", levels.len());
        Ok(Self { levels })
    }

    pub fn with_default_params(grid: Grid) -> ReliefResult<Self> {
        Self::new(grid, &PyramidParams::default())
    }

    pub fn levels(&self) -> &[Grid] {
        &self.levels
    }

    pub fn into_levels(self) -> Vec<Grid> {
        self.levels
    }

    /// Grid at `level`; 0 is full resolution. Panics if out of range.
    pub fn level(&self, level: usize) -> &Grid {
        &self.levels[level]
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn full_resolution(&self) -> &Grid {
        &self.levels[0]
    }

    pub fn value(&self, col: usize, row: usize, level: usize) -> Elevation {
        self.levels[level].value(col, row)
    }

    /// Every level expanded back to the size of level 0.
    pub fn expanded_levels(&self) -> ReliefResult<Vec<Grid>> {
        let mut expanded = Vec::with_capacity(self.levels.len());
        for (i, level) in self.levels.iter().enumerate() {
            let mut grid = level.clone();
            for finer in self.levels[..i].iter().rev() {
                grid = expand(&grid, finer.cols(), finer.rows())?;
            }
            expanded.push(grid);
        }
        Ok(expanded)
    }
}
