//! Laplacian pyramid: band-pass residuals between successive Gaussian levels,
//! and weighted re-synthesis of a full resolution grid from those residuals.

use crate::core::gaussian::{GaussianPyramid, WA, WB, WC};
use crate::core::operator::{
    chunk_rows, par_for_each_row_chunk, DifferenceOperator, DualGridOperator, GridOperator,
    ScaleOperator, SumOperator,
};
use crate::grid::Grid;
use crate::types::{Elevation, ReliefError, ReliefResult};
use ndarray::{Array2, Axis};

/// Output size along one axis: twice the input, capped at `max`. A parent
/// with an odd size receives one extra sample replicated from the border.
fn expanded_size(size: usize, max: usize) -> usize {
    if max == size * 2 + 1 {
        max
    } else {
        max.min(size * 2)
    }
}

/// Weighted sum of the valid taps, scaled by 2 to restore the gain of
/// the phase. Void taps are dropped and the result is rescaled by
/// `total weight / valid weight`; all taps void gives void.
#[inline]
fn weighted_taps<const N: usize>(values: [Elevation; N], weights: [Elevation; N]) -> Elevation {
    let mut sum = 0.0;
    let mut total_weight = 0.0;
    let mut valid_weight = 0.0;
    for (&v, &w) in values.iter().zip(weights.iter()) {
        total_weight += w;
        if !v.is_nan() {
            sum += w * v;
            valid_weight += w;
        }
    }
    if valid_weight == 0.0 {
        Elevation::NAN
    } else if valid_weight == total_weight {
        2.0 * sum
    } else {
        2.0 * sum * (total_weight / valid_weight)
    }
}

/// Expanded sample `out` along an axis of `n` input samples read with `v`.
///
/// Even outputs `2i` use taps `i-1, i, i+1` weighted `WC, WA, WC`; odd
/// outputs `2i+1` use taps `i, i+1` weighted `WB, WB`. Missing taps beyond
/// the border repeat the edge value.
#[inline]
fn expand_sample<F>(v: F, n: usize, out: usize) -> Elevation
where
    F: Fn(usize) -> Elevation,
{
    let last = n - 1;
    let i = out / 2;
    if out % 2 == 0 {
        let prev = i.saturating_sub(1).min(last);
        let next = (i + 1).min(last);
        weighted_taps([v(prev), v(i.min(last)), v(next)], [WC, WA, WC])
    } else {
        let next = (i + 1).min(last);
        weighted_taps([v(i.min(last)), v(next)], [WB, WB])
    }
}

/// Double the resolution of a grid, capped at `max_cols` x `max_rows`.
///
/// The expansion is separable: rows are expanded first into a temporary
/// array, then columns. The result has half the cell size and the same
/// north-west corner as `grid`.
pub fn expand(grid: &Grid, max_cols: usize, max_rows: usize) -> ReliefResult<Grid> {
    let cols = grid.cols();
    let rows = grid.rows();
    let new_cols = expanded_size(cols, max_cols);
    let new_rows = expanded_size(rows, max_rows);

    let mut expanded = Grid::new(new_cols, new_rows, grid.cell_size() / 2.0)?;
    expanded.set_west(grid.west());
    expanded.set_north(grid.north());

    // expanded horizontally, but not vertically
    let src = grid.values();
    let mut temp = Array2::<Elevation>::zeros((rows, new_cols));
    par_for_each_row_chunk(&mut temp, chunk_rows(rows), |first_row, mut dst| {
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let src_row = src.row(first_row + r);
            for (c, d) in dst_row.iter_mut().enumerate() {
                *d = expand_sample(|i| src_row[i], cols, c);
            }
        }
    });

    let temp = &temp;
    par_for_each_row_chunk(
        expanded.values_mut(),
        chunk_rows(new_rows),
        |first_row, mut dst| {
            for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
                let out_row = first_row + r;
                for (c, d) in dst_row.iter_mut().enumerate() {
                    *d = expand_sample(|i| temp[[i, c]], rows, out_row);
                }
            }
        },
    );

    Ok(expanded)
}

/// Laplacian pyramid. Level `i` holds the difference between Gaussian level
/// `i` and the expansion of Gaussian level `i + 1`; the last level is the
/// coarsest Gaussian level.
#[derive(Debug, Clone)]
pub struct LaplacianPyramid {
    levels: Vec<Grid>,
}

impl LaplacianPyramid {
    pub fn from_gaussian(gaussian: &GaussianPyramid) -> ReliefResult<Self> {
        Self::from_gaussian_levels(gaussian.levels())
    }

    pub fn from_gaussian_levels(gaussian: &[Grid]) -> ReliefResult<Self> {
        let Some(coarsest) = gaussian.last() else {
            return Err(ReliefError::InvalidArgument(
                "a Laplacian pyramid needs at least one Gaussian level".to_string(),
            ));
        };
        log::info!("Building Laplacian pyramid with {} levels", gaussian.len());

        let mut levels = vec![coarsest.clone()];
        for i in (1..gaussian.len()).rev() {
            let larger = &gaussian[i - 1];
            let expanded = expand(&gaussian[i], larger.cols(), larger.rows())?;
            levels.push(DifferenceOperator.operate(larger, &expanded)?);
        }
        levels.reverse();

        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[Grid] {
        &self.levels
    }

    pub fn level(&self, level: usize) -> &Grid {
        &self.levels[level]
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// One weight per level, all set to `value`.
    pub fn constant_weights(&self, value: f32) -> Vec<f32> {
        vec![value; self.levels.len()]
    }

    /// Re-synthesize a grid from the levels.
    ///
    /// Starts with the coarsest level scaled by its weight, then repeatedly
    /// expands the running sum to the next finer level and adds that level
    /// scaled by its weight. Levels with a weight of exactly 0 are skipped.
    /// Without weights every level has weight 1, which reproduces the
    /// full resolution Gaussian level.
    pub fn sum_levels(&self, weights: Option<&[f32]>) -> ReliefResult<Grid> {
        let n = self.levels.len();
        if let Some(w) = weights {
            if w.len() != n {
                return Err(ReliefError::ShapeMismatch {
                    expected: format!("{} level weights", n),
                    found: format!("{} level weights", w.len()),
                });
            }
        }
        let weight = |level: usize| weights.map_or(1.0, |w| w[level]);
        log::debug!(
            "Summing {} pyramid levels with weights {:?}",
            n,
            (0..n).map(weight).collect::<Vec<_>>()
        );

        let mut sum = ScaleOperator {
            scale: weight(n - 1),
        }
        .operate(&self.levels[n - 1]);

        for i in (0..n - 1).rev() {
            let level = &self.levels[i];
            sum = expand(&sum, level.cols(), level.rows())?;
            let w = weight(i);
            if w != 0.0 {
                sum = SumOperator { weight: w }.operate(&sum, level)?;
            }
        }

        Ok(sum)
    }
}
