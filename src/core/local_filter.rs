//! Local contrast enhancement.
//!
//! The filtered grid is `(grid - low_pass) / (local_std_dev + 1)`, rescaled to
//! the value range of the original grid. The local standard deviation is the
//! RMS of a high-pass band re-synthesized from the finest Laplacian levels.

use crate::core::laplacian::LaplacianPyramid;
use crate::core::operator::{
    chunk_rows, diff_div, par_for_each_row_chunk, par_map_rows, CopyOperator, GridOperator,
    ScaleToRangeOperator,
};
use crate::grid::Grid;
use crate::types::{Elevation, ReliefError, ReliefResult};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Local filter parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalFilterParams {
    /// Standard deviation of the Gaussian low pass in cells
    pub low_pass_std: f64,
    /// Number of fine Laplacian levels forming the high-pass band
    pub std_dev_levels: usize,
}

impl Default for LocalFilterParams {
    fn default() -> Self {
        Self {
            low_pass_std: 11.0,
            std_dev_levels: 3,
        }
    }
}

/// Normalized 1D Gaussian kernel with radius `ceil(3 * std)`.
fn gauss_kernel(std: f64) -> Vec<f32> {
    let radius = (3.0 * std).ceil() as isize;
    let denominator = 2.0 * std * std;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-((k * k) as f64) / denominator).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Convolve one line of `n` samples read with `v` at position `i`. Taps
/// outside the line repeat the edge value, void taps are skipped and the
/// remaining weights re-normalized.
#[inline]
fn convolve_at<F>(v: F, n: usize, i: usize, kernel: &[f32]) -> Elevation
where
    F: Fn(usize) -> Elevation,
{
    let radius = kernel.len() / 2;
    let mut sum = 0.0f32;
    let mut weight_sum = 0.0f32;
    for (k, &w) in kernel.iter().enumerate() {
        let j = (i + k).saturating_sub(radius).min(n - 1);
        let value = v(j);
        if !value.is_nan() {
            sum += w * value;
            weight_sum += w;
        }
    }
    if weight_sum > 0.0 {
        sum / weight_sum
    } else {
        Elevation::NAN
    }
}

/// Separable Gaussian blur with standard deviation `std` cells. Void cells
/// of the source stay void. A non-positive `std` returns a copy.
pub fn gauss_low_pass(grid: &Grid, std: f64) -> ReliefResult<Grid> {
    if !std.is_finite() {
        return Err(ReliefError::InvalidArgument(format!(
            "invalid low pass standard deviation {}",
            std
        )));
    }
    if std <= 0.0 {
        return Ok(CopyOperator.operate(grid));
    }
    let kernel = gauss_kernel(std);
    log::debug!("Gaussian low pass: std {}, {} taps", std, kernel.len());

    let cols = grid.cols();
    let rows = grid.rows();
    let src = grid.values();

    let mut temp = Array2::<Elevation>::zeros((rows, cols));
    par_for_each_row_chunk(&mut temp, chunk_rows(rows), |first_row, mut dst| {
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let src_row = src.row(first_row + r);
            for (col, d) in dst_row.iter_mut().enumerate() {
                *d = convolve_at(|j| src_row[j], cols, col, &kernel);
            }
        }
    });

    let temp = &temp;
    Ok(par_map_rows(grid, |first_row, mut dst| {
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let row = first_row + r;
            for (col, d) in dst_row.iter_mut().enumerate() {
                *d = if src[[row, col]].is_nan() {
                    Elevation::NAN
                } else {
                    convolve_at(|j| temp[[j, col]], rows, row, &kernel)
                };
            }
        }
    }))
}

/// Summed-area tables of squared values and of valid cell counts, padded
/// with a leading zero row and column.
struct SummedArea {
    squares: Array2<f64>,
    counts: Array2<u32>,
}

impl SummedArea {
    fn new(grid: &Grid) -> Self {
        let cols = grid.cols();
        let rows = grid.rows();
        let mut squares = Array2::<f64>::zeros((rows + 1, cols + 1));
        let mut counts = Array2::<u32>::zeros((rows + 1, cols + 1));
        for row in 0..rows {
            let mut row_sum = 0.0f64;
            let mut row_count = 0u32;
            for col in 0..cols {
                let v = grid.value(col, row);
                if !v.is_nan() {
                    row_sum += (v as f64) * (v as f64);
                    row_count += 1;
                }
                squares[[row + 1, col + 1]] = squares[[row, col + 1]] + row_sum;
                counts[[row + 1, col + 1]] = counts[[row, col + 1]] + row_count;
            }
        }
        Self { squares, counts }
    }

    /// Sum of squares and cell count over rows `top..bottom` and columns
    /// `left..right` (exclusive ends).
    fn window(&self, left: usize, top: usize, right: usize, bottom: usize) -> (f64, u32) {
        let s = &self.squares;
        let c = &self.counts;
        let sum = s[[bottom, right]] - s[[top, right]] - s[[bottom, left]] + s[[top, left]];
        let count = c[[bottom, right]] + c[[top, left]] - c[[top, right]] - c[[bottom, left]];
        (sum, count)
    }
}

/// Root mean square of the valid cells in a square window of side
/// `2 * half_window + 1` around each cell. Void cells stay void.
pub fn windowed_rms(grid: &Grid, half_window: usize) -> Grid {
    let sat = SummedArea::new(grid);
    let cols = grid.cols();
    let rows = grid.rows();
    par_map_rows(grid, |first_row, mut dst| {
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let row = first_row + r;
            let top = row.saturating_sub(half_window);
            let bottom = (row + half_window + 1).min(rows);
            for (col, d) in dst_row.iter_mut().enumerate() {
                if grid.value(col, row).is_nan() {
                    *d = Elevation::NAN;
                    continue;
                }
                let left = col.saturating_sub(half_window);
                let right = (col + half_window + 1).min(cols);
                let (sum, count) = sat.window(left, top, right, bottom);
                // rounding in the table can make tiny sums negative
                *d = (sum.max(0.0) / count.max(1) as f64).sqrt() as Elevation;
            }
        }
    })
}

/// Local standard deviation from the `levels` finest Laplacian levels.
pub fn local_std_dev(pyramid: &LaplacianPyramid, levels: usize) -> ReliefResult<Grid> {
    if levels == 0 {
        return Err(ReliefError::InvalidArgument(
            "local standard deviation needs at least one level".to_string(),
        ));
    }
    let weights: Vec<f32> = (0..pyramid.level_count())
        .map(|i| if i < levels { 1.0 } else { 0.0 })
        .collect();
    let high_pass = pyramid.sum_levels(Some(&weights))?;
    let half_window = 8 * levels;
    log::debug!(
        "Local standard deviation: {} levels, window {} cells",
        levels,
        2 * half_window + 1
    );
    Ok(windowed_rms(&high_pass, half_window))
}

/// Local contrast filter of `grid`, whose Laplacian pyramid is `pyramid`.
pub fn local_filter(
    grid: &Grid,
    pyramid: &LaplacianPyramid,
    params: &LocalFilterParams,
) -> ReliefResult<Grid> {
    log::info!("Local filter: {}", grid.shape_description());
    log::debug!("Local filter parameters: {:?}", params);

    let low_pass = gauss_low_pass(grid, params.low_pass_std)?;
    let std_dev = local_std_dev(pyramid, params.std_dev_levels)?;
    let filtered = diff_div(grid, &low_pass, &std_dev)?;
    let (min, max) = grid.min_max();
    Ok(ScaleToRangeOperator::new(min, max).operate(&filtered))
}
