//! Row-parallel raster operators.
//!
//! Every operator writes into a freshly allocated destination grid. The rows
//! of the destination are split into contiguous chunks that are computed
//! concurrently; each chunk owns a disjoint mutable view, so a source can never
//! alias the destination.

use crate::grid::Grid;
use crate::types::{Elevation, ReliefError, ReliefResult};
use ndarray::{s, Array2, ArrayViewMut2, Axis, Zip};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Number of rows per chunk so that every worker thread receives one chunk.
pub fn chunk_rows(rows: usize) -> usize {
    let threads = rayon::current_num_threads().max(1);
    ((rows + threads - 1) / threads).max(1)
}

/// Split `array` into chunks of `chunk` rows and call `f(first_row, chunk_view)`
/// for each chunk, concurrently when the `parallel` feature is enabled.
/// Returns after all chunks have completed.
pub fn par_for_each_row_chunk<T, F>(array: &mut Array2<T>, chunk: usize, f: F)
where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<'_, T>) + Sync + Send,
{
    let chunk = chunk.max(1);

    #[cfg(feature = "parallel")]
    {
        array
            .axis_chunks_iter_mut(Axis(0), chunk)
            .into_par_iter()
            .enumerate()
            .for_each(|(chunk_idx, view)| f(chunk_idx * chunk, view));
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (chunk_idx, view) in array.axis_chunks_iter_mut(Axis(0), chunk).enumerate() {
            f(chunk_idx * chunk, view);
        }
    }
}

/// Allocate a grid shaped and geo-referenced like `template` and fill it
/// chunk by chunk with `f(first_row, chunk_view)`.
pub fn par_map_rows<F>(template: &Grid, f: F) -> Grid
where
    F: Fn(usize, ArrayViewMut2<'_, Elevation>) + Sync + Send,
{
    let mut dst = Grid::like(template);
    let chunk = chunk_rows(dst.rows());
    par_for_each_row_chunk(dst.values_mut(), chunk, f);
    dst
}

/// Fail with `ShapeMismatch` unless both grids have identical size.
pub fn ensure_identical_in_size(expected: &Grid, found: &Grid) -> ReliefResult<()> {
    if expected.is_identical_in_size(found) {
        Ok(())
    } else {
        Err(ReliefError::ShapeMismatch {
            expected: expected.shape_description(),
            found: found.shape_description(),
        })
    }
}

/// An operator computing a new grid from one source grid.
pub trait GridOperator: Sync {
    fn name(&self) -> &'static str;

    /// Compute destination rows `first_row..first_row + dst.nrows()`.
    fn operate_rows(&self, src: &Grid, first_row: usize, dst: ArrayViewMut2<'_, Elevation>);

    fn operate(&self, src: &Grid) -> Grid {
        log::debug!("{}: {}", self.name(), src.shape_description());
        par_map_rows(src, |first_row, dst| self.operate_rows(src, first_row, dst))
    }
}

/// An operator combining two grids of identical size into a new grid.
pub trait DualGridOperator: Sync {
    fn name(&self) -> &'static str;

    fn operate_rows(
        &self,
        a: &Grid,
        b: &Grid,
        first_row: usize,
        dst: ArrayViewMut2<'_, Elevation>,
    );

    /// The size check happens before the destination is allocated.
    fn operate(&self, a: &Grid, b: &Grid) -> ReliefResult<Grid> {
        ensure_identical_in_size(a, b)?;
        log::debug!("{}: {}", self.name(), a.shape_description());
        Ok(par_map_rows(a, |first_row, dst| {
            self.operate_rows(a, b, first_row, dst)
        }))
    }
}

/// Deep copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOperator;

impl GridOperator for CopyOperator {
    fn name(&self) -> &'static str {
        "Copy"
    }

    fn operate_rows(&self, src: &Grid, first_row: usize, mut dst: ArrayViewMut2<'_, Elevation>) {
        let n = dst.nrows();
        dst.assign(&src.values().slice(s![first_row..first_row + n, ..]));
    }
}

/// Multiplies every value by a factor.
#[derive(Debug, Clone, Copy)]
pub struct ScaleOperator {
    pub scale: f32,
}

impl GridOperator for ScaleOperator {
    fn name(&self) -> &'static str {
        "Scale"
    }

    fn operate_rows(&self, src: &Grid, first_row: usize, mut dst: ArrayViewMut2<'_, Elevation>) {
        let n = dst.nrows();
        let scale = self.scale;
        Zip::from(&mut dst)
            .and(&src.values().slice(s![first_row..first_row + n, ..]))
            .for_each(|d, &v| *d = v * scale);
    }
}

/// Adds a constant offset to every value.
#[derive(Debug, Clone, Copy)]
pub struct AddOperator {
    pub offset: f32,
}

impl GridOperator for AddOperator {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn operate_rows(&self, src: &Grid, first_row: usize, mut dst: ArrayViewMut2<'_, Elevation>) {
        let n = dst.nrows();
        let offset = self.offset;
        Zip::from(&mut dst)
            .and(&src.values().slice(s![first_row..first_row + n, ..]))
            .for_each(|d, &v| *d = v + offset);
    }
}

/// Slope (rise over run) of every cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlopeOperator;

impl GridOperator for SlopeOperator {
    fn name(&self) -> &'static str {
        "Slope"
    }

    fn operate_rows(&self, src: &Grid, first_row: usize, mut dst: ArrayViewMut2<'_, Elevation>) {
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let row = first_row + r;
            for (col, d) in dst_row.iter_mut().enumerate() {
                *d = src.slope(col, row) as Elevation;
            }
        }
    }
}

/// Linearly maps the value range of a grid onto `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct ScaleToRangeOperator {
    pub min: f32,
    pub max: f32,
}

impl ScaleToRangeOperator {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn operate(&self, src: &Grid) -> Grid {
        let (src_min, src_max) = src.min_max();
        let src_range = src_max - src_min;
        let dst_min = self.min;
        let scale = if src_range > 0.0 && src_range.is_finite() {
            (self.max - self.min) / src_range
        } else {
            0.0
        };
        log::debug!(
            "Scale to range: [{}, {}] -> [{}, {}]",
            src_min,
            src_max,
            self.min,
            self.max
        );
        par_map_rows(src, |first_row, mut dst| {
            let n = dst.nrows();
            Zip::from(&mut dst)
                .and(&src.values().slice(s![first_row..first_row + n, ..]))
                .for_each(|d, &v| *d = (v - src_min) * scale + dst_min);
        })
    }
}

/// Difference `a - b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceOperator;

impl DualGridOperator for DifferenceOperator {
    fn name(&self) -> &'static str {
        "Difference"
    }

    fn operate_rows(
        &self,
        a: &Grid,
        b: &Grid,
        first_row: usize,
        mut dst: ArrayViewMut2<'_, Elevation>,
    ) {
        let end = first_row + dst.nrows();
        Zip::from(&mut dst)
            .and(&a.values().slice(s![first_row..end, ..]))
            .and(&b.values().slice(s![first_row..end, ..]))
            .for_each(|d, &va, &vb| *d = va - vb);
    }
}

/// Weighted sum `a + b * weight`.
#[derive(Debug, Clone, Copy)]
pub struct SumOperator {
    pub weight: f32,
}

impl DualGridOperator for SumOperator {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn operate_rows(
        &self,
        a: &Grid,
        b: &Grid,
        first_row: usize,
        mut dst: ArrayViewMut2<'_, Elevation>,
    ) {
        let end = first_row + dst.nrows();
        let weight = self.weight;
        Zip::from(&mut dst)
            .and(&a.values().slice(s![first_row..end, ..]))
            .and(&b.values().slice(s![first_row..end, ..]))
            .for_each(|d, &va, &vb| *d = va + vb * weight);
    }
}

/// Computes `(a - b) / (c + 1)`. Infinite results become void.
pub fn diff_div(a: &Grid, b: &Grid, c: &Grid) -> ReliefResult<Grid> {
    ensure_identical_in_size(a, b)?;
    ensure_identical_in_size(a, c)?;
    log::debug!("Difference & division: {}", a.shape_description());
    Ok(par_map_rows(a, |first_row, mut dst| {
        let end = first_row + dst.nrows();
        Zip::from(&mut dst)
            .and(&a.values().slice(s![first_row..end, ..]))
            .and(&b.values().slice(s![first_row..end, ..]))
            .and(&c.values().slice(s![first_row..end, ..]))
            .for_each(|d, &va, &vb, &vc| {
                let v = (va - vb) / (vc + 1.0);
                *d = if v.is_infinite() { Elevation::NAN } else { v };
            });
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_grid(cols: usize, rows: usize) -> Grid {
        let mut grid = Grid::new(cols, rows, 5.0).unwrap();
        grid.set_west(1000.0);
        grid.set_south(2000.0);
        for row in 0..rows {
            for col in 0..cols {
                grid.set_value(col, row, (row * cols + col) as f32);
            }
        }
        grid
    }

    #[test]
    fn test_copy_is_exact_and_keeps_georeference() {
        let src = test_grid(7, 37);
        let dst = CopyOperator.operate(&src);
        assert_eq!(dst.values(), src.values());
        assert_eq!(dst.west(), 1000.0);
        assert_eq!(dst.south(), 2000.0);
    }

    #[test]
    fn test_every_row_is_written_once() {
        for rows in [3, 4, 5, 17, 64, 101] {
            let src = test_grid(3, rows);
            let dst = AddOperator { offset: 1.0 }.operate(&src);
            for row in 0..rows {
                for col in 0..3 {
                    assert_eq!(dst.value(col, row), src.value(col, row) + 1.0);
                }
            }
        }
    }

    #[test]
    fn test_scale_operator() {
        let src = test_grid(4, 4);
        let dst = ScaleOperator { scale: 0.5 }.operate(&src);
        assert_relative_eq!(dst.value(3, 3), 7.5);
    }

    #[test]
    fn test_difference_rejects_different_shapes() {
        let a = test_grid(5, 5);
        let b = test_grid(5, 6);
        let err = DifferenceOperator.operate(&a, &b).unwrap_err();
        assert!(err.is_invalid_argument());

        let mut c = Grid::new(5, 5, 2.0).unwrap();
        c.set_value(0, 0, 1.0);
        assert!(DifferenceOperator.operate(&a, &c).is_err());
    }

    #[test]
    fn test_difference_and_sum() {
        let a = test_grid(5, 5);
        let b = ScaleOperator { scale: 2.0 }.operate(&a);
        let diff = DifferenceOperator.operate(&b, &a).unwrap();
        assert_eq!(diff.values(), a.values());
        let sum = SumOperator { weight: -0.5 }.operate(&b, &a).unwrap();
        assert_relative_eq!(sum.value(4, 4), 36.0);
    }

    #[test]
    fn test_scale_to_range() {
        let src = test_grid(4, 3);
        let dst = ScaleToRangeOperator::new(-1.0, 1.0).operate(&src);
        let (min, max) = dst.min_max();
        assert_relative_eq!(min, -1.0);
        assert_relative_eq!(max, 1.0);
    }

    #[test]
    fn test_scale_to_range_keeps_void() {
        let mut src = test_grid(4, 3);
        src.set_value(1, 1, f32::NAN);
        let dst = ScaleToRangeOperator::new(0.0, 100.0).operate(&src);
        assert!(dst.value(1, 1).is_nan());
        assert_relative_eq!(dst.value(3, 2), 100.0);
    }

    #[test]
    fn test_diff_div_maps_infinity_to_void() {
        let a = test_grid(3, 3);
        let b = Grid::like(&a);
        let mut c = Grid::like(&a);
        c.set_value(2, 2, -1.0);
        let dst = diff_div(&a, &b, &c).unwrap();
        assert_relative_eq!(dst.value(1, 1), 4.0);
        assert!(dst.value(2, 2).is_nan());
    }

    #[test]
    fn test_slope_operator_on_flat_grid() {
        let flat = Grid::new(6, 5, 1.0).unwrap();
        let slope = SlopeOperator.operate(&flat);
        assert!(slope.values().iter().all(|&v| v == 0.0));
    }
}
