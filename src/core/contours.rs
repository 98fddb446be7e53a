//! Illuminated contour lines.
//!
//! Line width and gray value depend on the angle between the local aspect
//! and the illumination azimuth: lines on slopes facing the light are drawn
//! in a light gray, lines on slopes facing away are black, and lines are
//! narrowed where the slope is parallel to the light (Tanaka contours).

use crate::core::operator::{chunk_rows, ensure_identical_in_size, par_for_each_row_chunk};
use crate::grid::Grid;
use crate::progress::ProgressMonitor;
use crate::types::{ArgbImage, ReliefError, ReliefResult};
use ndarray::{Array2, ArrayViewMut2};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fully transparent pixel.
pub const TRANSPARENT: u32 = 0;

/// Contour rendering parameters. Line widths are relative to the cell size
/// and vary linearly between the low and the high value across the value
/// range of the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourParams {
    /// Illuminated contours if true, otherwise only shaded contours
    pub illuminated: bool,
    pub interval: f64,
    pub illuminated_width_low: f64,
    pub illuminated_width_high: f64,
    pub shadow_width_low: f64,
    pub shadow_width_high: f64,
    /// Lines are never narrower than this
    pub min_width: f64,
    /// Vary the line width with the aspect angle
    pub tanaka: bool,
    /// Azimuth of the light in degrees, clockwise from north
    pub azimuth: f64,
    /// Angle between aspect and light separating lit from shadowed lines
    pub transition_angle: f64,
    /// Half width of the band around the transition angle in which the gray
    /// value is blended
    pub gradient_angle: f64,
    pub illuminated_gray: u8,
    /// The image is this many times larger than the grid
    pub scale: usize,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            illuminated: true,
            interval: 200.0,
            illuminated_width_low: 0.5,
            illuminated_width_high: 0.5,
            shadow_width_low: 0.5,
            shadow_width_high: 0.5,
            min_width: 0.1,
            tanaka: true,
            azimuth: 315.0,
            transition_angle: 90.0,
            gradient_angle: 0.0,
            illuminated_gray: 255,
            scale: 1,
        }
    }
}

/// A rendered contour image. `complete` is false if rendering was cancelled;
/// the image is then only partially drawn.
#[derive(Debug, Clone)]
pub struct ContourImage {
    pub image: ArgbImage,
    pub complete: bool,
}

/// Opaque gray ARGB pixel.
pub fn gray_to_argb(gray: u8) -> u32 {
    let g = gray as u32;
    0xFF00_0000 | (g << 16) | (g << 8) | g
}

/// Smallest angle in degrees between the light direction and an aspect
/// angle (counter-clockwise from east, in degrees).
pub fn angle_difference(azimuth: f64, aspect: f64) -> f64 {
    // azimuth to geometric angle, counter-clockwise from east
    let geom_angle = 90.0 - azimuth;
    (((geom_angle - aspect).abs() + 180.0) % 360.0 - 180.0).abs()
}

#[derive(Debug, Clone)]
pub struct IlluminatedContoursOperator {
    params: ContourParams,
    min_elevation: f64,
    max_elevation: f64,
}

impl IlluminatedContoursOperator {
    /// `elevation_range` is the min/max used to interpolate line widths.
    pub fn new(params: ContourParams, elevation_range: (f32, f32)) -> ReliefResult<Self> {
        if !(params.interval > 0.0) {
            return Err(ReliefError::InvalidArgument(format!(
                "contour interval must be positive, got {}",
                params.interval
            )));
        }
        if params.scale == 0 {
            return Err(ReliefError::InvalidArgument(
                "contour image scale must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            params,
            min_elevation: elevation_range.0 as f64,
            max_elevation: elevation_range.1 as f64,
        })
    }

    pub fn params(&self) -> &ContourParams {
        &self.params
    }

    /// Illuminated and shadowed line widths at `elevation`.
    fn line_widths(&self, elevation: f64) -> (f64, f64) {
        let p = &self.params;
        let range = self.max_elevation - self.min_elevation;
        let t = if range > 0.0 {
            ((elevation - self.min_elevation) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (
            p.illuminated_width_low + t * (p.illuminated_width_high - p.illuminated_width_low),
            p.shadow_width_low + t * (p.shadow_width_high - p.shadow_width_low),
        )
    }

    /// Gray value of a contour pixel, or `None` if the pixel is not on a
    /// contour line. `aspect` is in degrees in `[0, 360)`.
    pub fn compute_gray(
        &self,
        elevation: f64,
        aspect: f64,
        slope: f64,
        cell_size: f64,
    ) -> Option<u8> {
        if !(elevation.is_finite() && aspect.is_finite() && slope.is_finite()) {
            return None;
        }
        let p = &self.params;
        let angle_diff = angle_difference(p.azimuth, aspect);

        let (illuminated_width, shadow_width) = self.line_widths(elevation);
        let width = if angle_diff > p.transition_angle {
            shadow_width
        } else {
            illuminated_width
        };
        let mut a = width * slope * cell_size;
        if p.tanaka {
            a *= angle_diff.to_radians().cos().abs();
        }
        a = a.max(p.min_width * slope * cell_size);

        // distance to the closest contour, equal on both sides of the line
        let mut dist = elevation.abs() % p.interval;
        if dist > a {
            dist = p.interval - dist;
        }
        if a <= dist {
            return None;
        }

        let lit = if p.illuminated { p.illuminated_gray } else { 0 };
        let lower = p.transition_angle - p.gradient_angle;
        let upper = p.transition_angle + p.gradient_angle;
        if angle_diff >= upper {
            Some(0)
        } else if angle_diff <= lower {
            Some(lit)
        } else {
            // the band always fades from white to black, whatever the lit gray
            let f = (angle_diff - lower) / (upper - lower);
            Some((f * -255.0 + 255.0) as u8)
        }
    }

    /// Render contours of `grid` into an image `scale` times larger than the
    /// grid. `slope` is the slope grid of `grid`. Border cells are not
    /// rendered. Cancellation is checked once per grid row.
    pub fn render(
        &self,
        grid: &Grid,
        slope: &Grid,
        monitor: &dyn ProgressMonitor,
    ) -> ReliefResult<ContourImage> {
        ensure_identical_in_size(grid, slope)?;
        let scale = self.params.scale;
        let rows = grid.rows();
        let cols = grid.cols();
        log::info!(
            "Rendering contours for {} at scale {}",
            grid.shape_description(),
            scale
        );

        let mut image: ArgbImage = Array2::from_elem((rows * scale, cols * scale), TRANSPARENT);
        let cancelled = AtomicBool::new(false);
        let chunk = chunk_rows(rows);

        par_for_each_row_chunk(&mut image, chunk * scale, |first_image_row, mut view| {
            let first_row = first_image_row / scale;
            let chunk_len = view.nrows() / scale;
            // only the first chunk reports progress
            let report_progress = first_row == 0;
            for row in first_row..first_row + chunk_len {
                if cancelled.load(Ordering::Relaxed) || monitor.is_cancelled() {
                    cancelled.store(true, Ordering::Relaxed);
                    return;
                }
                if report_progress {
                    let percent = (100 * (row - first_row + 1) / chunk_len) as u8;
                    if !monitor.progress(percent) {
                        cancelled.store(true, Ordering::Relaxed);
                        return;
                    }
                }
                if row == 0 || row + 1 >= rows {
                    continue;
                }
                let view_row = row * scale - first_image_row;
                for col in 1..cols - 1 {
                    if scale == 1 {
                        self.render_cell(grid, slope, col, row, view_row, &mut view);
                    } else {
                        self.render_scaled_cell(grid, slope, col, row, view_row, &mut view);
                    }
                }
            }
        });

        let complete = !cancelled.load(Ordering::Relaxed);
        if !complete {
            log::info!("Contour rendering cancelled");
        }
        Ok(ContourImage { image, complete })
    }

    fn render_cell(
        &self,
        grid: &Grid,
        slope: &Grid,
        col: usize,
        row: usize,
        view_row: usize,
        view: &mut ArrayViewMut2<'_, u32>,
    ) {
        let aspect = grid.aspect(col, row).to_degrees() + 180.0;
        let gray = self.compute_gray(
            grid.value(col, row) as f64,
            aspect,
            slope.value(col, row) as f64,
            grid.cell_size(),
        );
        if let Some(g) = gray {
            view[[view_row, col]] = gray_to_argb(g);
        }
    }

    /// Render `scale` x `scale` pixels for one cell from bilinear samples.
    fn render_scaled_cell(
        &self,
        grid: &Grid,
        slope: &Grid,
        col: usize,
        row: usize,
        view_row: usize,
        view: &mut ArrayViewMut2<'_, u32>,
    ) {
        let scale = self.params.scale;
        let cell_size = grid.cell_size();
        let sampling_dist = cell_size / scale as f64;
        let west = grid.west();
        let north = grid.north();

        for r in 0..scale {
            for c in 0..scale {
                let x = west + (col as f64 + c as f64 / scale as f64) * cell_size;
                let y = north - (row as f64 + r as f64 / scale as f64) * cell_size;

                let center = grid.bilinear(x, y) as f64;
                let w = grid.bilinear(x - sampling_dist, y) as f64;
                let e = grid.bilinear(x + sampling_dist, y) as f64;
                let s = grid.bilinear(x, y - sampling_dist) as f64;
                let n = grid.bilinear(x, y + sampling_dist) as f64;
                let aspect = (n - s).atan2(e - w).to_degrees() + 180.0;
                let slope_value = slope.bilinear(x, y) as f64;

                if let Some(g) = self.compute_gray(center, aspect, slope_value, cell_size) {
                    view[[view_row + r, col * scale + c]] = gray_to_argb(g);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operator::{GridOperator, SlopeOperator};
    use crate::progress::{CancelFlag, NoProgress};

    fn operator(params: ContourParams) -> IlluminatedContoursOperator {
        IlluminatedContoursOperator::new(params, (0.0, 1000.0)).unwrap()
    }

    fn plain_params() -> ContourParams {
        ContourParams {
            interval: 100.0,
            tanaka: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_angle_difference() {
        // light from the north-west, aspect towards the north-west
        assert!(angle_difference(315.0, 135.0).abs() < 1e-9);
        assert!((angle_difference(315.0, 315.0) - 180.0).abs() < 1e-9);
        assert!((angle_difference(315.0, 225.0) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_on_lit_contour() {
        let op = operator(plain_params());
        // half width a = 0.5 * 1 * 10 = 5
        assert_eq!(op.compute_gray(102.0, 135.0, 1.0, 10.0), Some(255));
        assert_eq!(op.compute_gray(98.0, 135.0, 1.0, 10.0), Some(255));
        assert_eq!(op.compute_gray(150.0, 135.0, 1.0, 10.0), None);
    }

    #[test]
    fn test_pixel_on_shadowed_contour() {
        let op = operator(plain_params());
        assert_eq!(op.compute_gray(101.0, 315.0, 1.0, 10.0), Some(0));
    }

    #[test]
    fn test_shaded_only_mode_has_black_lit_lines() {
        let op = operator(ContourParams {
            illuminated: false,
            ..plain_params()
        });
        assert_eq!(op.compute_gray(102.0, 135.0, 1.0, 10.0), Some(0));
    }

    #[test]
    fn test_gradient_blend() {
        let op = operator(ContourParams {
            gradient_angle: 30.0,
            ..plain_params()
        });
        assert_eq!(op.compute_gray(101.0, 225.0, 1.0, 10.0), Some(127));
    }

    #[test]
    fn test_gradient_blend_ignores_lit_gray() {
        let gray = operator(ContourParams {
            gradient_angle: 30.0,
            illuminated_gray: 200,
            ..plain_params()
        });
        assert_eq!(gray.compute_gray(101.0, 225.0, 1.0, 10.0), Some(127));

        let shaded_only = operator(ContourParams {
            gradient_angle: 30.0,
            illuminated: false,
            ..plain_params()
        });
        assert_eq!(shaded_only.compute_gray(101.0, 225.0, 1.0, 10.0), Some(127));
        // outside the band the mode still decides
        assert_eq!(shaded_only.compute_gray(102.0, 135.0, 1.0, 10.0), Some(0));
    }

    #[test]
    fn test_void_is_transparent() {
        let op = operator(plain_params());
        assert_eq!(op.compute_gray(f64::NAN, 135.0, 1.0, 10.0), None);
    }

    #[test]
    fn test_invalid_params() {
        let params = ContourParams {
            interval: 0.0,
            ..Default::default()
        };
        assert!(IlluminatedContoursOperator::new(params, (0.0, 1.0)).is_err());
        let params = ContourParams {
            scale: 0,
            ..Default::default()
        };
        assert!(IlluminatedContoursOperator::new(params, (0.0, 1.0)).is_err());
    }

    fn cone(size: usize) -> Grid {
        let mut grid = Grid::new(size, size, 10.0).unwrap();
        let c = size as f32 / 2.0;
        for row in 0..size {
            for col in 0..size {
                let d = ((col as f32 - c).powi(2) + (row as f32 - c).powi(2)).sqrt();
                grid.set_value(col, row, 1000.0 - d * 40.0);
            }
        }
        grid
    }

    #[test]
    fn test_render_scaled_image() {
        let grid = cone(20);
        let slope = SlopeOperator.operate(&grid);
        for scale in [1, 3] {
            let op = IlluminatedContoursOperator::new(
                ContourParams {
                    interval: 100.0,
                    scale,
                    ..Default::default()
                },
                grid.min_max(),
            )
            .unwrap();
            let result = op.render(&grid, &slope, &NoProgress).unwrap();
            assert!(result.complete);
            assert_eq!(result.image.dim(), (20 * scale, 20 * scale));
            assert!(result.image.row(0).iter().all(|&p| p == TRANSPARENT));
            assert!(result.image.iter().any(|&p| p != TRANSPARENT));
            assert!(result
                .image
                .iter()
                .all(|&p| p == TRANSPARENT || p >> 24 == 0xFF));
        }
    }

    #[test]
    fn test_render_cancelled() {
        let grid = cone(12);
        let slope = SlopeOperator.operate(&grid);
        let flag = CancelFlag::new();
        flag.cancel();
        let op = operator(ContourParams::default());
        let result = op.render(&grid, &slope, &flag).unwrap();
        assert!(!result.complete);
    }

    #[test]
    fn test_render_requires_matching_slope_grid() {
        let grid = cone(12);
        let slope = SlopeOperator.operate(&cone(10));
        let op = operator(ContourParams::default());
        assert!(op.render(&grid, &slope, &NoProgress).is_err());
    }
}
