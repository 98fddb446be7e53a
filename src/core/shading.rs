//! Shaded relief from surface normals and a directional light source.

use crate::core::operator::GridOperator;
use crate::grid::Grid;
use crate::types::Elevation;
use ndarray::{ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

/// Mean earth radius in meters, used to convert angular cell sizes.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Cell sizes below this value are taken to be in degrees.
const ANGULAR_CELL_SIZE_LIMIT: f64 = 0.1;

/// Illumination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadingParams {
    /// Azimuth of the light in degrees, clockwise from north
    pub azimuth: f64,
    /// Zenith angle of the light in degrees, 0 is straight overhead
    pub zenith: f64,
    /// Vertical exaggeration applied to elevation differences
    pub exaggeration: f64,
}

impl Default for ShadingParams {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            zenith: 45.0,
            exaggeration: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit vector pointing towards a light at `azimuth` and `zenith` degrees.
    fn light(azimuth: f64, zenith: f64) -> Self {
        let az = azimuth.to_radians();
        let zen = zenith.to_radians();
        Self::new(az.sin() * zen.sin(), az.cos() * zen.sin(), zen.cos())
    }

    fn cross(self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    fn dot(self, o: Vec3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    fn normalized(self) -> Vec3 {
        let len = self.dot(self).sqrt();
        Vec3::new(self.x / len, self.y / len, self.z / len)
    }
}

/// Computes a gray value in `[0, 255]` per cell from the angle between the
/// surface normal and the light direction.
#[derive(Debug, Clone)]
pub struct ShaderOperator {
    light: Vec3,
    exaggeration: f64,
}

impl ShaderOperator {
    pub fn new(params: &ShadingParams) -> Self {
        log::debug!("Shading parameters: {:?}", params);
        Self {
            light: Vec3::light(params.azimuth, params.zenith),
            exaggeration: params.exaggeration,
        }
    }

    /// Horizontal cell size in the units of the elevation values.
    fn linear_cell_size(cell_size: f64) -> f64 {
        if cell_size < ANGULAR_CELL_SIZE_LIMIT {
            cell_size.to_radians() * EARTH_RADIUS
        } else {
            cell_size
        }
    }

    /// Unit normal of a cell from its four axis-aligned neighbors. Border
    /// cells are flat.
    fn terrain_normal(&self, src: &Grid, col: usize, row: usize, cell_size: f64) -> Vec3 {
        if col == 0 || row == 0 || col + 1 >= src.cols() || row + 1 >= src.rows() {
            return Vec3::UP;
        }
        let g = src.values();
        let center = g[[row, col]] as f64;
        let ve = self.exaggeration;
        let elev_s = (g[[row + 1, col]] as f64 - center) * ve;
        let elev_e = (g[[row, col + 1]] as f64 - center) * ve;
        let elev_n = (g[[row - 1, col]] as f64 - center) * ve;
        let elev_w = (g[[row, col - 1]] as f64 - center) * ve;

        let s = Vec3::new(0.0, -cell_size, elev_s);
        let e = Vec3::new(cell_size, 0.0, elev_e);
        let n = Vec3::new(0.0, cell_size, elev_n);
        let w = Vec3::new(-cell_size, 0.0, elev_w);

        // one cross product per quadrant
        s.cross(e)
            .add(e.cross(n))
            .add(n.cross(w))
            .add(w.cross(s))
            .normalized()
    }
}

impl Default for ShaderOperator {
    fn default() -> Self {
        Self::new(&ShadingParams::default())
    }
}

impl GridOperator for ShaderOperator {
    fn name(&self) -> &'static str {
        "Shading"
    }

    fn operate_rows(&self, src: &Grid, first_row: usize, mut dst: ArrayViewMut2<'_, Elevation>) {
        let cell_size = Self::linear_cell_size(src.cell_size());
        for (r, mut dst_row) in dst.axis_iter_mut(Axis(0)).enumerate() {
            let row = first_row + r;
            for (col, d) in dst_row.iter_mut().enumerate() {
                let normal = self.terrain_normal(src, col, row, cell_size);
                let dot = normal.dot(self.light);
                *d = ((dot + 1.0) / 2.0 * 255.0) as Elevation;
            }
        }
    }
}
