//! relief_pyramid: multi-resolution terrain processing for relief shading.
//!
//! This library builds Gaussian and Laplacian pyramids from digital elevation
//! models, re-synthesizes generalized terrain from weighted pyramid levels, and
//! renders shaded relief, local contrast enhanced grids and illuminated contour
//! lines. Elevation grids are read from ESRI ASCII grid files by a streaming
//! reader that overlaps file I/O with parsing.
//!
//! All raster operators split the rows of the output grid into chunks that are
//! processed in parallel with rayon (feature `parallel`, enabled by default).

pub mod types;
pub mod grid;
pub mod progress;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
pub mod python;

// Re-export main types and functions for easier access
pub use types::{ArgbImage, Elevation, ElevationArray, ReliefError, ReliefResult};
pub use grid::Grid;
pub use progress::{CancelFlag, NoProgress, ProgressMonitor};

pub use crate::core::{
    expand, generalize, reduce, ContourImage, ContourParams, DualGridOperator, GaussianPyramid,
    GeneralizationParams, GridOperator, IlluminatedContoursOperator, LaplacianPyramid,
    LocalFilterParams, PyramidParams, ShaderOperator, ShadingParams,
};
pub use io::{AsciiGridReader, GridReaderParams};
