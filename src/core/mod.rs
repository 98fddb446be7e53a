//! Pyramid engine and raster operators

pub mod operator;
pub mod gaussian;
pub mod laplacian;
pub mod generalize;
pub mod shading;
pub mod local_filter;
pub mod contours;

// Re-export main types
pub use operator::{
    diff_div, AddOperator, CopyOperator, DifferenceOperator, DualGridOperator, GridOperator,
    ScaleOperator, ScaleToRangeOperator, SlopeOperator, SumOperator,
};
pub use gaussian::{reduce, GaussianPyramid, PyramidParams};
pub use laplacian::{expand, LaplacianPyramid};
pub use generalize::{generalize, GeneralizationParams};
pub use shading::{ShaderOperator, ShadingParams};
pub use local_filter::{gauss_low_pass, local_filter, local_std_dev, LocalFilterParams};
pub use contours::{ContourImage, ContourParams, IlluminatedContoursOperator};
