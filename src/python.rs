//! Python bindings

use crate::core::{
    generalize as generalize_grid, local_filter as local_filter_grid, GaussianPyramid,
    GeneralizationParams, GridOperator, LaplacianPyramid, LocalFilterParams, PyramidParams,
    ShaderOperator, ShadingParams,
};
use crate::grid::Grid;
use crate::io::{export_ascii_grid, read_ascii_grid as read_grid};
use crate::types::ReliefError;
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

impl From<ReliefError> for PyErr {
    fn from(e: ReliefError) -> Self {
        match e {
            ReliefError::Io(_) => PyIOError::new_err(e.to_string()),
            _ => PyValueError::new_err(e.to_string()),
        }
    }
}

/// Convert PyReadonlyArray2 to a grid
fn numpy_to_grid(
    data: PyReadonlyArray2<f32>,
    cell_size: f64,
    west: f64,
    south: f64,
) -> PyResult<Grid> {
    Ok(Grid::from_array(data.as_array().to_owned(), cell_size, west, south)?)
}

fn laplacian_pyramid(grid: Grid, max_levels: usize) -> PyResult<LaplacianPyramid> {
    let params = PyramidParams {
        max_levels,
        ..Default::default()
    };
    let gaussian = GaussianPyramid::new(grid, &params)?;
    Ok(LaplacianPyramid::from_gaussian(&gaussian)?)
}

/// Read an ESRI ASCII grid
#[pyfunction]
fn read_ascii_grid(py: Python, path: String) -> PyResult<PyObject> {
    let grid = read_grid(&path)?;
    let result = PyDict::new(py);
    result.set_item("data", grid.values().to_pyarray(py))?;
    result.set_item("cols", grid.cols())?;
    result.set_item("rows", grid.rows())?;
    result.set_item("cell_size", grid.cell_size())?;
    result.set_item("west", grid.west())?;
    result.set_item("south", grid.south())?;
    Ok(result.into())
}

/// Write an ESRI ASCII grid
#[pyfunction]
#[pyo3(signature = (path, data, cell_size, west = 0.0, south = 0.0))]
fn write_ascii_grid(
    path: String,
    data: PyReadonlyArray2<f32>,
    cell_size: f64,
    west: f64,
    south: f64,
) -> PyResult<()> {
    let grid = numpy_to_grid(data, cell_size, west, south)?;
    Ok(export_ascii_grid(&grid, &path)?)
}

/// Re-synthesize a grid from its Laplacian pyramid with per-level weights
#[pyfunction]
fn sum_pyramid_levels(
    py: Python,
    data: PyReadonlyArray2<f32>,
    cell_size: f64,
    weights: Vec<f32>,
) -> PyResult<PyObject> {
    let grid = numpy_to_grid(data, cell_size, 0.0, 0.0)?;
    let pyramid = laplacian_pyramid(grid, weights.len())?;
    if pyramid.level_count() != weights.len() {
        return Err(PyValueError::new_err(format!(
            "grid has {} pyramid levels, {} weights given",
            pyramid.level_count(),
            weights.len()
        )));
    }
    let sum = pyramid.sum_levels(Some(&weights))?;
    Ok(sum.values().to_pyarray(py).into())
}

/// Generalize terrain by damping fine pyramid levels
#[pyfunction]
#[pyo3(signature = (data, cell_size, max_levels, details = -0.8))]
fn generalize(
    py: Python,
    data: PyReadonlyArray2<f32>,
    cell_size: f64,
    max_levels: usize,
    details: f64,
) -> PyResult<PyObject> {
    let grid = numpy_to_grid(data, cell_size, 0.0, 0.0)?;
    let range = grid.min_max();
    let pyramid = laplacian_pyramid(grid, PyramidParams::default().max_levels)?;
    let params = GeneralizationParams {
        max_levels,
        details,
    };
    let generalized = generalize_grid(&pyramid, &params, range)?;
    Ok(generalized.values().to_pyarray(py).into())
}

/// Shaded relief with gray values in [0, 255]
#[pyfunction]
#[pyo3(signature = (data, cell_size, azimuth = 315.0, zenith = 45.0, exaggeration = 1.0))]
fn shade(
    py: Python,
    data: PyReadonlyArray2<f32>,
    cell_size: f64,
    azimuth: f64,
    zenith: f64,
    exaggeration: f64,
) -> PyResult<PyObject> {
    let grid = numpy_to_grid(data, cell_size, 0.0, 0.0)?;
    let params = ShadingParams {
        azimuth,
        zenith,
        exaggeration,
    };
    let shaded = py.allow_threads(|| ShaderOperator::new(&params).operate(&grid));
    Ok(shaded.values().to_pyarray(py).into())
}

/// Local contrast filter
#[pyfunction]
#[pyo3(signature = (data, cell_size, low_pass_std = 11.0, std_dev_levels = 3))]
fn local_filter(
    py: Python,
    data: PyReadonlyArray2<f32>,
    cell_size: f64,
    low_pass_std: f64,
    std_dev_levels: usize,
) -> PyResult<PyObject> {
    let grid = numpy_to_grid(data, cell_size, 0.0, 0.0)?;
    let params = LocalFilterParams {
        low_pass_std,
        std_dev_levels,
    };
    let pyramid = laplacian_pyramid(grid.clone(), PyramidParams::default().max_levels)?;
    let filtered = local_filter_grid(&grid, &pyramid, &params)?;
    Ok(filtered.values().to_pyarray(py).into())
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(read_ascii_grid, m)?)?;
    m.add_function(wrap_pyfunction!(write_ascii_grid, m)?)?;
    m.add_function(wrap_pyfunction!(sum_pyramid_levels, m)?)?;
    m.add_function(wrap_pyfunction!(generalize, m)?)?;
    m.add_function(wrap_pyfunction!(shade, m)?)?;
    m.add_function(wrap_pyfunction!(local_filter, m)?)?;
    Ok(())
}
