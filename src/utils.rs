use macau::MacauError;
use nalgebra::DMatrix;
use numpy::{PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::PyErr;

pub(crate) fn to_nalgebra(array: PyReadonlyArray2<f64>) -> DMatrix<f64> {
    let array = array.as_array();
    DMatrix::from_fn(array.nrows(), array.ncols(), |i, j| array[[i, j]])
}

pub(crate) fn to_values(array: PyReadonlyArray1<f64>) -> Vec<f64> {
    array.as_array().iter().copied().collect()
}

/// Converts an array of indices, rejecting negative ones.
pub(crate) fn to_indices(array: PyReadonlyArray1<i64>, axis: &str) -> Result<Vec<usize>, PyErr> {
    array
        .as_array()
        .iter()
        .map(|&index| {
            usize::try_from(index).map_err(|_| {
                PyValueError::new_err(format!("negative {axis} index {index}"))
            })
        })
        .collect()
}

pub(crate) fn to_py_err(err: MacauError) -> PyErr {
    match err {
        MacauError::Numerical(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}
