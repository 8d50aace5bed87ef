use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyIOError, PyMemoryError, PyValueError};
use pyo3::prelude::*;

use crate::common::{EncodedData, SupportCount};
use crate::config::BuildConfig;
use crate::diffset::DiffsetBase;
use crate::error::Error;
use crate::nlist::NlistBase;
use crate::tidset::TidsetBase;

fn to_py_err(e: Error) -> PyErr {
    match e {
        Error::ResourceExhausted { .. } => PyMemoryError::new_err(e.to_string()),
        Error::Io(_) => PyIOError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Rows of a CSR matrix as selector-ID lists.
fn csr_rows(indptr: &[i32], indices: &[i32]) -> PyResult<Vec<Vec<u32>>> {
    if indptr.is_empty() {
        return Ok(Vec::new());
    }
    let mut rows = Vec::with_capacity(indptr.len() - 1);
    for w in indptr.windows(2) {
        let (start, end) = (w[0], w[1]);
        if start < 0 || end < start || end as usize > indices.len() {
            return Err(PyValueError::new_err(format!(
                "Malformed indptr: [{}, {}) with {} indices",
                start,
                end,
                indices.len()
            )));
        }
        let row = indices[start as usize..end as usize]
            .iter()
            .map(|&s| {
                u32::try_from(s).map_err(|_| PyValueError::new_err(format!("Negative selector ID {}", s)))
            })
            .collect::<PyResult<Vec<u32>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn encoded_data(indptr: &[i32], indices: &[i32], n_selectors: usize) -> PyResult<EncodedData> {
    EncodedData::new(n_selectors, csr_rows(indptr, indices)?).map_err(to_py_err)
}

fn count_all<E: SupportCount>(py: Python<'_>, engine: &E, queries: &[Vec<u32>]) -> PyResult<Vec<u64>> {
    py.allow_threads(|| engine.support_counts(queries)).map_err(to_py_err)
}

#[pyfunction]
#[pyo3(signature = (indptr, indices, n_selectors, q_indptr, q_indices))]
pub fn tidset_support_counts<'py>(
    py: Python<'py>,
    indptr: PyReadonlyArray1<i32>,
    indices: PyReadonlyArray1<i32>,
    n_selectors: usize,
    q_indptr: PyReadonlyArray1<i32>,
    q_indices: PyReadonlyArray1<i32>,
) -> PyResult<Bound<'py, PyArray1<u64>>> {
    let data = encoded_data(indptr.as_slice()?, indices.as_slice()?, n_selectors)?;
    let queries = csr_rows(q_indptr.as_slice()?, q_indices.as_slice()?)?;
    let base = py.allow_threads(|| TidsetBase::build(&data));
    Ok(count_all(py, &base, &queries)?.into_pyarray(py))
}

#[pyfunction]
#[pyo3(signature = (indptr, indices, n_selectors, q_indptr, q_indices))]
pub fn diffset_support_counts<'py>(
    py: Python<'py>,
    indptr: PyReadonlyArray1<i32>,
    indices: PyReadonlyArray1<i32>,
    n_selectors: usize,
    q_indptr: PyReadonlyArray1<i32>,
    q_indices: PyReadonlyArray1<i32>,
) -> PyResult<Bound<'py, PyArray1<u64>>> {
    let data = encoded_data(indptr.as_slice()?, indices.as_slice()?, n_selectors)?;
    let queries = csr_rows(q_indptr.as_slice()?, q_indices.as_slice()?)?;
    let base = py.allow_threads(|| DiffsetBase::build(&data));
    Ok(count_all(py, &base, &queries)?.into_pyarray(py))
}

/// Returns the support counts and, for a partitioned build, the recommended efficiency.
#[pyfunction]
#[pyo3(signature = (indptr, indices, n_selectors, q_indptr, q_indices, efficiency=1000, partitioned=false, node_budget=None))]
#[allow(clippy::too_many_arguments)]
pub fn nlist_support_counts<'py>(
    py: Python<'py>,
    indptr: PyReadonlyArray1<i32>,
    indices: PyReadonlyArray1<i32>,
    n_selectors: usize,
    q_indptr: PyReadonlyArray1<i32>,
    q_indices: PyReadonlyArray1<i32>,
    efficiency: usize,
    partitioned: bool,
    node_budget: Option<usize>,
) -> PyResult<(Bound<'py, PyArray1<u64>>, Option<usize>)> {
    let data = encoded_data(indptr.as_slice()?, indices.as_slice()?, n_selectors)?;
    let queries = csr_rows(q_indptr.as_slice()?, q_indices.as_slice()?)?;
    let mut config = BuildConfig::new(efficiency);
    if let Some(budget) = node_budget {
        config = config.with_node_budget(budget);
    }

    let base = py
        .allow_threads(|| {
            if partitioned {
                NlistBase::build_partitioned(&data, &config)
            } else {
                NlistBase::build(&data, &config)
            }
        })
        .map_err(to_py_err)?;
    let counts = count_all(py, &base, &queries)?;
    Ok((counts.into_pyarray(py), base.further_efficiency()))
}
