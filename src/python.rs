//! Python bindings for nested-synth.
//!
//! This module exposes experiment synthesis to Python using PyO3. Enable the
//! `python` feature to use this.

use std::collections::HashMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::config::ExperimentConfig;
use crate::table::{Column, ExperimentTable};

fn to_py_err(err: crate::Error) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn table_to_dict<'py>(py: Python<'py>, table: &ExperimentTable) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    for (name, column) in table.columns() {
        let list = PyList::empty(py);
        match column {
            Column::Level(values) => {
                for v in values {
                    list.append(*v)?;
                }
            }
            Column::Real(values) => {
                for v in values {
                    list.append(*v)?;
                }
            }
            Column::Text(values) => {
                for v in values {
                    list.append(v.as_str())?;
                }
            }
        }
        dict.set_item(name, list)?;
    }
    Ok(dict)
}

/// Synthesize a nested experiment.
///
/// Returns a dict of column name to list of values, in table column order.
#[pyfunction]
#[pyo3(signature = (
    grand_mean,
    names,
    n_levels,
    var_fracs,
    level_names=None,
    level_effects=None,
    digits=4,
    measurement_name=None,
    seed_pool_size=10_000,
    seed=None,
))]
#[allow(clippy::too_many_arguments)]
fn synthesize(
    py: Python<'_>,
    grand_mean: f64,
    names: Vec<String>,
    n_levels: HashMap<String, u32>,
    var_fracs: HashMap<String, f64>,
    level_names: Option<HashMap<String, Vec<String>>>,
    level_effects: Option<HashMap<String, Vec<f64>>>,
    digits: u32,
    measurement_name: Option<String>,
    seed_pool_size: usize,
    seed: Option<u64>,
) -> PyResult<PyObject> {
    let config = ExperimentConfig {
        seed_pool_size,
        grand_mean,
        factor_names: names,
        level_counts: n_levels,
        variability_fractions: var_fracs,
        level_names: level_names.unwrap_or_default(),
        level_effects: level_effects.unwrap_or_default(),
        digits,
        measurement_name,
        seed,
    };

    let table = config
        .build()
        .and_then(|experiment| experiment.run())
        .map_err(to_py_err)?;

    Ok(table_to_dict(py, &table)?.into())
}

/// The nested-synth Python module.
#[pymodule]
fn nested_synth(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(synthesize, m)?)?;
    Ok(())
}
