// PyO3 Python bindings for qsolve
//
// - solve(config_json) runs a full search and returns the result payload as JSON
// - apply_gate(amplitudes, gate, targets) applies one catalog gate
// - ket('0') and the State class for interactive use

use crate::{GateOp, QState, SolverConfig, SolverError, ket as rust_ket, result_payload};
use num_complex::Complex64;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(err: SolverError) -> PyErr {
    if err.is_config_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyIOError::new_err(err.to_string())
    }
}

fn parse_op(gate: &str, targets: Vec<usize>, num_qubits: usize) -> PyResult<GateOp> {
    let gate = gate.parse().map_err(to_py_err)?;
    GateOp::new(gate, targets, num_qubits).map_err(to_py_err)
}

/// Python wrapper for QState
#[pyclass(name = "State")]
pub struct PyQState {
    inner: QState,
}

#[pymethods]
impl PyQState {
    #[new]
    fn new(amplitudes: Vec<Complex64>) -> PyResult<Self> {
        let inner = QState::new(amplitudes).map_err(to_py_err)?;
        Ok(PyQState { inner })
    }

    // ---- Properties ----

    /// Number of qubits
    #[getter]
    fn n(&self) -> usize {
        self.inner.n
    }

    /// State vector amplitudes as list of complex numbers
    #[getter]
    fn amplitudes(&self) -> Vec<Complex64> {
        self.inner.v.to_vec()
    }

    /// L2 norm of the state vector
    #[getter]
    fn norm(&self) -> f64 {
        self.inner.norm()
    }

    fn probabilities(&self) -> Vec<f64> {
        self.inner.probabilities()
    }

    // ---- String representations ----

    fn __str__(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        format!("State({})", self.inner)
    }

    // ---- Gates ----

    /// Apply a gate, returning a new State. CNOT targets are [control, target].
    fn apply(&self, gate: &str, targets: Vec<usize>) -> PyResult<PyQState> {
        let op = parse_op(gate, targets, self.inner.n)?;
        let inner = self.inner.apply(&op).map_err(to_py_err)?;
        Ok(PyQState { inner })
    }

    /// Euclidean distance to another state of the same size
    fn distance(&self, other: &PyQState) -> PyResult<f64> {
        self.inner.distance(&other.inner).map_err(to_py_err)
    }

    fn isclose(&self, other: &PyQState) -> bool {
        self.inner.isclose(&other.inner)
    }
}

/// Create a product state from a string specification.
///
/// Examples: ket('0'), ket('1'), ket('00'), ket('++'), ket('101')
#[pyfunction]
#[pyo3(signature = (vecstring="0"))]
fn ket(vecstring: &str) -> PyResult<PyQState> {
    let inner = rust_ket(vecstring).map_err(to_py_err)?;
    Ok(PyQState { inner })
}

/// Apply one gate to raw amplitudes.
///
/// Args:
///     amplitudes: list of complex, length 2^n
///     gate: catalog symbol such as 'H' or 'CNOT'
///     targets: qubit indices; [control, target] for CNOT
#[pyfunction]
fn apply_gate(amplitudes: Vec<Complex64>, gate: &str, targets: Vec<usize>) -> PyResult<Vec<Complex64>> {
    let state = QState::new(amplitudes).map_err(to_py_err)?;
    let op = parse_op(gate, targets, state.n)?;
    let next = state.apply(&op).map_err(to_py_err)?;
    Ok(next.v.to_vec())
}

/// Run a search described by a JSON configuration and return the result
/// payload as JSON. The search releases the GIL.
#[pyfunction]
fn solve(py: Python<'_>, config_json: &str) -> PyResult<String> {
    let config = SolverConfig::from_json(config_json).map_err(to_py_err)?;
    let problem = config.resolve().map_err(to_py_err)?;
    let payload = py
        .allow_threads(|| {
            let outcome = problem.solve()?;
            result_payload(&outcome, &problem.initial)
        })
        .map_err(to_py_err)?;
    serde_json::to_string(&payload).map_err(|err| to_py_err(err.into()))
}

/// Python module definition
#[pymodule]
fn qsolve(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyQState>()?;
    m.add_function(wrap_pyfunction!(ket, m)?)?;
    m.add_function(wrap_pyfunction!(apply_gate, m)?)?;
    m.add_function(wrap_pyfunction!(solve, m)?)?;
    Ok(())
}
