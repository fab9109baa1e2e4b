// State vectors, state transition kernels and the distance metric.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SolverError};
use crate::gates::{GateOp, NEG_S2, ONE, S2, ZERO};

/// Registers with at least this many qubits apply gates with rayon.
pub const PARALLEL_QUBITS: usize = 14;

/// Largest register a search accepts.
pub const MAX_QUBITS: usize = 30;

// ---- Utility Functions ----

/// Return the number of qubits for a state vector of length `vl`.
pub fn nqubits(vl: usize) -> usize {
    vl.trailing_zeros() as usize
}

/// Flip bit `b` in index `i` using XOR.
pub fn conjugate_index(i: usize, b: usize) -> usize {
    i ^ (1 << b)
}

fn kron(a: &Array1<Complex64>, b: &Array1<Complex64>) -> Array1<Complex64> {
    let (la, lb) = (a.len(), b.len());
    let mut result = Array1::zeros(la * lb);
    for i in 0..la {
        for j in 0..lb {
            result[i * lb + j] = a[i] * b[j];
        }
    }
    result
}

// ---- Formatting ----

/// Round to `n` significant figures to eliminate floating-point ULP noise.
fn round_sigfigs(x: f64, n: i32) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    let d = x.abs().log10().ceil() as i32;
    let power = 10f64.powi(n - d);
    (x * power).round() / power
}

fn format_real(x: f64) -> String {
    let x = round_sigfigs(x, 15);
    let s = format!("{}", x);
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        format!("{s}.0")
    } else {
        s
    }
}

/// Just the real part if purely real, otherwise the full complex number.
fn qcoef(a: Complex64) -> String {
    let re = round_sigfigs(a.re, 15);
    let im = round_sigfigs(a.im, 15);
    if im.abs() < 1e-8 {
        format_real(re)
    } else {
        format!("{}+{}i", format_real(re), format_real(im))
    }
}

fn qterm(i: usize, qi: Complex64, n: usize) -> String {
    format!("{}|{:0>width$b}>", qcoef(qi), i, width = n)
}

// ---- Distance Metric ----

/// How two amplitude vectors are compared against the tolerance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// `sqrt(sum |a_i - b_i|^2)`; a global phase difference counts.
    #[default]
    Euclidean,
    /// Euclidean distance minimised over a global phase applied to one side.
    GlobalPhase,
}

impl Metric {
    pub fn distance(self, a: &QState, b: &QState) -> Result<f64> {
        a.check_dimension(b)?;
        Ok(self.measure(a, b))
    }

    /// Distance between two states already known to share a dimension.
    pub(crate) fn measure(self, a: &QState, b: &QState) -> f64 {
        match self {
            Metric::Euclidean => a
                .v
                .iter()
                .zip(b.v.iter())
                .map(|(x, y)| (x - y).norm_sqr())
                .sum::<f64>()
                .sqrt(),
            Metric::GlobalPhase => {
                let overlap: Complex64 = a.v.iter().zip(b.v.iter()).map(|(x, y)| x.conj() * y).sum();
                let (na, nb) = (a.norm(), b.norm());
                (na * na + nb * nb - 2.0 * overlap.norm()).max(0.0).sqrt()
            }
        }
    }
}

// ---- Quantum Register ----

/// A pure state over `2^n` computational basis states.
///
/// Qubit `q` is bit `q` of the basis index, so qubit 0 is the least
/// significant bit. Amplitudes are kept as given; nothing here normalizes
/// unless asked to.
#[derive(Clone, Debug, PartialEq)]
pub struct QState {
    pub v: Array1<Complex64>,
    pub n: usize,
}

impl QState {
    /// Create a state from raw amplitudes. The length must be a power of two.
    pub fn new(amplitudes: Vec<Complex64>) -> Result<Self> {
        Self::from_array(Array1::from_vec(amplitudes), "Input")
    }

    fn from_array(v: Array1<Complex64>, label: &str) -> Result<Self> {
        let len = v.len();
        if len == 0 {
            return Err(SolverError::EmptyState { label: label.to_string() });
        }
        if !len.is_power_of_two() {
            return Err(SolverError::NotPowerOfTwo { label: label.to_string(), len });
        }
        Ok(QState { v, n: nqubits(len) })
    }

    /// Build a state from `[real, imag]` pairs as found in configuration files.
    pub fn from_real_imag_pairs(pairs: &[Vec<f64>], label: &str) -> Result<Self> {
        let mut data = Vec::with_capacity(pairs.len());
        for (index, pair) in pairs.iter().enumerate() {
            match pair.as_slice() {
                [re, im] => data.push(Complex64::new(*re, *im)),
                _ => {
                    return Err(SolverError::MalformedAmplitude {
                        label: label.to_string(),
                        index,
                    });
                }
            }
        }
        Self::from_array(Array1::from_vec(data), label)
    }

    pub fn dimension(&self) -> usize {
        self.v.len()
    }

    /// Calculate the L2 norm of the state vector.
    pub fn norm(&self) -> f64 {
        self.v.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
    }

    /// Normalize in place. Zero vectors are rejected.
    pub fn normalize(&mut self, label: &str) -> Result<()> {
        let norm = self.norm();
        if norm < 1e-12 {
            return Err(SolverError::ZeroNorm { label: label.to_string() });
        }
        self.v.mapv_inplace(|x| x / norm);
        Ok(())
    }

    /// Squared magnitude of every amplitude.
    pub fn probabilities(&self) -> Vec<f64> {
        self.v.iter().map(|x| x.norm_sqr()).collect()
    }

    pub(crate) fn check_dimension(&self, other: &QState) -> Result<()> {
        if self.v.len() != other.v.len() {
            return Err(SolverError::DimensionMismatch {
                expected: self.v.len(),
                actual: other.v.len(),
            });
        }
        Ok(())
    }

    /// Euclidean norm of the componentwise difference.
    pub fn distance(&self, other: &QState) -> Result<f64> {
        Metric::Euclidean.distance(self, other)
    }

    /// Return string representation of significant terms in the quantum state.
    pub fn terms(&self) -> String {
        self.v
            .iter()
            .enumerate()
            .filter(|(_, qi)| qi.norm() > 1e-8)
            .map(|(i, &qi)| qterm(i, qi, self.n))
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ---- State Transition ----

    /// Apply a gate placement, returning a new state. `self` is untouched.
    pub fn apply(&self, op: &GateOp) -> Result<QState> {
        op.validate(self.n)?;
        Ok(self.apply_unchecked(op))
    }

    /// Apply a placement already validated against this register size.
    pub(crate) fn apply_unchecked(&self, op: &GateOp) -> QState {
        let m = op.gate.matrix();
        let v = match op.targets.as_slice() {
            [target] => self.apply1q(m, *target),
            [control, target] => self.apply2q(m, *control, *target),
            _ => unreachable!("placements are validated before application"),
        };
        QState { v, n: self.n }
    }

    /// Apply a single-qubit matrix to `target`.
    ///
    /// Amplitudes are grouped in pairs `(i, i | 1 << target)` with the target
    /// bit clear in `i`; the full `2^n x 2^n` operator is never built.
    pub fn apply1q(&self, m: &Array2<Complex64>, target: usize) -> Array1<Complex64> {
        let m00 = m[[0, 0]];
        let m01 = m[[0, 1]];
        let m10 = m[[1, 0]];
        let m11 = m[[1, 1]];
        let len = self.v.len();

        if self.n >= PARALLEL_QUBITS {
            let v = &self.v;
            let mask = 1usize << target;
            let out: Vec<Complex64> = (0..len)
                .into_par_iter()
                .map(|i| {
                    let (qi, qj) = (v[i & !mask], v[i | mask]);
                    if i & mask == 0 {
                        m00 * qi + m01 * qj
                    } else {
                        m10 * qi + m11 * qj
                    }
                })
                .collect();
            return Array1::from_vec(out);
        }

        let mut out = self.v.clone();
        for i in 0..len {
            let j = conjugate_index(i, target);
            if i > j {
                continue;
            }
            let (qi, qj) = (self.v[i], self.v[j]);
            out[i] = m00 * qi + m01 * qj;
            out[j] = m10 * qi + m11 * qj;
        }
        out
    }

    /// Apply a two-qubit matrix indexed by `(control_bit << 1) | target_bit`.
    pub fn apply2q(
        &self,
        m: &Array2<Complex64>,
        control: usize,
        target: usize,
    ) -> Array1<Complex64> {
        let mv: [[Complex64; 4]; 4] = [
            [m[[0, 0]], m[[0, 1]], m[[0, 2]], m[[0, 3]]],
            [m[[1, 0]], m[[1, 1]], m[[1, 2]], m[[1, 3]]],
            [m[[2, 0]], m[[2, 1]], m[[2, 2]], m[[2, 3]]],
            [m[[3, 0]], m[[3, 1]], m[[3, 2]], m[[3, 3]]],
        ];
        let len = self.v.len();

        if self.n >= PARALLEL_QUBITS {
            let v = &self.v;
            let cmask = 1usize << control;
            let tmask = 1usize << target;
            let out: Vec<Complex64> = (0..len)
                .into_par_iter()
                .map(|idx| {
                    let base = idx & !(cmask | tmask);
                    let row = (usize::from(idx & cmask != 0) << 1) | usize::from(idx & tmask != 0);
                    let r = &mv[row];
                    r[0] * v[base]
                        + r[1] * v[base | tmask]
                        + r[2] * v[base | cmask]
                        + r[3] * v[base | cmask | tmask]
                })
                .collect();
            return Array1::from_vec(out);
        }

        let mut out = self.v.clone();
        for i in 0..len {
            let j = conjugate_index(i, target);
            if i > j {
                continue;
            }
            let k = conjugate_index(i, control);
            if i > k {
                continue;
            }
            let l = conjugate_index(j, control);
            let (qi, qj, qk, ql) = (self.v[i], self.v[j], self.v[k], self.v[l]);

            out[i] = mv[0][0] * qi + mv[0][1] * qj + mv[0][2] * qk + mv[0][3] * ql;
            out[j] = mv[1][0] * qi + mv[1][1] * qj + mv[1][2] * qk + mv[1][3] * ql;
            out[k] = mv[2][0] * qi + mv[2][1] * qj + mv[2][2] * qk + mv[2][3] * ql;
            out[l] = mv[3][0] * qi + mv[3][1] * qj + mv[3][2] * qk + mv[3][3] * ql;
        }
        out
    }

    /// Check if this quantum state is close to another.
    pub fn isclose(&self, other: &QState) -> bool {
        if self.v.len() != other.v.len() {
            return false;
        }
        self.v
            .iter()
            .zip(other.v.iter())
            .all(|(a, b)| (a - b).norm() < 1e-5)
    }

    /// Check if this quantum state is close to a slice of f64 values (treated as real).
    pub fn isclose_slice(&self, other: &[f64]) -> bool {
        if self.v.len() != other.len() {
            return false;
        }
        self.v
            .iter()
            .zip(other.iter())
            .all(|(a, b)| (a - b).norm() < 1e-5)
    }
}

impl fmt::Display for QState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.terms())
    }
}

// ---- Convenience Functions ----

/// Create a product state from a string specification.
///
/// Characters: '0' = |0>, '1' = |1>, '+' = |+>, '-' = |->.
/// The rightmost character is qubit 0.
///
/// Examples: "0", "1", "00", "01", "++", "+-", "101"
pub fn ket(vecstring: &str) -> Result<QState> {
    if vecstring.is_empty() {
        return Err(SolverError::EmptyState { label: "ket".to_string() });
    }

    let mut register = Array1::from_vec(vec![ONE]);
    for ch in vecstring.chars() {
        let qubit = match ch {
            '0' => Array1::from_vec(vec![ONE, ZERO]),
            '1' => Array1::from_vec(vec![ZERO, ONE]),
            '+' => Array1::from_vec(vec![S2, S2]),
            '-' => Array1::from_vec(vec![S2, NEG_S2]),
            _ => return Err(SolverError::InvalidKet(ch)),
        };
        register = kron(&register, &qubit);
    }
    QState::from_array(register, "ket")
}

// ---- Tests ----
