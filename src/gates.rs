// Gate catalog: the fixed set of unitaries the solver may place.

use ndarray::{array, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Result, SolverError};

// ---- Complex Constants ----

pub(crate) const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub(crate) const ONE: Complex64 = Complex64::new(1.0, 0.0);
const NEG1: Complex64 = Complex64::new(-1.0, 0.0);
const IM: Complex64 = Complex64::new(0.0, 1.0);
const NEG_IM: Complex64 = Complex64::new(0.0, -1.0);
pub(crate) const S2: Complex64 = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
pub(crate) const NEG_S2: Complex64 = Complex64::new(-std::f64::consts::FRAC_1_SQRT_2, 0.0);

// ---- Gate Matrices ----

pub static I_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![[ONE, ZERO], [ZERO, ONE]]
});

pub static X_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![[ZERO, ONE], [ONE, ZERO]]
});

pub static Y_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![[ZERO, NEG_IM], [IM, ZERO]]
});

pub static Z_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![[ONE, ZERO], [ZERO, NEG1]]
});

pub static H_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![[S2, S2], [S2, NEG_S2]]
});

pub static S_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![[ONE, ZERO], [ZERO, IM]]
});

pub static T_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    let phase = Complex64::from_polar(1.0, std::f64::consts::FRAC_PI_4);
    array![[ONE, ZERO], [ZERO, phase]]
});

/// Rows and columns are indexed by `(control_bit << 1) | target_bit`.
pub static CNOT_GATE: LazyLock<Array2<Complex64>> = LazyLock::new(|| {
    array![
        [ONE,  ZERO, ZERO, ZERO],
        [ZERO, ONE,  ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE ],
        [ZERO, ZERO, ONE,  ZERO]
    ]
});

// ---- Gate Symbols ----

/// A cataloged gate symbol.
///
/// Declaration order is the search enumeration order and therefore decides
/// which of several equally short solutions is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gate {
    I,
    X,
    Y,
    Z,
    H,
    S,
    T,
    Cnot,
}

impl Gate {
    /// Every gate, in catalog order.
    pub const ALL: [Gate; 8] = [
        Gate::I,
        Gate::X,
        Gate::Y,
        Gate::Z,
        Gate::H,
        Gate::S,
        Gate::T,
        Gate::Cnot,
    ];

    /// Number of qubits the gate acts on.
    pub fn arity(self) -> usize {
        match self {
            Gate::Cnot => 2,
            _ => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Gate::I => "I",
            Gate::X => "X",
            Gate::Y => "Y",
            Gate::Z => "Z",
            Gate::H => "H",
            Gate::S => "S",
            Gate::T => "T",
            Gate::Cnot => "CNOT",
        }
    }

    /// The gate's unitary: 2x2 for single-qubit gates, 4x4 for CNOT.
    pub fn matrix(self) -> &'static Array2<Complex64> {
        match self {
            Gate::I => &*I_GATE,
            Gate::X => &*X_GATE,
            Gate::Y => &*Y_GATE,
            Gate::Z => &*Z_GATE,
            Gate::H => &*H_GATE,
            Gate::S => &*S_GATE,
            Gate::T => &*T_GATE,
            Gate::Cnot => &*CNOT_GATE,
        }
    }
}

impl FromStr for Gate {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        let gate = match s.trim().to_ascii_uppercase().as_str() {
            "I" | "ID" => Gate::I,
            "X" => Gate::X,
            "Y" => Gate::Y,
            "Z" => Gate::Z,
            "H" => Gate::H,
            "S" => Gate::S,
            "T" => Gate::T,
            "CNOT" | "CX" => Gate::Cnot,
            _ => return Err(SolverError::UnknownGate(s.to_string())),
        };
        Ok(gate)
    }
}

impl TryFrom<String> for Gate {
    type Error = SolverError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Gate> for String {
    fn from(gate: Gate) -> String {
        gate.symbol().to_string()
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Parse a list of gate symbols, dropping repeats but keeping first-seen order.
pub fn parse_gate_list<S: AsRef<str>>(symbols: &[S]) -> Result<Vec<Gate>> {
    let mut gates = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let gate: Gate = symbol.as_ref().parse()?;
        if !gates.contains(&gate) {
            gates.push(gate);
        }
    }
    Ok(gates)
}

// ---- Gate Placement ----

/// A gate together with the qubits it acts on.
///
/// For CNOT the targets are `[control, target]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateOp {
    pub gate: Gate,
    pub targets: Vec<usize>,
}

impl GateOp {
    /// Build a placement and check it against a register of `num_qubits` qubits.
    pub fn new(gate: Gate, targets: Vec<usize>, num_qubits: usize) -> Result<Self> {
        let op = GateOp { gate, targets };
        op.validate(num_qubits)?;
        Ok(op)
    }

    pub fn single(gate: Gate, target: usize) -> Self {
        GateOp { gate, targets: vec![target] }
    }

    pub fn cnot(control: usize, target: usize) -> Self {
        GateOp { gate: Gate::Cnot, targets: vec![control, target] }
    }

    /// Check arity, range and uniqueness of the targets.
    pub fn validate(&self, num_qubits: usize) -> Result<()> {
        if self.targets.len() != self.gate.arity() {
            return Err(SolverError::ArityMismatch {
                gate: self.gate.to_string(),
                expected: self.gate.arity(),
                actual: self.targets.len(),
            });
        }
        for &qubit in &self.targets {
            if qubit >= num_qubits {
                return Err(SolverError::QubitOutOfRange {
                    gate: self.gate.to_string(),
                    qubit,
                    num_qubits,
                });
            }
        }
        if self.targets.len() == 2 && self.targets[0] == self.targets[1] {
            return Err(SolverError::RepeatedTarget(self.gate.to_string()));
        }
        Ok(())
    }

    /// Every placement of `gate` on an `num_qubits` register, ascending by target
    /// (control first, then target, for CNOT).
    pub fn enumerate(gate: Gate, num_qubits: usize) -> Vec<GateOp> {
        match gate.arity() {
            1 => (0..num_qubits).map(|q| GateOp::single(gate, q)).collect(),
            _ => {
                let mut ops = Vec::with_capacity(num_qubits * num_qubits.saturating_sub(1));
                for control in 0..num_qubits {
                    for target in 0..num_qubits {
                        if control != target {
                            ops.push(GateOp { gate, targets: vec![control, target] });
                        }
                    }
                }
                ops
            }
        }
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.gate, self.targets.as_slice()) {
            (Gate::Cnot, [control, target]) => write!(f, "CNOT q{control}->q{target}"),
            (gate, [target]) => write!(f, "{gate} q{target}"),
            (gate, targets) => {
                let list: Vec<String> = targets.iter().map(|q| format!("q{q}")).collect();
                write!(f, "{gate} ({})", list.join(","))
            }
        }
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unitary(m: &Array2<Complex64>) -> bool {
        let n = m.nrows();
        for i in 0..n {
            for j in 0..n {
                let mut total = ZERO;
                for k in 0..n {
                    total += m[[i, k]] * m[[j, k]].conj();
                }
                let expected = if i == j { ONE } else { ZERO };
                if (total - expected).norm() > 1e-12 {
                    return false;
                }
            }
        }
        true
    }

    #[test]
    fn test_catalog_is_unitary() {
        for gate in Gate::ALL {
            let m = gate.matrix();
            let dim = 1 << gate.arity();
            assert_eq!(m.shape(), [dim, dim], "{gate}");
            assert!(is_unitary(m), "{gate} is not unitary");
        }
    }

    #[test]
    fn test_t_squared_is_s() {
        let t = T_GATE.dot(&*T_GATE);
        for (a, b) in t.iter().zip(S_GATE.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_parse_symbols() {
        assert_eq!("h".parse::<Gate>().unwrap(), Gate::H);
        assert_eq!("cx".parse::<Gate>().unwrap(), Gate::Cnot);
        assert_eq!(" CNOT ".parse::<Gate>().unwrap(), Gate::Cnot);
        assert!(matches!("SWAP".parse::<Gate>(), Err(SolverError::UnknownGate(_))));
    }

    #[test]
    fn test_parse_gate_list_dedups() {
        let gates = parse_gate_list(&["H", "CNOT", "h"]).unwrap();
        assert_eq!(gates, vec![Gate::H, Gate::Cnot]);
    }

    #[test]
    fn test_serde_symbol() {
        let op = GateOp::cnot(0, 1);
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"gate":"CNOT","targets":[0,1]}"#);
        let back: GateOp = serde_json::from_str(r#"{"gate":"cx","targets":[0,1]}"#).unwrap();
        assert_eq!(back, op);
        assert!(serde_json::from_str::<GateOp>(r#"{"gate":"U3","targets":[0]}"#).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(GateOp::new(Gate::H, vec![1], 2).is_ok());
        assert!(matches!(
            GateOp::new(Gate::H, vec![2], 2),
            Err(SolverError::QubitOutOfRange { qubit: 2, .. })
        ));
        assert!(matches!(
            GateOp::new(Gate::Cnot, vec![0], 2),
            Err(SolverError::ArityMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            GateOp::new(Gate::Cnot, vec![1, 1], 2),
            Err(SolverError::RepeatedTarget(_))
        ));
    }

    #[test]
    fn test_enumeration_order() {
        let ops = GateOp::enumerate(Gate::Cnot, 3);
        let pairs: Vec<Vec<usize>> = ops.into_iter().map(|op| op.targets).collect();
        assert_eq!(
            pairs,
            vec![vec![0, 1], vec![0, 2], vec![1, 0], vec![1, 2], vec![2, 0], vec![2, 1]]
        );
        assert_eq!(GateOp::enumerate(Gate::X, 3).len(), 3);
        assert!(GateOp::enumerate(Gate::Cnot, 1).is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(GateOp::single(Gate::H, 0).to_string(), "H q0");
        assert_eq!(GateOp::cnot(0, 1).to_string(), "CNOT q0->q1");
    }
}
