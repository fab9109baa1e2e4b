// JSON problem description and its resolution into a ready-to-run search.

use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constraints::{ConstraintModel, FixedGate, LayerConstraint};
use crate::error::{Result, SolverError};
use crate::gates::{Gate, parse_gate_list};
use crate::solver::{DEFAULT_TOLERANCE, SolveOutcome, Solver, SolverOptions};
use crate::state::{MAX_QUBITS, Metric, QState};

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_true() -> bool {
    true
}

/// A problem as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    pub num_qubits: usize,
    /// Maximum sequence length
    #[serde(default)]
    pub layers: usize,
    /// `[real, imag]` pairs, length `2^num_qubits`
    pub initial_state: Vec<Vec<f64>>,
    pub target_state: Vec<Vec<f64>>,
    /// Gate symbols; all gates when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_gates: Option<Vec<String>>,
    #[serde(default)]
    pub fixed_gates: Vec<FixedGate>,
    #[serde(default)]
    pub layer_gate_constraints: Vec<LayerConstraint>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default)]
    pub metric: Metric,
    /// Rescale both states to unit norm before searching
    #[serde(default = "default_true")]
    pub normalize_states: bool,
    #[serde(default)]
    pub parallel: bool,
}

/// Values supplied on the command line that replace configured ones.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub layers: Option<usize>,
    pub allowed_gates: Option<Vec<String>>,
    pub output_path: Option<String>,
}

/// A validated problem.
#[derive(Debug, Clone)]
pub struct Problem {
    pub initial: QState,
    pub target: QState,
    pub solver: Solver,
    pub output_path: Option<String>,
}

impl Problem {
    pub fn solve(&self) -> Result<SolveOutcome> {
        self.solver.solve(&self.initial, &self.target)
    }
}

/// Read a configuration from `path`, or from stdin when `path` is `-`.
pub fn load_config(path: &str) -> Result<SolverConfig> {
    if path == "-" {
        let stdin = io::stdin();
        return Ok(serde_json::from_reader(stdin.lock())?);
    }
    let text = fs::read_to_string(path)?;
    SolverConfig::from_json(&text)
}

impl SolverConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(layers) = overrides.layers {
            self.layers = layers;
        }
        if let Some(gates) = overrides.allowed_gates {
            self.allowed_gates = Some(gates);
        }
        if let Some(path) = overrides.output_path {
            self.output_path = Some(path);
        }
    }

    /// Validate every field and build the states and solver.
    pub fn resolve(&self) -> Result<Problem> {
        let n = self.num_qubits;
        if n == 0 || n > MAX_QUBITS {
            return Err(SolverError::InvalidQubitCount(n));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(SolverError::InvalidTolerance(self.tolerance));
        }

        let initial = self.read_state(&self.initial_state, "Initial")?;
        let target = self.read_state(&self.target_state, "Target")?;

        let allowed = match &self.allowed_gates {
            Some(symbols) => parse_gate_list(symbols)?,
            None => Gate::ALL.to_vec(),
        };
        let model = ConstraintModel::new(
            n,
            self.layers,
            &allowed,
            &self.fixed_gates,
            &self.layer_gate_constraints,
        )?;
        debug!(
            num_qubits = n,
            layers = self.layers,
            gates = allowed.len(),
            fixed = self.fixed_gates.len(),
            "configuration resolved"
        );

        let options = SolverOptions {
            tolerance: self.tolerance,
            metric: self.metric,
            parallel: self.parallel,
            ..SolverOptions::default()
        };
        Ok(Problem {
            initial,
            target,
            solver: Solver::new(model, options),
            output_path: self.output_path.clone(),
        })
    }

    fn read_state(&self, pairs: &[Vec<f64>], label: &str) -> Result<QState> {
        let mut state = QState::from_real_imag_pairs(pairs, label)?;
        let expected = 1usize << self.num_qubits;
        if state.dimension() != expected {
            return Err(SolverError::DimensionMismatch { expected, actual: state.dimension() });
        }
        if self.normalize_states {
            state.normalize(label)?;
        } else if state.norm() < 1e-12 {
            return Err(SolverError::ZeroNorm { label: label.to_string() });
        }
        Ok(state)
    }
}
