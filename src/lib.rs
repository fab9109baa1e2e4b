// qsolve - gate sequence search over quantum state vectors
//
// Given an initial and a target state vector, find the shortest sequence of
// catalog gates (at most one per layer) that takes one to the other, subject
// to per-layer constraints.

pub mod config;
pub mod constraints;
pub mod error;
pub mod gates;
pub mod persistence;
pub mod solver;
pub mod state;
pub mod timeline;

#[cfg(feature = "pyo3")]
mod python;

pub use config::{Overrides, Problem, SolverConfig, load_config};
pub use constraints::{ConstraintModel, FixedGate, LayerConstraint};
pub use error::{Result, SolverError};
pub use gates::{Gate, GateOp, parse_gate_list};
pub use persistence::{ResultPayload, result_payload, write_result};
pub use solver::{SearchStats, SolveOutcome, Solver, SolverOptions, replay};
pub use state::{Metric, QState, ket};
pub use timeline::render_timeline;
