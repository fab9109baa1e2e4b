// JSON result payloads.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::gates::GateOp;
use crate::solver::{SearchStats, SolveOutcome, replay};
use crate::state::QState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub num_qubits: usize,
    /// `[real, imag]` per basis state
    pub amplitudes: Vec<[f64; 2]>,
    pub probabilities: Vec<f64>,
}

impl From<&QState> for StatePayload {
    fn from(state: &QState) -> Self {
        StatePayload {
            num_qubits: state.n,
            amplitudes: state.v.iter().map(|a| [a.re, a.im]).collect(),
            probabilities: state.probabilities(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    /// 1-based layer index
    pub layer: usize,
    pub operation: GateOp,
    pub state: StatePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub success: bool,
    pub distance: f64,
    pub layers_used: usize,
    pub sequence: Vec<GateOp>,
    pub steps: Vec<StepPayload>,
    pub final_state: StatePayload,
    pub stats: SearchStats,
}

/// Build the payload for `outcome`. Intermediate states are replayed from
/// `initial` rather than stored by the search.
pub fn result_payload(outcome: &SolveOutcome, initial: &QState) -> Result<ResultPayload> {
    let states = replay(initial, &outcome.sequence)?;
    let steps = outcome
        .sequence
        .iter()
        .zip(&states)
        .enumerate()
        .map(|(i, (op, state))| StepPayload {
            layer: i + 1,
            operation: op.clone(),
            state: state.into(),
        })
        .collect();

    Ok(ResultPayload {
        success: outcome.success,
        distance: outcome.distance,
        layers_used: outcome.layers_used(),
        sequence: outcome.sequence.clone(),
        steps,
        final_state: (&outcome.final_state).into(),
        stats: outcome.stats,
    })
}

/// Write `payload` as pretty JSON to `dest`, or to stdout when `dest` is `-`.
/// Missing parent directories are created.
pub fn write_result(payload: &ResultPayload, dest: &str) -> Result<()> {
    let text = serde_json::to_string_pretty(payload)?;
    if dest == "-" {
        let mut out = io::stdout().lock();
        writeln!(out, "{text}")?;
        return Ok(());
    }

    let path = Path::new(dest);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text + "\n")?;
    info!(path = dest, "result written");
    Ok(())
}
