// Plain-text rendering of a gate sequence and the states it passes through.

use std::fmt::Write;

use num_complex::Complex64;

use crate::error::Result;
use crate::gates::{Gate, GateOp};
use crate::state::QState;

/// Digits after the decimal point for amplitudes and probabilities.
pub const PRECISION: usize = 6;

const WIRE_WIDTH: usize = 7;

fn format_amplitude(a: Complex64) -> String {
    format!("{:.p$}{:+.p$}i", a.re, a.im, p = PRECISION)
}

/// One line per basis state: `|bits> amplitude=a+bi, prob=p`.
pub fn format_state(state: &QState) -> Vec<String> {
    state
        .v
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            format!(
                "|{:0w$b}> amplitude={}, prob={:.p$}",
                i,
                format_amplitude(a),
                a.norm_sqr(),
                w = state.n,
                p = PRECISION
            )
        })
        .collect()
}

/// Wire diagram of a single layer, one line per qubit.
fn layer_lines(op: &GateOp, num_qubits: usize) -> Vec<String> {
    let center = WIRE_WIDTH / 2;
    let mut wires = vec![vec!['─'; WIRE_WIDTH]; num_qubits];

    match (op.gate, op.targets.as_slice()) {
        (Gate::Cnot, &[control, target]) => {
            wires[control][center] = '●';
            wires[target][center] = 'X';
            let (top, bottom) = (control.min(target), control.max(target));
            for wire in &mut wires[top + 1..bottom] {
                wire[center] = '│';
            }
        }
        (gate, targets) => {
            let symbol = gate.symbol().chars().next().unwrap_or('?');
            for &q in targets {
                wires[q][center] = symbol;
            }
        }
    }

    wires
        .into_iter()
        .enumerate()
        .map(|(q, chars)| format!("q{q} {}", chars.into_iter().collect::<String>()))
        .collect()
}

/// Render the initial state, every layer with the state after it, and the
/// final state. `states[k]` is the state after `sequence[k]`.
///
/// Every placement is checked against the register of `initial` first.
pub fn render_timeline(
    initial: &QState,
    sequence: &[GateOp],
    states: &[QState],
    final_state: &QState,
) -> Result<String> {
    for op in sequence {
        op.validate(initial.n)?;
    }

    let mut out = String::new();
    out.push_str("Initial state:\n");
    for line in format_state(initial) {
        let _ = writeln!(out, "{line}");
    }
    out.push('\n');

    if sequence.is_empty() {
        out.push_str("Timeline: (no operations)\n\n");
    } else {
        out.push_str("Timeline:\n");
        for (i, (op, state)) in sequence.iter().zip(states).enumerate() {
            let layer = i + 1;
            let _ = writeln!(out, "Layer {layer}: {op}");
            for line in layer_lines(op, initial.n) {
                let _ = writeln!(out, "    {line}");
            }
            let _ = writeln!(out, "    State after layer {layer}:");
            for line in format_state(state) {
                let _ = writeln!(out, "        {line}");
            }
            out.push('\n');
        }
    }

    out.push_str("Final state:\n");
    out.push_str(&format_state(final_state).join("\n"));
    Ok(out)
}
