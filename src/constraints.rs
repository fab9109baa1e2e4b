// Per-layer candidate moves.
//
// Each 1-based step resolves to one of: a single fixed placement, the
// placements of a restricted gate set (intersected with the global set), or
// the placements of the global set. Placements are listed in catalog order,
// then ascending targets; the search relies on this order for tie-breaks.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::gates::{Gate, GateOp};
use crate::state::MAX_QUBITS;

/// A placement mandated at a given step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedGate {
    /// 1-based layer index
    #[serde(alias = "layer")]
    pub step: usize,
    pub gate: Gate,
    pub targets: Vec<usize>,
}

impl FixedGate {
    pub fn new(step: usize, op: GateOp) -> Self {
        FixedGate { step, gate: op.gate, targets: op.targets }
    }

    pub fn op(&self) -> GateOp {
        GateOp { gate: self.gate, targets: self.targets.clone() }
    }
}

/// The gates permitted at a given step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConstraint {
    /// 1-based layer index
    #[serde(alias = "layer")]
    pub step: usize,
    pub allowed_gates: Vec<Gate>,
}

/// Resolved candidate moves for every layer of a run.
#[derive(Debug, Clone)]
pub struct ConstraintModel {
    num_qubits: usize,
    max_layers: usize,
    default_moves: Vec<GateOp>,
    overrides: HashMap<usize, Vec<GateOp>>,
    fixed_steps: BTreeSet<usize>,
}

impl ConstraintModel {
    /// Validate the rules and resolve the move list of each step.
    ///
    /// `allowed` is the global gate set; its order does not matter. A fixed
    /// gate must appear in its step's layer constraint when that step has one.
    pub fn new(
        num_qubits: usize,
        max_layers: usize,
        allowed: &[Gate],
        fixed: &[FixedGate],
        layer_rules: &[LayerConstraint],
    ) -> Result<Self> {
        if num_qubits == 0 || num_qubits > MAX_QUBITS {
            return Err(SolverError::InvalidQubitCount(num_qubits));
        }

        let global: BTreeSet<Gate> = allowed.iter().copied().collect();
        let default_moves = placements(&global, num_qubits);

        let mut overrides = HashMap::new();
        let mut restricted: HashMap<usize, &[Gate]> = HashMap::new();
        for rule in layer_rules {
            check_step("Layer constraint", rule.step, max_layers)?;
            if restricted.insert(rule.step, &rule.allowed_gates).is_some() {
                return Err(SolverError::DuplicateStep { kind: "layer constraint", step: rule.step });
            }
            if rule.allowed_gates.is_empty() {
                return Err(SolverError::EmptyLayerConstraint(rule.step));
            }
            let permitted: BTreeSet<Gate> = rule
                .allowed_gates
                .iter()
                .copied()
                .filter(|gate| global.contains(gate))
                .collect();
            overrides.insert(rule.step, placements(&permitted, num_qubits));
        }

        let mut fixed_steps = BTreeSet::new();
        for rule in fixed {
            check_step("Fixed gate", rule.step, max_layers)?;
            if !fixed_steps.insert(rule.step) {
                return Err(SolverError::DuplicateStep { kind: "fixed gate", step: rule.step });
            }
            let op = rule.op();
            op.validate(num_qubits)?;
            if let Some(gates) = restricted.get(&rule.step) {
                if !gates.contains(&rule.gate) {
                    return Err(SolverError::FixedGateConflict {
                        step: rule.step,
                        gate: rule.gate.to_string(),
                    });
                }
            }
            overrides.insert(rule.step, vec![op]);
        }

        Ok(ConstraintModel {
            num_qubits,
            max_layers,
            default_moves,
            overrides,
            fixed_steps,
        })
    }

    /// Candidate moves for a 1-based step. May be empty.
    pub fn moves(&self, step: usize) -> &[GateOp] {
        self.overrides
            .get(&step)
            .map_or(self.default_moves.as_slice(), Vec::as_slice)
    }

    /// Shortest sequence length that covers every fixed step.
    pub fn required_length(&self) -> usize {
        self.fixed_steps.last().copied().unwrap_or(0)
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn max_layers(&self) -> usize {
        self.max_layers
    }
}

fn check_step(kind: &'static str, step: usize, max_layers: usize) -> Result<()> {
    if step == 0 || step > max_layers {
        return Err(SolverError::StepOutOfRange { kind, step, max_layers });
    }
    Ok(())
}

/// All placements of the given gates, gates in catalog order.
fn placements(gates: &BTreeSet<Gate>, num_qubits: usize) -> Vec<GateOp> {
    gates
        .iter()
        .flat_map(|&gate| GateOp::enumerate(gate, num_qubits))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(moves: &[GateOp]) -> Vec<String> {
        moves.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_default_moves_in_catalog_order() {
        let model = ConstraintModel::new(2, 1, &[Gate::Cnot, Gate::H], &[], &[]).unwrap();
        assert_eq!(
            names(model.moves(1)),
            vec!["H q0", "H q1", "CNOT q0->q1", "CNOT q1->q0"]
        );
        assert_eq!(model.required_length(), 0);
    }

    #[test]
    fn test_branching_factor() {
        let model = ConstraintModel::new(3, 1, &Gate::ALL, &[], &[]).unwrap();
        // Seven single-qubit gates on 3 qubits plus 3 * 2 CNOT placements.
        assert_eq!(model.moves(1).len(), 7 * 3 + 6);
    }

    #[test]
    fn test_layer_constraint_intersects_global_set() {
        let rules = [LayerConstraint { step: 2, allowed_gates: vec![Gate::X, Gate::H] }];
        let model = ConstraintModel::new(1, 2, &[Gate::H, Gate::Z], &[], &rules).unwrap();
        assert_eq!(names(model.moves(1)), vec!["Z q0", "H q0"]);
        assert_eq!(names(model.moves(2)), vec!["H q0"]);
    }

    #[test]
    fn test_empty_intersection_is_dead_end() {
        let rules = [LayerConstraint { step: 1, allowed_gates: vec![Gate::T] }];
        let model = ConstraintModel::new(1, 1, &[Gate::H], &[], &rules).unwrap();
        assert!(model.moves(1).is_empty());
    }

    #[test]
    fn test_fixed_gate_outside_layer_constraint() {
        let fixed = [FixedGate::new(1, GateOp::single(Gate::X, 0))];
        let rules = [LayerConstraint { step: 1, allowed_gates: vec![Gate::H] }];
        let err = ConstraintModel::new(1, 1, &Gate::ALL, &fixed, &rules).unwrap_err();
        assert!(matches!(err, SolverError::FixedGateConflict { step: 1, ref gate } if gate == "X"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_fixed_gate_within_layer_constraint() {
        let fixed = [FixedGate::new(1, GateOp::single(Gate::X, 1))];
        let rules = [LayerConstraint { step: 1, allowed_gates: vec![Gate::H, Gate::X] }];
        let model = ConstraintModel::new(2, 3, &[Gate::H], &fixed, &rules).unwrap();
        assert_eq!(names(model.moves(1)), vec!["X q1"]);
        assert_eq!(names(model.moves(2)), vec!["H q0", "H q1"]);
        assert_eq!(model.required_length(), 1);
    }

    #[test]
    fn test_qubit_count_range() {
        assert!(matches!(
            ConstraintModel::new(0, 1, &Gate::ALL, &[], &[]),
            Err(SolverError::InvalidQubitCount(0))
        ));
        assert!(matches!(
            ConstraintModel::new(64, 1, &[Gate::X], &[], &[]),
            Err(SolverError::InvalidQubitCount(64))
        ));
        assert!(ConstraintModel::new(MAX_QUBITS, 1, &[Gate::X], &[], &[]).is_ok());
    }

    #[test]
    fn test_fixed_gate_out_of_range_qubit() {
        let fixed = [FixedGate::new(1, GateOp::single(Gate::X, 2))];
        let err = ConstraintModel::new(2, 2, &Gate::ALL, &fixed, &[]).unwrap_err();
        assert!(matches!(err, SolverError::QubitOutOfRange { qubit: 2, num_qubits: 2, .. }));
    }

    #[test]
    fn test_step_validation() {
        let beyond = [FixedGate::new(3, GateOp::single(Gate::X, 0))];
        assert!(matches!(
            ConstraintModel::new(1, 2, &Gate::ALL, &beyond, &[]),
            Err(SolverError::StepOutOfRange { step: 3, .. })
        ));

        let zero = [LayerConstraint { step: 0, allowed_gates: vec![Gate::X] }];
        assert!(matches!(
            ConstraintModel::new(1, 2, &Gate::ALL, &[], &zero),
            Err(SolverError::StepOutOfRange { step: 0, .. })
        ));

        let twice = [
            FixedGate::new(1, GateOp::single(Gate::X, 0)),
            FixedGate::new(1, GateOp::single(Gate::Z, 0)),
        ];
        assert!(matches!(
            ConstraintModel::new(1, 2, &Gate::ALL, &twice, &[]),
            Err(SolverError::DuplicateStep { step: 1, .. })
        ));

        let empty = [LayerConstraint { step: 1, allowed_gates: vec![] }];
        assert!(matches!(
            ConstraintModel::new(1, 2, &Gate::ALL, &[], &empty),
            Err(SolverError::EmptyLayerConstraint(1))
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        let fixed = [FixedGate { step: 1, gate: Gate::Cnot, targets: vec![0] }];
        assert!(matches!(
            ConstraintModel::new(2, 1, &Gate::ALL, &fixed, &[]),
            Err(SolverError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_layer_alias_deserializes() {
        let rule: FixedGate =
            serde_json::from_str(r#"{"layer": 2, "gate": "x", "targets": [0]}"#).unwrap();
        assert_eq!(rule, FixedGate::new(2, GateOp::single(Gate::X, 0)));
    }
}
