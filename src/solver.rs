// Iterative deepening search for gate sequences.
//
// Depth limits are tried in increasing order, so the first sequence found is
// a shortest one. Within a depth limit the moves of every layer are tried in
// `ConstraintModel` order, which makes the reported solution the first one
// in that order among all shortest solutions.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info};

use crate::constraints::ConstraintModel;
use crate::error::{Result, SolverError};
use crate::gates::GateOp;
use crate::state::{Metric, QState};

/// Decimal places kept when comparing states for duplicate pruning.
pub const QUANTISATION_DECIMALS: i32 = 8;

/// Default acceptance tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// A state is accepted when its distance to the target is at most this.
    pub tolerance: f64,
    pub metric: Metric,
    /// Skip subtrees rooted at a `(depth, state)` already expanded in the
    /// current iteration.
    pub prune_duplicates: bool,
    /// Explore first-layer branches on the rayon pool.
    pub parallel: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            tolerance: DEFAULT_TOLERANCE,
            metric: Metric::Euclidean,
            prune_duplicates: true,
            parallel: false,
        }
    }
}

/// Counters gathered over a whole search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Depth limits explored
    pub iterations: usize,
    /// Gate applications performed
    pub nodes_expanded: u64,
    /// Children not expanded because an identical state was already explored
    pub nodes_pruned: u64,
}

impl SearchStats {
    fn absorb(&mut self, other: SearchStats) {
        self.nodes_expanded += other.nodes_expanded;
        self.nodes_pruned += other.nodes_pruned;
    }
}

/// Result of a search.
///
/// On failure `sequence`, `final_state` and `distance` describe the closest
/// state seen, which is useful for diagnosing an unreachable target.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub success: bool,
    pub sequence: Vec<GateOp>,
    pub final_state: QState,
    pub distance: f64,
    pub stats: SearchStats,
}

impl SolveOutcome {
    pub fn layers_used(&self) -> usize {
        self.sequence.len()
    }

    /// State after each layer, recomputed from `initial`.
    pub fn timeline(&self, initial: &QState) -> Result<Vec<QState>> {
        replay(initial, &self.sequence)
    }
}

/// Apply `sequence` to `initial`, returning the state after every gate.
pub fn replay(initial: &QState, sequence: &[GateOp]) -> Result<Vec<QState>> {
    let mut states = Vec::with_capacity(sequence.len());
    let mut current = initial.clone();
    for op in sequence {
        current = current.apply(op)?;
        states.push(current.clone());
    }
    Ok(states)
}

/// Searches for a sequence of moves allowed by a [`ConstraintModel`].
#[derive(Debug, Clone)]
pub struct Solver {
    model: ConstraintModel,
    options: SolverOptions,
}

impl Solver {
    pub fn new(model: ConstraintModel, options: SolverOptions) -> Self {
        Solver { model, options }
    }

    pub fn model(&self) -> &ConstraintModel {
        &self.model
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Find a shortest sequence taking `initial` to within tolerance of `target`.
    ///
    /// A sequence only counts once it covers every fixed step. Returns an
    /// error only for inputs that do not fit the model; an exhausted search
    /// is reported with `success == false`.
    pub fn solve(&self, initial: &QState, target: &QState) -> Result<SolveOutcome> {
        self.check_input(initial, "initial")?;
        self.check_input(target, "target")?;

        let max_layers = self.model.max_layers();
        let required = self.model.required_length();
        let _span = debug_span!("solve", num_qubits = self.model.num_qubits(), max_layers).entered();

        let initial_distance = self.options.metric.measure(initial, target);
        let mut best = Best {
            distance: initial_distance,
            path: Vec::new(),
            state: initial.clone(),
        };
        let mut stats = SearchStats { iterations: 1, ..SearchStats::default() };

        if required == 0 && initial_distance <= self.options.tolerance {
            info!(distance = initial_distance, "initial state already matches target");
            return Ok(self.finish(true, best, stats));
        }

        // Limits below the last fixed step cannot produce an accepted sequence.
        for limit in required.max(1)..=max_layers {
            stats.iterations += 1;
            let (found, iteration) = if self.options.parallel {
                self.run_parallel(initial, target, limit, &mut best)
            } else {
                let mut dfs = Dfs::new(&self.model, &self.options, target, limit);
                let found = dfs.explore(initial);
                best.merge(dfs.best);
                (found, dfs.stats)
            };
            stats.absorb(iteration);
            debug!(
                limit,
                expanded = iteration.nodes_expanded,
                pruned = iteration.nodes_pruned,
                "depth limit exhausted or solved"
            );

            if let Some(found) = found {
                let best = Best {
                    distance: found.distance,
                    path: found.path,
                    state: found.state,
                };
                return Ok(self.finish(true, best, stats));
            }
        }

        Ok(self.finish(false, best, stats))
    }

    fn check_input(&self, state: &QState, label: &str) -> Result<()> {
        let expected = 1usize << self.model.num_qubits();
        if state.dimension() != expected {
            return Err(SolverError::DimensionMismatch {
                expected,
                actual: state.dimension(),
            });
        }
        if state.norm() < 1e-12 {
            return Err(SolverError::ZeroNorm { label: label.to_string() });
        }
        Ok(())
    }

    /// Explore each first-layer move as its own subtree on the rayon pool.
    ///
    /// Results are combined in move order, so the reported solution matches
    /// the sequential search.
    fn run_parallel<'a>(
        &'a self,
        initial: &QState,
        target: &'a QState,
        limit: usize,
        best: &mut Best<'a>,
    ) -> (Option<Found<'a>>, SearchStats) {
        let branches: Vec<(Option<Found<'a>>, SearchStats, Option<Best<'a>>)> = self
            .model
            .moves(1)
            .par_iter()
            .map(|op| {
                let mut dfs = Dfs::new(&self.model, &self.options, target, limit);
                let found = dfs.visit(initial, op);
                (found, dfs.stats, dfs.best)
            })
            .collect();

        let mut stats = SearchStats::default();
        let mut found = None;
        for (branch_found, branch_stats, branch_best) in branches {
            stats.absorb(branch_stats);
            best.merge(branch_best);
            if found.is_none() {
                found = branch_found;
            }
        }
        (found, stats)
    }

    fn finish(&self, success: bool, best: Best<'_>, stats: SearchStats) -> SolveOutcome {
        let sequence: Vec<GateOp> = best.path.into_iter().cloned().collect();
        info!(
            success,
            layers = sequence.len(),
            distance = best.distance,
            expanded = stats.nodes_expanded,
            "search finished"
        );
        SolveOutcome {
            success,
            sequence,
            final_state: best.state,
            distance: best.distance,
            stats,
        }
    }
}

// ---- Depth-first exploration ----

struct Found<'a> {
    path: Vec<&'a GateOp>,
    state: QState,
    distance: f64,
}

/// Closest state seen so far; earlier wins on ties.
struct Best<'a> {
    distance: f64,
    path: Vec<&'a GateOp>,
    state: QState,
}

impl<'a> Best<'a> {
    fn merge(&mut self, other: Option<Best<'a>>) {
        if let Some(other) = other {
            if other.distance < self.distance {
                *self = other;
            }
        }
    }
}

type StateKey = (usize, Vec<i64>);

fn state_key(depth: usize, state: &QState) -> StateKey {
    let scale = 10f64.powi(QUANTISATION_DECIMALS);
    let parts = state
        .v
        .iter()
        .flat_map(|a| [(a.re * scale).round() as i64, (a.im * scale).round() as i64])
        .collect();
    (depth, parts)
}

/// One depth-limited traversal. Each child gets its own state vector, so
/// sibling branches never share mutable data.
struct Dfs<'a> {
    model: &'a ConstraintModel,
    options: &'a SolverOptions,
    target: &'a QState,
    limit: usize,
    path: Vec<&'a GateOp>,
    visited: HashSet<StateKey>,
    stats: SearchStats,
    best: Option<Best<'a>>,
}

impl<'a> Dfs<'a> {
    fn new(
        model: &'a ConstraintModel,
        options: &'a SolverOptions,
        target: &'a QState,
        limit: usize,
    ) -> Self {
        Dfs {
            model,
            options,
            target,
            limit,
            path: Vec::with_capacity(limit),
            visited: HashSet::new(),
            stats: SearchStats::default(),
            best: None,
        }
    }

    fn explore(&mut self, state: &QState) -> Option<Found<'a>> {
        let step = self.path.len() + 1;
        let model = self.model;
        for op in model.moves(step) {
            if let Some(found) = self.visit(state, op) {
                return Some(found);
            }
        }
        None
    }

    /// Apply `op` to `parent`, test the result, then descend.
    fn visit(&mut self, parent: &QState, op: &'a GateOp) -> Option<Found<'a>> {
        let next = parent.apply_unchecked(op);
        self.stats.nodes_expanded += 1;
        self.path.push(op);
        let step = self.path.len();
        let distance = self.options.metric.measure(&next, self.target);

        if self.best.as_ref().is_none_or(|best| distance < best.distance) {
            self.best = Some(Best {
                distance,
                path: self.path.clone(),
                state: next.clone(),
            });
        }

        if distance <= self.options.tolerance && step >= self.model.required_length() {
            return Some(Found {
                path: self.path.clone(),
                state: next,
                distance,
            });
        }

        if step < self.limit {
            if self.options.prune_duplicates && !self.visited.insert(state_key(step, &next)) {
                self.stats.nodes_pruned += 1;
            } else if let Some(found) = self.explore(&next) {
                return Some(found);
            }
        }

        self.path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{FixedGate, LayerConstraint};
    use crate::gates::Gate;
    use crate::state::ket;
    use num_complex::Complex64;

    fn solver(n: usize, layers: usize, gates: &[Gate], fixed: &[FixedGate]) -> Solver {
        let model = ConstraintModel::new(n, layers, gates, fixed, &[]).unwrap();
        Solver::new(model, SolverOptions::default())
    }

    fn names(outcome: &SolveOutcome) -> Vec<String> {
        outcome.sequence.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_single_qubit_x_gate() {
        let outcome = solver(1, 1, &[Gate::X], &[])
            .solve(&ket("0").unwrap(), &ket("1").unwrap())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(names(&outcome), vec!["X q0"]);
        assert!(outcome.distance < 1e-12);
        assert!(outcome.final_state.isclose(&ket("1").unwrap()));
    }

    #[test]
    fn test_bell_state() {
        let target = QState::new(vec![
            Complex64::new(0.7071, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.7071, 0.0),
        ])
        .map(|mut t| {
            t.normalize("target").unwrap();
            t
        })
        .unwrap();
        let outcome = solver(2, 2, &[Gate::H, Gate::Cnot], &[])
            .solve(&ket("00").unwrap(), &target)
            .unwrap();
        assert!(outcome.success);
        assert_eq!(names(&outcome), vec!["H q0", "CNOT q0->q1"]);
        assert!(outcome.distance < 1e-6);
    }

    #[test]
    fn test_failure_when_layers_too_small() {
        let bell = ket("00").unwrap();
        let bell = bell.apply(&GateOp::single(Gate::H, 0)).unwrap();
        let bell = bell.apply(&GateOp::cnot(0, 1)).unwrap();
        let outcome = solver(2, 1, &[Gate::H, Gate::Cnot], &[])
            .solve(&ket("00").unwrap(), &bell)
            .unwrap();
        assert!(!outcome.success);
        // No single layer gets closer than |00> itself.
        assert!(outcome.sequence.is_empty());
        assert!((outcome.distance - (2.0 - 2f64.sqrt()).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_minimal_length_preferred() {
        // |0> -> |1>: X is one layer even though H Z H also works.
        let outcome = solver(1, 3, &[Gate::H, Gate::Z, Gate::X], &[])
            .solve(&ket("0").unwrap(), &ket("1").unwrap())
            .unwrap();
        assert_eq!(names(&outcome), vec!["X q0"]);
    }

    #[test]
    fn test_tie_break_uses_catalog_order() {
        // Up to phase both Y|0> = i|1> and X|0> reach |1>; X precedes Y in the catalog.
        let model = ConstraintModel::new(1, 1, &[Gate::Y, Gate::X], &[], &[]).unwrap();
        let options = SolverOptions { metric: Metric::GlobalPhase, ..SolverOptions::default() };
        let outcome = Solver::new(model, options)
            .solve(&ket("0").unwrap(), &ket("1").unwrap())
            .unwrap();
        assert_eq!(names(&outcome), vec!["X q0"]);
    }

    #[test]
    fn test_tie_break_uses_ascending_targets() {
        let outcome = solver(2, 2, &[Gate::X], &[])
            .solve(&ket("00").unwrap(), &ket("11").unwrap())
            .unwrap();
        assert_eq!(names(&outcome), vec!["X q0", "X q1"]);
    }

    #[test]
    fn test_zero_layers_checks_initial_only() {
        let s = solver(1, 0, &Gate::ALL, &[]);
        let same = s.solve(&ket("0").unwrap(), &ket("0").unwrap()).unwrap();
        assert!(same.success);
        assert!(same.sequence.is_empty());
        let other = s.solve(&ket("0").unwrap(), &ket("1").unwrap()).unwrap();
        assert!(!other.success);
        assert_eq!(other.stats.nodes_expanded, 0);
    }

    #[test]
    fn test_fixed_gate_requires_compensation() {
        let fixed = [FixedGate::new(2, GateOp::single(Gate::X, 0))];
        let outcome = solver(1, 2, &[Gate::X], &fixed)
            .solve(&ket("0").unwrap(), &ket("0").unwrap())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(names(&outcome), vec!["X q0", "X q0"]);
        assert!(outcome.distance < 1e-12);
    }

    #[test]
    fn test_fixed_gate_adherence() {
        let fixed = [FixedGate::new(1, GateOp::single(Gate::H, 1))];
        let outcome = solver(2, 3, &[Gate::X, Gate::H], &fixed)
            .solve(&ket("00").unwrap(), &ket("+1").unwrap())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.sequence[0], GateOp::single(Gate::H, 1));
        assert_eq!(names(&outcome), vec!["H q1", "X q0"]);
    }

    #[test]
    fn test_unreachable_target_exhausts() {
        // Norm 2 target cannot be the image of a unit vector.
        let target = QState::new(vec![Complex64::new(2.0, 0.0), Complex64::new(0.0, 0.0)]).unwrap();
        let outcome = solver(1, 5, &Gate::ALL, &[])
            .solve(&ket("0").unwrap(), &target)
            .unwrap();
        assert!(!outcome.success);
        assert!((outcome.distance - 1.0).abs() < 1e-9);
        assert_eq!(outcome.stats.iterations, 6);
    }

    #[test]
    fn test_layer_constraint_dead_end() {
        let rules = [LayerConstraint { step: 1, allowed_gates: vec![Gate::T] }];
        let model = ConstraintModel::new(1, 2, &[Gate::X], &[], &rules).unwrap();
        let outcome = Solver::new(model, SolverOptions::default())
            .solve(&ket("0").unwrap(), &ket("1").unwrap())
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.stats.nodes_expanded, 0);
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        let err = solver(2, 1, &Gate::ALL, &[])
            .solve(&ket("0").unwrap(), &ket("00").unwrap())
            .unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { expected: 4, actual: 2 }));
    }

    #[test]
    fn test_rejects_zero_norm() {
        let zero = QState::new(vec![Complex64::new(0.0, 0.0); 2]).unwrap();
        let err = solver(1, 1, &Gate::ALL, &[])
            .solve(&zero, &ket("1").unwrap())
            .unwrap_err();
        assert!(matches!(err, SolverError::ZeroNorm { .. }));
    }

    #[test]
    fn test_global_phase_metric_accepts_phase() {
        // Y|0> = i|1> matches |1> up to a global phase.
        let model = ConstraintModel::new(1, 1, &[Gate::Y], &[], &[]).unwrap();
        let options = SolverOptions { metric: Metric::GlobalPhase, ..SolverOptions::default() };
        let outcome = Solver::new(model.clone(), options)
            .solve(&ket("0").unwrap(), &ket("1").unwrap())
            .unwrap();
        assert!(outcome.success);

        let strict = Solver::new(model, SolverOptions::default())
            .solve(&ket("0").unwrap(), &ket("1").unwrap())
            .unwrap();
        assert!(!strict.success);
    }

    #[test]
    fn test_parallel_and_pruning_agree_with_plain_search() {
        let start = ket("000").unwrap();
        let target = start
            .apply(&GateOp::single(Gate::H, 2))
            .and_then(|s| s.apply(&GateOp::cnot(2, 0)))
            .and_then(|s| s.apply(&GateOp::single(Gate::S, 0)))
            .unwrap();
        let model = ConstraintModel::new(3, 3, &Gate::ALL, &[], &[]).unwrap();

        let plain = SolverOptions { prune_duplicates: false, ..SolverOptions::default() };
        let parallel = SolverOptions { parallel: true, ..SolverOptions::default() };
        let reference = Solver::new(model.clone(), plain).solve(&start, &target).unwrap();
        let pruned = Solver::new(model.clone(), SolverOptions::default())
            .solve(&start, &target)
            .unwrap();
        let par = Solver::new(model, parallel).solve(&start, &target).unwrap();

        assert!(reference.success);
        assert_eq!(reference.layers_used(), 3);
        assert_eq!(pruned.sequence, reference.sequence);
        assert_eq!(par.sequence, reference.sequence);
        assert!(pruned.stats.nodes_pruned > 0);
        assert!(pruned.stats.nodes_expanded < reference.stats.nodes_expanded);
    }

    #[test]
    fn test_deterministic() {
        let start = ket("00").unwrap();
        let target = ket("1+").unwrap();
        let s = solver(2, 3, &Gate::ALL, &[]);
        let first = s.solve(&start, &target).unwrap();
        let second = s.solve(&start, &target).unwrap();
        assert_eq!(first.sequence, second.sequence);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_timeline_replay() {
        let s = solver(2, 2, &[Gate::H, Gate::Cnot], &[]);
        let start = ket("00").unwrap();
        let bell = start
            .apply(&GateOp::single(Gate::H, 0))
            .and_then(|s| s.apply(&GateOp::cnot(0, 1)))
            .unwrap();
        let outcome = s.solve(&start, &bell).unwrap();
        let states = outcome.timeline(&start).unwrap();
        assert_eq!(states.len(), outcome.layers_used());
        assert!(states[0].isclose(&ket("0+").unwrap()));
        assert_eq!(states.last().unwrap(), &outcome.final_state);
    }
}
