// Error types for configuration and gate application.
//
// Search exhaustion is not an error: it is reported through
// `SolveOutcome::success`.

use thiserror::Error;

/// Result type for solver operations
pub type Result<T> = std::result::Result<T, SolverError>;

/// Errors raised before or during a search
#[derive(Error, Debug)]
pub enum SolverError {
    /// The qubit count is zero or too large to simulate
    #[error("Qubit count {0} is outside the supported range 1..={max}", max = crate::state::MAX_QUBITS)]
    InvalidQubitCount(usize),

    /// The tolerance is negative or not a number
    #[error("Tolerance must be a non-negative finite number, got {0}")]
    InvalidTolerance(f64),

    /// A state vector was empty
    #[error("{label} state must contain at least one amplitude")]
    EmptyState {
        /// Which state was being parsed
        label: String,
    },

    /// A state vector length is not 2^n
    #[error("{label} state length {len} is not a power of two")]
    NotPowerOfTwo {
        /// Which state was being parsed
        label: String,
        /// Offending length
        len: usize,
    },

    /// A state vector length does not match the configured qubit count
    #[error("Dimension mismatch: expected {expected} amplitudes, got {actual}")]
    DimensionMismatch {
        /// Expected dimension (2^n)
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A state vector has zero norm
    #[error("{label} state has zero norm")]
    ZeroNorm {
        /// Which state was being parsed
        label: String,
    },

    /// An amplitude entry was not a `[real, imag]` pair
    #[error("Amplitude at index {index} of {label} state must have real and imaginary components")]
    MalformedAmplitude {
        /// Which state was being parsed
        label: String,
        /// Position of the entry
        index: usize,
    },

    /// A ket string contained something other than `0`, `1`, `+`, `-`
    #[error("Invalid character '{0}' in ket string. Valid: 0, 1, +, -")]
    InvalidKet(char),

    /// A gate symbol is not in the catalog
    #[error("Gate '{0}' is not supported")]
    UnknownGate(String),

    /// Wrong number of targets for a gate
    #[error("Gate {gate} expects {expected} target(s), got {actual}")]
    ArityMismatch {
        /// Gate symbol
        gate: String,
        /// Required arity
        expected: usize,
        /// Supplied arity
        actual: usize,
    },

    /// A target index is outside `[0, n)`
    #[error("Gate {gate} targets qubit {qubit}, but the register has {num_qubits} qubits")]
    QubitOutOfRange {
        /// Gate symbol
        gate: String,
        /// Offending qubit
        qubit: usize,
        /// Register size
        num_qubits: usize,
    },

    /// The same qubit was listed twice in one gate
    #[error("Target qubits must be unique for gate {0}")]
    RepeatedTarget(String),

    /// A step index is zero or beyond the layer budget
    #[error("{kind} step {step} is outside the layer range 1..={max_layers}")]
    StepOutOfRange {
        /// "Fixed gate" or "Layer constraint"
        kind: &'static str,
        /// 1-based step
        step: usize,
        /// Configured layer budget
        max_layers: usize,
    },

    /// Two rules of the same kind name the same step
    #[error("Multiple {kind} rules defined for step {step}")]
    DuplicateStep {
        /// "fixed gate" or "layer constraint"
        kind: &'static str,
        /// 1-based step
        step: usize,
    },

    /// A fixed gate is not among the gates its step's layer constraint allows
    #[error("Layer {step} has a fixed gate '{gate}' that is not allowed by the layer gate constraint")]
    FixedGateConflict {
        /// 1-based step
        step: usize,
        /// Gate symbol of the fixed placement
        gate: String,
    },

    /// A layer constraint lists no gates
    #[error("Layer constraint at step {0} must list at least one gate")]
    EmptyLayerConstraint(usize),

    /// Filesystem failure while reading config or writing results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SolverError {
    /// True for errors caused by the supplied configuration rather than the environment.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, SolverError::Io(_))
    }
}
