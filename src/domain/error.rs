// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Three families of failure, all fatal to a run:
//
//   ConfigError — bad task / output mode / run settings, raised at startup
//   PlanError   — a prune plan that cannot be applied to this model
//   PruneError  — a weight matrix that does not fit the requested pruning
//
// Degenerate correlations (NaN Matthews coefficient) are not errors;
// the orchestrator substitutes 0 and logs a warning.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)

use thiserror::Error;

use crate::domain::prune_plan::PruneMode;

/// Startup configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Unknown output mode: {0} (expected 'classification' or 'regression')")]
    InvalidOutputMode(String),

    #[error("Invalid gradient_accumulation_steps: {0}, should be >= 1")]
    InvalidGradientAccumulation(usize),

    #[error("Invalid batch size {batch_size}: each step needs at least one example with gradient_accumulation_steps = {grad_accum}")]
    InvalidBatchSize { batch_size: usize, grad_accum: usize },

    #[error("Invalid number of epochs: {0}")]
    InvalidEpochs(usize),

    #[error("Unknown device: {0} (expected 'wgpu' or 'ndarray')")]
    UnknownDevice(String),
}

/// Errors raised while building or validating a `PrunePlan`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Unknown plan parameter '{0}'")]
    UnknownKey(String),

    #[error("Plan parameter '{key}' addresses slot {index}, but the model has {slots} slots")]
    SlotOutOfRange { key: String, index: usize, slots: usize },

    #[error("Plan parameter '{key}' has unknown prune mode {value}")]
    InvalidMode { key: String, value: String },

    #[error("Plan parameter '{key}' must be a number, got {value}")]
    InvalidRate { key: String, value: String },

    #[error("Plan has {types} types and {rates} rates, expected {slots} of each")]
    LengthMismatch { types: usize, rates: usize, slots: usize },

    #[error("Slot {slot} is not an attention QKV slot and cannot use multi-head pruning")]
    MultiHeadNotEligible { slot: usize },

    #[error("Slot {slot} has keep rate {rate}, outside (0, 1]")]
    RateOutOfRange { slot: usize, rate: f64 },
}

/// Errors raised by the weight pruning engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PruneError {
    #[error("{mode} pruning expects {expected} elements, got a {rows}x{cols} matrix")]
    ShapeMismatch {
        mode:     PruneMode,
        expected: usize,
        rows:     usize,
        cols:     usize,
    },

    #[error("Keep ratio {0} is outside (0, 1]")]
    InvalidRatio(f64),

    #[error("Shared selection of kind '{selection}' cannot drive {mode} pruning")]
    SelectionMismatch {
        mode:      PruneMode,
        selection: &'static str,
    },
}
