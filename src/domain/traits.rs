// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams of the system:
//
//   WeightStore      — who owns the weights the pruner rewrites
//   SearchController — who proposes prune plans and receives scores
//
// The training loop only sees these traits, so the pruning
// traversal can be exercised against an in-memory store and the
// orchestrator against a recording controller.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use ndarray::Array2;
use serde_json::{Map, Value};

use crate::domain::weight_group::WeightGroup;

// ─── WeightStore ──────────────────────────────────────────────────────────────
/// Exclusive read/overwrite access to the prunable matrices of a model.
///
/// Matrices cross this boundary by value in output-major layout
/// (`[out, in]`), whatever the store's internal layout is.
///
/// Implementations:
///   - BertForSequenceClassification → burn parameters
///   - (tests) an in-memory map
pub trait WeightStore {
    /// Number of encoder layers in the store
    fn num_layers(&self) -> usize;

    /// Copy out the current value of one weight matrix
    fn read(&self, group: WeightGroup) -> Result<Array2<f32>>;

    /// Overwrite one weight matrix. The shape must not change.
    fn write(&mut self, group: WeightGroup, weight: Array2<f32>) -> Result<()>;
}

// ─── SearchController ─────────────────────────────────────────────────────────
/// The external hyperparameter search process.
///
/// Reporting is fire-and-forget: implementations log delivery
/// failures themselves and never block or fail the run.
///
/// Implementations:
///   - FileSearchController → JSON parameter file + JSONL report file
///   - StandaloneController → defaults only, reports go to the log
pub trait SearchController {
    /// The `pt{i}` / `pr{i}` parameter object for this trial
    fn next_parameters(&mut self) -> Result<Map<String, Value>>;

    /// Score of one finished epoch
    fn report_intermediate(&mut self, score: f64);

    /// Best score of the whole run
    fn report_final(&mut self, score: f64);
}
