// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that describe WHAT is being pruned and trained:
//
//   weight_group — layers, slots and the six prunable matrices
//   prune_plan   — per-slot prune mode and keep rate
//   task         — GLUE task registry and output modes
//   error        — the error taxonomy
//   traits       — WeightStore and SearchController seams
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod error;
pub mod prune_plan;
pub mod task;
pub mod traits;
pub mod weight_group;
