// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Coordinates the other layers to accomplish one command
// (a training trial, or a dry run of the prune plan).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No printing here (that's Layer 1)
//   - No direct file parsing (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// One pruning-aware fine-tuning trial
pub mod train_use_case;

// Parameter object → balanced, validated prune plan
pub mod plan_use_case;
