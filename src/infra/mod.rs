// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the outside world:
//
//   checkpoint.rs        — pretrained snapshot loading, best-model
//                          and train_config.json saving
//   tokenizer_store.rs   — loads the snapshot's tokenizer.json
//   metrics.rs           — per-epoch CSV log
//   search_controller.rs — parameter source and score sink of the
//                          hyperparameter search
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Pretrained snapshot and run checkpoints
pub mod checkpoint;

/// Tokenizer loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// File-based and standalone search controllers
pub mod search_controller;
