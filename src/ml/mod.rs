// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn training code lives here. Other layers see the
// model only through `WeightStore` and the trainer's outcome.
//
//   model.rs    — BERT encoder with a sequence classification
//                 head; Q, K and V kept as separate linears so
//                 each can be pruned on its own
//
//   weights.rs  — WeightStore for the burn model: copies the
//                 six prunable matrices of a layer in and out
//                 as host ndarrays
//
//   schedule.rs — linear warmup then linear decay of the
//                 learning rate
//
//   trainer.rs  — the pruning-aware training loop with
//                 per-epoch evaluation and reporting
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Devlin et al. (2019) BERT

/// BERT encoder + classification head
pub mod model;

/// Host access to the prunable weight matrices
pub mod weights;

/// Learning rate schedule
pub mod schedule;

/// Training loop with pruning after every step
pub mod trainer;
