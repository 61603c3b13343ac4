// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from GLUE TSV files to tensor batches:
//
//   train.tsv / dev.tsv
//       │
//       ▼
//   GlueProcessor     → per-task columns → InputExample
//       │
//       ▼
//   FeatureEncoder    → WordPiece ids, pair truncation, padding
//       │
//       ▼
//   GlueDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   GlueBatcher       → stacks features into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the per-task TSV layouts
pub mod processor;

/// Tokenizes and pads examples, maps labels
pub mod features;

/// Implements Burn's Dataset trait for encoded examples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
