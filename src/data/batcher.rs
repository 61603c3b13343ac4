// ============================================================
// Layer 4 — GLUE Batcher
// ============================================================
// Implements Burn's Batcher trait to stack encoded examples into
// tensors for the model forward pass.
//
//   Input:  Vec of N GlueFeatures, each padded to length S
//   Output: GlueBatch with [N, S] id / mask / segment tensors
//           and an [N] label tensor
//
// The label tensor's kind follows the output mode: class ids for
// cross-entropy, float scores for mean squared error.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::{GlueFeatures, GlueLabel};
use crate::domain::task::OutputMode;

/// Targets of a batch
#[derive(Debug, Clone)]
pub enum Labels<B: Backend> {
    /// shape: [batch_size]
    Class(Tensor<B, 1, Int>),
    /// shape: [batch_size]
    Score(Tensor<B, 1>),
}

// ─── GlueBatch ────────────────────────────────────────────────────────────────
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct GlueBatch<B: Backend> {
    /// shape: [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,

    /// 0 = first sentence, 1 = second sentence
    pub token_type_ids: Tensor<B, 2, Int>,

    pub labels: Labels<B>,
}

// ─── GlueBatcher ──────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct GlueBatcher<B: Backend> {
    pub device:      B::Device,
    pub output_mode: OutputMode,
}

impl<B: Backend> GlueBatcher<B> {
    pub fn new(device: B::Device, output_mode: OutputMode) -> Self {
        Self { device, output_mode }
    }

    fn stack(&self, rows: Vec<&[u32]>, seq_len: usize) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let flat: Vec<i32> = rows
            .into_iter()
            .flat_map(|row| row.iter().map(|&x| x as i32))
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<GlueFeatures, GlueBatch<B>> for GlueBatcher<B> {
    fn batch(&self, items: Vec<GlueFeatures>) -> GlueBatch<B> {
        // every example is pre-padded to the same length
        let seq_len = items.first().map_or(0, |f| f.input_ids.len());

        let input_ids      = self.stack(items.iter().map(|f| f.input_ids.as_slice()).collect(), seq_len);
        let attention_mask = self.stack(items.iter().map(|f| f.attention_mask.as_slice()).collect(), seq_len);
        let token_type_ids = self.stack(items.iter().map(|f| f.token_type_ids.as_slice()).collect(), seq_len);

        let labels = match self.output_mode {
            OutputMode::Classification => {
                let ids: Vec<i32> = items
                    .iter()
                    .map(|f| match f.label {
                        GlueLabel::Class(id)    => id as i32,
                        GlueLabel::Score(score) => score as i32,
                    })
                    .collect();
                Labels::Class(Tensor::from_ints(ids.as_slice(), &self.device))
            }
            OutputMode::Regression => {
                let scores: Vec<f32> = items
                    .iter()
                    .map(|f| match f.label {
                        GlueLabel::Class(id)    => id as f32,
                        GlueLabel::Score(score) => score,
                    })
                    .collect();
                Labels::Score(Tensor::from_floats(scores.as_slice(), &self.device))
            }
        };

        GlueBatch { input_ids, attention_mask, token_type_ids, labels }
    }
}
