use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// Target of one example: a class id or a regression score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GlueLabel {
    Class(usize),
    Score(f32),
}

/// One fully encoded and padded example.
/// Sequence format: [CLS] a [SEP] (b [SEP]) [PAD]...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlueFeatures {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub token_type_ids: Vec<u32>,
    pub label:          GlueLabel,
}

impl GlueFeatures {
    /// Tokens that are not padding
    pub fn real_length(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

pub struct GlueDataset {
    features: Vec<GlueFeatures>,
}

impl GlueDataset {
    pub fn new(features: Vec<GlueFeatures>) -> Self { Self { features } }

    pub fn example_count(&self) -> usize { self.features.len() }
}

impl Dataset<GlueFeatures> for GlueDataset {
    fn get(&self, index: usize) -> Option<GlueFeatures> {
        self.features.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.features.len()
    }
}
