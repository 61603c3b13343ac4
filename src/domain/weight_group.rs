// ============================================================
// Layer 3 — Weight Groups and Flat Slots
// ============================================================
// Every encoder layer owns six prunable matrices:
//
//   attention:     query, key, value, attention-output
//   feed-forward:  intermediate, output
//
// The prune plan does not address matrices directly. It addresses
// FLAT SLOTS, four per layer:
//
//   flat index = 4 * layer_index + slot
//
//   slot 0 → query + key + value   (one shared decision)
//   slot 1 → attention output
//   slot 2 → intermediate
//   slot 3 → output
//
// Reference: Devlin et al. (2019) BERT

use serde::{Deserialize, Serialize};

/// Number of flat slots per encoder layer
pub const SLOTS_PER_LAYER: usize = 4;

/// One of the six prunable matrices in an encoder layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    Query,
    Key,
    Value,
    AttnOutput,
    Intermediate,
    Output,
}

impl GroupKind {
    /// Only the three attention projections can be pruned head-wise
    pub fn is_multihead_eligible(self) -> bool {
        matches!(self, GroupKind::Query | GroupKind::Key | GroupKind::Value)
    }

    pub fn name(self) -> &'static str {
        match self {
            GroupKind::Query        => "query",
            GroupKind::Key          => "key",
            GroupKind::Value        => "value",
            GroupKind::AttnOutput   => "attention_output",
            GroupKind::Intermediate => "intermediate",
            GroupKind::Output       => "output",
        }
    }
}

/// The sub-component a flat slot refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    AttentionQkv,
    AttentionOutput,
    Intermediate,
    Output,
}

impl SlotKind {
    pub const ALL: [SlotKind; SLOTS_PER_LAYER] = [
        SlotKind::AttentionQkv,
        SlotKind::AttentionOutput,
        SlotKind::Intermediate,
        SlotKind::Output,
    ];

    pub fn index(self) -> usize {
        match self {
            SlotKind::AttentionQkv    => 0,
            SlotKind::AttentionOutput => 1,
            SlotKind::Intermediate    => 2,
            SlotKind::Output          => 3,
        }
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % SLOTS_PER_LAYER]
    }

    /// Matrices covered by this slot, in default traversal order
    pub fn groups(self) -> &'static [GroupKind] {
        match self {
            SlotKind::AttentionQkv    => &[GroupKind::Query, GroupKind::Key, GroupKind::Value],
            SlotKind::AttentionOutput => &[GroupKind::AttnOutput],
            SlotKind::Intermediate    => &[GroupKind::Intermediate],
            SlotKind::Output          => &[GroupKind::Output],
        }
    }

    /// Nominal parameter count of the slot, used to weight keep rates
    pub fn param_count(self, dims: &ModelDims) -> usize {
        let h = dims.hidden_size;
        match self {
            SlotKind::AttentionQkv    => 3 * h * h,
            SlotKind::AttentionOutput => h * h,
            SlotKind::Intermediate    => h * dims.intermediate_size,
            SlotKind::Output          => dims.intermediate_size * h,
        }
    }
}

/// A flat pruning slot: layer index plus sub-component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlatSlot {
    pub layer_index: usize,
    pub kind:        SlotKind,
}

impl FlatSlot {
    pub fn new(layer_index: usize, kind: SlotKind) -> Self {
        Self { layer_index, kind }
    }

    pub fn from_flat(index: usize) -> Self {
        Self {
            layer_index: index / SLOTS_PER_LAYER,
            kind:        SlotKind::from_index(index),
        }
    }

    pub fn flat_index(self) -> usize {
        SLOTS_PER_LAYER * self.layer_index + self.kind.index()
    }
}

/// Addresses one matrix-shaped parameter of one encoder layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightGroup {
    pub layer_index: usize,
    pub kind:        GroupKind,
}

impl WeightGroup {
    pub fn new(layer_index: usize, kind: GroupKind) -> Self {
        Self { layer_index, kind }
    }

    /// Shape of the matrix in output-major layout: [out, in]
    pub fn shape(self, dims: &ModelDims) -> (usize, usize) {
        let h = dims.hidden_size;
        match self.kind {
            GroupKind::Query | GroupKind::Key | GroupKind::Value | GroupKind::AttnOutput => (h, h),
            GroupKind::Intermediate => (dims.intermediate_size, h),
            GroupKind::Output       => (h, dims.intermediate_size),
        }
    }
}

impl std::fmt::Display for WeightGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer.{}.{}", self.layer_index, self.kind.name())
    }
}

/// Architectural dimensions that parameterise slots and head layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDims {
    pub num_layers:        usize,
    pub hidden_size:       usize,
    pub intermediate_size: usize,
    pub num_heads:         usize,
}

impl ModelDims {
    /// BERT-base: 12 layers, 768 hidden, 3072 intermediate, 12 heads
    pub fn bert_base() -> Self {
        Self {
            num_layers:        12,
            hidden_size:       768,
            intermediate_size: 3072,
            num_heads:         12,
        }
    }

    pub fn num_slots(&self) -> usize {
        SLOTS_PER_LAYER * self.num_layers
    }

    pub fn head_size(&self) -> usize {
        self.hidden_size / self.num_heads
    }
}
