// ============================================================
// Layer 3 — PrunePlan
// ============================================================
// A prune plan holds one (mode, keep rate) pair per flat slot.
// It arrives from the search controller as a flat string-keyed
// object:
//
//   { "pt0": "multihead", "pr0": 0.7, "pt1": "channel", ... }
//
//   pt{i} → prune mode of slot i   (default: vanilla)
//   pr{i} → keep rate of slot i    (default: 0.5)
//
// All defaulting happens in `from_params`; every other component
// sees a complete, validated plan. Rates are rebalanced once
// before training and the plan is never modified afterwards.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::PlanError;
use crate::domain::weight_group::{FlatSlot, ModelDims, SlotKind};

/// Mode used when a slot has no `pt{i}` entry
pub const DEFAULT_MODE: PruneMode = PruneMode::Vanilla;

/// Keep rate used when a slot has no `pr{i}` entry
pub const DEFAULT_RATE: f64 = 0.5;

/// How a weight matrix is pruned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneMode {
    /// Unstructured: lowest-magnitude individual entries
    Vanilla,
    /// Structured: whole output rows with lowest L1 norm
    Channel,
    /// Structured: whole attention heads, selection shared across Q/K/V
    MultiHead,
}

impl PruneMode {
    pub fn name(self) -> &'static str {
        match self {
            PruneMode::Vanilla   => "vanilla",
            PruneMode::Channel   => "channel",
            PruneMode::MultiHead => "multihead",
        }
    }
}

impl fmt::Display for PruneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PruneMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vanilla"          => Ok(PruneMode::Vanilla),
            "channel" | "chn"  => Ok(PruneMode::Channel),
            "multihead"        => Ok(PruneMode::MultiHead),
            other              => Err(other.to_string()),
        }
    }
}

/// The (mode, keep rate) pair for one flat slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotPlan {
    pub mode:       PruneMode,
    pub keep_ratio: f64,
}

/// One pruning decision per flat slot, indexed by flat slot index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunePlan {
    types: Vec<PruneMode>,
    rates: Vec<f64>,
}

impl PrunePlan {
    /// Build a plan from explicit type and rate vectors.
    /// Both must have exactly `dims.num_slots()` entries.
    pub fn new(types: Vec<PruneMode>, rates: Vec<f64>, dims: &ModelDims) -> Result<Self, PlanError> {
        let slots = dims.num_slots();
        if types.len() != slots || rates.len() != slots {
            return Err(PlanError::LengthMismatch {
                types: types.len(),
                rates: rates.len(),
                slots,
            });
        }

        let plan = Self { types, rates };
        plan.check_eligibility()?;
        Ok(plan)
    }

    /// Same mode and rate for every slot
    pub fn uniform(mode: PruneMode, rate: f64, dims: &ModelDims) -> Result<Self, PlanError> {
        let slots = dims.num_slots();
        Self::new(vec![mode; slots], vec![rate; slots], dims)
    }

    /// Parse the search controller's `pt{i}` / `pr{i}` object.
    ///
    /// Missing keys fall back to `DEFAULT_MODE` / `DEFAULT_RATE`.
    /// Any other key, or an index beyond the model's slot count,
    /// is rejected.
    pub fn from_params(params: &Map<String, Value>, dims: &ModelDims) -> Result<Self, PlanError> {
        let slots     = dims.num_slots();
        let mut types = vec![DEFAULT_MODE; slots];
        let mut rates = vec![DEFAULT_RATE; slots];

        for (key, value) in params {
            let (field, index) = parse_key(key)?;
            if index >= slots {
                return Err(PlanError::SlotOutOfRange { key: key.clone(), index, slots });
            }

            match field {
                PlanField::Type => {
                    let name = value.as_str().ok_or_else(|| PlanError::InvalidMode {
                        key:   key.clone(),
                        value: value.to_string(),
                    })?;
                    types[index] = name.parse().map_err(|_| PlanError::InvalidMode {
                        key:   key.clone(),
                        value: value.to_string(),
                    })?;
                }
                PlanField::Rate => {
                    rates[index] = value.as_f64().ok_or_else(|| PlanError::InvalidRate {
                        key:   key.clone(),
                        value: value.to_string(),
                    })?;
                }
            }
        }

        Self::new(types, rates, dims)
    }

    /// Replace the rate vector, e.g. with balanced rates
    pub fn with_rates(self, rates: Vec<f64>) -> Result<Self, PlanError> {
        if rates.len() != self.rates.len() {
            return Err(PlanError::LengthMismatch {
                types: self.types.len(),
                rates: rates.len(),
                slots: self.types.len(),
            });
        }
        Ok(Self { types: self.types, rates })
    }

    /// Reject any keep rate outside (0, 1].
    ///
    /// The balancer does not clamp, so skewed controller rates can
    /// push a slot past 1.0; this check surfaces that before the
    /// first training step instead of deep inside the loop.
    pub fn validate_rates(&self) -> Result<(), PlanError> {
        for (slot, &rate) in self.rates.iter().enumerate() {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(PlanError::RateOutOfRange { slot, rate });
            }
        }
        Ok(())
    }

    pub fn types(&self) -> &[PruneMode] {
        &self.types
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn num_layers(&self) -> usize {
        self.types.len() / crate::domain::weight_group::SLOTS_PER_LAYER
    }

    pub fn slot(&self, slot: FlatSlot) -> SlotPlan {
        let i = slot.flat_index();
        SlotPlan { mode: self.types[i], keep_ratio: self.rates[i] }
    }

    fn check_eligibility(&self) -> Result<(), PlanError> {
        for (slot, mode) in self.types.iter().enumerate() {
            if *mode == PruneMode::MultiHead && SlotKind::from_index(slot) != SlotKind::AttentionQkv {
                return Err(PlanError::MultiHeadNotEligible { slot });
            }
        }
        Ok(())
    }
}

enum PlanField {
    Type,
    Rate,
}

fn parse_key(key: &str) -> Result<(PlanField, usize), PlanError> {
    let (field, digits) = if let Some(rest) = key.strip_prefix("pt") {
        (PlanField::Type, rest)
    } else if let Some(rest) = key.strip_prefix("pr") {
        (PlanField::Rate, rest)
    } else {
        return Err(PlanError::UnknownKey(key.to_string()));
    };

    let index = digits
        .parse::<usize>()
        .map_err(|_| PlanError::UnknownKey(key.to_string()))?;
    Ok((field, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let dims = ModelDims::bert_base();
        let plan = PrunePlan::from_params(&Map::new(), &dims).unwrap();
        assert_eq!(plan.len(), 48);
        assert!(plan.types().iter().all(|&t| t == PruneMode::Vanilla));
        assert!(plan.rates().iter().all(|&r| r == 0.5));
    }

    #[test]
    fn test_explicit_keys_override_defaults() {
        let dims = ModelDims::bert_base();
        let plan = PrunePlan::from_params(
            &params(json!({ "pt0": "multihead", "pr0": 0.7, "pt5": "chn", "pr47": 0.9 })),
            &dims,
        ).unwrap();

        assert_eq!(plan.types()[0], PruneMode::MultiHead);
        assert_eq!(plan.rates()[0], 0.7);
        assert_eq!(plan.types()[5], PruneMode::Channel);
        assert_eq!(plan.rates()[47], 0.9);
        assert_eq!(plan.slot(FlatSlot::from_flat(47)).keep_ratio, 0.9);
    }

    #[test]
    fn test_unknown_and_out_of_range_keys_rejected() {
        let dims = ModelDims::bert_base();
        let err = PrunePlan::from_params(&params(json!({ "lr": 0.1 })), &dims).unwrap_err();
        assert_eq!(err, PlanError::UnknownKey("lr".into()));

        let err = PrunePlan::from_params(&params(json!({ "ptx": "vanilla" })), &dims).unwrap_err();
        assert_eq!(err, PlanError::UnknownKey("ptx".into()));

        let err = PrunePlan::from_params(&params(json!({ "pr48": 0.5 })), &dims).unwrap_err();
        assert!(matches!(err, PlanError::SlotOutOfRange { index: 48, slots: 48, .. }));
    }

    #[test]
    fn test_bad_values_rejected() {
        let dims = ModelDims::bert_base();
        let err = PrunePlan::from_params(&params(json!({ "pt1": "svd" })), &dims).unwrap_err();
        assert!(matches!(err, PlanError::InvalidMode { .. }));

        let err = PrunePlan::from_params(&params(json!({ "pr1": "half" })), &dims).unwrap_err();
        assert!(matches!(err, PlanError::InvalidRate { .. }));
    }

    #[test]
    fn test_multihead_only_on_qkv_slots() {
        let dims = ModelDims::bert_base();
        assert!(PrunePlan::from_params(&params(json!({ "pt4": "multihead" })), &dims).is_ok());

        let err = PrunePlan::from_params(&params(json!({ "pt6": "multihead" })), &dims).unwrap_err();
        assert_eq!(err, PlanError::MultiHeadNotEligible { slot: 6 });
    }

    #[test]
    fn test_validate_rates_flags_out_of_range() {
        let dims = ModelDims { num_layers: 1, ..ModelDims::bert_base() };
        let plan = PrunePlan::uniform(PruneMode::Vanilla, 0.5, &dims).unwrap();
        assert!(plan.validate_rates().is_ok());

        let plan = plan.with_rates(vec![0.5, 1.2, 0.5, 0.5]).unwrap();
        assert_eq!(plan.validate_rates(), Err(PlanError::RateOutOfRange { slot: 1, rate: 1.2 }));

        let plan = plan.with_rates(vec![0.0, 0.5, 0.5, 0.5]).unwrap();
        assert!(plan.validate_rates().is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let dims = ModelDims { num_layers: 2, ..ModelDims::bert_base() };
        let err = PrunePlan::new(vec![PruneMode::Vanilla; 8], vec![0.5; 7], &dims).unwrap_err();
        assert_eq!(err, PlanError::LengthMismatch { types: 8, rates: 7, slots: 8 });
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Channel".parse::<PruneMode>(), Ok(PruneMode::Channel));
        assert_eq!("MULTIHEAD".parse::<PruneMode>(), Ok(PruneMode::MultiHead));
        assert!("svd".parse::<PruneMode>().is_err());
    }
}
