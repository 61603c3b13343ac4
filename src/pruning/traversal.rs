// ============================================================
// Plan Traversal
// ============================================================
// Applies a whole PrunePlan to a WeightStore, slot by slot in flat
// index order:
//
//   layer 0: qkv → attention output → intermediate → output
//   layer 1: qkv → ...
//
// Inside a QKV slot under MultiHead the Value matrix goes first and
// its head selection is reused for Query and Key, so all three lose
// the same heads. Other modes prune Query, Key, Value independently.

use anyhow::{Context, Result};

use crate::domain::prune_plan::{PrunePlan, PruneMode};
use crate::domain::traits::WeightStore;
use crate::domain::weight_group::{FlatSlot, GroupKind, SlotKind, WeightGroup};
use crate::pruning::engine::{Selection, WeightPruner};

const MULTIHEAD_ORDER: [GroupKind; 3] = [GroupKind::Value, GroupKind::Query, GroupKind::Key];

/// What one traversal did, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub matrices:      usize,
    pub zeroed_units:  usize,
}

/// Matrices of `slot` in the order they must be pruned under `mode`
pub fn prune_order(slot: SlotKind, mode: PruneMode) -> &'static [GroupKind] {
    match (slot, mode) {
        (SlotKind::AttentionQkv, PruneMode::MultiHead) => &MULTIHEAD_ORDER,
        _                                              => slot.groups(),
    }
}

/// Prune every slot of `store` according to `plan`
pub fn apply_plan<S: WeightStore>(
    store:  &mut S,
    plan:   &PrunePlan,
    pruner: &WeightPruner,
) -> Result<PruneReport> {
    let layers = store.num_layers();
    anyhow::ensure!(
        plan.num_layers() == layers,
        "Prune plan covers {} layers but the model has {}",
        plan.num_layers(),
        layers,
    );

    let mut report = PruneReport::default();

    for layer_index in 0..layers {
        for kind in SlotKind::ALL {
            let slot = plan.slot(FlatSlot::new(layer_index, kind));
            let mut shared: Option<Selection> = None;

            for &group_kind in prune_order(kind, slot.mode) {
                let group  = WeightGroup::new(layer_index, group_kind);
                let weight = store.read(group)?;

                let (pruned, selection) = pruner
                    .apply(weight, slot.keep_ratio, slot.mode, shared.as_ref())
                    .with_context(|| format!("Cannot prune {group} in {} mode", slot.mode))?;

                store.write(group, pruned)?;
                report.matrices     += 1;
                report.zeroed_units += selection.len();

                if slot.mode == PruneMode::MultiHead && shared.is_none() {
                    shared = Some(selection);
                }
            }
        }
    }

    Ok(report)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use ndarray::Array2;

    use crate::domain::weight_group::ModelDims;
    use crate::pruning::engine::HeadLayout;

    /// In-memory store that also records the order of writes
    struct MemoryStore {
        dims:    ModelDims,
        weights: HashMap<WeightGroup, Array2<f32>>,
        writes:  Vec<WeightGroup>,
    }

    impl MemoryStore {
        fn new(dims: ModelDims) -> Self {
            let mut weights = HashMap::new();
            for layer in 0..dims.num_layers {
                for kind in SlotKind::ALL {
                    for &g in kind.groups() {
                        let group = WeightGroup::new(layer, g);
                        let (rows, cols) = group.shape(&dims);
                        let seed = (layer * 7 + g as usize) as f32;
                        let m = Array2::from_shape_fn((rows, cols), |(r, c)| {
                            1.0 + ((r * 31 + c * 17) as f32 + seed).sin().abs()
                        });
                        weights.insert(group, m);
                    }
                }
            }
            Self { dims, weights, writes: Vec::new() }
        }
    }

    impl WeightStore for MemoryStore {
        fn num_layers(&self) -> usize {
            self.dims.num_layers
        }

        fn read(&self, group: WeightGroup) -> Result<Array2<f32>> {
            self.weights
                .get(&group)
                .cloned()
                .with_context(|| format!("missing {group}"))
        }

        fn write(&mut self, group: WeightGroup, weight: Array2<f32>) -> Result<()> {
            self.writes.push(group);
            self.weights.insert(group, weight);
            Ok(())
        }
    }

    fn tiny_dims() -> ModelDims {
        ModelDims { num_layers: 2, hidden_size: 8, intermediate_size: 16, num_heads: 4 }
    }

    fn zero_rows(m: &Array2<f32>) -> Vec<usize> {
        m.rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|&w| w == 0.0))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_traversal_visits_slots_in_flat_order() {
        let dims  = tiny_dims();
        let mut store = MemoryStore::new(dims);
        let mut types = vec![PruneMode::Vanilla; dims.num_slots()];
        types[4] = PruneMode::MultiHead;
        let plan   = PrunePlan::new(types, vec![0.5; dims.num_slots()], &dims).unwrap();
        let pruner = WeightPruner::new(HeadLayout::from_dims(&dims));

        let report = apply_plan(&mut store, &plan, &pruner).unwrap();

        assert_eq!(report.matrices, 12);
        let expected: Vec<WeightGroup> = [
            (0, GroupKind::Query), (0, GroupKind::Key), (0, GroupKind::Value),
            (0, GroupKind::AttnOutput), (0, GroupKind::Intermediate), (0, GroupKind::Output),
            (1, GroupKind::Value), (1, GroupKind::Query), (1, GroupKind::Key),
            (1, GroupKind::AttnOutput), (1, GroupKind::Intermediate), (1, GroupKind::Output),
        ]
        .iter()
        .map(|&(l, k)| WeightGroup::new(l, k))
        .collect();
        assert_eq!(store.writes, expected);
    }

    #[test]
    fn test_multihead_heads_match_across_qkv() {
        let dims  = tiny_dims();
        let mut store = MemoryStore::new(dims);
        let mut types = vec![PruneMode::Channel; dims.num_slots()];
        types[0] = PruneMode::MultiHead;
        let plan   = PrunePlan::new(types, vec![0.5; dims.num_slots()], &dims).unwrap();
        let pruner = WeightPruner::new(HeadLayout::from_dims(&dims));

        apply_plan(&mut store, &plan, &pruner).unwrap();

        let rows = |k| zero_rows(&store.weights[&WeightGroup::new(0, k)]);
        let value_rows = rows(GroupKind::Value);
        assert_eq!(value_rows.len(), 4); // 2 of 4 heads, 2 rows each
        assert_eq!(rows(GroupKind::Query), value_rows);
        assert_eq!(rows(GroupKind::Key), value_rows);
    }

    #[test]
    fn test_every_slot_reaches_its_keep_ratio() {
        let dims  = tiny_dims();
        let mut store = MemoryStore::new(dims);
        let plan   = PrunePlan::uniform(PruneMode::Vanilla, 0.75, &dims).unwrap();
        let pruner = WeightPruner::new(HeadLayout::from_dims(&dims));

        apply_plan(&mut store, &plan, &pruner).unwrap();

        for (group, weight) in &store.weights {
            let zeros = weight.iter().filter(|&&w| w == 0.0).count();
            assert_eq!(zeros, weight.len() / 4, "{group}");
        }
    }

    #[test]
    fn test_out_of_range_rate_is_fatal() {
        let dims  = tiny_dims();
        let mut store = MemoryStore::new(dims);
        let mut rates = vec![0.5; dims.num_slots()];
        rates[6] = 1.3;
        let plan = PrunePlan::new(vec![PruneMode::Vanilla; dims.num_slots()], rates, &dims).unwrap();
        let pruner = WeightPruner::new(HeadLayout::from_dims(&dims));

        let err = apply_plan(&mut store, &plan, &pruner).unwrap_err();
        assert!(format!("{err:#}").contains("1.3"));
    }

    #[test]
    fn test_plan_for_wrong_depth_is_rejected() {
        let dims  = tiny_dims();
        let mut store = MemoryStore::new(dims);
        let plan = PrunePlan::uniform(
            PruneMode::Vanilla,
            0.5,
            &ModelDims { num_layers: 3, ..dims },
        ).unwrap();
        let pruner = WeightPruner::new(HeadLayout::from_dims(&dims));

        assert!(apply_plan(&mut store, &plan, &pruner).is_err());
    }
}
