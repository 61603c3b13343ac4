// ============================================================
// Rate Balancer
// ============================================================
// Slots differ in size: a QKV triple holds three H×H matrices,
// the feed-forward matrices hold H×I each. Raw keep rates from the
// search controller are rescaled so that their parameter-count
// weighted mean equals the run's keep budget:
//
//   mean  = Σ rate[i] * params(i) / Σ params(i)
//   out_i = rate[i] * budget / mean
//
// Results are NOT clamped to (0, 1]. `PrunePlan::validate_rates`
// catches the out-of-range case before training starts.

use crate::domain::weight_group::{ModelDims, SlotKind};

/// Rescale `rates` (one per flat slot) to a weighted mean of `budget`
pub fn balance(rates: &[f64], budget: f64, dims: &ModelDims) -> Vec<f64> {
    let mean = weighted_mean(rates, dims);
    rates.iter().map(|r| r / mean * budget).collect()
}

/// Parameter-count weighted mean of per-slot rates
pub fn weighted_mean(rates: &[f64], dims: &ModelDims) -> f64 {
    let (weighted, total) = rates
        .iter()
        .enumerate()
        .fold((0.0f64, 0.0f64), |(weighted, total), (slot, rate)| {
            let params = SlotKind::from_index(slot).param_count(dims) as f64;
            (weighted + rate * params, total + params)
        });
    weighted / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::collection::vec;
    use proptest::prelude::*;

    #[test]
    fn test_equal_rates_become_the_budget() {
        let dims     = ModelDims::bert_base();
        let balanced = balance(&[0.5; 48], 0.3, &dims);

        assert_eq!(balanced.len(), 48);
        for rate in balanced {
            assert_relative_eq!(rate, 0.3, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_larger_slots_pull_harder() {
        // One layer: qkv=3, attn_out=1, intermediate=4, output=4 (units of H²)
        let dims = ModelDims { num_layers: 1, ..ModelDims::bert_base() };
        let balanced = balance(&[1.0, 1.0, 0.5, 0.5], 0.5, &dims);

        // mean = (3 + 1 + 2 + 2) / 12 = 2/3 → scale = 0.75
        assert_relative_eq!(balanced[0], 0.75, epsilon = 1e-12);
        assert_relative_eq!(balanced[2], 0.375, epsilon = 1e-12);
        assert_relative_eq!(weighted_mean(&balanced, &dims), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_skewed_rates_are_not_clamped() {
        // High attention rates beside low feed-forward rates push the
        // attention slots above 1.0 once rescaled.
        let dims = ModelDims { num_layers: 1, ..ModelDims::bert_base() };
        let balanced = balance(&[0.9, 0.9, 0.1, 0.1], 0.5, &dims);

        assert!(balanced[0] > 1.0, "expected an unclamped rate, got {}", balanced[0]);
        assert_relative_eq!(weighted_mean(&balanced, &dims), 0.5, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_weighted_mean_equals_budget(
            rates in vec(0.01f64..1.0, 48),
            budget in 0.05f64..1.0,
        ) {
            let dims = ModelDims::bert_base();
            let balanced = balance(&rates, budget, &dims);
            prop_assert!((weighted_mean(&balanced, &dims) - budget).abs() < 1e-6);
        }
    }
}
