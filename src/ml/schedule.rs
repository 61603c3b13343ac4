// ============================================================
// Layer 5 — Warmup-Linear Learning Rate Schedule
// ============================================================
// lr(step) = base_lr * factor(step / total_steps), where
//
//   factor(p) = p / w              for p < w   (warmup)
//   factor(p) = max((p−1)/(w−1), 0) otherwise  (decay to 0 at p = 1)
//
// and w is the warmup proportion. Both pieces equal 1.0 at p = w.
//
// Reference: Devlin et al. (2019) BERT, Appendix A.2

#[derive(Debug, Clone, Copy)]
pub struct WarmupLinearSchedule {
    base_lr:           f64,
    warmup_proportion: f64,
    total_steps:       usize,
}

impl WarmupLinearSchedule {
    pub fn new(base_lr: f64, warmup_proportion: f64, total_steps: usize) -> Self {
        Self { base_lr, warmup_proportion, total_steps }
    }

    /// Learning rate for the optimizer step numbered `step` (0-based)
    pub fn lr(&self, step: usize) -> f64 {
        self.base_lr * self.factor(step)
    }

    fn factor(&self, step: usize) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        let progress = step as f64 / self.total_steps as f64;
        let warmup   = self.warmup_proportion;

        if progress < warmup {
            progress / warmup
        } else if warmup >= 1.0 {
            1.0
        } else {
            ((progress - 1.0) / (warmup - 1.0)).max(0.0)
        }
    }
}

/// Optimizer steps of a whole run: full accumulation windows per epoch
pub fn total_optimization_steps(
    train_examples: usize,
    step_batch:     usize,
    grad_accum:     usize,
    epochs:         usize,
) -> usize {
    let per_epoch = train_examples as f64 / step_batch.max(1) as f64 / grad_accum.max(1) as f64;
    per_epoch as usize * epochs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_warmup_then_decay() {
        let s = WarmupLinearSchedule::new(1e-4, 0.1, 100);

        assert_eq!(s.lr(0), 0.0);
        assert_relative_eq!(s.lr(5), 0.5e-4, epsilon = 1e-12);
        assert_relative_eq!(s.lr(10), 1e-4, epsilon = 1e-12);
        assert_relative_eq!(s.lr(55), 0.5e-4, epsilon = 1e-12);
        assert_eq!(s.lr(100), 0.0);
        assert_eq!(s.lr(150), 0.0);
    }

    #[test]
    fn test_lr_never_exceeds_base() {
        let s = WarmupLinearSchedule::new(2e-5, 0.25, 40);
        assert!((0..60).all(|step| s.lr(step) <= 2e-5 + 1e-15));
    }

    #[test]
    fn test_total_steps() {
        // 1000 examples, batch 16 per step, 2 accumulation steps → 31 per epoch
        assert_eq!(total_optimization_steps(1000, 16, 2, 3), 93);
        assert_eq!(total_optimization_steps(10, 32, 1, 3), 0);
    }
}
