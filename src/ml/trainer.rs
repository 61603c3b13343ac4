// ============================================================
// Layer 5 — Pruning-Aware Training Loop
// ============================================================
// One trial of the search: fine-tune for a fixed number of
// epochs while keeping the model pruned to the trial's plan.
//
// Per training step (strictly in this order):
//   1. forward + loss (cross-entropy or MSE), divided by grad_accum
//   2. backward, gradients go into the accumulator
//   3. on every grad_accum-th step: AdamW step at the scheduled
//      learning rate, global_step += 1
//   4. EVERY step: walk all 4·L slots and re-zero their weights
//
// Per epoch:
//   evaluate the whole dev set → EvalSummary → score
//   best_score = max(best_score, score)   (starts at 0)
//   report score as an intermediate result
//   save model_best on improvement, log a CSV row
//
// Step 4 runs even between optimizer steps, so the weights the
// next forward pass sees are always the pruned ones.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{GlueBatch, GlueBatcher, Labels},
    dataset::GlueDataset,
};
use crate::domain::{
    prune_plan::PrunePlan,
    task::{GlueTask, OutputMode},
    traits::SearchController,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::BertForSequenceClassification,
    schedule::{total_optimization_steps, WarmupLinearSchedule},
};
use crate::pruning::{
    engine::WeightPruner,
    traversal::apply_plan,
};
use crate::scoring::{EvalAccumulator, EvalSummary};

// Applies to every parameter, biases and LayerNorm included
const WEIGHT_DECAY:  f32 = 0.01;
const ADAM_EPSILON:  f32 = 1e-6;
const MAX_GRAD_NORM: f32 = 1.0;

/// Knobs of the loop itself; the model and data are passed to `run`
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub task:              GlueTask,
    pub output_mode:       OutputMode,
    pub epochs:            usize,
    pub learning_rate:     f64,
    pub warmup_proportion: f64,
    pub grad_accum:        usize,
    /// Examples per forward pass (train batch / grad_accum)
    pub step_batch_size:   usize,
    pub eval_batch_size:   usize,
    pub seed:              u64,
    pub num_workers:       usize,
}

/// What a finished trial hands back
pub struct RunOutcome<B: AutodiffBackend> {
    pub best_score:  f64,
    pub global_step: usize,
    pub history:     Vec<EpochMetrics>,
    pub model:       BertForSequenceClassification<B>,
}

/// Where a run writes its per-epoch artifacts
pub struct RunArtifacts<'a> {
    pub checkpoint: &'a CheckpointManager,
    pub metrics:    &'a MetricsLogger,
}

pub struct Trainer<'a> {
    settings: &'a TrainerSettings,
    plan:     &'a PrunePlan,
    pruner:   WeightPruner,
}

impl<'a> Trainer<'a> {
    pub fn new(settings: &'a TrainerSettings, plan: &'a PrunePlan, pruner: WeightPruner) -> Self {
        Self { settings, plan, pruner }
    }

    pub fn run<B: AutodiffBackend>(
        &self,
        mut model:  BertForSequenceClassification<B>,
        train:      GlueDataset,
        eval:       GlueDataset,
        device:     &B::Device,
        controller: &mut dyn SearchController,
        artifacts:  RunArtifacts<'_>,
    ) -> Result<RunOutcome<B>> {
        let cfg = self.settings;
        B::seed(cfg.seed);

        let total_steps = total_optimization_steps(
            train.example_count(),
            cfg.step_batch_size,
            cfg.grad_accum,
            cfg.epochs,
        );
        let schedule = WarmupLinearSchedule::new(cfg.learning_rate, cfg.warmup_proportion, total_steps);

        tracing::info!(
            "Training {} on {} examples, {} dev examples",
            cfg.task,
            train.example_count(),
            eval.example_count(),
        );
        tracing::info!(
            "  step batch = {}, accumulation = {}, optimizer steps = {}",
            cfg.step_batch_size,
            cfg.grad_accum,
            total_steps,
        );

        // ── AdamW with decoupled weight decay ────────────────────────────────
        let mut optim = AdamWConfig::new()
            .with_weight_decay(WEIGHT_DECAY)
            .with_epsilon(ADAM_EPSILON)
            .with_grad_clipping(Some(GradientClippingConfig::Norm(MAX_GRAD_NORM)))
            .init();
        let mut accumulator = GradientsAccumulator::new();

        // ── Data loaders ──────────────────────────────────────────────────────
        let train_loader = DataLoaderBuilder::new(GlueBatcher::<B>::new(device.clone(), cfg.output_mode))
            .batch_size(cfg.step_batch_size)
            .shuffle(cfg.seed)
            .num_workers(cfg.num_workers)
            .build(train);

        // evaluation runs on the inner backend, no autodiff overhead
        let eval_loader = DataLoaderBuilder::new(
            GlueBatcher::<B::InnerBackend>::new(device.clone(), cfg.output_mode),
        )
        .batch_size(cfg.eval_batch_size)
        .num_workers(cfg.num_workers)
        .build(eval);

        let mut global_step = 0usize;
        let mut best_score  = 0.0f64;
        let mut history     = Vec::with_capacity(cfg.epochs);

        // ── Epoch loop ────────────────────────────────────────────────────────
        for epoch in 1..=cfg.epochs {
            let mut train_loss_sum = 0.0f64;
            let mut train_steps    = 0usize;

            for (step, batch) in train_loader.iter().enumerate() {
                // ── Step 1: forward + loss ────────────────────────────────────
                let loss = model
                    .forward_loss(batch)
                    .loss
                    .div_scalar(cfg.grad_accum as f64);
                train_loss_sum += loss.clone().into_scalar().elem::<f64>();
                train_steps    += 1;

                // ── Step 2: backward into the accumulator ─────────────────────
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                accumulator.accumulate(&model, grads);

                // ── Step 3: optimizer step on accumulation boundaries ─────────
                if (step + 1) % cfg.grad_accum == 0 {
                    let lr = schedule.lr(global_step);
                    model = optim.step(lr, model, accumulator.grads());
                    global_step += 1;
                }

                // ── Step 4: prune every slot ──────────────────────────────────
                let report = apply_plan(&mut model, self.plan, &self.pruner)
                    .with_context(|| format!("Pruning failed after step {step} of epoch {epoch}"))?;
                tracing::debug!(
                    "epoch {} step {}: pruned {} matrices, {} units zeroed",
                    epoch, step, report.matrices, report.zeroed_units,
                );
            }

            let train_loss = if train_steps > 0 {
                train_loss_sum / train_steps as f64
            } else { f64::NAN };

            // ── Evaluate ──────────────────────────────────────────────────────
            let summary = self.evaluate(&model.valid(), eval_loader.as_ref())?;
            let score   = self.epoch_score(&summary, epoch);

            let mut row = EpochMetrics {
                epoch,
                train_loss,
                eval_loss: summary.eval_loss,
                accuracy:  summary.accuracy,
                mcc:       summary.mcc,
                score,
                best_score,
            };
            if row.is_improvement(best_score) {
                best_score     = score;
                row.best_score = score;
                artifacts.checkpoint.save_best(&model)?;
            }

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | eval_loss={:.4} | acc={:.4} | mcc={:.4} | score={:.4} | best={:.4}",
                epoch, cfg.epochs, train_loss, summary.eval_loss,
                summary.accuracy, summary.mcc, score, best_score,
            );

            if let Some(f1) = summary.f1 {
                tracing::info!("Epoch {:>3}/{} | f1={:.4} over {} dev examples", epoch, cfg.epochs, f1, summary.examples);
            }

            controller.report_intermediate(score);

            artifacts.metrics.log(&row)?;
            history.push(row);
        }

        tracing::info!("Training complete: best score {:.4} after {} optimizer steps", best_score, global_step);

        Ok(RunOutcome { best_score, global_step, history, model })
    }

    /// Score the whole dev set in one pass
    fn evaluate<B: Backend>(
        &self,
        model:  &BertForSequenceClassification<B>,
        loader: &dyn DataLoader<GlueBatch<B>>,
    ) -> Result<EvalSummary> {
        let mut acc = EvalAccumulator::new(self.settings.task, self.settings.output_mode);

        for batch in loader.iter() {
            let output = model.forward_loss(batch);
            acc.push_loss(output.loss.into_scalar().elem::<f64>());

            let [_, width] = output.logits.dims();
            let logits = host_floats(output.logits)?;

            match output.labels {
                Labels::Class(ids) => {
                    let ids: Vec<usize> = ids
                        .into_data()
                        .convert::<i64>()
                        .to_vec::<i64>()
                        .map_err(|e| anyhow::anyhow!("Cannot read labels: {e:?}"))?
                        .into_iter()
                        .map(|id| id as usize)
                        .collect();
                    acc.push_logits(&logits, width, &ids);
                }
                Labels::Score(scores) => {
                    acc.push_scores(&logits, &host_floats(scores)?);
                }
            }
        }

        Ok(acc.finish())
    }

    /// The reported number of an epoch; undefined values count as 0
    fn epoch_score(&self, summary: &EvalSummary, epoch: usize) -> f64 {
        if summary.mcc_degenerate {
            tracing::warn!("Epoch {epoch}: Matthews correlation undefined, using 0");
        }
        if summary.score.is_nan() {
            tracing::warn!("Epoch {epoch}: {} score undefined, using 0", self.settings.task);
            return 0.0;
        }
        summary.score
    }
}

fn host_floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot copy tensor to host: {e:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use serde_json::{Map, Value};

    use crate::data::dataset::{GlueFeatures, GlueLabel};
    use crate::domain::prune_plan::PruneMode;
    use crate::domain::traits::WeightStore;
    use crate::domain::weight_group::{GroupKind, WeightGroup};
    use crate::ml::model::tests::tiny_config;
    use crate::pruning::engine::HeadLayout;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[derive(Default)]
    struct RecordingController {
        intermediate: Vec<f64>,
    }

    impl SearchController for RecordingController {
        fn next_parameters(&mut self) -> Result<Map<String, Value>> {
            Ok(Map::new())
        }
        fn report_intermediate(&mut self, score: f64) {
            self.intermediate.push(score);
        }
        fn report_final(&mut self, _score: f64) {}
    }

    fn settings(task: GlueTask, output_mode: OutputMode, epochs: usize) -> TrainerSettings {
        TrainerSettings {
            task,
            output_mode,
            epochs,
            learning_rate:     1e-3,
            warmup_proportion: 0.1,
            grad_accum:        2,
            step_batch_size:   2,
            eval_batch_size:   4,
            seed:              42,
            num_workers:       1,
        }
    }

    fn dataset(n: usize, label: impl Fn(usize) -> GlueLabel) -> GlueDataset {
        GlueDataset::new(
            (0..n)
                .map(|i| GlueFeatures {
                    input_ids:      vec![1, 3 + (i % 7) as u32, 4 + (i % 5) as u32, 2, 0, 0],
                    attention_mask: vec![1, 1, 1, 1, 0, 0],
                    token_type_ids: vec![0; 6],
                    label:          label(i),
                })
                .collect(),
        )
    }

    fn zero_count(model: &impl WeightStore, group: WeightGroup) -> usize {
        model.read(group).unwrap().iter().filter(|&&w| w == 0.0).count()
    }

    #[test]
    fn test_run_reports_every_epoch_and_prunes() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = tiny_config();
        let dims   = config.dims();

        let cfg    = settings(GlueTask::Sst2, OutputMode::Classification, 2);
        let plan   = PrunePlan::uniform(PruneMode::Vanilla, 0.5, &dims).unwrap();
        let model  = config.init_classifier::<TestBackend>(2, &device);
        let checkpoint = CheckpointManager::new(dir.path()).unwrap();
        let metrics    = MetricsLogger::new(dir.path()).unwrap();
        let mut controller = RecordingController::default();

        let outcome = Trainer::new(&cfg, &plan, WeightPruner::new(HeadLayout::from_dims(&dims)))
            .run(
                model,
                dataset(8, |i| GlueLabel::Class(i % 2)),
                dataset(4, |i| GlueLabel::Class(i % 2)),
                &device,
                &mut controller,
                RunArtifacts { checkpoint: &checkpoint, metrics: &metrics },
            )
            .unwrap();

        // 8 examples / 2 per step = 4 steps per epoch, 2 per optimizer step
        assert_eq!(outcome.global_step, 4);
        assert_eq!(controller.intermediate.len(), 2);
        assert_eq!(outcome.history.len(), 2);

        let expected_best = controller.intermediate.iter().copied().fold(0.0, f64::max);
        assert_eq!(outcome.best_score, expected_best);
        assert_eq!(outcome.history[1].best_score, expected_best);

        // the last thing a step does is prune, so every matrix is at its keep rate
        for layer in 0..dims.num_layers {
            for kind in [GroupKind::Query, GroupKind::AttnOutput, GroupKind::Output] {
                let group = WeightGroup::new(layer, kind);
                let (rows, cols) = group.shape(&dims);
                assert!(zero_count(&outcome.model, group) >= rows * cols / 2, "{group}");
            }
        }

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_multihead_plan_zeros_same_heads_in_qkv() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = tiny_config();
        let dims   = config.dims();

        let cfg = settings(GlueTask::Rte, OutputMode::Classification, 1);
        let mut types = vec![PruneMode::Channel; dims.num_slots()];
        types[0] = PruneMode::MultiHead;
        let plan = PrunePlan::new(types, vec![0.5; dims.num_slots()], &dims).unwrap();
        let checkpoint = CheckpointManager::new(dir.path()).unwrap();
        let metrics    = MetricsLogger::new(dir.path()).unwrap();

        let outcome = Trainer::new(&cfg, &plan, WeightPruner::new(HeadLayout::from_dims(&dims)))
            .run(
                config.init_classifier::<TestBackend>(2, &device),
                dataset(4, |i| GlueLabel::Class(i % 2)),
                dataset(2, |i| GlueLabel::Class(i % 2)),
                &device,
                &mut RecordingController::default(),
                RunArtifacts { checkpoint: &checkpoint, metrics: &metrics },
            )
            .unwrap();

        let zero_rows = |kind| -> Vec<usize> {
            let m = outcome.model.read(WeightGroup::new(0, kind)).unwrap();
            m.rows()
                .into_iter()
                .enumerate()
                .filter(|(_, r)| r.iter().all(|&w| w == 0.0))
                .map(|(i, _)| i)
                .collect()
        };

        let value_rows = zero_rows(GroupKind::Value);
        // 2 of 4 heads, 2 rows per head
        assert_eq!(value_rows.len(), 4);
        assert_eq!(zero_rows(GroupKind::Query), value_rows);
        assert_eq!(zero_rows(GroupKind::Key), value_rows);
    }

    #[test]
    fn test_regression_run_reports_finite_scores() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = tiny_config();
        let dims   = config.dims();

        let mut cfg = settings(GlueTask::Stsb, OutputMode::Regression, 1);
        cfg.grad_accum = 1;
        let plan = PrunePlan::uniform(PruneMode::Vanilla, 0.8, &dims).unwrap();
        let checkpoint = CheckpointManager::new(dir.path()).unwrap();
        let metrics    = MetricsLogger::new(dir.path()).unwrap();
        let mut controller = RecordingController::default();

        let outcome = Trainer::new(&cfg, &plan, WeightPruner::new(HeadLayout::from_dims(&dims)))
            .run(
                config.init_classifier::<TestBackend>(1, &device),
                dataset(4, |i| GlueLabel::Score(i as f32)),
                dataset(4, |i| GlueLabel::Score(i as f32)),
                &device,
                &mut controller,
                RunArtifacts { checkpoint: &checkpoint, metrics: &metrics },
            )
            .unwrap();

        assert_eq!(outcome.global_step, 2);
        assert!(controller.intermediate.iter().all(|s| s.is_finite()));
        assert!(outcome.best_score >= 0.0);
    }
}
