// ============================================================
// Metric Engine
// ============================================================
// Turns the predictions of one full evaluation pass into the
// numbers reported per epoch:
//
//   classification → accuracy, Matthews correlation, F1 (2 labels)
//   regression     → Pearson, Spearman and their mean
//
// Accuracy, F1 and the correlations are computed once over the
// predictions of the whole dev set. Matthews correlation is the
// mean of the per-batch coefficients; one undefined batch makes
// the mean undefined, and an undefined mean is reported as 0.

pub mod classification;
pub mod correlation;

use crate::domain::task::{GlueTask, HeadlineMetric, OutputMode};

use self::classification::{argmax_rows, f1_score, matthews_corrcoef, simple_accuracy};
use self::correlation::{pearson, spearman};

// ─── Summary ──────────────────────────────────────────────────────────────────

/// Scores of one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSummary {
    pub examples:  usize,
    pub eval_loss: f64,
    pub accuracy:  f64,
    /// NaN already replaced by 0, see `mcc_degenerate`
    pub mcc:       f64,
    pub f1:        Option<f64>,
    pub pearson:   Option<f64>,
    pub spearman:  Option<f64>,
    /// The task's headline number
    pub score:     f64,
    /// Matthews correlation was undefined and substituted by 0
    pub mcc_degenerate: bool,
}

// ─── Accumulator ──────────────────────────────────────────────────────────────

/// Collects predictions, labels and losses over an evaluation pass
#[derive(Debug, Clone)]
pub struct EvalAccumulator {
    task:         GlueTask,
    mode:         OutputMode,
    class_preds:  Vec<usize>,
    class_labels: Vec<usize>,
    score_preds:  Vec<f64>,
    score_labels: Vec<f64>,
    mcc_sum:      f64,
    mcc_batches:  usize,
    loss_sum:     f64,
    loss_batches: usize,
}

impl EvalAccumulator {
    pub fn new(task: GlueTask, mode: OutputMode) -> Self {
        Self {
            task,
            mode,
            class_preds:  Vec::new(),
            class_labels: Vec::new(),
            score_preds:  Vec::new(),
            score_labels: Vec::new(),
            mcc_sum:      0.0,
            mcc_batches:  0,
            loss_sum:     0.0,
            loss_batches: 0,
        }
    }

    /// Row-major logits `[batch, num_labels]` and their class ids
    pub fn push_logits(&mut self, logits: &[f32], num_labels: usize, labels: &[usize]) {
        let preds = argmax_rows(logits, num_labels);
        self.mcc_sum     += matthews_corrcoef(&preds, labels);
        self.mcc_batches += 1;

        self.class_preds.extend(preds);
        self.class_labels.extend_from_slice(labels);
    }

    /// One regression output per example
    pub fn push_scores(&mut self, outputs: &[f32], labels: &[f32]) {
        self.score_preds.extend(outputs.iter().map(|&v| v as f64));
        self.score_labels.extend(labels.iter().map(|&v| v as f64));
    }

    pub fn push_loss(&mut self, batch_loss: f64) {
        self.loss_sum     += batch_loss;
        self.loss_batches += 1;
    }

    pub fn len(&self) -> usize {
        match self.mode {
            OutputMode::Classification => self.class_labels.len(),
            OutputMode::Regression     => self.score_labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> EvalSummary {
        let examples  = self.len();
        let eval_loss = if self.loss_batches == 0 {
            0.0
        } else {
            self.loss_sum / self.loss_batches as f64
        };

        let (accuracy, raw_mcc, f1, pearson_r, spearman_r) = match self.mode {
            OutputMode::Classification => {
                let f1 = (self.task.num_labels() == 2)
                    .then(|| f1_score(&self.class_preds, &self.class_labels));
                (
                    simple_accuracy(&self.class_preds, &self.class_labels),
                    if self.mcc_batches == 0 {
                        f64::NAN
                    } else {
                        self.mcc_sum / self.mcc_batches as f64
                    },
                    f1,
                    None,
                    None,
                )
            }
            OutputMode::Regression => (
                0.0,
                0.0,
                None,
                Some(pearson(&self.score_preds, &self.score_labels)),
                Some(spearman(&self.score_preds, &self.score_labels)),
            ),
        };

        let mcc_degenerate = raw_mcc.is_nan();
        let mcc = if mcc_degenerate { 0.0 } else { raw_mcc };

        // a regression head always reports correlation, whatever the task
        let score = match (pearson_r, spearman_r) {
            (Some(p), Some(s)) => (p + s) / 2.0,
            _ => match self.task.headline_metric() {
                HeadlineMetric::Matthews => mcc,
                _                        => accuracy,
            },
        };

        EvalSummary {
            examples,
            eval_loss,
            accuracy,
            mcc,
            f1,
            pearson: pearson_r,
            spearman: spearman_r,
            score,
            mcc_degenerate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_all_correct_binary_epoch() {
        let mut acc = EvalAccumulator::new(GlueTask::Sst2, OutputMode::Classification);
        // two batches, logits favour the true class every time
        acc.push_logits(&[2.0, -1.0, -0.5, 1.5], 2, &[0, 1]);
        acc.push_logits(&[0.1, 0.9, 3.0, 0.0], 2, &[1, 0]);
        acc.push_loss(0.2);
        acc.push_loss(0.4);

        let summary = acc.finish();
        assert_eq!(summary.examples, 4);
        assert_eq!(summary.accuracy, 1.0);
        assert_relative_eq!(summary.mcc, 1.0, epsilon = 1e-12);
        assert_eq!(summary.f1, Some(1.0));
        assert_relative_eq!(summary.eval_loss, 0.3, epsilon = 1e-12);
        assert_eq!(summary.score, 1.0);
        assert!(!summary.mcc_degenerate);
    }

    #[test]
    fn test_cola_scores_by_matthews() {
        let mut acc = EvalAccumulator::new(GlueTask::Cola, OutputMode::Classification);
        // preds [1, 0, 1, 1]: tp=2 tn=1 fp=1 fn=0
        acc.push_logits(&[0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0], 2, &[1, 0, 0, 1]);

        let summary = acc.finish();
        assert_eq!(summary.accuracy, 0.75);
        assert_relative_eq!(summary.score, summary.mcc);
        assert!(summary.mcc > 0.0 && summary.mcc < 1.0);
    }

    #[test]
    fn test_degenerate_matthews_becomes_zero() {
        let mut acc = EvalAccumulator::new(GlueTask::Cola, OutputMode::Classification);
        // always predicts class 1
        acc.push_logits(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0], 2, &[1, 0, 1]);

        let summary = acc.finish();
        assert!(summary.mcc_degenerate);
        assert_eq!(summary.mcc, 0.0);
        assert_eq!(summary.score, 0.0);
    }

    #[test]
    fn test_matthews_is_mean_over_batches() {
        let mut acc = EvalAccumulator::new(GlueTask::Cola, OutputMode::Classification);
        // preds [1, 0, 1, 0] vs [1, 0, 0, 1]: coefficient 0
        acc.push_logits(&[0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0], 2, &[1, 0, 0, 1]);
        // preds [1, 0, 1, 1] vs [1, 0, 1, 0]: coefficient 2 / sqrt(12)
        acc.push_logits(&[0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0], 2, &[1, 0, 1, 0]);

        let summary = acc.finish();
        assert_relative_eq!(summary.mcc, 1.0 / 12f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(summary.score, summary.mcc);
        assert_eq!(summary.accuracy, 0.625);
    }

    #[test]
    fn test_single_class_batches_score_zero() {
        let mut acc = EvalAccumulator::new(GlueTask::Cola, OutputMode::Classification);
        // every prediction is right, but each batch holds one class only
        acc.push_logits(&[0.0, 1.0, 0.0, 1.0], 2, &[1, 1]);
        acc.push_logits(&[1.0, 0.0, 1.0, 0.0], 2, &[0, 0]);

        let summary = acc.finish();
        assert_eq!(summary.accuracy, 1.0);
        assert!(summary.mcc_degenerate);
        assert_eq!(summary.mcc, 0.0);
        assert_eq!(summary.score, 0.0);
    }

    #[test]
    fn test_three_way_task_has_no_f1() {
        let mut acc = EvalAccumulator::new(GlueTask::Mnli, OutputMode::Classification);
        acc.push_logits(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0], 3, &[0, 2]);

        let summary = acc.finish();
        assert_eq!(summary.f1, None);
        assert_eq!(summary.score, 1.0);
    }

    #[test]
    fn test_regression_scores_by_mean_correlation() {
        let mut acc = EvalAccumulator::new(GlueTask::Stsb, OutputMode::Regression);
        acc.push_scores(&[1.0, 2.0, 3.0], &[1.5, 2.5, 3.5]);
        acc.push_scores(&[4.0], &[5.0]);

        let summary = acc.finish();
        assert_eq!(summary.examples, 4);
        let p = summary.pearson.unwrap();
        let s = summary.spearman.unwrap();
        assert_relative_eq!(s, 1.0, epsilon = 1e-12);
        assert_relative_eq!(summary.score, (p + s) / 2.0, epsilon = 1e-12);
    }
}
