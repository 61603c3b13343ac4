// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per epoch in <output_dir>/metrics.csv:
//
//   epoch,train_loss,eval_loss,accuracy,mcc,score,best_score
//   1,0.612300,0.587100,0.701800,0.218400,0.218400,0.218400
//   2,0.498000,0.561200,0.733500,0.312900,0.312900,0.312900
//
// `score` is the task's headline number (accuracy, Matthews or
// correlation); `best_score` is the running maximum that is
// reported as the final result.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,eval_loss,accuracy,mcc,score,best_score";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch: usize,

    /// Mean per-step loss, already divided by the accumulation factor
    pub train_loss: f64,

    pub eval_loss: f64,
    pub accuracy:  f64,
    pub mcc:       f64,
    pub score:     f64,
    pub best_score: f64,
}

impl EpochMetrics {
    /// Whether this epoch's score beats the best seen before it
    pub fn is_improvement(&self, previous_best: f64) -> bool {
        self.score > previous_best
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Starts a fresh file; a previous run's rows are replaced.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "{HEADER}")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.eval_loss,
            m.accuracy,
            m.mcc,
            m.score,
            m.best_score,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, score={:.4}",
            m.epoch,
            m.train_loss,
            m.score,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
