// ============================================================
// Layer 3 — GLUE Task Registry
// ============================================================
// Each supported task fixes three things:
//   - its label vocabulary (or none, for regression)
//   - its output mode (classification vs regression)
//   - which evaluation number counts as "the score"
//
// Reference: Wang et al. (2018) GLUE benchmark

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlueTask {
    Cola,
    Mnli,
    MnliMismatched,
    Mrpc,
    Sst2,
    Stsb,
    Qqp,
    Qnli,
    Rte,
    Wnli,
}

/// Loss / head shape used for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Classification,
    Regression,
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(OutputMode::Classification),
            "regression"     => Ok(OutputMode::Regression),
            other            => Err(ConfigError::InvalidOutputMode(other.to_string())),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Classification => f.write_str("classification"),
            OutputMode::Regression     => f.write_str("regression"),
        }
    }
}

/// Which evaluation number becomes the reported score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlineMetric {
    Accuracy,
    Matthews,
    Correlation,
}

impl GlueTask {
    pub const ALL: [GlueTask; 10] = [
        GlueTask::Cola,
        GlueTask::Mnli,
        GlueTask::MnliMismatched,
        GlueTask::Mrpc,
        GlueTask::Sst2,
        GlueTask::Stsb,
        GlueTask::Qqp,
        GlueTask::Qnli,
        GlueTask::Rte,
        GlueTask::Wnli,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GlueTask::Cola           => "cola",
            GlueTask::Mnli           => "mnli",
            GlueTask::MnliMismatched => "mnli-mm",
            GlueTask::Mrpc           => "mrpc",
            GlueTask::Sst2           => "sst-2",
            GlueTask::Stsb           => "sts-b",
            GlueTask::Qqp            => "qqp",
            GlueTask::Qnli           => "qnli",
            GlueTask::Rte            => "rte",
            GlueTask::Wnli           => "wnli",
        }
    }

    pub fn output_mode(self) -> OutputMode {
        match self {
            GlueTask::Stsb => OutputMode::Regression,
            _              => OutputMode::Classification,
        }
    }

    /// Label vocabulary in class-id order. Empty for regression.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            GlueTask::Mnli | GlueTask::MnliMismatched => &["contradiction", "entailment", "neutral"],
            GlueTask::Qnli | GlueTask::Rte            => &["entailment", "not_entailment"],
            GlueTask::Stsb                            => &[],
            _                                         => &["0", "1"],
        }
    }

    /// Width of the classifier head
    pub fn num_labels(self) -> usize {
        match self.output_mode() {
            OutputMode::Regression     => 1,
            OutputMode::Classification => self.labels().len(),
        }
    }

    pub fn headline_metric(self) -> HeadlineMetric {
        match self {
            GlueTask::Cola => HeadlineMetric::Matthews,
            GlueTask::Stsb => HeadlineMetric::Correlation,
            _              => HeadlineMetric::Accuracy,
        }
    }

    /// File name of the evaluation split inside the task's data dir
    pub fn dev_file(self) -> &'static str {
        match self {
            GlueTask::Mnli           => "dev_matched.tsv",
            GlueTask::MnliMismatched => "dev_mismatched.tsv",
            _                        => "dev.tsv",
        }
    }
}

impl FromStr for GlueTask {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        GlueTask::ALL
            .iter()
            .copied()
            .find(|t| t.name() == lower)
            .ok_or(ConfigError::UnknownTask(lower))
    }
}

impl fmt::Display for GlueTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
