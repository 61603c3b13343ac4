// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Runs one trial of the search end to end, in order:
//
//   Step 1: Validate the run settings       (Layer 3 - domain)
//   Step 2: Read the snapshot's config       (Layer 6 - infra)
//   Step 3: Ask the controller for a plan    (Layer 6 + PlanUseCase)
//   Step 4: Save train_config.json           (Layer 6 - infra)
//   Step 5: Load the tokenizer               (Layer 6 - infra)
//   Step 6: Read and encode the TSV splits   (Layer 4 - data)
//   Step 7: Build the model, fine-tune+prune (Layer 5 - ml)
//   Step 8: Report the best score as final   (Layer 6 - infra)
//
// Everything that can be rejected (task, output mode, batch
// arithmetic, device, plan) is rejected before any data is read.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use std::{fmt, path::{Path, PathBuf}, str::FromStr};
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::plan_use_case::build_plan;
use crate::data::{
    dataset::GlueDataset,
    features::FeatureEncoder,
    processor::GlueProcessor,
};
use crate::domain::{
    error::ConfigError,
    prune_plan::PrunePlan,
    task::{GlueTask, OutputMode},
    traits::SearchController,
};
use crate::infra::{
    checkpoint::{CheckpointManager, PretrainedSnapshot},
    metrics::MetricsLogger,
    search_controller::{FileSearchController, StandaloneController},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::BertConfig,
    trainer::{RunArtifacts, Trainer, TrainerSettings},
};
use crate::pruning::engine::{HeadLayout, WeightPruner};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything one trial needs. Saved next to the run's checkpoints so a
// finished run can be traced back to the exact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub task:              String,
    pub data_dir:          String,
    pub model_root:        String,
    pub model_size:        String,
    pub output_dir:        String,
    pub max_seq_length:    usize,
    pub train_batch_size:  usize,
    pub eval_batch_size:   usize,
    pub learning_rate:     f64,
    pub epochs:            usize,
    pub warmup_proportion: f64,
    pub grad_accum:        usize,
    pub seed:              u64,
    pub device:            String,
    pub keep_budget:       f64,
    pub params_file:       Option<String>,
    pub report_file:       Option<String>,
    /// Overrides the task's own output mode when set
    pub output_mode:       Option<String>,
    pub num_workers:       usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            task:              "cola".to_string(),
            data_dir:          "glue_data/CoLA".to_string(),
            model_root:        "models".to_string(),
            model_size:        "bert-base-uncased".to_string(),
            output_dir:        "output".to_string(),
            max_seq_length:    128,
            train_batch_size:  32,
            eval_batch_size:   8,
            learning_rate:     5e-5,
            epochs:            3,
            warmup_proportion: 0.1,
            grad_accum:        1,
            seed:              42,
            device:            "wgpu".to_string(),
            keep_budget:       0.3,
            params_file:       None,
            report_file:       None,
            output_mode:       None,
            num_workers:       1,
        }
    }
}

// ─── Device ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Wgpu,
    NdArray,
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wgpu"              => Ok(DeviceKind::Wgpu),
            "ndarray" | "cpu"   => Ok(DeviceKind::NdArray),
            other               => Err(ConfigError::UnknownDevice(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Wgpu    => f.write_str("wgpu"),
            DeviceKind::NdArray => f.write_str("ndarray"),
        }
    }
}

/// The parts of a `TrainConfig` that had to be parsed or derived
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub task:            GlueTask,
    pub output_mode:     OutputMode,
    pub device:          DeviceKind,
    /// Examples per forward pass
    pub step_batch_size: usize,
    /// Width of the classifier head
    pub num_labels:      usize,
}

impl TrainConfig {
    /// Reject a bad run before anything touches the disk
    pub fn validate(&self) -> Result<RunSettings, ConfigError> {
        let task: GlueTask = self.task.parse()?;

        let output_mode = match &self.output_mode {
            Some(mode) => mode.parse()?,
            None       => task.output_mode(),
        };
        if output_mode == OutputMode::Classification && task.labels().is_empty() {
            return Err(ConfigError::InvalidOutputMode(format!(
                "classification (task {task} has no label list)"
            )));
        }

        if self.grad_accum < 1 {
            return Err(ConfigError::InvalidGradientAccumulation(self.grad_accum));
        }
        let step_batch_size = self.train_batch_size / self.grad_accum;
        if step_batch_size == 0 || self.eval_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize {
                batch_size: self.train_batch_size.min(self.eval_batch_size),
                grad_accum: self.grad_accum,
            });
        }
        if self.epochs < 1 {
            return Err(ConfigError::InvalidEpochs(self.epochs));
        }

        let num_labels = match output_mode {
            OutputMode::Regression     => 1,
            OutputMode::Classification => task.labels().len(),
        };

        Ok(RunSettings {
            task,
            output_mode,
            device: self.device.parse()?,
            step_batch_size,
            num_labels,
        })
    }

    fn trainer_settings(&self, run: &RunSettings) -> TrainerSettings {
        TrainerSettings {
            task:              run.task,
            output_mode:       run.output_mode,
            epochs:            self.epochs,
            learning_rate:     self.learning_rate,
            warmup_proportion: self.warmup_proportion,
            grad_accum:        self.grad_accum,
            step_batch_size:   run.step_batch_size,
            eval_batch_size:   self.eval_batch_size,
            seed:              self.seed,
            num_workers:       self.num_workers,
        }
    }

    /// File controller when either file is named, standalone otherwise.
    /// The report file defaults to `<output_dir>/report.jsonl`.
    fn controller(&self) -> Box<dyn SearchController> {
        if self.params_file.is_none() && self.report_file.is_none() {
            return Box::new(StandaloneController);
        }
        let report = self
            .report_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&self.output_dir).join("report.jsonl"));
        Box::new(FileSearchController::new(self.params_file.as_ref().map(PathBuf::from), report))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────

/// Inputs of the backend-generic part of a run
struct PreparedRun<'a> {
    bert_config: &'a BertConfig,
    snapshot:    &'a PretrainedSnapshot,
    plan:        &'a PrunePlan,
    settings:    TrainerSettings,
    num_labels:  usize,
    train:       GlueDataset,
    eval:        GlueDataset,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the trial and return its best epoch score
    pub fn execute(&self) -> Result<f64> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        let run = cfg.validate()?;
        tracing::info!(
            "Task {} ({}), device {}, {} labels",
            run.task, run.output_mode, run.device, run.num_labels
        );

        // ── Step 2: Model description ────────────────────────────────────────
        let snapshot    = PretrainedSnapshot::new(&cfg.model_root, &cfg.model_size);
        let bert_config = snapshot.load_config()?;
        let dims        = bert_config.dims();

        // ── Step 3: Prune plan from the controller ───────────────────────────
        let mut controller = cfg.controller();
        let params = controller.next_parameters()?;
        let plan   = build_plan(&params, cfg.keep_budget, &dims)?;

        // ── Step 4: Output directory ─────────────────────────────────────────
        let checkpoint = CheckpointManager::new(&cfg.output_dir)?;
        checkpoint.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.output_dir)?;

        // ── Step 5: Tokenizer ────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(snapshot.tokenizer_path()).load()?;

        // ── Step 6: Features ─────────────────────────────────────────────────
        let processor = GlueProcessor::new(run.task, &cfg.data_dir);
        let encoder   = FeatureEncoder::new(tokenizer, run.task, run.output_mode, cfg.max_seq_length)?;

        let train = GlueDataset::new(encoder.encode_all(&processor.train_examples()?)?);
        let eval  = GlueDataset::new(encoder.encode_all(&processor.dev_examples()?)?);
        tracing::info!(
            "Encoded {} train and {} dev examples",
            train.example_count(),
            eval.example_count()
        );

        // ── Step 7: Fine-tune ────────────────────────────────────────────────
        let prepared = PreparedRun {
            bert_config: &bert_config,
            snapshot:    &snapshot,
            plan:        &plan,
            settings:    cfg.trainer_settings(&run),
            num_labels:  run.num_labels,
            train,
            eval,
        };
        let artifacts = RunArtifacts { checkpoint: &checkpoint, metrics: &metrics };

        let best_score = match run.device {
            DeviceKind::Wgpu => train_on::<Autodiff<Wgpu>>(
                prepared,
                &burn::backend::wgpu::WgpuDevice::default(),
                controller.as_mut(),
                artifacts,
            )?,
            DeviceKind::NdArray => train_on::<Autodiff<NdArray>>(
                prepared,
                &burn::backend::ndarray::NdArrayDevice::Cpu,
                controller.as_mut(),
                artifacts,
            )?,
        };

        // ── Step 8: Final result ─────────────────────────────────────────────
        controller.report_final(best_score);
        tracing::info!("Best {} score: {:.4}", run.task, best_score);

        Ok(best_score)
    }
}

fn train_on<B: AutodiffBackend>(
    run:        PreparedRun<'_>,
    device:     &B::Device,
    controller: &mut dyn SearchController,
    artifacts:  RunArtifacts<'_>,
) -> Result<f64> {
    let model = run.bert_config.init_classifier::<B>(run.num_labels, device);
    let model = run.snapshot.load_backbone(model, device)?;

    let pruner = WeightPruner::new(HeadLayout::from_dims(&run.bert_config.dims()));
    let outcome = Trainer::new(&run.settings, run.plan, pruner)
        .run(model, run.train, run.eval, device, controller, artifacts)?;

    tracing::info!("Finished after {} optimizer steps", outcome.global_step);
    Ok(outcome.best_score)
}
