// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `plan`, and all
// their configurable flags.
//
// clap's derive macros generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Task, device and output mode stay strings here; they are
// parsed (and rejected) by the application layer.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::{plan_use_case::PlanConfig, train_use_case::TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune on a GLUE task while pruning to the trial's plan
    Train(TrainArgs),

    /// Print the balanced prune plan for a parameter file, without training
    Plan(PlanArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// GLUE task: cola, mnli, mnli-mm, mrpc, sst-2, sts-b, qqp, qnli, rte, wnli
    #[arg(long)]
    pub task: String,

    /// Directory holding the task's train.tsv and dev TSV
    #[arg(long)]
    pub data_dir: String,

    /// Directory containing one sub-directory per pretrained model
    #[arg(long, default_value = "models")]
    pub model_root: String,

    /// Pretrained model to start from, e.g. bert-base-uncased
    #[arg(long, default_value = "bert-base-uncased")]
    pub model_size: String,

    /// Where train_config.json, metrics.csv and model_best are written
    #[arg(long, default_value = "output")]
    pub output_dir: String,

    /// Token sequences are truncated / padded to this length
    #[arg(long, default_value_t = 128)]
    pub max_seq_length: usize,

    /// Examples per optimizer step, split across accumulation steps
    #[arg(long, default_value_t = 32)]
    pub train_batch_size: usize,

    #[arg(long, default_value_t = 8)]
    pub eval_batch_size: usize,

    /// Peak learning rate, reached at the end of warmup
    #[arg(long, default_value_t = 5e-5)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// Fraction of optimizer steps spent warming up
    #[arg(long, default_value_t = 0.1)]
    pub warmup_proportion: f64,

    /// Forward/backward passes per optimizer step
    #[arg(long, default_value_t = 1)]
    pub gradient_accumulation_steps: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Compute backend: wgpu or ndarray
    #[arg(long, default_value = "wgpu")]
    pub device: String,

    /// Parameter-weighted mean keep rate the plan is balanced to
    #[arg(long, default_value_t = 0.3)]
    pub keep_budget: f64,

    /// JSON file with the trial's pt{i} / pr{i} parameters
    #[arg(long)]
    pub params_file: Option<String>,

    /// JSON-lines file receiving intermediate and final scores
    /// (defaults to <output_dir>/report.jsonl when --params-file is set)
    #[arg(long)]
    pub report_file: Option<String>,

    /// Override the task's output mode: classification or regression
    #[arg(long)]
    pub output_mode: Option<String>,

    /// Background workers preparing batches
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            task:              a.task,
            data_dir:          a.data_dir,
            model_root:        a.model_root,
            model_size:        a.model_size,
            output_dir:        a.output_dir,
            max_seq_length:    a.max_seq_length,
            train_batch_size:  a.train_batch_size,
            eval_batch_size:   a.eval_batch_size,
            learning_rate:     a.learning_rate,
            epochs:            a.epochs,
            warmup_proportion: a.warmup_proportion,
            grad_accum:        a.gradient_accumulation_steps,
            seed:              a.seed,
            device:            a.device,
            keep_budget:       a.keep_budget,
            params_file:       a.params_file,
            report_file:       a.report_file,
            output_mode:       a.output_mode,
            num_workers:       a.num_workers,
        }
    }
}

/// All arguments for the `plan` command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// JSON file with pt{i} / pr{i} parameters; defaults apply when omitted
    #[arg(long)]
    pub params_file: Option<String>,

    #[arg(long, default_value = "models")]
    pub model_root: String,

    #[arg(long, default_value = "bert-base-uncased")]
    pub model_size: String,

    #[arg(long, default_value_t = 0.3)]
    pub keep_budget: f64,
}

impl From<PlanArgs> for PlanConfig {
    fn from(a: PlanArgs) -> Self {
        PlanConfig {
            model_root:  a.model_root,
            model_size:  a.model_size,
            params_file: a.params_file,
            keep_budget: a.keep_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "bert-prune-tune", "train",
            "--task", "rte",
            "--data-dir", "glue/RTE",
            "--gradient-accumulation-steps", "4",
            "--device", "ndarray",
        ])
        .unwrap();

        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.task, "rte");
        assert_eq!(cfg.grad_accum, 4);
        assert_eq!(cfg.max_seq_length, 128);
        assert_eq!(cfg.train_batch_size, 32);
        assert_eq!(cfg.keep_budget, 0.3);
        assert_eq!(cfg.params_file, None);
    }

    #[test]
    fn test_plan_args_defaults() {
        let cli = Cli::try_parse_from(["bert-prune-tune", "plan", "--params-file", "p.json"]).unwrap();

        let Commands::Plan(args) = cli.command else { panic!("expected plan") };
        let cfg: PlanConfig = args.into();
        assert_eq!(cfg.params_file.as_deref(), Some("p.json"));
        assert_eq!(cfg.model_size, "bert-base-uncased");
    }
}
