// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — one pruning-aware fine-tuning trial
//   2. `plan`  — print the balanced prune plan for a parameter file
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PlanArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "bert-prune-tune",
    version = "0.1.0",
    about = "Fine-tune a BERT encoder on GLUE while keeping its weights pruned to a searched plan."
)]
pub struct Cli {
    /// The subcommand to run (train or plan)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => Self::run_train(args),
            Commands::Plan(args)  => Self::run_plan(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting {} trial on data in: {}", args.task, args.data_dir);

        let output_dir = args.output_dir.clone();
        let best = TrainUseCase::new(args.into()).execute()?;

        println!("Training complete. Best score: {best:.4}");
        println!("Artifacts written to '{output_dir}'.");
        Ok(())
    }

    fn run_plan(args: PlanArgs) -> Result<()> {
        use crate::application::plan_use_case::PlanUseCase;

        let table = PlanUseCase::new(args.into()).execute()?;
        print!("{}", table.render());
        Ok(())
    }
}
