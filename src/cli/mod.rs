// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`   — splits a task's episodes and trains a policy
//   2. `predict` — loads a checkpoint and prints an action chunk
//   3. `split`   — prints the file lists a task and seed yield
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, SplitArgs, TrainArgs};

use crate::data::splitter::TaskSplit;

#[derive(Parser, Debug)]
#[command(
    name = "act-chunk",
    version = "0.1.0",
    about = "Train action-chunking imitation policies on recorded robot episodes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case; this layer only prints results.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
            Commands::Split(args)   => run_split(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on episodes in: {}", args.task.dataset_dir);

    // Convert CLI args → application config (separates presentation from domain)
    let use_case = TrainUseCase::new(args.try_into()?);
    use_case.execute()?;

    println!("Training complete. Checkpoints saved.");
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case   = PredictUseCase::new(&args.checkpoint_dir, args.checkpoint_choice())?;
    let prediction = use_case.predict(&args.episode, args.timestep)?;

    println!(
        "Episode {} ({}) at t={}: {} predicted steps",
        args.episode.display(),
        prediction.meta.label(),
        prediction.timestep,
        prediction.actions.len(),
    );
    for (t, row) in prediction.actions.iter().enumerate() {
        println!("{:>4}  {}", t, format_row(row));
    }
    if let Some(raw) = &prediction.raw {
        println!("\nRaw joint units:");
        for (t, row) in raw.iter().enumerate() {
            println!("{:>4}  {}", t, format_row(row));
        }
    }
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<()> {
    use crate::application::train_use_case::plan_split;

    let split = plan_split(&args.task.into())?;

    for (title, list) in [("train", &split.train), ("validation", &split.validation)] {
        println!("{} ({} episodes):", title, list.len());
        for (label, count) in TaskSplit::composition(list) {
            println!("  {label:<20} {count}");
        }
        for ep in list {
            println!("    {}", ep.path.display());
        }
    }
    if split.unused > 0 {
        println!("unused: {} episodes", split.unused);
    }
    Ok(())
}

fn format_row(row: &[f32]) -> String {
    row.iter().map(|v| format!("{v:>8.4}")).collect::<Vec<_>>().join(" ")
}
