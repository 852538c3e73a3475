//! Kolosal NAS - Main Entry Point
//!
//! Scores candidate architectures and ranks search history.

use clap::Parser;
use kolosal_nas::cli::{cmd_evaluate, cmd_rank, Cli, Commands, EvaluateArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_nas=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank { file } => {
            cmd_rank(&file)?;
        }
        Commands::Evaluate {
            data,
            target,
            actions,
            config,
            epochs,
            batch_size,
            monitor,
            checkpoint,
            val_split,
            seed,
            history,
        } => {
            cmd_evaluate(&EvaluateArgs {
                data,
                target,
                actions,
                config,
                epochs,
                batch_size,
                monitor,
                checkpoint,
                val_split,
                seed,
                history,
            })?;
        }
    }

    Ok(())
}
