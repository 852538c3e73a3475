//! Kolosal NAS CLI Module
//!
//! Command-line interface for ranking searched architectures and scoring
//! a single candidate.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{load_labeled_csv, LoaderOptions};
use crate::nas::history::DEFAULT_HISTORY_FILE;
use crate::nas::{append_record, parse_actions, rank, read_history, DenseActionBuilder, ManagerConfig, NetworkManager};
use crate::network::Monitor;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-nas")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reward evaluation and ranking for neural architecture search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print searched architectures ranked by score
    Rank {
        /// Path to file to score
        #[arg(short = 'f', long = "file", default_value = DEFAULT_HISTORY_FILE)]
        file: PathBuf,
    },

    /// Train one candidate architecture and report its reward
    Evaluate {
        /// Labelled CSV dataset
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Comma-separated (units, activation) pairs, e.g. "32,relu,16,tanh"
        #[arg(short, long, default_value = "")]
        actions: String,

        /// JSON manager config; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Training epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Checkpoint monitor (val_acc, val_loss, acc, loss)
        #[arg(long)]
        monitor: Option<String>,

        /// Checkpoint file
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Validation fraction
        #[arg(long, default_value = "0.2")]
        val_split: f64,

        /// Random seed for the split, initialization and shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Append the result to this history file
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_rank(file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        println!("Please run a search to generate architectures first !");
        return Ok(());
    }

    let records = rank(read_history(file)?);
    for record in &records {
        println!("{}", record);
    }
    Ok(())
}

/// Settings for [`cmd_evaluate`] collected from the command line
pub struct EvaluateArgs {
    pub data: PathBuf,
    pub target: String,
    pub actions: String,
    pub config: Option<PathBuf>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub monitor: Option<String>,
    pub checkpoint: Option<PathBuf>,
    pub val_split: f64,
    pub seed: Option<u64>,
    pub history: Option<PathBuf>,
}

fn manager_config(args: &EvaluateArgs) -> anyhow::Result<ManagerConfig> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_json_file(path)?,
        None => ManagerConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config = config.with_epochs(epochs);
    }
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(monitor) = &args.monitor {
        config = config.with_monitor(monitor.parse::<Monitor>()?);
    }
    if let Some(checkpoint) = &args.checkpoint {
        config = config.with_checkpoint_path(checkpoint);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    config.validate()?;
    Ok(config)
}

/// Builder seeded from the merged config, so a seed set only in the config file still applies
fn candidate_builder(num_features: usize, num_classes: usize, config: &ManagerConfig) -> DenseActionBuilder {
    let builder = DenseActionBuilder::new(num_features, num_classes);
    match config.seed {
        Some(seed) => builder.with_seed(seed),
        None => builder,
    }
}

pub fn cmd_evaluate(args: &EvaluateArgs) -> anyhow::Result<()> {
    section("Evaluate");

    let config = manager_config(args)?;
    let actions = parse_actions(&args.actions)?;

    step_run("Loading data");
    let start = Instant::now();
    let options = LoaderOptions::default()
        .with_val_split(args.val_split)
        .with_seed(config.seed.or(Some(42)));
    let labeled = load_labeled_csv(&args.data, &args.target, &options)?;
    step_done(&format!(
        "{} train / {} val × {} features, {} classes in {:?}",
        labeled.dataset.x_train.nrows(),
        labeled.dataset.x_val.nrows(),
        labeled.dataset.num_features(),
        labeled.classes.len(),
        start.elapsed()
    ));

    let builder = candidate_builder(labeled.dataset.num_features(), labeled.dataset.num_classes(), &config);

    step_run(&format!("Training for {} epochs", config.epochs));
    let manager = NetworkManager::new(labeled.dataset, config);
    let eval = manager.evaluate_candidate(|a| builder.build(a), &actions)?;
    step_done(&format!("{:.3}s", eval.train_time_secs));

    println!();
    println!("  {:<16} {}", muted("Reward"), format!("{:.4}", eval.reward).white().bold());
    println!("  {:<16} {}", muted("Val loss"), format!("{:.4}", eval.val_loss).white());
    println!("  {:<16} {}", muted("Parameters"), eval.num_params.to_string().white());
    if let Some(epoch) = eval.best_epoch {
        println!("  {:<16} {}", muted("Best epoch"), (epoch + 1).to_string().white());
    }
    println!();

    if let Some(history) = &args.history {
        append_record(history, eval.reward, &actions)?;
        println!("  {} appended to {}", ok("✓"), history.display());
        println!();
    }

    Ok(())
}
