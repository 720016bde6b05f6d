//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use review_guard_adapters::results::OutputFormat;
use std::path::PathBuf;

/// review-guard: flag advertisements, irrelevant content and rants in location reviews
#[derive(Parser, Debug)]
#[command(name = "review-guard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a single review
    Classify(ClassifyArgs),

    /// Classify every review in a dataset file
    Batch(BatchArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Review text to classify
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// File containing the review text (use - for stdin)
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Attached photo: local path or http(s) URL
    #[arg(long)]
    pub image: Option<String>,

    /// Name of the reviewed place
    #[arg(long)]
    pub place_name: Option<String>,

    /// Business category of the place
    #[arg(long)]
    pub place_category: Option<String>,

    /// Star rating given by the reviewer
    #[arg(long)]
    pub rating: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Dataset of reviews (.json array or .jsonl)
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write the results
    #[arg(long)]
    pub output: PathBuf,

    /// Output format (defaults to batch.output_format)
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Override batch.max_concurrent
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
