//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, device::DeviceCommands, export::ExportArgs,
    index::IndexCommands, init::InitArgs, validate::ValidateArgs, wp::WpArgs,
};

#[derive(Parser)]
#[command(name = "tdb")]
#[command(author, version, about = "Transistor characterization toolkit")]
#[command(
    long_about = "Store power semiconductor datasheet curves as plain text files and \
                  evaluate losses and characteristics at arbitrary working points."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (repeat for debug logging)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Project root (default: auto-detect by finding .tdb/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new device database
    Init(InitArgs),

    /// Device management (list, show, import)
    #[command(subcommand)]
    Device(DeviceCommands),

    /// Evaluate quantities of a device at one working point
    Wp(WpArgs),

    /// Export quantities over a list of working points
    Export(ExportArgs),

    /// Validate device files against the schema
    Validate(ValidateArgs),

    /// Manage the device index
    #[command(subcommand)]
    Index(IndexCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (pretty for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
