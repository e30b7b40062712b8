//! CLI parse: clap types for Strata. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Strata CLI - feature-oriented configuration management
#[derive(Debug, Parser)]
#[command(name = "strata", version)]
#[command(about = "Commit variants by feature configuration and compose new ones")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Shorthand for --log-level debug
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path, used with --log-output file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Commit a directory as the variant of a configuration, e.g. "A.1, B, -C"
    Commit {
        configuration: String,
        /// Commit message
        #[arg(long, short)]
        message: Option<String>,
        /// Directory to read (defaults to the workspace root)
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Compose a configuration and write it to a directory
    Checkout {
        configuration: String,
        /// Output directory; must be empty unless --force is given
        #[arg(long, short)]
        output: PathBuf,
        /// Build the whole tree up front instead of resolving it lazily
        #[arg(long)]
        eager: bool,
        /// Write into a non-empty output directory
        #[arg(long)]
        force: bool,
    },
    /// List features and their revisions
    Features,
    /// List associations with their simplified conditions
    Associations,
    /// List modules with observation counts
    Modules,
    /// Show the commit log
    Log,
    /// Write a copy without the given feature revisions to another store
    Subset {
        /// Revisions to remove, e.g. "B.1"; a bare feature means its first revision
        revisions: Vec<String>,
        /// Lower module order bound for the result
        #[arg(long)]
        max_order: Option<usize>,
        /// Store directory of the result
        #[arg(long)]
        target: PathBuf,
    },
    /// Absorb the repository stored at another store directory
    Merge { source: PathBuf },
    /// Merge associations with equal conditions
    Consolidate,
    /// Summarize the repository
    Status,
}
