use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::completions::CompletionCommands;
use crate::package::Category;
use crate::ui::OutputFormat;

/// Install, roll back and safely remove developer runtimes
#[derive(Parser, Debug)]
#[command(name = "stackctl", author, version, about, long_about = None)]
pub struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use this config file instead of ~/.config/stackctl/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory containing the install scripts
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install packages and their dependencies
    Install {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,
        /// Version to install (single package only)
        #[arg(long)]
        version: Option<String>,
        /// Install packages concurrently
        #[arg(short, long)]
        parallel: bool,
        /// Kill an install script after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Detect how packages were installed and remove them
    Remove {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,
        /// Remove host-critical packages and skip the confirmation warning
        #[arg(short, long)]
        force: bool,
        /// Show what would be removed without removing anything
        #[arg(long)]
        dry_run: bool,
        /// Remove packages concurrently
        #[arg(short, long)]
        parallel: bool,
    },

    /// List the package catalog with installation state
    List {
        /// Only show one category
        #[arg(long, value_enum)]
        category: Option<Category>,
    },

    /// Show installation state of a package
    Status {
        /// Package name
        package: String,
    },

    /// Print the order packages would be installed in
    Order {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Verify catalog integrity (cycles, script paths)
    Check,

    /// Remove rollback points left behind by interrupted runs
    Cleanup {
        /// Only remove points older than this (defaults to the configured age)
        #[arg(long, value_name = "HOURS")]
        max_age_hours: Option<u64>,
    },

    /// Shell completion helpers
    Completions {
        #[command(subcommand)]
        command: CompletionCommands,
    },
}

/// The clap command tree, used for completion generation
pub fn command() -> clap::Command {
    Cli::command()
}
