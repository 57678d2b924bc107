//! Outbox CLI
//!
//! Command-line tools for inspecting and maintaining persisted Outbox
//! queue files.
//!
//! # Commands
//!
//! - `status` - Summarize a queue file by operation status
//! - `list` - List queued operations
//! - `prune` - Remove completed and cancelled operations
//! - `clear` - Empty the queue file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Outbox queue file maintenance tools.
#[derive(Parser)]
#[command(name = "outbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the queue file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a queue file by operation status
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List queued operations
    List {
        /// Only show operations with this status
        /// (pending, syncing, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove completed and cancelled operations
    Prune,

    /// Empty the queue file
    Clear,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.path.ok_or("Queue file path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::List { status, format } => {
            let path = cli.path.ok_or("Queue file path required for list")?;
            commands::list::run(&path, status.as_deref(), &format)?;
        }
        Commands::Prune => {
            let path = cli.path.ok_or("Queue file path required for prune")?;
            commands::prune::run(&path)?;
        }
        Commands::Clear => {
            let path = cli.path.ok_or("Queue file path required for clear")?;
            commands::clear::run(&path)?;
        }
        Commands::Version => {
            println!("Outbox CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
