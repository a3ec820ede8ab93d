//! Tidemark CLI - versioned SQL migrations from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{bootstrap, logs, migrate, status, validate};

/// Tidemark - apply versioned SQL migrations to DuckDB
#[derive(Parser)]
#[command(name = "tidemark", version, about, long_about = None)]
struct Cli {
    /// Project directory holding tidemark.json and migrations/
    #[arg(long, global = true, env = "TIDEMARK_DIR")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Migrate {
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show applied and pending migrations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify checksums and list pending migrations without applying them
    Validate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the migration history table
    Bootstrap {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the run event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let project_dir = commands::get_project_dir(cli.project_dir)?;

    match cli.command {
        Commands::Migrate { json } => migrate::run(project_dir, json),
        Commands::Status { json } => status::run(&project_dir, json),
        Commands::Validate { json } => validate::run(&project_dir, json),
        Commands::Bootstrap { json } => bootstrap::run(&project_dir, json),
        Commands::Logs { command } => logs::run(&project_dir, command),
    }
}
