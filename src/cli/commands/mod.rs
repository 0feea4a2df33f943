//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod daemon;
mod init;
mod run_job;
mod status;
mod submit;
mod unlock;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, LoadOptions};
use crate::models::{JobName, SearchType};

#[derive(Parser)]
#[command(name = "bookharvest")]
#[command(about = "Incremental keyword-driven book and group catalog scraper")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: discovered by name in the standard config locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config and BOOKHARVEST_DATABASE)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and write a default config file if none exists
    Init,

    /// Submit a keyword search
    Submit {
        /// Keyword to search for
        keyword: String,
        /// What to search for
        #[arg(short = 't', long = "type", value_enum, default_value = "books")]
        search_type: SearchType,
        /// Number of result pages to scrape
        #[arg(short, long, default_value = "1")]
        pages: u32,
        /// Print the acknowledgement as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one job once (waits for its lease, skips if it stays taken)
    Run {
        #[arg(value_enum)]
        job: JobName,
        /// Print the job outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run all jobs on their schedule until interrupted
    Daemon,

    /// Show catalog counts, job leases and recent searches
    Status {
        /// Number of recent search requests to list
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Force a job lease back to completed (after a crashed worker)
    Unlock {
        #[arg(value_enum)]
        job: JobName,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        database: cli.database,
    };
    let config = Config::load(&options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&config, options.config_path.as_deref()),
        Commands::Submit {
            keyword,
            search_type,
            pages,
            json,
        } => submit::cmd_submit(&config, &keyword, search_type, pages, json),
        Commands::Run { job, json } => run_job::cmd_run(config, job, json).await,
        Commands::Daemon => daemon::cmd_daemon(config).await,
        Commands::Status { limit } => status::cmd_status(&config, limit),
        Commands::Unlock { job } => unlock::cmd_unlock(&config, job),
    }
}
