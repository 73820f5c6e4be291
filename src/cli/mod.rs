//! Command-line interface.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::SourceType;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Course catalog aggregation: scrape, queue, normalize, ingest")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

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
    /// Scrape a source right now, without the queue
    Scrape {
        /// Source to scrape: coursera, futurelearn, open-university
        source: SourceType,
        /// Listing URL to start from (overrides the source default)
        #[arg(long)]
        url: Option<String>,
        /// Search query for search-driven platforms
        #[arg(short, long)]
        query: Option<String>,
        /// Cap on detail pages for this run
        #[arg(short, long)]
        limit: Option<usize>,
        /// Save a screenshot of the listing page to this file, then exit
        #[arg(long)]
        screenshot: Option<PathBuf>,
        /// Use plain HTTP instead of the browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Add a scrape job to the queue
    Enqueue {
        /// Source to scrape: coursera, futurelearn, open-university
        source: SourceType,
        /// Listing URL to start from
        #[arg(long)]
        url: Option<String>,
        /// Search query for search-driven platforms
        #[arg(short, long)]
        query: Option<String>,
        /// Cap on detail pages for the job
        #[arg(short, long)]
        limit: Option<usize>,
        /// Higher runs first
        #[arg(short, long, default_value = "0")]
        priority: i32,
        /// Delay dispatch by this many seconds
        #[arg(short, long, default_value = "0")]
        delay: u64,
    },

    /// Run the worker pool against the queue
    Worker {
        /// Number of concurrent workers (overrides config)
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Also run the cron scheduler for periodic sweeps
        #[arg(long)]
        with_scheduler: bool,
        /// Drain the queue and exit instead of polling forever
        #[arg(long)]
        drain: bool,
        /// Use plain HTTP instead of the browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Inspect and manage the job queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Show catalog and queue status
    Status,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Show per-state job counts
    Stats,
    /// List jobs
    List {
        /// Filter by state: waiting, active, completed, failed
        #[arg(short, long)]
        state: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Stop dispatching jobs (running jobs finish)
    Pause,
    /// Resume dispatching jobs
    Resume,
    /// Put every failed job back in the queue
    RetryFailed,
    /// Delete old finished jobs
    Clean,
    /// Remove one job by id
    Remove { id: String },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = crate::config::Settings::load(cli.data_dir.clone());
    settings.ensure_directories()?;

    match cli.command {
        Commands::Scrape {
            source,
            url,
            query,
            limit,
            screenshot,
            no_browser,
        } => {
            commands::scrape::run(&settings, source, url, query, limit, screenshot, no_browser)
                .await
        }
        Commands::Enqueue {
            source,
            url,
            query,
            limit,
            priority,
            delay,
        } => commands::queue_cmd::enqueue(&settings, source, url, query, limit, priority, delay),
        Commands::Worker {
            concurrency,
            with_scheduler,
            drain,
            no_browser,
        } => {
            commands::worker::run(&settings, concurrency, with_scheduler, drain, no_browser).await
        }
        Commands::Queue { command } => match command {
            QueueCommands::Stats => commands::queue_cmd::stats(&settings),
            QueueCommands::List { state, limit } => {
                commands::queue_cmd::list(&settings, state, limit)
            }
            QueueCommands::Pause => commands::queue_cmd::pause(&settings),
            QueueCommands::Resume => commands::queue_cmd::resume(&settings),
            QueueCommands::RetryFailed => commands::queue_cmd::retry_failed(&settings),
            QueueCommands::Clean => commands::queue_cmd::clean(&settings),
            QueueCommands::Remove { id } => commands::queue_cmd::remove(&settings, &id),
        },
        Commands::Status => commands::status::run(&settings).await,
    }
}
