//! Command-line interface, clap-based.
//!
//! Defines the [`Cli`] struct with the [`Command`] subcommands (serve,
//! watch) and global flags (--config, --verbose).

use clap::{Parser, Subcommand};

use crate::ranking::SortMode;

/// topicwatch — status proxy and result watcher for topic analysis jobs.
#[derive(Debug, Parser)]
#[command(name = "topicwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "topicwatch.toml")]
    pub config: String,

    /// Enable verbose logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the task-status proxy server.
    Serve {
        /// Address to bind (host:port); overrides the configured value.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Poll a job until its results are ready and print them.
    Watch {
        /// Job identifier returned by the submission pipeline.
        job_id: String,

        /// Base URL of a running proxy instance.
        #[arg(long, default_value = "http://127.0.0.1:8787")]
        proxy: String,

        /// Milliseconds between poll attempts; overrides the configured value.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Consecutive failures tolerated before giving up; overrides the
        /// configured value.
        #[arg(long)]
        max_errors: Option<u32>,

        /// Ordering for the printed results.
        #[arg(long, value_enum, default_value_t = SortMode::ScoreDesc)]
        sort: SortMode,
    },
}
