use crate::hooks::HookEvent;
use clap::{Parser, Subcommand};

mod handlers;

pub use handlers::run_command;

/// `infinite-context` - persistent conversational memory for coding-assistant
/// sessions.
#[derive(Parser, Debug)]
#[command(name = "infinite-context")]
#[command(version)]
#[command(about = "Archive, rank, and restore coding-assistant context.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the lifecycle hooks in the host settings file
    Install,

    /// Remove the registered hooks, leaving unrelated entries untouched
    Uninstall,

    /// Show store totals and on-disk locations
    Status,

    /// Full-text search over archived memories
    Search {
        /// Keywords joined into a single query
        keywords: Vec<String>,

        /// Restrict results to one project path
        #[arg(long)]
        project: Option<String>,
    },

    /// Dump memories as JSON to stdout
    Export {
        /// Restrict the dump to one project path
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete low-value memories
    Prune {
        /// Delete untouched memories older than this many days
        #[arg(long)]
        older_than: Option<f64>,

        /// Delete memories scoring below this threshold
        #[arg(long)]
        below_score: Option<f64>,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Serve the JSON dashboard API
    Dashboard {
        /// Port to listen on
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },

    /// Print the effective configuration
    Config,

    /// Run one lifecycle hook (invoked by the host, reads JSON on stdin)
    Hook {
        #[arg(value_enum)]
        event: HookEvent,
    },
}
