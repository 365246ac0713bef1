//! Command-line surface (component N): argument parsing via `clap`, plus
//! the `tracing_init` submodule wiring structured logging to the CLI's
//! verbosity flags.

pub mod tracing_init;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Runs declarative HTTP API collections against live servers",
    long_about = "Loads a collection of folders and requests, resolves layered\n\
                  variables and inherited auth, and executes it sequentially or in\n\
                  parallel against a target environment.\n\n\
                  Examples:\n  \
                  runner run collection.json --environment staging\n  \
                  runner run collection.json --folder Users --parallel\n  \
                  runner validate collection.json\n  \
                  runner config set-url collection.json staging https://staging.example.com"
)]
pub struct Cli {
    /// Output all errors as structured JSON to stderr
    #[arg(long, global = true, help = "Output errors in JSON format")]
    pub json_errors: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a collection (or one folder within it) against a target environment
    #[command(long_about = "Executes every request in the collection depth-first, \n\
                      or scopes the run to a single folder with --folder.\n\n\
                      Examples:\n  \
                      runner run collection.json --environment staging\n  \
                      runner run collection.json --parallel --max-parallelism 4\n  \
                      runner run collection.json --folder Users --stop-on-error")]
    Run {
        /// Path to the collection file (JSON)
        collection_file: String,
        /// Named environment to layer over collection/global variables
        #[arg(long, value_name = "NAME")]
        environment: Option<String>,
        /// Run requests concurrently instead of depth-first sequentially
        #[arg(long)]
        parallel: bool,
        /// Maximum requests in flight when --parallel is set (soft cap 64)
        #[arg(long, value_name = "N", default_value_t = 8)]
        max_parallelism: usize,
        /// Stop the run at the first failed request
        #[arg(long)]
        stop_on_error: bool,
        /// Fail on any undefined variable reference instead of leaving it in place
        #[arg(long)]
        strict_variables: bool,
        /// Fail the request on a prerequest/test hook error instead of recording a diagnostic
        #[arg(long)]
        strict_hooks: bool,
        /// Per-request timeout in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        timeout_ms: u64,
        /// Restrict the run to the named folder
        #[arg(long, value_name = "NAME")]
        folder: Option<String>,
        /// Emit the run result as JSON instead of a human-readable summary
        #[arg(long)]
        json: bool,
    },
    /// Validate a collection file without executing it
    Validate {
        /// Path to the collection file (JSON)
        collection_file: String,
    },
    /// Manage per-environment configuration (base URL overrides, secrets)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Set the base URL override for a collection under an environment
    SetUrl {
        /// Name identifying the collection (typically its file stem)
        collection_name: String,
        /// Environment name (e.g. staging, prod)
        environment: String,
        /// The base URL to use for this collection/environment pair
        url: String,
    },
    /// Get the base URL override for a collection under an environment
    GetUrl {
        /// Name identifying the collection
        collection_name: String,
        /// Environment name
        environment: String,
    },
}
