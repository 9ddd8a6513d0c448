//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod cache;
pub mod context;
pub mod fetch;
pub mod push;
pub mod register;
pub mod sweep;
pub mod version;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

/// swcache - offline caching controller for a progressive web app origin
#[derive(Parser, Debug)]
#[command(name = "swcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "SWCACHE_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "SWCACHE_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Origin the controlled pages are served from
    #[arg(long, global = true, env = "SWCACHE_ORIGIN", hide_env = true)]
    pub origin: Option<String>,

    /// Cache version tag of the deployment
    #[arg(long, global = true, env = "SWCACHE_VERSION", hide_env = true)]
    pub cache_version: Option<String>,

    /// Directory holding the cache database
    #[arg(long, global = true, env = "SWCACHE_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, env = "SWCACHE_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the configured version and take control
    Register {
        /// Activate right away even when the config asks to wait
        #[arg(long)]
        skip_waiting: bool,
    },

    /// Run one request through the offline caching policy
    Fetch {
        /// Absolute URL or path relative to the origin
        target: String,

        /// Accept header sent with the request
        #[arg(long)]
        accept: Option<String>,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
    },

    /// Delete dynamic entries past the retention window
    Sweep,

    /// Sweep periodically until interrupted
    Watch,

    /// Show the notification a push message would display
    Push {
        /// Push payload text
        #[arg(long)]
        body: Option<String>,

        /// Click the notification, optionally on an action button
        #[arg(long, value_name = "ACTION", num_args = 0..=1, default_missing_value = "")]
        click: Option<String>,
    },

    /// Display version information
    Version,

    /// Manage the local cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show partitions and their sizes
    Status,
    /// Delete every partition
    Clear,
    /// Print cache directory path
    Path,
}
