//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::client::Resource;

pub mod args;
pub mod cache;
pub mod context;
pub mod get;
pub mod init;
pub mod invalidate;
pub mod status;
pub mod watch;

pub use args::{ListArgs, OutputFormat};

/// stockcache - cached, invalidation-aware access to the Stockroom API
#[derive(Parser, Debug)]
#[command(name = "stockcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "STOCKCACHE_FORMAT",
        default_value = "table",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "STOCKCACHE_CONFIG", hide_env = true)]
    pub config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true, env = "STOCKCACHE_API_URL", hide_env = true)]
    pub api_url: Option<String>,

    /// Override the tenant
    #[arg(long, global = true, env = "STOCKCACHE_TENANT", hide_env = true)]
    pub tenant: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "STOCKCACHE_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Run without the persistent cache
    #[arg(long, global = true, env = "STOCKCACHE_NO_CACHE", hide_env = true)]
    pub no_cache: bool,

    /// Override the cache directory
    #[arg(long, global = true, env = "STOCKCACHE_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the configuration file
    Init {
        /// API token (prompted for when omitted)
        #[arg(long, env = "STOCKCACHE_API_TOKEN", hide_env = true)]
        token: Option<String>,
    },

    /// Show configuration and cache status
    Status,

    /// Fetch one page of a resource, served from cache while fresh
    #[command(after_help = "\
Examples:
  stockcache get batches
  stockcache get inventory --page 2 --per-page 50 --filter warehouse=main
  stockcache get loans --refresh --format json")]
    Get {
        /// Resource to list
        #[arg(value_enum)]
        resource: Resource,

        #[command(flatten)]
        list: ListArgs,

        /// Ignore any cached copy and fetch now
        #[arg(long)]
        refresh: bool,

        /// Cache lifetime in seconds (defaults to cache.expiration_secs)
        #[arg(long)]
        ttl: Option<u64>,

        /// Fail on the first error instead of retrying transient failures
        #[arg(long)]
        no_retry: bool,
    },

    /// Keep a resource page fresh, printing it whenever it changes
    Watch {
        /// Resource to watch
        #[arg(value_enum)]
        resource: Resource,

        #[command(flatten)]
        list: ListArgs,

        /// Auto-refresh check interval in seconds (defaults to cache.auto_refresh_interval_secs)
        #[arg(long)]
        interval: Option<u64>,

        /// Seconds between connectivity probes
        #[arg(long, default_value_t = 15)]
        probe_secs: u64,
    },

    /// Drop cached entries so the next read fetches fresh data
    Invalidate(InvalidateArgs),

    /// Manage the local response cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// What to invalidate; exactly one selector is required
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct InvalidateArgs {
    /// A single cache key, e.g. batches_page_1_20
    #[arg(long)]
    pub key: Option<String>,

    /// Every key containing this text
    #[arg(long)]
    pub pattern: Option<String>,

    /// Several exact keys, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub keys: Option<Vec<String>>,

    /// Every cached page of a resource
    #[arg(long, value_enum)]
    pub resource: Option<Resource>,
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,
    /// Clear all cached data
    Clear,
    /// Print cache directory path
    Path,
    /// List cached keys
    Keys,
}
