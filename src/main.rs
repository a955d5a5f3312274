//! stockcache CLI - invalidation-aware response cache for the Stockroom API

use clap::Parser;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod output;

use cli::args::GlobalOptions;
use cli::{CacheCommands, Cli, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init { token } => cli::init::run(&opts, token),
        Commands::Status => cli::status::run(&opts),
        Commands::Get {
            resource,
            list,
            refresh,
            ttl,
            no_retry,
        } => {
            let fetch = cli::get::FetchOptions {
                refresh,
                ttl,
                retry: !no_retry,
            };
            cli::get::run(&opts, resource, &list, fetch).await
        }
        Commands::Watch {
            resource,
            list,
            interval,
            probe_secs,
        } => cli::watch::run(&opts, resource, &list, interval, probe_secs).await,
        Commands::Invalidate(args) => cli::invalidate::run(&opts, &args),
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
            CacheCommands::Keys => cli::cache::keys(&opts),
        },
    }
}

/// Warnings by default, crate debug output with `--debug`; `RUST_LOG` wins
fn init_logging(debug: bool) {
    let default_filter = if debug { "stockcache=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}
