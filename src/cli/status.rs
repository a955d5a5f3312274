//! Status command implementation

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::cli::cache::cache_path;
use crate::cli::context::open_cache;
use crate::config::Config;
use crate::error::Result;

/// Run the status command to display configuration and cache status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "stockcache Configuration Status".bold());

    let config_path = Config::resolve_path(opts.config_ref())?;
    let settings = match Config::load_at(&config_path) {
        Ok(config) => {
            println!("Config file: {}", config_path.display().to_string().cyan());
            println!();

            match opts.api_url.as_ref().or(config.api_url.as_ref()) {
                Some(url) => println!("{} API URL: {}", "✓".green(), url),
                None => {
                    println!("{} API URL not configured", "✗".red());
                    println!("  → Run 'stockcache init' to configure");
                }
            }

            if config.api_token.is_some() {
                println!("{} API token configured", "✓".green());
            } else {
                println!("{} No API token (requests are unauthenticated)", "○".dimmed());
            }

            match opts.tenant.as_ref().or(config.tenant_id.as_ref()) {
                Some(tenant) => println!("{} Tenant: {}", "✓".green(), tenant),
                None => println!("{} No tenant set", "○".dimmed()),
            }

            config.cache
        }
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!(
                "Run {} to create a configuration file.",
                "stockcache init".cyan()
            );
            Default::default()
        }
    };

    println!();
    let cache = open_cache(opts, &settings);
    if cache.store().is_enabled() {
        let stats = cache.stats(settings.expiration());
        let location = cache_path(opts)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        println!("{} Cache: {}", "✓".green(), location.cyan());
        println!(
            "  {} entries, {} fresh (TTL {}s)",
            stats.total_entries, stats.valid_entries, settings.expiration_secs
        );
    } else {
        println!("{} Cache disabled", "○".dimmed());
    }
    println!();

    Ok(())
}
