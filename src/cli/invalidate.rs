//! Invalidate command

use colored::Colorize;

use crate::cache::DataCache;
use crate::cli::args::GlobalOptions;
use crate::cli::context::open_cache;
use crate::cli::{InvalidateArgs, OutputFormat};
use crate::config::Config;
use crate::error::Result;

/// Run the invalidate command
pub fn run(opts: &GlobalOptions, args: &InvalidateArgs) -> Result<()> {
    let path = Config::resolve_path(opts.config_ref())?;
    let config = Config::load_or_default(&path)?;
    let cache = open_cache(opts, &config.cache);

    let (selector, removed) = invalidate(&cache, args);

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "selector": selector,
                "entries_removed": removed,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if removed > 0 {
                println!("{} Invalidated {} entries ({})", "✓".green(), removed, selector);
            } else {
                println!("No cached entries matched {}", selector);
            }
        }
    }
    Ok(())
}

/// Apply the selected invalidation; returns a description and the number of
/// entries removed
pub fn invalidate(cache: &DataCache, args: &InvalidateArgs) -> (String, usize) {
    if let Some(ref key) = args.key {
        let removed = usize::from(cache.invalidate_key(key));
        (format!("key {}", key), removed)
    } else if let Some(ref pattern) = args.pattern {
        (
            format!("pattern {}", pattern),
            cache.invalidate_pattern(pattern),
        )
    } else if let Some(ref keys) = args.keys {
        (
            format!("{} keys", keys.len()),
            cache.invalidate_multiple(keys),
        )
    } else if let Some(resource) = args.resource {
        (
            format!("resource {}", resource),
            cache.invalidate_pattern(resource.key_prefix()),
        )
    } else {
        ("nothing".to_string(), 0)
    }
}
