//! Cache management commands

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use crate::cache::{DataCache, PersistentStore, SqliteStore};
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::cli::context::open_cache;
use crate::config::{CacheSettings, Config};
use crate::error::Result;
use crate::output::formatters::{format_age, format_epoch_millis, format_size};
use crate::output::json::format_json;
use crate::output::table::format_table;

/// Open the cache the data commands would use, honoring config and overrides
fn open(opts: &GlobalOptions) -> Result<(DataCache, CacheSettings)> {
    let path = Config::resolve_path(opts.config_ref())?;
    let settings = Config::load_or_default(&path)?.cache;
    Ok((open_cache(opts, &settings), settings))
}

/// Directory holding the cache database
pub fn cache_path(opts: &GlobalOptions) -> Result<PathBuf> {
    match opts.cache_dir_ref() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(SqliteStore::cache_dir()?),
    }
}

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let (cache, settings) = open(opts)?;
    let path = cache_path(opts)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    println!(
        "{}",
        status_report(&cache, settings.expiration(), &path, opts.format)?
    );
    Ok(())
}

pub fn status_report(
    cache: &DataCache,
    ttl: Duration,
    path: &str,
    format: OutputFormat,
) -> Result<String> {
    let stats = cache.stats(ttl);

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "enabled": cache.store().is_enabled(),
            "total_entries": stats.total_entries,
            "valid_entries": stats.valid_entries,
            "expired_entries": stats.expired_entries,
            "error_entries": stats.error_entries,
            "unreadable_entries": stats.unreadable_entries,
            "total_size_bytes": stats.total_size_bytes,
            "total_size_human": format_size(stats.total_size_bytes),
            "oldest_entry_timestamp": stats.oldest_entry,
            "newest_entry_timestamp": stats.newest_entry,
            "path": path,
        });
        return Ok(serde_json::to_string_pretty(&json)?);
    }

    let mut lines = vec![
        "Cache Status".to_string(),
        "────────────────────────────────────────".to_string(),
        format!("Location:       {}", path),
    ];
    if !cache.store().is_enabled() {
        lines.push("Enabled:        no".to_string());
    }
    lines.push(format!("Valid entries:  {}", stats.valid_entries));
    lines.push(format!("Expired:        {}", stats.expired_entries));
    if stats.error_entries > 0 {
        lines.push(format!("Failed fetches: {}", stats.error_entries));
    }
    if stats.unreadable_entries > 0 {
        lines.push(format!("Unreadable:     {}", stats.unreadable_entries));
    }
    lines.push(format!(
        "Total size:     {}",
        format_size(stats.total_size_bytes)
    ));
    if let Some(oldest) = stats.oldest_entry {
        lines.push(format!("Oldest entry:   {}", format_epoch_millis(oldest)));
    }
    if let Some(newest) = stats.newest_entry {
        lines.push(format!("Newest entry:   {}", format_epoch_millis(newest)));
    }

    Ok(lines.join("\n"))
}

/// Clear all cache entries
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let (cache, _) = open(opts)?;
    let removed = cache.clear();

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if removed > 0 {
                println!("Cleared {} cache entries", removed);
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", cache_path(opts)?.display());
    Ok(())
}

/// One cached key as listed by `cache keys`
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct KeyRow {
    #[tabled(rename = "KEY")]
    pub key: String,
    #[tabled(rename = "STATE")]
    pub state: String,
    #[tabled(rename = "AGE")]
    pub age: String,
    #[tabled(rename = "SIZE")]
    pub size: String,
}

/// Describe every stored entry
pub fn key_rows(cache: &DataCache, ttl: Duration) -> Vec<KeyRow> {
    let now = cache.now_millis();
    let store = cache.store();

    store
        .keys()
        .into_iter()
        .map(|key| match store.read_stored(&key) {
            Some(stored) => {
                let header = stored.header();
                let state = if stored.is_error {
                    "error"
                } else if cache.staleness().is_valid(&header, ttl, now) {
                    "fresh"
                } else {
                    "expired"
                };
                KeyRow {
                    key,
                    state: state.to_string(),
                    age: format_age(header.age_millis(now)),
                    size: format_size(PersistentStore::estimate_size(&stored)),
                }
            }
            None => KeyRow {
                key,
                state: "unreadable".to_string(),
                age: "-".to_string(),
                size: "-".to_string(),
            },
        })
        .collect()
}

/// List cached keys
pub fn keys(opts: &GlobalOptions) -> Result<()> {
    let (cache, settings) = open(opts)?;
    let rows = key_rows(&cache, settings.expiration());

    match opts.format {
        OutputFormat::Json => println!("{}", format_json(&rows)?),
        _ => println!("{}", format_table(&rows)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::StoredEntry;
    use crate::cache::{MemoryStore, PersistentStore};
    use crate::cache::policy::ManualClock;
    use std::sync::Arc;

    fn cache_at(now: i64) -> DataCache {
        DataCache::new(PersistentStore::new(Arc::new(MemoryStore::new())))
            .with_clock(Arc::new(ManualClock::new(now)))
    }

    #[test]
    fn test_key_rows_classify_entries() {
        let now = 1_000_000;
        let cache = cache_at(now);
        let store = cache.store();
        store.write_stored(&StoredEntry::success(
            "batches_page_1_20",
            b"[]",
            "h".to_string(),
            now - 1_000,
        ));
        store.write_stored(&StoredEntry::success(
            "loans_page_1_20",
            b"[]",
            "h".to_string(),
            now - 600_000,
        ));
        store.write_stored(&StoredEntry::failure("roles_page_1_20", None, now));

        let rows = key_rows(&cache, Duration::from_secs(300));
        let state = |key: &str| {
            rows.iter()
                .find(|r| r.key == key)
                .map(|r| r.state.clone())
                .unwrap()
        };

        assert_eq!(rows.len(), 3);
        assert_eq!(state("batches_page_1_20"), "fresh");
        assert_eq!(state("loans_page_1_20"), "expired");
        assert_eq!(state("roles_page_1_20"), "error");
    }

    #[test]
    fn test_status_report_json() {
        let cache = cache_at(5_000);
        cache.store().write_stored(&StoredEntry::success(
            "batches_page_1_20",
            b"[]",
            "h".to_string(),
            4_000,
        ));

        let out = status_report(
            &cache,
            Duration::from_secs(300),
            "/tmp/cache",
            OutputFormat::Json,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(json["total_entries"], 1);
        assert_eq!(json["valid_entries"], 1);
        assert_eq!(json["path"], "/tmp/cache");
        assert_eq!(json["enabled"], true);
    }

    #[test]
    fn test_status_report_disabled_cache() {
        let cache = DataCache::new(PersistentStore::disabled());
        let out = status_report(&cache, Duration::from_secs(300), "-", OutputFormat::Table)
            .unwrap();
        assert!(out.contains("Enabled:        no"));
        assert!(out.contains("Valid entries:  0"));
    }

    #[test]
    fn test_cache_path_override() {
        let opts = GlobalOptions {
            cache_dir: Some(PathBuf::from("/tmp/stockcache-test")),
            ..GlobalOptions::default()
        };
        assert_eq!(
            cache_path(&opts).unwrap(),
            PathBuf::from("/tmp/stockcache-test")
        );
    }
}
