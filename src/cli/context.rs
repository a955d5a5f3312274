//! Command execution context
//!
//! Loads configuration, applies CLI overrides, and builds the API client and
//! response cache every data command needs.

use std::sync::Arc;

use log::warn;

use crate::cache::{DataCache, JsonCodec, PersistentStore, Query, QueryOptions, SqliteStore};
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::client::{ListParams, Page, Resource, ResourceApi, RestClient};
use crate::config::{CacheSettings, Config};
use crate::error::{FetchError, Result};

/// Context for command execution containing config, API client and cache.
pub struct CommandContext {
    /// Configuration with CLI overrides applied
    pub config: Config,
    /// API client (Arc-wrapped so producers can own a handle)
    pub api: Arc<dyn ResourceApi>,
    /// Response cache
    pub cache: DataCache,
    /// Output format preference
    pub format: OutputFormat,
}

impl CommandContext {
    /// Build a context from the config file and global options.
    ///
    /// A missing config file is fine when `--api-url` is given.
    pub async fn new(opts: &GlobalOptions) -> Result<Self> {
        let path = Config::resolve_path(opts.config_ref())?;
        let mut config = if opts.api_url.is_some() {
            Config::load_or_default(&path)?
        } else {
            Config::load_at(&path)?
        };
        apply_overrides(&mut config, opts);
        config.validate()?;

        let api = RestClient::new(
            config.require_api_url()?,
            config.api_token.clone(),
            config.tenant_id.clone(),
        )?;
        let cache = open_cache(opts, &config.cache);

        Ok(Self::with_parts(config, Arc::new(api), cache, opts.format))
    }

    /// Assemble a context from already-built parts
    pub fn with_parts(
        config: Config,
        api: Arc<dyn ResourceApi>,
        cache: DataCache,
        format: OutputFormat,
    ) -> Self {
        Self {
            config,
            api,
            cache,
            format,
        }
    }

    pub fn tenant(&self) -> Option<&str> {
        self.config.tenant_id.as_deref()
    }

    /// Cached query for one page of `resource`
    pub fn resource_query(
        &self,
        resource: Resource,
        params: ListParams,
        options: QueryOptions<Page>,
    ) -> Query<Page> {
        let key = params.cache_key(resource, self.tenant());
        let api = Arc::clone(&self.api);

        self.cache.query(
            key,
            JsonCodec,
            move || {
                let api = Arc::clone(&api);
                let params = params.clone();
                async move { api.list(resource, &params).await.map_err(FetchError::from) }
            },
            options,
        )
    }
}

fn apply_overrides(config: &mut Config, opts: &GlobalOptions) {
    if let Some(ref url) = opts.api_url {
        config.api_url = Some(url.clone());
    }
    if let Some(ref tenant) = opts.tenant {
        config.tenant_id = Some(tenant.clone());
    }
}

/// Open the persistent cache, degrading to a no-op cache when disabled or
/// when no store can be opened.
pub fn open_cache(opts: &GlobalOptions, settings: &CacheSettings) -> DataCache {
    let store = if opts.no_cache {
        PersistentStore::disabled()
    } else {
        let opened = match opts.cache_dir_ref() {
            Some(dir) => SqliteStore::open_at(dir, settings.quota_bytes),
            None => SqliteStore::open(settings.quota_bytes),
        };
        match opened {
            Ok(store) => PersistentStore::new(Arc::new(store)),
            Err(e) => {
                warn!("Cache unavailable, continuing without it: {}", e);
                PersistentStore::disabled()
            }
        }
    };

    DataCache::new(store.with_max_entry_bytes(settings.max_entry_bytes))
        .with_staleness(settings.staleness())
        .with_retry(settings.retry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockResourceApi;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_no_cache_disables_store() {
        let opts = GlobalOptions {
            no_cache: true,
            ..GlobalOptions::default()
        };
        let cache = open_cache(&opts, &CacheSettings::default());
        assert!(!cache.store().is_enabled());
    }

    #[test]
    fn test_cache_dir_override() {
        let dir = tempdir().unwrap();
        let opts = GlobalOptions {
            cache_dir: Some(dir.path().to_path_buf()),
            ..GlobalOptions::default()
        };
        let cache = open_cache(&opts, &CacheSettings::default());
        assert!(cache.store().is_enabled());
        assert!(dir.path().join("cache.db").exists());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = Config {
            api_url: Some("https://file.example.com/api".to_string()),
            tenant_id: Some("file-tenant".to_string()),
            ..Config::default()
        };
        let opts = GlobalOptions {
            api_url: Some("http://localhost:8080/api".to_string()),
            tenant: Some("cli-tenant".to_string()),
            ..GlobalOptions::default()
        };

        apply_overrides(&mut config, &opts);
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8080/api"));
        assert_eq!(config.tenant_id.as_deref(), Some("cli-tenant"));
    }

    #[tokio::test]
    async fn test_missing_config_without_api_url_fails() {
        let dir = tempdir().unwrap();
        let opts = GlobalOptions {
            config: Some(dir.path().join("missing.yaml")),
            no_cache: true,
            ..GlobalOptions::default()
        };
        assert!(CommandContext::new(&opts).await.is_err());
    }

    #[tokio::test]
    async fn test_resource_query_uses_tenant_key_and_cache() {
        let mock = Arc::new(
            MockResourceApi::new().with_rows(Resource::Batches, vec![json!({"code": "B-1"})]),
        );
        let config = Config {
            tenant_id: Some("acme".to_string()),
            ..Config::default()
        };
        let cache = DataCache::new(PersistentStore::new(Arc::new(
            crate::cache::MemoryStore::new(),
        )));
        let ctx = CommandContext::with_parts(config, mock.clone(), cache, OutputFormat::Json);

        let query = ctx.resource_query(Resource::Batches, ListParams::new(), QueryOptions::default());
        assert_eq!(query.key(), "batches_page_1_20@acme");

        query.load().await;
        let again = ctx.resource_query(Resource::Batches, ListParams::new(), QueryOptions::default());
        again.load().await;

        assert_eq!(mock.call_count().await, 1);
        assert_eq!(again.state().data.unwrap().data.len(), 1);
    }
}
