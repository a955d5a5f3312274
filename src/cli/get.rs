//! Get command: one cached page of a resource

use std::time::Duration;

use colored::Colorize;

use crate::cache::QueryOptions;
use crate::cli::ListArgs;
use crate::cli::args::GlobalOptions;
use crate::cli::context::CommandContext;
use crate::client::{ListParams, Page, Resource};
use crate::error::Result;
use crate::output::render_page;

/// How `get` goes about fetching
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Ignore any cached copy and fetch now
    pub refresh: bool,
    /// Cache lifetime in seconds; falls back to the configured expiration
    pub ttl: Option<u64>,
    /// Retry transient failures with backoff
    pub retry: bool,
}

/// Run the get command
pub async fn run(
    opts: &GlobalOptions,
    resource: Resource,
    list: &ListArgs,
    fetch: FetchOptions,
) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;
    let output = fetch_page(&ctx, resource, list.to_params(), fetch).await?;
    println!("{}", output);
    Ok(())
}

/// Load a page through the cache and render it.
///
/// When the fetch fails but earlier data exists, that data is rendered with
/// a warning instead of failing the command.
pub async fn fetch_page(
    ctx: &CommandContext,
    resource: Resource,
    params: ListParams,
    fetch: FetchOptions,
) -> Result<String> {
    let expiration = fetch
        .ttl
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.cache.expiration());
    let query = ctx.resource_query(
        resource,
        params,
        QueryOptions::default()
            .expiration(expiration)
            .retry_on_error(fetch.retry),
    );

    if fetch.refresh {
        query.refetch().await;
    } else {
        query.load().await;
    }

    let state = query.state();
    if let Some(ref error) = state.error {
        if state.data.is_none() {
            return Err(error.clone().into());
        }
        eprintln!(
            "{} Showing last known data for {}; refresh failed: {}",
            "⚠".yellow(),
            query.key(),
            error
        );
    }

    let page = state.data.unwrap_or_else(Page::default);
    render_page(
        &page,
        ctx.format,
        query.key(),
        state.error.map(|e| e.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DataCache, MemoryStore, PersistentStore};
    use crate::cli::OutputFormat;
    use crate::client::MockResourceApi;
    use crate::config::Config;
    use crate::error::ApiError;
    use serde_json::json;
    use std::sync::Arc;

    fn context(mock: Arc<MockResourceApi>) -> CommandContext {
        let cache = DataCache::new(PersistentStore::new(Arc::new(MemoryStore::new())));
        CommandContext::with_parts(Config::default(), mock, cache, OutputFormat::Json)
    }

    fn cached() -> FetchOptions {
        FetchOptions {
            retry: true,
            ..FetchOptions::default()
        }
    }

    fn refresh() -> FetchOptions {
        FetchOptions {
            refresh: true,
            ..cached()
        }
    }

    fn mock() -> Arc<MockResourceApi> {
        Arc::new(MockResourceApi::new().with_rows(
            Resource::Batches,
            vec![json!({"code": "B-001"}), json!({"code": "B-002"})],
        ))
    }

    #[tokio::test]
    async fn test_second_get_is_served_from_cache() {
        let mock = mock();
        let ctx = context(mock.clone());

        let first = fetch_page(&ctx, Resource::Batches, ListParams::new(), cached())
            .await
            .unwrap();
        let second = fetch_page(&ctx, Resource::Batches, ListParams::new(), cached())
            .await
            .unwrap();

        assert!(first.contains("B-002"));
        assert!(second.contains("\"cache_key\": \"batches_page_1_20\""));
        assert_eq!(mock.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let mock = mock();
        let ctx = context(mock.clone());

        fetch_page(&ctx, Resource::Batches, ListParams::new(), cached())
            .await
            .unwrap();
        fetch_page(&ctx, Resource::Batches, ListParams::new(), refresh())
            .await
            .unwrap();

        assert_eq!(mock.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_failure_without_data_is_an_error() {
        let mock = Arc::new(MockResourceApi::new().with_errors(vec![ApiError::Forbidden]));
        let ctx = context(mock);

        let err = fetch_page(&ctx, Resource::Roles, ListParams::new(), cached())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Access denied"));
    }

    #[tokio::test]
    async fn test_failure_with_earlier_data_shows_it() {
        let mock = mock();
        let ctx = context(mock.clone());

        fetch_page(&ctx, Resource::Batches, ListParams::new(), cached())
            .await
            .unwrap();
        mock.fail_next(ApiError::NotFound("gone".to_string())).await;

        let out = fetch_page(&ctx, Resource::Batches, ListParams::new(), refresh())
            .await
            .unwrap();
        assert!(out.contains("B-001"));
        assert!(out.contains("\"error\""));
    }

    #[tokio::test]
    async fn test_no_retry_fails_on_first_transient_error() {
        let mock = Arc::new(
            MockResourceApi::new()
                .with_rows(Resource::Batches, vec![json!({"code": "B-001"})])
                .with_errors(vec![ApiError::Network("Connection reset".to_string())]),
        );
        let ctx = context(mock.clone());

        let err = fetch_page(
            &ctx,
            Resource::Batches,
            ListParams::new(),
            FetchOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Connection reset"));
        assert_eq!(mock.call_count().await, 1);
    }
}
