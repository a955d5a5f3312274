//! Inventory API client

use async_trait::async_trait;

use crate::error::ApiError;

pub mod dedup;
#[cfg(test)]
pub mod mock;
pub mod pagination;
pub mod rate_limit;
pub mod resource;
pub mod rest;

#[cfg(test)]
pub use mock::MockResourceApi;
pub use pagination::{ListParams, Page, PageMeta};
pub use resource::Resource;
pub use rest::RestClient;

/// Result of a single API call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Read access to the inventory API
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetch one page of a resource listing
    async fn list(&self, resource: Resource, params: &ListParams) -> ApiResult<Page>;

    /// Check whether the API is reachable at all
    async fn ping(&self) -> ApiResult<()>;
}
