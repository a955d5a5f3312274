//! Mock inventory API for testing
//!
//! Serves canned rows per resource without making real API calls.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::pagination::{ListParams, Page, PageMeta};
use super::resource::Resource;
use super::{ApiResult, ResourceApi};
use crate::error::ApiError;

/// Mock API client.
///
/// # Example
/// ```ignore
/// let mock = MockResourceApi::new()
///     .with_rows(Resource::Batches, vec![json!({"code": "B-001"})]);
/// let page = mock.list(Resource::Batches, &ListParams::new()).await?;
/// ```
#[derive(Default)]
pub struct MockResourceApi {
    rows: HashMap<Resource, Vec<Value>>,
    /// Errors returned before any rows, one per call
    errors: Arc<Mutex<VecDeque<ApiError>>>,
    calls: Arc<Mutex<Vec<(Resource, ListParams)>>>,
    offline: bool,
}

impl MockResourceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, resource: Resource, rows: Vec<Value>) -> Self {
        self.rows.insert(resource, rows);
        self
    }

    /// Fail the next calls with these errors, in order
    pub fn with_errors(self, errors: Vec<ApiError>) -> Self {
        Self {
            errors: Arc::new(Mutex::new(errors.into())),
            ..self
        }
    }

    /// Queue one more failure
    pub async fn fail_next(&self, error: ApiError) {
        self.errors.lock().await.push_back(error);
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn calls(&self) -> Vec<(Resource, ListParams)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ResourceApi for MockResourceApi {
    async fn list(&self, resource: Resource, params: &ListParams) -> ApiResult<Page> {
        self.calls.lock().await.push((resource, params.clone()));

        if let Some(err) = self.errors.lock().await.pop_front() {
            return Err(err);
        }

        let rows = self.rows.get(&resource).cloned().unwrap_or_default();
        let total = rows.len();
        let start = (params.page - 1) * params.per_page;
        let data: Vec<Value> = rows
            .into_iter()
            .skip(start)
            .take(params.per_page)
            .collect();

        Ok(Page {
            data,
            meta: Some(PageMeta {
                current_page: Some(params.page),
                per_page: Some(params.per_page),
                total: Some(total),
                last_page: Some(total.div_ceil(params.per_page).max(1)),
            }),
        })
    }

    async fn ping(&self) -> ApiResult<()> {
        if self.offline {
            Err(ApiError::Network("Failed to connect to API".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_pages_rows() {
        let rows = (1..=25).map(|i| json!({ "id": i })).collect();
        let mock = MockResourceApi::new().with_rows(Resource::Inventory, rows);

        let second = mock
            .list(Resource::Inventory, &ListParams::new().page(2))
            .await
            .unwrap();

        assert_eq!(second.data.len(), 5);
        assert_eq!(second.meta.unwrap().last_page, Some(2));
        assert_eq!(mock.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_mock_errors_then_rows() {
        let mock = MockResourceApi::new()
            .with_rows(Resource::Loans, vec![json!({ "id": 1 })])
            .with_errors(vec![ApiError::Forbidden]);

        assert!(mock.list(Resource::Loans, &ListParams::new()).await.is_err());
        assert!(mock.list(Resource::Loans, &ListParams::new()).await.is_ok());
    }
}
