//! HTTP client for the inventory REST API

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::dedup::RequestDeduplicator;
use super::pagination::{ListParams, Page};
use super::rate_limit::{EndpointCategory, RateLimiterSet};
use super::resource::Resource;
use super::{ApiResult, ResourceApi};
use crate::error::{ApiError, Result};

/// Header carrying the tenant for multi-tenant deployments
const TENANT_HEADER: &str = "X-Tenant-ID";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error body shape returned by the API.
///
/// `isPdoError` and `retryable` are set by the server when the failure is a
/// database hiccup worth retrying.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    is_pdo_error: bool,
    #[serde(default)]
    retryable: bool,
}

impl ErrorBody {
    fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    fn message_or(&self, raw: &str, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .or_else(|| (!raw.trim().is_empty()).then(|| raw.trim().to_string()))
            .unwrap_or_else(|| fallback.to_string())
    }

    fn is_transient(&self) -> bool {
        self.is_pdo_error || self.retryable
    }
}

/// REST client with bearer auth, reactive rate limiting and de-duplication
/// of identical concurrent GETs.
#[derive(Clone)]
pub struct RestClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
    tenant: Option<String>,
    rate_limiters: Arc<RateLimiterSet>,
    dedup: Arc<RequestDeduplicator<Value>>,
}

impl RestClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        tenant: Option<String>,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            tenant,
            rate_limiters: Arc::new(RateLimiterSet::new()),
            dedup: Arc::new(RequestDeduplicator::new()),
        })
    }


    /// De-duplicated GET returning the decoded JSON body
    async fn get_json(&self, path: &str, query: Vec<(String, String)>) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let key = RequestDeduplicator::<Value>::request_key(&url, &query);
        let category = EndpointCategory::from_path(path);
        let this = self.clone();

        self.dedup
            .run(key, move || async move { this.send(category, url, query).await })
            .await
    }

    async fn send(
        &self,
        category: EndpointCategory,
        url: String,
        query: Vec<(String, String)>,
    ) -> ApiResult<Value> {
        self.rate_limiters.wait_for(category).await;

        debug!("GET {}", url);
        let mut request = self.http.get(&url).query(&query);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(ref tenant) = self.tenant {
            request = request.header(TENANT_HEADER, tenant);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)));
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let text = response.text().await.unwrap_or_default();
        let body = ErrorBody::parse(&text);
        debug!("GET {} failed with {}: {}", url, status, text);

        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND => {
                ApiError::NotFound(body.message_or(&text, "Resource not found"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                self.rate_limiters.activate(category);
                ApiError::RateLimit(Duration::from_secs(retry_after.unwrap_or(60)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY if !body.is_transient() => {
                ApiError::BadRequest(body.message_or(&text, "Bad request"))
            }
            status if status.is_server_error() || body.is_transient() => ApiError::ServerError {
                message: body.message_or(&text, &format!("Server error: {}", status)),
                transient: body.is_transient(),
            },
            status => ApiError::InvalidResponse(format!("Unexpected status code: {}", status)),
        })
    }
}

#[async_trait]
impl ResourceApi for RestClient {
    async fn list(&self, resource: Resource, params: &ListParams) -> ApiResult<Page> {
        let body = self
            .get_json(resource.path(), params.to_query_params())
            .await?;
        Page::from_json(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Unexpected {} page: {}", resource, e)))
    }

    async fn ping(&self) -> ApiResult<()> {
        // Any HTTP answer means the API is reachable
        self.http
            .get(&self.base_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|_| ())
            .map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = RestClient::new("https://api.test/api/", None, None).unwrap();
        assert_eq!(client.base_url, "https://api.test/api");
    }

    #[test]
    fn test_error_body_flags() {
        let body = ErrorBody::parse(r#"{"message":"SQLSTATE[25P02]","isPdoError":true}"#);
        assert!(body.is_transient());
        assert_eq!(body.message_or("", "x"), "SQLSTATE[25P02]");

        let plain = ErrorBody::parse("gateway timeout");
        assert!(!plain.is_transient());
        assert_eq!(plain.message_or("gateway timeout", "x"), "gateway timeout");
    }

    #[cfg_attr(not(feature = "http-tests"), ignore)]
    #[tokio::test]
    async fn test_list_sends_auth_tenant_and_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/batches")
            .match_header("authorization", "Bearer secret")
            .match_header("x-tenant-id", "acme")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("per_page".into(), "20".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"data":[{"id":1,"code":"B-001"}],"meta":{"current_page":1,"last_page":1}}"#)
            .create_async()
            .await;

        let client = RestClient::new(
            server.url(),
            Some("secret".to_string()),
            Some("acme".to_string()),
        )
        .unwrap();
        let page = client
            .list(Resource::Batches, &ListParams::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.data.len(), 1);
        assert!(!page.has_next_page());
    }

    #[cfg_attr(not(feature = "http-tests"), ignore)]
    #[tokio::test]
    async fn test_flagged_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/loans")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"message":"database error","isPdoError":true}"#)
            .create_async()
            .await;

        let client = RestClient::new(server.url(), None, None).unwrap();
        let err = client
            .list(Resource::Loans, &ListParams::new())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("database error"));
    }

    #[cfg_attr(not(feature = "http-tests"), ignore)]
    #[tokio::test]
    async fn test_not_found_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/reports")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Report not found"}"#)
            .create_async()
            .await;

        let client = RestClient::new(server.url(), None, None).unwrap();
        let err = client
            .list(Resource::Reports, &ListParams::new())
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Report not found"));
    }

    #[cfg_attr(not(feature = "http-tests"), ignore)]
    #[tokio::test]
    async fn test_rate_limit_activates_category() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/reports")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "3")
            .create_async()
            .await;

        let client = RestClient::new(server.url(), None, None).unwrap();
        let err = client
            .list(Resource::Reports, &ListParams::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RateLimit(d) if d == Duration::from_secs(3)));
        assert!(client.rate_limiters.is_active(EndpointCategory::Reports));
        assert!(!client.rate_limiters.is_active(EndpointCategory::Default));
    }

    #[tokio::test]
    async fn test_ping_unreachable_host() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let client = RestClient::new("http://127.0.0.1:9", None, None).unwrap();
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
