//! Pagination and filtering for resource listings
//!
//! The API pages with 1-indexed `page` / `per_page` query parameters and
//! answers with a `data` array plus a `meta` block.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::Resource;
use crate::cache::cache_key;

/// Default page size used by the web client
pub const DEFAULT_PER_PAGE: usize = 20;

/// Largest page the API will serve
pub const MAX_PER_PAGE: usize = 100;

/// Sort order for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Page, sort and filter parameters for one listing request.
///
/// Filters live in a sorted map, so both the query string and the cache key
/// are independent of the order filters were given in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: usize,
    pub per_page: usize,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub filters: BTreeMap<String, String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort_by: None,
            sort_order: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page number (1-indexed; 0 is treated as 1).
    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    /// Set the page size, clamped to `1..=MAX_PER_PAGE`.
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    /// Query string pairs: `page`, `per_page`, optional `sort`/`order`,
    /// then filters by name.
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
        ];

        if let Some(ref field) = self.sort_by {
            params.push(("sort".to_string(), field.clone()));
        }

        if let Some(order) = self.sort_order {
            let order_str = match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            params.push(("order".to_string(), order_str.to_string()));
        }

        for (name, value) in &self.filters {
            params.push((name.clone(), value.clone()));
        }

        params
    }

    /// Cache key for this listing of `resource`
    pub fn cache_key(&self, resource: Resource, tenant: Option<&str>) -> String {
        let mut filters: Vec<(&str, &str)> = self
            .filters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(ref field) = self.sort_by {
            filters.push(("sort", field.as_str()));
        }
        if let Some(order) = self.sort_order {
            filters.push((
                "order",
                match order {
                    SortOrder::Asc => "asc",
                    SortOrder::Desc => "desc",
                },
            ));
        }
        cache_key(
            resource.key_prefix(),
            tenant,
            self.page,
            self.per_page,
            &filters,
        )
    }
}

/// Pagination metadata returned alongside a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub current_page: Option<usize>,

    #[serde(default)]
    pub per_page: Option<usize>,

    /// Total number of items across all pages
    #[serde(default)]
    pub total: Option<usize>,

    #[serde(default)]
    pub last_page: Option<usize>,
}

impl PageMeta {
    pub fn has_next_page(&self) -> bool {
        match (self.current_page, self.last_page) {
            (Some(current), Some(last)) => current < last,
            _ => false,
        }
    }
}

/// One page of a resource listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl Page {
    pub fn new(data: Vec<Value>) -> Self {
        Self { data, meta: None }
    }

    pub fn has_next_page(&self) -> bool {
        self.meta.as_ref().is_some_and(PageMeta::has_next_page)
    }

    /// Accept both an enveloped page and a bare JSON array
    pub fn from_json(body: Value) -> Result<Self, serde_json::Error> {
        match body {
            Value::Array(items) => Ok(Self::new(items)),
            other => serde_json::from_value(other),
        }
    }
}
