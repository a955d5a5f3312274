//! Cache key generation for paginated resource listings
//!
//! Keys stay human-readable so that pattern invalidation by resource name
//! (`"batches"`) reaches every page and filter combination.

/// Build a deterministic cache key for a resource listing.
///
/// Produces `"{resource}_page_{page}_{per_page}"`, followed by one
/// `_{name}-{value}` segment per filter sorted by name, and an `@{tenant}`
/// suffix when a tenant is given. Filter order does not affect the key.
/// Separator characters inside names, values and the tenant are
/// percent-encoded, so distinct inputs never share a key.
pub fn cache_key(
    resource: &str,
    tenant: Option<&str>,
    page: usize,
    per_page: usize,
    filters: &[(&str, &str)],
) -> String {
    let mut key = format!("{}_page_{}_{}", resource, page, per_page);

    let mut sorted_filters: Vec<_> = filters.iter().collect();
    sorted_filters.sort();

    for (name, value) in sorted_filters {
        key.push('_');
        key.push_str(&escape(name));
        key.push('-');
        key.push_str(&escape(value));
    }

    if let Some(tenant) = tenant {
        key.push('@');
        key.push_str(&escape(tenant));
    }

    key
}

fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            '-' => out.push_str("%2D"),
            '@' => out.push_str("%40"),
            '_' => out.push_str("%5F"),
            c => out.push(c),
        }
    }
    out
}
