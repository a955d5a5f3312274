//! Listing argument types for CLI commands

use clap::Args;

use crate::client::pagination::{DEFAULT_PER_PAGE, ListParams, SortOrder};

use super::SortDir;

/// Page, sort and filter arguments for resource listings.
///
/// Flatten this into any command that reads a listing:
/// ```ignore
/// Get {
///     #[command(flatten)]
///     list: ListArgs,
/// }
/// ```
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Page number (1-indexed)
    #[arg(long, short = 'p', default_value_t = 1)]
    pub page: usize,

    /// Results per page
    #[arg(long, short = 'n', default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: usize,

    /// Field to sort by
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long, value_enum, hide_possible_values = true)]
    pub sort_dir: Option<SortDir>,

    /// Filter as NAME=VALUE; repeat or comma-separate for several
    #[arg(long = "filter", short = 'f', value_delimiter = ',', value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort_by: None,
            sort_dir: None,
            filters: Vec::new(),
        }
    }
}

impl ListArgs {
    /// Convert CLI args to API listing params.
    pub fn to_params(&self) -> ListParams {
        let mut params = ListParams::new().page(self.page).per_page(self.per_page);

        if let Some(ref field) = self.sort_by {
            params = params.sort_by(field);
        }
        if let Some(dir) = self.sort_dir {
            let order = match dir {
                SortDir::Asc => SortOrder::Asc,
                SortDir::Desc => SortOrder::Desc,
            };
            params = params.sort_order(order);
        }
        for (name, value) in &self.filters {
            params = params.filter(name, value);
        }

        params
    }
}

/// Parse a `NAME=VALUE` filter
pub fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("filter name missing in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
