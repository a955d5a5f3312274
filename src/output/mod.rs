//! Output formatting for CLI results

use colored::Colorize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::client::Page;
use crate::error::Result;

pub mod formatters;
pub mod json;
pub mod table;

use formatters::cell_text;
use json::JsonOutput;

/// Render a page of records in the requested format
pub fn render_page(
    page: &Page,
    format: OutputFormat,
    cache_key: &str,
    error: Option<String>,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => JsonOutput::new(&page.data)
            .with_cache_key(cache_key)
            .with_pagination(page.meta.clone())
            .with_error(error)
            .render()?,
        OutputFormat::Table => table::format_records(&page.data),
        OutputFormat::Pretty => format_pretty(page),
    })
}

/// One block per record with bold field names, then a paging footer
pub fn format_pretty(page: &Page) -> String {
    if page.data.is_empty() {
        return "No results found.".dimmed().to_string();
    }

    let mut out = String::new();
    for (i, record) in page.data.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match record {
            Value::Object(fields) => {
                let width = fields.keys().map(String::len).max().unwrap_or(0);
                for (name, value) in fields {
                    let label = format!("{:width$}", name, width = width);
                    out.push_str(&format!("{}  {}\n", label.bold(), cell_text(value)));
                }
            }
            other => {
                out.push_str(&cell_text(other));
                out.push('\n');
            }
        }
    }

    if let Some(meta) = &page.meta
        && let (Some(current), Some(last)) = (meta.current_page, meta.last_page)
    {
        let total = meta
            .total
            .map(|t| format!(", {} total", t))
            .unwrap_or_default();
        let next = if page.has_next_page() {
            format!(" (next: --page {})", current + 1)
        } else {
            String::new()
        };
        out.push_str(&format!(
            "\n{}",
            format!("Page {} of {}{}{}", current, last, total, next).dimmed()
        ));
    }

    out.trim_end().to_string()
}
