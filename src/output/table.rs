//! Table output formatting

use serde_json::Value;
use tabled::{
    Table, Tabled,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Rows},
};

use super::formatters::cell_text;

/// Format typed rows as a table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    style(&mut table);
    table.to_string()
}

/// Format API records as a table.
///
/// Columns are the union of object keys in first-seen order; records that are
/// not objects land in a single `VALUE` column.
pub fn format_records(records: &[Value]) -> String {
    if records.is_empty() {
        return "No results found.".to_string();
    }

    let mut columns: Vec<String> = Vec::new();
    for record in records {
        if let Value::Object(fields) = record {
            for name in fields.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
    }

    let mut builder = Builder::default();
    if columns.is_empty() {
        builder.push_record(["VALUE".to_string()]);
        for record in records {
            builder.push_record([cell_text(record)]);
        }
    } else {
        builder.push_record(columns.iter().map(|c| c.to_uppercase()));
        for record in records {
            builder.push_record(
                columns
                    .iter()
                    .map(|c| record.get(c).map(cell_text).unwrap_or_default()),
            );
        }
    }

    let mut table = builder.build();
    style(&mut table);
    table.to_string()
}

fn style(table: &mut Table) {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
}
