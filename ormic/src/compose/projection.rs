//! The flat, dot-prefixed column map a layer exposes to the translator, and
//! the SELECT list built from it.

use indexmap::IndexMap;

use crate::schema::ColumnDescriptor;

/// Dotted output path → quoted SQL reference, in declaration order.
pub type ColumnMap = IndexMap<String, String>;

/// Builds the initial column map for a freshly-scanned base table: every
/// declared column, keyed by its field name, referencing `alias`.
pub fn base_columns(
    alias: &str,
    columns: &IndexMap<&'static str, &'static ColumnDescriptor>,
) -> ColumnMap {
    columns
        .values()
        .map(|col| (col.field_name.to_string(), format!("\"{alias}\".\"{}\"", col.column_name)))
        .collect()
}

/// Renders a column map as a SELECT list, quoting each output key as its
/// column alias.
pub fn render_select_list(columns: &ColumnMap) -> String {
    columns
        .iter()
        .map(|(key, sql)| format!("{sql} AS \"{key}\"", key = key.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(", ")
}
