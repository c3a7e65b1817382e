//! Result set rendering: aligned tables or compact lines.

use comfy_table::{presets, Cell, CellAlignment, Table};

use super::format::{escape_newlines, format_row, format_value, DisplayMode};
use super::{RenderMode, RenderedOutput};
use crate::db::{ColumnInfo, Row};

/// Renders a result set according to `mode`.
pub fn render(
    headers: &[ColumnInfo],
    rows: &[Row],
    mode: RenderMode,
    display: DisplayMode,
) -> RenderedOutput {
    match mode {
        RenderMode::Pretty => render_pretty(headers, rows, display),
        RenderMode::Compact => render_compact(headers, rows, display),
    }
}

/// Aligned table, one left-aligned column per header.
fn render_pretty(headers: &[ColumnInfo], rows: &[Row], display: DisplayMode) -> RenderedOutput {
    let mut table = Table::new();
    table.load_preset(presets::ASCII_FULL_CONDENSED).force_no_tty();

    let header: Vec<Cell> = headers
        .iter()
        .map(|column| Cell::new(escape_newlines(&column.name)))
        .collect();
    table.set_header(header);

    for row in rows {
        table.add_row(format_row(row, display));
    }

    for column in table.column_iter_mut() {
        column.set_cell_alignment(CellAlignment::Left);
    }

    RenderedOutput::new(table.to_string().lines().map(str::to_string).collect())
}

/// Header-name sequence on the first line, one formatted row sequence per line after it.
///
/// Sequences use Rust literal syntax, so quotes and newlines inside a cell
/// come out escaped.
fn render_compact(headers: &[ColumnInfo], rows: &[Row], display: DisplayMode) -> RenderedOutput {
    let names: Vec<&str> = headers.iter().map(|column| column.name.as_str()).collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!("{names:?}"));
    lines.extend(rows.iter().map(|row| {
        let cells: Vec<String> = row.iter().map(|value| format_value(value, display)).collect();
        format!("{cells:?}")
    }));

    RenderedOutput::new(lines)
}
