//! Per-value display formatting.
//!
//! Strings are quoted so they stand apart from numbers and NULL, temporal
//! values carry a type tag, and JSON documents are pretty-printed.

use crate::db::Value;

/// Process-wide display preference for temporal values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayMode {
    /// Render timestamps in full ISO-8601 instead of date-only.
    pub show_full_timestamps: bool,
}

impl DisplayMode {
    /// Creates a mode with the given timestamp preference.
    pub fn new(show_full_timestamps: bool) -> Self {
        Self {
            show_full_timestamps,
        }
    }

    /// Flips the timestamp preference.
    pub fn toggle(&mut self) {
        self.show_full_timestamps = !self.show_full_timestamps;
    }
}

/// Replaces raw newlines with the two characters `\n`.
pub fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\\n").replace('\n', "\\n")
}

/// Full ISO-8601 form of a temporal value.
fn full_iso(value: &Value) -> Option<String> {
    match value {
        Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(ts) => Some(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::TimestampTz(ts) => Some(ts.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string()),
        _ => None,
    }
}

/// Date part of a timestamp. Dates and times have no separate date-only form.
fn date_only(value: &Value) -> Option<String> {
    match value {
        Value::Timestamp(ts) => Some(ts.date().format("%Y-%m-%d").to_string()),
        Value::TimestampTz(ts) => Some(ts.date_naive().format("%Y-%m-%d").to_string()),
        _ => None,
    }
}

fn tagged(value: &Value, text: String) -> String {
    format!("<{}>({})", value.type_name(), text)
}

fn quoted(text: &str) -> String {
    format!("'{text}'")
}

/// Formats one value for display. The result may span several lines
/// (pretty-printed JSON); `format_row` escapes them.
pub fn format_value(value: &Value, mode: DisplayMode) -> String {
    match value {
        Value::Text(s) => quoted(s),
        Value::Json(serde_json::Value::String(s)) => quoted(s),
        Value::Json(doc @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string())
        }
        v if v.is_temporal() => {
            let full = full_iso(v).unwrap_or_else(|| v.to_display_string());
            if mode.show_full_timestamps {
                tagged(v, full)
            } else {
                tagged(v, date_only(v).unwrap_or(full))
            }
        }
        other => other.to_display_string(),
    }
}

/// Formats a row for rendering; no cell contains a raw newline.
pub fn format_row(row: &[Value], mode: DisplayMode) -> Vec<String> {
    row.iter()
        .map(|value| escape_newlines(&format_value(value, mode)))
        .collect()
}

/// Formats values for a header line: temporal values in full, everything else raw.
pub fn format_header(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|value| match full_iso(value) {
            Some(full) => tagged(value, full),
            None => value.to_display_string(),
        })
        .collect()
}

/// Renders a row as one `|`-joined line.
///
/// Header rows go through `format_header`; data rows only quote strings and
/// otherwise keep each value's natural display form.
pub fn preview_line(row: &[Value], is_header: bool) -> String {
    let cells: Vec<String> = if is_header {
        format_header(row)
    } else {
        row.iter()
            .map(|value| match value {
                Value::Text(s) => quoted(s),
                other => other.to_display_string(),
            })
            .collect()
    };
    escape_newlines(&cells.join("|"))
}
