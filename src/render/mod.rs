//! Result rendering for pgscratch.
//!
//! Turns result sets into text lines for a display surface.

mod format;
mod table;

pub use format::{
    escape_newlines, format_header, format_row, format_value, preview_line, DisplayMode,
};
pub use table::render;

/// How a result set is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Aligned table with ASCII borders.
    #[default]
    Pretty,
    /// One literal sequence per line.
    Compact,
}

impl RenderMode {
    /// Pretty when `pretty` is set, compact otherwise.
    pub fn from_pretty(pretty: bool) -> Self {
        if pretty {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

/// Ordered lines of text produced by one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedOutput {
    lines: Vec<String>,
}

impl RenderedOutput {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Output consisting of a single line.
    pub fn line(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
        }
    }

    /// Splits a multi-line message into one output line per message line.
    pub fn from_message(message: &str) -> Self {
        Self {
            lines: message.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the lines ending in exactly one blank line.
    ///
    /// Applying this to already-terminated output changes nothing.
    pub fn terminated(mut self) -> Self {
        while self.lines.len() > 1 && self.lines.last().is_some_and(|l| l.is_empty()) {
            let before_last = &self.lines[self.lines.len() - 2];
            if !before_last.is_empty() {
                break;
            }
            self.lines.pop();
        }
        if self.lines.last().map_or(true, |l| !l.is_empty()) {
            self.lines.push(String::new());
        }
        self
    }
}

impl From<Vec<String>> for RenderedOutput {
    fn from(lines: Vec<String>) -> Self {
        Self::new(lines)
    }
}
