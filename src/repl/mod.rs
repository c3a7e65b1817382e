//! Line-oriented interactive loop.
//!
//! Reads statements from an async reader, runs them through the session and
//! writes the output to the display. Lines starting with `\` outside a
//! statement are meta commands.

mod commands;

pub use commands::{MetaCommand, HELP_TEXT};

use crate::display::Display;
use crate::error::Result;
use crate::render::{RenderMode, RenderedOutput};
use crate::session::{present, ColumnQuery, Session};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

const PROMPT: &str = "pgscratch> ";
const CONTINUATION_PROMPT: &str = "pgscratch-> ";

/// Accumulates input lines until a statement is complete.
#[derive(Debug, Default)]
pub struct StatementBuffer {
    lines: Vec<String>,
}

impl StatementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds a line and returns the statement it completes, if any.
    ///
    /// A line ending in `;` or a blank line after some input ends the statement.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return self.take();
        }
        self.lines.push(line.to_string());
        if line.trim_end().ends_with(';') {
            self.take()
        } else {
            None
        }
    }

    /// Returns the pending text, if any, and clears the buffer.
    pub fn take(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let text = self.lines.join("\n");
        self.lines.clear();
        Some(text)
    }
}

/// Whether the loop keeps reading after a meta command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Runs one meta command against the session.
pub async fn run_meta(
    session: &mut Session,
    display: &mut Display,
    command: MetaCommand,
) -> Result<Flow> {
    debug!(?command, "Meta command");
    match command {
        MetaCommand::Quit => return Ok(Flow::Quit),
        MetaCommand::ToggleTimestamps => {
            session.toggle_display_mode();
            let state = if session.display_mode().show_full_timestamps {
                "on"
            } else {
                "off"
            };
            display.append(RenderedOutput::line(format!("Full timestamps {state}.")));
        }
        MetaCommand::Pretty => {
            session.set_render_mode(RenderMode::Pretty);
            display.append(RenderedOutput::line("Rendering tables."));
        }
        MetaCommand::Compact => {
            session.set_render_mode(RenderMode::Compact);
            display.append(RenderedOutput::line("Rendering compact lines."));
        }
        MetaCommand::Reconnect => reconnect(session, display).await?,
        MetaCommand::Last => {
            let preview = session
                .last_result_preview()
                .unwrap_or_else(|| RenderedOutput::line("No result set yet."));
            display.append(preview);
        }
        MetaCommand::Tables => present(session.all_tables().await, display)?,
        MetaCommand::DescribeTable(table) => {
            present(session.describe_table(&table).await, display)?
        }
        MetaCommand::DescribeColumns(table) => {
            let query = ColumnQuery {
                order_by: Some("ordinal_position".to_string()),
                ..ColumnQuery::default()
            };
            present(session.describe_columns(&table, &query).await, display)?
        }
        MetaCommand::ForeignKeys(table) => {
            present(session.describe_foreign_keys(&table).await, display)?
        }
        MetaCommand::AllForeignKeys => present(session.all_foreign_keys().await, display)?,
        MetaCommand::Help => display.append(RenderedOutput::from_message(HELP_TEXT)),
        MetaCommand::MissingArgument(name) => {
            display.append(RenderedOutput::line(format!("{name} needs a table name.")))
        }
        MetaCommand::Unknown(name) => display.append(RenderedOutput::line(format!(
            "Unknown command: {name}. Type \\help for help."
        ))),
    }
    Ok(Flow::Continue)
}

/// Rolls back in place; reopens the connection when that fails.
async fn reconnect(session: &mut Session, display: &mut Display) -> Result<()> {
    match session.reconnect().await {
        Ok(()) => {
            display.append(RenderedOutput::line("Rolled back."));
            Ok(())
        }
        Err(e) => {
            warn!("Reset failed ({}); reopening the connection", e);
            match session.target().cloned() {
                Some(target) => session.init(target, true, display).await,
                None => Err(e),
            }
        }
    }
}

fn prompt(text: &str) {
    let mut out = std::io::stdout();
    // A failed prompt write only costs the prompt.
    let _ = write!(out, "{text}").and_then(|_| out.flush());
}

/// Reads statements from `reader` until end of input or `\q`.
///
/// Connection errors are reported and the loop keeps going; the next
/// statement tries to recover the connection.
pub async fn run<R>(
    session: &mut Session,
    display: &mut Display,
    reader: R,
    show_prompt: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut buffer = StatementBuffer::new();

    info!("Starting interactive session");
    loop {
        if show_prompt {
            prompt(if buffer.is_empty() {
                PROMPT
            } else {
                CONTINUATION_PROMPT
            });
        }

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        if buffer.is_empty() && line.trim_start().starts_with('\\') {
            match run_meta(session, display, MetaCommand::parse(&line)).await {
                Ok(Flow::Quit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => error!("{}: {}", e.category(), e),
            }
            continue;
        }

        if let Some(text) = buffer.push_line(&line) {
            if let Err(e) = session.submit(&text, display).await {
                error!("{}: {}", e.category(), e);
            }
        }
    }

    // End of input completes a pending statement.
    if let Some(text) = buffer.take() {
        session.submit(&text, display).await?;
    }
    Ok(())
}
