//! Display surfaces for rendered output.
//!
//! Output goes to a named sink in a `Display` registry. When the named sink
//! is not registered, lines go to the console instead.

use crate::error::{Result, ScratchError};
use crate::render::RenderedOutput;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Name of the sink session output is written to by default.
pub const DEFAULT_SINK_NAME: &str = "__pgscratch__";

/// An appendable, ordered line sink.
pub trait DisplaySink: Send {
    /// Appends lines to the sink.
    fn append(&mut self, lines: &[String]) -> Result<()>;
}

/// Where a `BufferSink` inserts new output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Anchor {
    /// Newest output first.
    #[default]
    Top,
    /// Newest output last.
    Bottom,
}

/// In-memory line buffer.
///
/// Clones share the same buffer, so a caller can keep one clone to read
/// back while another is registered with a `Display`.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
    anchor: Anchor,
}

impl BufferSink {
    pub fn new(anchor: Anchor) -> Self {
        Self {
            lines: Arc::default(),
            anchor,
        }
    }

    /// Returns a copy of the buffer contents.
    pub fn contents(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySink for BufferSink {
    fn append(&mut self, lines: &[String]) -> Result<()> {
        let anchor = self.anchor;
        let mut buffer = self.lock();
        match anchor {
            Anchor::Top => {
                buffer.splice(0..0, lines.iter().cloned());
            }
            Anchor::Bottom => buffer.extend(lines.iter().cloned()),
        }
        Ok(())
    }
}

/// Writes lines to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn append(&mut self, lines: &[String]) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for line in lines {
            writeln!(out, "{line}")
                .map_err(|e| ScratchError::internal(format!("Failed to write output: {e}")))?;
        }
        out.flush()
            .map_err(|e| ScratchError::internal(format!("Failed to flush output: {e}")))
    }
}

/// Appends lines to a file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ScratchError::config(format!(
                    "Cannot open output file {}: {e}",
                    path.display()
                ))
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl DisplaySink for FileSink {
    fn append(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            writeln!(self.file, "{line}").map_err(|e| {
                ScratchError::internal(format!("Failed to write {}: {e}", self.path.display()))
            })?;
        }
        self.file
            .flush()
            .map_err(|e| ScratchError::internal(format!("Failed to flush {}: {e}", self.path.display())))
    }
}

/// Registry of named sinks plus the console fallback.
pub struct Display {
    sinks: HashMap<String, Box<dyn DisplaySink>>,
    target: String,
    console: Box<dyn DisplaySink>,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            sinks: HashMap::new(),
            target: DEFAULT_SINK_NAME.to_string(),
            console: Box::new(ConsoleSink),
        }
    }
}

impl Display {
    /// A display with no registered sinks; everything goes to the console.
    pub fn console() -> Self {
        Self::default()
    }

    /// A display whose default sink is `sink`.
    pub fn with_sink(sink: Box<dyn DisplaySink>) -> Self {
        let mut display = Self::default();
        display.register(DEFAULT_SINK_NAME, sink);
        display
    }

    /// Replaces the fallback used when the target sink is missing.
    pub fn with_fallback(mut self, sink: Box<dyn DisplaySink>) -> Self {
        self.console = sink;
        self
    }

    /// Registers a sink under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, sink: Box<dyn DisplaySink>) {
        self.sinks.insert(name.into(), sink);
    }

    /// Removes the sink registered under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn DisplaySink>> {
        self.sinks.remove(name)
    }

    pub fn has_sink(&self, name: &str) -> bool {
        self.sinks.contains_key(name)
    }

    /// Changes which sink `append` writes to.
    pub fn set_target(&mut self, name: impl Into<String>) {
        self.target = name.into();
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Looks up the target sink.
    fn target_sink(&mut self) -> Result<&mut Box<dyn DisplaySink>> {
        let name = self.target.clone();
        self.sinks
            .get_mut(&name)
            .ok_or_else(|| ScratchError::sink_missing(name))
    }

    /// Appends output to the target sink, terminated by exactly one blank line.
    ///
    /// A missing or failing sink is logged and the lines go to the fallback.
    pub fn append(&mut self, output: RenderedOutput) {
        let lines = output.terminated().into_lines();

        let written = match self.target_sink() {
            Ok(sink) => sink.append(&lines),
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            warn!("{}: {}; writing to console", e.category(), e);
            if let Err(e) = self.console.append(&lines) {
                warn!("Console output failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.sinks.keys().collect();
        names.sort();
        f.debug_struct("Display")
            .field("sinks", &names)
            .field("target", &self.target)
            .finish()
    }
}
