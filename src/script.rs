//! Scripting escape for input that is not SQL.

use crate::error::{Result, ScratchError};
use crate::render::RenderedOutput;
use crate::safety::FORCE_TAG;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Evaluates text the classifier routed away from the database.
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    /// Runs `text` and returns the lines it produced.
    async fn evaluate(&self, text: &str) -> Result<RenderedOutput>;
}

/// Refuses to evaluate anything; points the user at the force tag instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingEvaluator;

#[async_trait]
impl ScriptEvaluator for RejectingEvaluator {
    async fn evaluate(&self, text: &str) -> Result<RenderedOutput> {
        let first_line = text.trim().lines().next().unwrap_or_default();
        Ok(RenderedOutput::line(format!(
            "Not recognized as SQL: {first_line}. Prefix with {FORCE_TAG} to send it anyway."
        )))
    }
}

/// Runs text through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellEvaluator {
    shell: String,
}

impl Default for ShellEvaluator {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellEvaluator {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl ScriptEvaluator for ShellEvaluator {
    async fn evaluate(&self, text: &str) -> Result<RenderedOutput> {
        debug!(shell = %self.shell, "Evaluating script");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(text)
            .output()
            .await
            .map_err(|e| ScratchError::script(format!("Failed to run {}: {e}", self.shell)))?;

        let mut rendered = RenderedOutput::default();
        for stream in [&output.stdout, &output.stderr] {
            for line in String::from_utf8_lossy(stream).lines() {
                rendered.push(line);
            }
        }

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            rendered.push(format!("exit status: {code}"));
        }

        Ok(rendered)
    }
}
