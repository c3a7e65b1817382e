//! Mock database handle for testing.
//!
//! Returns scripted outcomes and records every call so tests can observe
//! what the session sent, committed and rolled back.

use super::{ColumnInfo, DatabaseHandle, ErrorKind, StatementOutcome, Value};
use crate::error::{Result, ScratchError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything a `MockHandle` has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockLog {
    /// SQL texts in submission order.
    pub statements: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
    pub cursor_resets: usize,
    pub closed: bool,
}

#[derive(Debug)]
enum Scripted {
    Outcome(StatementOutcome),
    TransportFailure(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Scripted>,
    log: MockLog,
    aborted: bool,
}

/// A mock handle that plays back scripted outcomes.
///
/// Once a `StatementOutcome::Error` has been returned, every further
/// statement fails like an aborted PostgreSQL transaction until
/// `rollback` is called.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Creates a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for the next statement.
    pub fn push(&self, outcome: StatementOutcome) -> &Self {
        self.lock().script.push_back(Scripted::Outcome(outcome));
        self
    }

    /// Queues a transport failure for the next statement.
    pub fn push_transport_failure(&self, message: impl Into<String>) -> &Self {
        self.lock()
            .script
            .push_back(Scripted::TransportFailure(message.into()));
        self
    }

    /// Returns a snapshot of the calls recorded so far.
    pub fn log(&self) -> MockLog {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Result for statements nobody scripted: selects yield one row, the rest nothing.
fn default_outcome(sql: &str) -> StatementOutcome {
    if sql.trim_start().to_lowercase().starts_with("select") {
        StatementOutcome::rows(
            vec![ColumnInfo::new("result", "TEXT")],
            vec![vec![Value::Text(format!("Mock result for: {}", sql))]],
        )
    } else {
        StatementOutcome::NoResult { rows_affected: 0 }
    }
}

#[async_trait]
impl DatabaseHandle for MockHandle {
    async fn execute(&mut self, sql: &str) -> Result<StatementOutcome> {
        let mut state = self.lock();
        state.log.statements.push(sql.to_string());

        if state.aborted {
            return Ok(StatementOutcome::error(
                ErrorKind::Other,
                "ERROR: current transaction is aborted, commands ignored until end of transaction block",
            ));
        }

        let outcome = match state.script.pop_front() {
            Some(Scripted::Outcome(outcome)) => outcome,
            Some(Scripted::TransportFailure(message)) => {
                return Err(ScratchError::connection(message));
            }
            None => default_outcome(sql),
        };

        if matches!(outcome, StatementOutcome::Error { .. }) {
            state.aborted = true;
        }
        Ok(outcome)
    }

    async fn commit(&mut self) -> Result<()> {
        self.lock().log.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.log.rollbacks += 1;
        state.aborted = false;
        Ok(())
    }

    async fn reset_cursor(&mut self) -> Result<()> {
        self.lock().log.cursor_resets += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().log.closed = true;
        Ok(())
    }
}
