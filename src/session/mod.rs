//! The interactive SQL session.
//!
//! A `Session` owns one database handle and runs statements end to end:
//! classify, rewrite, execute, then recover or render. Statement errors the
//! server reports become output; the session stays usable.

mod introspect;

pub use introspect::{
    all_foreign_keys_sql, all_tables_sql, describe_columns_sql, describe_foreign_keys_sql,
    describe_table_sql, ColumnQuery,
};

use crate::config::{ConnectionTarget, SessionConfig};
use crate::db::{self, ColumnInfo, DatabaseHandle, Row, StatementOutcome, Value};
use crate::display::Display;
use crate::error::{Result, ScratchError};
use crate::render::{self, preview_line, DisplayMode, RenderMode, RenderedOutput};
use crate::safety::{Kind, SafetyRewriter, Statement};
use crate::script::{RejectingEvaluator, ScriptEvaluator, ShellEvaluator};
use std::fmt;
use tracing::{debug, info, warn};

/// Longest statement excerpt shown in a commit confirmation.
const EXCERPT_LEN: usize = 40;

/// Lifecycle of the session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// The transport failed mid-statement; the next statement recovers first.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One interactive session against one database.
pub struct Session {
    state: ConnectionState,
    handle: Option<Box<dyn DatabaseHandle>>,
    target: Option<ConnectionTarget>,
    last_headers: Option<Vec<ColumnInfo>>,
    last_rows: Option<Vec<Row>>,
    display_mode: DisplayMode,
    render_mode: RenderMode,
    rewriter: SafetyRewriter,
    evaluator: Box<dyn ScriptEvaluator>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl Session {
    /// Creates a disconnected session with the given defaults.
    pub fn new(settings: &SessionConfig) -> Self {
        let evaluator: Box<dyn ScriptEvaluator> = if settings.shell_escape {
            Box::new(ShellEvaluator::default())
        } else {
            Box::new(RejectingEvaluator)
        };

        Self {
            state: ConnectionState::Disconnected,
            handle: None,
            target: None,
            last_headers: None,
            last_rows: None,
            display_mode: DisplayMode::new(settings.show_full_timestamps),
            render_mode: RenderMode::from_pretty(settings.pretty),
            rewriter: SafetyRewriter::new(settings.implicit_limit),
            evaluator,
        }
    }

    /// Opens the connection to `target` and announces it on `display`.
    ///
    /// Does nothing when a handle is already open, unless `override_existing`
    /// is set; then the old handle is closed once the new one is open.
    pub async fn init(
        &mut self,
        target: ConnectionTarget,
        override_existing: bool,
        display: &mut Display,
    ) -> Result<()> {
        if self.handle.is_some() && !override_existing {
            debug!("Session already connected; keeping the existing handle");
            return Ok(());
        }

        display.append(RenderedOutput::line(format!(
            "Connecting to: {}",
            target.display_string()
        )));
        info!("Connecting to {}", target.display_string());

        let handle = db::connect(&target).await?;
        self.attach(handle, target).await;
        Ok(())
    }

    /// Installs an already-open handle, closing any previous one.
    pub async fn attach(&mut self, handle: Box<dyn DatabaseHandle>, target: ConnectionTarget) {
        if let Some(mut old) = self.handle.take() {
            if let Err(e) = old.close().await {
                warn!("Failed to close previous connection: {}", e);
            }
        }
        self.handle = Some(handle);
        self.target = Some(target);
        self.state = ConnectionState::Connected;
    }

    /// Closes the handle and returns the session to `Disconnected`.
    pub async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        self.target = None;
        match self.handle.take() {
            Some(mut handle) => {
                info!("Closing connection");
                handle.close().await
            }
            None => Ok(()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    /// Whether destructive statements are allowed. False while disconnected.
    pub fn is_local(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.is_local)
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Flips the timestamp preference for subsequent renders.
    pub fn toggle_display_mode(&mut self) {
        self.display_mode.toggle();
        debug!(
            show_full_timestamps = self.display_mode.show_full_timestamps,
            "Toggled display mode"
        );
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    /// Headers and rows of the last statement that returned a result set.
    pub fn last_result(&self) -> Option<(&[ColumnInfo], &[Row])> {
        match (&self.last_headers, &self.last_rows) {
            (Some(headers), Some(rows)) => Some((headers.as_slice(), rows.as_slice())),
            _ => None,
        }
    }

    /// The last result set as `|`-joined lines, header names first.
    pub fn last_result_preview(&self) -> Option<RenderedOutput> {
        let (headers, rows) = self.last_result()?;

        let names: Vec<Value> = headers
            .iter()
            .map(|column| Value::Text(column.name.clone()))
            .collect();

        let mut output = RenderedOutput::line(preview_line(&names, true));
        for row in rows {
            output.push(preview_line(row, false));
        }
        Some(output)
    }

    fn handle_mut(&mut self) -> Result<&mut Box<dyn DatabaseHandle>> {
        self.handle
            .as_mut()
            .ok_or_else(|| ScratchError::connection("Not connected. Run init first."))
    }

    /// Rolls back and acquires a fresh cursor on the same connection.
    pub async fn reconnect(&mut self) -> Result<()> {
        let handle = self.handle_mut()?;
        let recovered = match handle.rollback().await {
            Ok(()) => handle.reset_cursor().await,
            Err(e) => Err(e),
        };

        match recovered {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => Err(ScratchError::connection(
                "Not connected. Run init first.",
            )),
            ConnectionState::Failed => {
                info!("Recovering connection after a transport failure");
                self.reconnect().await
            }
        }
    }

    async fn commit(&mut self) -> Result<()> {
        let committed = self.handle_mut()?.commit().await;
        if committed.is_err() {
            self.state = ConnectionState::Failed;
        }
        committed
    }

    /// Runs one piece of input and returns what it rendered.
    ///
    /// Server-reported statement errors come back as `Ok` output after a
    /// rollback. `Err` means a policy refusal, a scripting failure, or a
    /// broken connection.
    pub async fn execute(&mut self, text: &str) -> Result<RenderedOutput> {
        let statement = Statement::prepare(text, &self.rewriter, self.is_local())?;

        let sql = match (statement.kind, statement.sql) {
            (Kind::Script, _) => return self.evaluator.evaluate(&statement.raw).await,
            (Kind::Sql, Some(sql)) => sql,
            (Kind::Sql, None) => return Err(ScratchError::internal("SQL statement without SQL")),
        };

        self.ensure_connected().await?;

        debug!(sql = %sql, "Executing statement");
        let result = self.handle_mut()?.execute(&sql).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Statement failed at the transport level: {}", e);
                self.state = ConnectionState::Failed;
                return Err(e);
            }
        };

        match outcome {
            StatementOutcome::Error { kind, message } => {
                warn!(%kind, "Statement rejected; rolling back");
                self.reconnect().await?;
                Ok(RenderedOutput::from_message(&message))
            }
            StatementOutcome::Rows { columns, rows } => {
                let mut output = render::render(&columns, &rows, self.render_mode, self.display_mode);
                output.push("");
                self.commit().await?;
                debug!(rows = rows.len(), "Statement returned rows");
                self.last_headers = Some(columns);
                self.last_rows = Some(rows);
                Ok(output)
            }
            StatementOutcome::NoResult { rows_affected } => {
                self.commit().await?;
                debug!(rows_affected, "Statement committed");
                Ok(RenderedOutput::line(committed_message(&sql)))
            }
        }
    }

    /// Executes `text` and appends whatever it produced to `display`.
    pub async fn submit(&mut self, text: &str, display: &mut Display) -> Result<()> {
        let result = self.execute(text).await;
        present(result, display)
    }
}

/// Appends a statement result to `display`.
///
/// Errors are written as lines too. Statement-scoped ones are swallowed and
/// the rest returned.
pub fn present(result: Result<RenderedOutput>, display: &mut Display) -> Result<()> {
    match result {
        Ok(output) => {
            display.append(output);
            Ok(())
        }
        Err(e) => {
            match &e {
                ScratchError::PolicyViolation(_) => warn!("Refused statement: {}", e),
                _ => warn!("{}: {}", e.category(), e),
            }
            display.append(RenderedOutput::from_message(&e.to_string()));
            if e.is_statement_scoped() {
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("target", &self.target.as_ref().map(|t| t.display_string()))
            .field("display_mode", &self.display_mode)
            .field("render_mode", &self.render_mode)
            .field("rewriter", &self.rewriter)
            .finish_non_exhaustive()
    }
}

/// Confirmation line for a statement that returned no rows.
fn committed_message(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let excerpt = if collapsed.chars().count() > EXCERPT_LEN {
        let head: String = collapsed.chars().take(EXCERPT_LEN).collect();
        format!("{}...", head.trim_end())
    } else {
        collapsed
    };
    format!("\"{excerpt}\" committed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ErrorKind, MockHandle};
    use crate::display::{Anchor, BufferSink};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn target(is_local: bool) -> ConnectionTarget {
        ConnectionTarget {
            url: "postgres://app@db.example.com/app".to_string(),
            is_local,
        }
    }

    async fn session_with(mock: &MockHandle, is_local: bool) -> Session {
        let mut session = Session::default();
        session.attach(Box::new(mock.clone()), target(is_local)).await;
        session
    }

    fn users() -> StatementOutcome {
        StatementOutcome::rows(
            vec![ColumnInfo::new("id", "INT4"), ColumnInfo::new("email", "TEXT")],
            vec![vec![Value::Int(1), Value::Text("a@example.com".into())]],
        )
    }

    #[tokio::test]
    async fn test_select_gets_implicit_limit_and_renders_headers() {
        let mock = MockHandle::new();
        mock.push(users());
        let mut session = session_with(&mock, false).await;

        let output = session.execute("select * from users").await.unwrap();

        assert_eq!(mock.log().statements, vec!["select * from users limit 200"]);
        assert!(output.lines()[1].contains("id"));
        assert!(output.lines()[1].contains("email"));
        assert_eq!(output.lines().last().unwrap(), "");
        assert_eq!(mock.log().commits, 1);

        let (headers, rows) = session.last_result().unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_reports_commit_and_keeps_last_result() {
        let mock = MockHandle::new();
        mock.push(users());
        mock.push(StatementOutcome::NoResult { rows_affected: 1 });
        let mut session = session_with(&mock, false).await;

        session.execute("select * from users").await.unwrap();
        let output = session.execute("insert into t(x) values (1)").await.unwrap();

        assert_eq!(
            output.lines(),
            &["\"insert into t(x) values (1)\" committed".to_string()]
        );
        assert_eq!(mock.log().commits, 2);
        let (headers, _) = session.last_result().unwrap();
        assert_eq!(headers[0].name, "id");
    }

    #[tokio::test]
    async fn test_constraint_violation_recovers() {
        let mock = MockHandle::new();
        mock.push(StatementOutcome::error(
            ErrorKind::Integrity,
            "ERROR:  duplicate key value violates unique constraint \"users_pkey\"\nDETAIL:  Key (id)=(1) already exists.",
        ));
        let mut session = session_with(&mock, false).await;

        let output = session
            .execute("insert into users(id) values (1)")
            .await
            .unwrap();

        assert_eq!(
            output.lines(),
            &[
                "ERROR:  duplicate key value violates unique constraint \"users_pkey\"".to_string(),
                "DETAIL:  Key (id)=(1) already exists.".to_string(),
            ]
        );
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(mock.log().rollbacks, 1);
        assert_eq!(mock.log().cursor_resets, 1);
        assert!(session.last_result().is_none());

        // The mock refuses everything until rolled back; this proves the rollback happened.
        let output = session.execute("select 1").await.unwrap();
        assert!(output.lines().iter().any(|l| l.contains("Mock result")));
    }

    #[tokio::test]
    async fn test_failed_statement_leaves_last_result_untouched() {
        let mock = MockHandle::new();
        mock.push(users());
        mock.push(StatementOutcome::error(ErrorKind::Programming, "ERROR:  syntax error"));
        let mut session = session_with(&mock, false).await;

        session.execute("select * from users").await.unwrap();
        let before = session.last_result_preview();
        session.execute("select from where").await.unwrap();

        assert_eq!(session.last_result_preview(), before);
    }

    #[tokio::test]
    async fn test_drop_schema_refused_on_remote() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, false).await;

        let result = session.execute("drop schema public cascade").await;

        assert!(matches!(result, Err(ScratchError::PolicyViolation(_))));
        assert!(mock.log().statements.is_empty());
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_drop_schema_allowed_on_local() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, true).await;

        let output = session.execute("drop schema scratch cascade").await.unwrap();

        assert_eq!(mock.log().statements, vec!["drop schema scratch cascade"]);
        assert_eq!(
            output.lines(),
            &["\"drop schema scratch cascade\" committed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_force_tag_is_stripped() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, false).await;

        session.execute("!s begin").await.unwrap();

        assert_eq!(mock.log().statements, vec![" begin"]);
    }

    #[tokio::test]
    async fn test_script_never_touches_database() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, false).await;

        let output = session.execute("print('hello')").await.unwrap();

        assert!(mock.log().statements.is_empty());
        assert_eq!(output.lines().len(), 1);
        assert!(output.lines()[0].contains("!s"));
    }

    #[tokio::test]
    async fn test_toggle_only_affects_later_renders() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let outcome = StatementOutcome::rows(
            vec![ColumnInfo::new("created_at", "TIMESTAMP")],
            vec![vec![Value::Timestamp(at)]],
        );
        let mock = MockHandle::new();
        mock.push(outcome.clone());
        mock.push(outcome);
        let mut session = session_with(&mock, false).await;
        session.set_render_mode(RenderMode::Compact);

        let before = session.execute("select created_at from t").await.unwrap();
        session.toggle_display_mode();
        let after = session.execute("select created_at from t").await.unwrap();

        assert_eq!(before.lines()[1], "[\"<timestamp>(2024-01-02)\"]");
        assert_eq!(after.lines()[1], "[\"<timestamp>(2024-01-02T03:04:05)\"]");
    }

    #[tokio::test]
    async fn test_transport_failure_then_recovery() {
        let mock = MockHandle::new();
        mock.push_transport_failure("connection reset by peer");
        let mut session = session_with(&mock, false).await;

        let result = session.execute("select 1").await;
        assert!(matches!(result, Err(ScratchError::Connection(_))));
        assert_eq!(session.state(), ConnectionState::Failed);

        session.execute("select 1").await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(mock.log().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_execute_while_disconnected() {
        let mut session = Session::default();
        let result = session.execute("select 1").await;
        assert!(matches!(result, Err(ScratchError::Connection(_))));
    }

    #[tokio::test]
    async fn test_init_is_noop_when_connected() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, false).await;
        let buffer = BufferSink::new(Anchor::Bottom);
        let mut display = Display::with_sink(Box::new(buffer.clone()));

        let unreachable = ConnectionTarget {
            url: "postgres://nobody@nonexistent.invalid.host/db".to_string(),
            is_local: false,
        };
        session.init(unreachable, false, &mut display).await.unwrap();

        assert!(buffer.contents().is_empty());
        assert_eq!(session.target(), Some(&target(false)));
    }

    #[tokio::test]
    async fn test_attach_replaces_and_closes_old_handle() {
        let old = MockHandle::new();
        let new = MockHandle::new();
        let mut session = session_with(&old, false).await;

        session.attach(Box::new(new.clone()), target(true)).await;
        session.execute("select 1").await.unwrap();

        assert!(old.log().closed);
        assert!(old.log().statements.is_empty());
        assert_eq!(new.log().statements.len(), 1);
        assert!(session.is_local());
    }

    #[tokio::test]
    async fn test_close() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, false).await;

        session.close().await.unwrap();

        assert!(mock.log().closed);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.target().is_none());
    }

    #[tokio::test]
    async fn test_submit_writes_policy_violation_to_display() {
        let mock = MockHandle::new();
        let mut session = session_with(&mock, false).await;
        let buffer = BufferSink::new(Anchor::Bottom);
        let mut display = Display::with_sink(Box::new(buffer.clone()));

        session
            .submit("drop schema public", &mut display)
            .await
            .unwrap();

        assert_eq!(
            buffer.contents(),
            vec![
                "Policy violation: Cannot drop schema on nonlocal connection!".to_string(),
                String::new(),
            ]
        );
    }

    #[tokio::test]
    async fn test_submit_rows_end_with_single_blank_line() {
        let mock = MockHandle::new();
        mock.push(users());
        let mut session = session_with(&mock, false).await;
        let buffer = BufferSink::new(Anchor::Bottom);
        let mut display = Display::with_sink(Box::new(buffer.clone()));

        session.submit("select * from users", &mut display).await.unwrap();

        let contents = buffer.contents();
        assert_eq!(contents.last().unwrap(), "");
        assert_ne!(contents[contents.len() - 2], "");
    }

    #[tokio::test]
    async fn test_submit_returns_connection_errors() {
        let mock = MockHandle::new();
        mock.push_transport_failure("broken pipe");
        let mut session = session_with(&mock, false).await;
        let buffer = BufferSink::new(Anchor::Bottom);
        let mut display = Display::with_sink(Box::new(buffer.clone()));

        let result = session.submit("select 1", &mut display).await;

        assert!(result.is_err());
        assert_eq!(buffer.contents()[0], "Connection error: broken pipe");
    }

    #[tokio::test]
    async fn test_last_result_preview() {
        let mock = MockHandle::new();
        mock.push(users());
        let mut session = session_with(&mock, false).await;
        assert!(session.last_result_preview().is_none());

        session.execute("select * from users").await.unwrap();

        let preview = session.last_result_preview().unwrap();
        assert_eq!(
            preview.lines(),
            &["id|email".to_string(), "1|'a@example.com'".to_string()]
        );
    }

    #[test]
    fn test_committed_message_truncates() {
        let sql = "update users\n   set email = lower(email)\n where id in (select id from staff)";
        assert_eq!(
            committed_message(sql),
            "\"update users set email = lower(email) wh...\" committed"
        );
    }

    #[test]
    fn test_committed_message_short() {
        assert_eq!(
            committed_message("  vacuum\n"),
            "\"vacuum\" committed"
        );
    }
}
