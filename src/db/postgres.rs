//! PostgreSQL database handle implementation.
//!
//! Provides the `PostgresHandle` struct that implements the `DatabaseHandle` trait
//! on a single sqlx `PgConnection`.

use crate::config::ConnectionTarget;
use crate::db::{ColumnInfo, DatabaseHandle, ErrorKind, Row, StatementOutcome, Value};
use crate::error::{Result, ScratchError};
use crate::safety::{ends_transaction, requires_autocommit};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column as SqlxColumn, Connection, Either, Executor, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database handle.
///
/// Statements run inside an implicit transaction opened on demand, so
/// `commit` and `rollback` have something to act on, mirroring a DB-API
/// cursor.
#[derive(Debug)]
pub struct PostgresHandle {
    conn: Option<PgConnection>,
    target: ConnectionTarget,
    in_transaction: bool,
}

impl PostgresHandle {
    /// Opens a connection, retrying transient failures with exponential backoff.
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            match PgConnection::connect(&target.url).await {
                Ok(conn) => {
                    debug!("Successfully connected to database");
                    return Ok(Self {
                        conn: Some(conn),
                        target: target.clone(),
                        in_transaction: false,
                    });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, target)),
            None => Err(ScratchError::internal("no connection attempt was made")),
        }
    }

    fn conn_mut(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ScratchError::connection("Connection is closed"))
    }

    async fn begin_if_needed(&mut self) -> Result<()> {
        if self.in_transaction {
            return Ok(());
        }
        self.conn_mut()?
            .execute("BEGIN")
            .await
            .map_err(|e| ScratchError::connection(e.to_string()))?;
        self.in_transaction = true;
        Ok(())
    }

    async fn end_transaction(&mut self, command: &str) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.conn_mut()?
            .execute(command)
            .await
            .map_err(|e| ScratchError::connection(format!("{command} failed: {e}")))?;
        Ok(())
    }

    /// True while an implicit transaction is open on the connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn run_statement(&mut self, sql: &str) -> std::result::Result<StatementOutcome, sqlx::Error> {
        let conn = self
            .conn
            .as_mut()
            .ok_or(sqlx::Error::PoolClosed)?;

        if requires_autocommit(sql) {
            let done = conn.execute(sqlx::raw_sql(sql)).await?;
            return Ok(StatementOutcome::NoResult {
                rows_affected: done.rows_affected(),
            });
        }

        // The simple protocol takes several statements in one text and sends
        // every value back in its text form. One segment per statement.
        let mut segments: Vec<(Vec<PgRow>, u64)> = Vec::new();
        {
            let mut pending = Vec::new();
            let mut stream = (&mut *conn).fetch_many(sqlx::raw_sql(sql));
            while let Some(item) = stream.try_next().await? {
                match item {
                    Either::Left(done) => {
                        segments.push((std::mem::take(&mut pending), done.rows_affected()))
                    }
                    Either::Right(row) => pending.push(row),
                }
            }
            if !pending.is_empty() {
                segments.push((pending, 0));
            }
        }

        let Some((rows, rows_affected)) = segments.pop() else {
            return Ok(StatementOutcome::NoResult { rows_affected: 0 });
        };

        if let Some(first) = rows.first() {
            let columns = first
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect();
            let rows = rows.iter().map(convert_row).collect();
            return Ok(StatementOutcome::Rows { columns, rows });
        }

        // Only a describe tells an empty result set from a statement without
        // one, and multi-statement text cannot be described.
        if !segments.is_empty() {
            return Ok(StatementOutcome::NoResult { rows_affected });
        }

        let described = (&mut *conn).describe(sql).await?;
        // Describe caches a named prepared statement, which goes stale once
        // the table behind it changes shape.
        conn.clear_cached_statements().await?;

        let columns: Vec<ColumnInfo> = described
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect();

        if columns.is_empty() {
            Ok(StatementOutcome::NoResult { rows_affected })
        } else {
            Ok(StatementOutcome::Rows {
                columns,
                rows: Vec::new(),
            })
        }
    }
}

#[async_trait]
impl DatabaseHandle for PostgresHandle {
    async fn execute(&mut self, sql: &str) -> Result<StatementOutcome> {
        if !requires_autocommit(sql) {
            self.begin_if_needed().await?;
        }

        match self.run_statement(sql).await {
            Ok(outcome) => {
                if ends_transaction(sql) {
                    self.in_transaction = false;
                }
                Ok(outcome)
            }
            Err(e) => match e.as_database_error() {
                Some(db_error) => {
                    let kind = db_error
                        .code()
                        .map(|code| ErrorKind::from_sqlstate(&code))
                        .unwrap_or(ErrorKind::Other);
                    Ok(StatementOutcome::error(kind, format_query_error(&e)))
                }
                None => Err(ScratchError::connection(format!(
                    "Lost connection to {}: {e}",
                    self.target.display_string()
                ))),
            },
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK").await
    }

    async fn reset_cursor(&mut self) -> Result<()> {
        self.conn_mut()?
            .ping()
            .await
            .map_err(|e| ScratchError::connection(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.in_transaction = false;
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| ScratchError::connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let type_name = col.type_info().name();
            match row.try_get_unchecked::<Option<String>, _>(i) {
                Ok(Some(text)) => parse_text_value(type_name, text),
                Ok(None) => Value::Null,
                Err(e) => {
                    debug!("Could not decode column {}: {}", col.name(), e);
                    Value::Other(format!("<undecodable {}>", type_name.to_lowercase()))
                }
            }
        })
        .collect()
}

/// Converts one value from its PostgreSQL text form.
///
/// Text that does not parse as its column type (`infinity` dates, BC
/// timestamps) is kept verbatim as `Value::Other`.
fn parse_text_value(type_name: &str, text: String) -> Value {
    let parsed = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => match text.as_str() {
            "t" => Some(Value::Bool(true)),
            "f" => Some(Value::Bool(false)),
            _ => None,
        },
        "INT2" | "SMALLINT" | "INT4" | "INT" | "INTEGER" | "INT8" | "BIGINT" => {
            text.parse().ok().map(Value::Int)
        }
        "FLOAT4" | "REAL" | "FLOAT8" | "DOUBLE PRECISION" => text.parse().ok().map(Value::Float),
        "DATE" => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        "TIME" => NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
            .ok()
            .map(Value::Time),
        "TIMESTAMP" => NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(Value::Timestamp),
        "TIMESTAMPTZ" => DateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .ok()
            .map(Value::TimestampTz),
        "JSON" | "JSONB" => serde_json::from_str(&text).ok().map(Value::Json),
        "BYTEA" => decode_bytea_hex(&text).map(Value::Bytes),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            return Value::Text(text)
        }
        _ => None,
    };
    parsed.unwrap_or(Value::Other(text))
}

/// Decodes bytea's `\x` hex output.
fn decode_bytea_hex(text: &str) -> Option<Vec<u8>> {
    let hex = text.strip_prefix("\\x")?;
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    // Authentication and database-not-found errors are never transient;
    // unknown errors are not retried either.
    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, target: &ConnectionTarget) -> ScratchError {
    let display = target.display_string();
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ScratchError::connection(format!(
            "Cannot connect to {display}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        ScratchError::connection(format!(
            "Authentication failed for {display}. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        ScratchError::connection(format!("Database in {display} does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        ScratchError::connection(
            "Server requires SSL. Add '?sslmode=require' to connection string.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ScratchError::connection(format!(
            "Connection to {display} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ScratchError::connection(error.to_string())
    }
}

/// Formats a statement error the way psql prints it, one field per line.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR:  ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\nDETAIL:  ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\nHINT:  ");
            result.push_str(hint);
        }

        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\nCONSTRAINT:  ");
            result.push_str(constraint);
        }
    }

    result
}
