//! Database abstraction layer for pgscratch.
//!
//! The session talks to the database only through the `DatabaseHandle`
//! trait: one exclusively owned connection plus its cursor.

mod mock;
mod postgres;
mod types;

pub use mock::{MockHandle, MockLog};
pub use postgres::PostgresHandle;
pub use types::{ColumnInfo, ErrorKind, Row, StatementOutcome, Value};

use crate::config::ConnectionTarget;
use crate::error::Result;
use async_trait::async_trait;

/// Opens the database handle for the given target.
///
/// This is the central factory function for database connections.
pub async fn connect(target: &ConnectionTarget) -> Result<Box<dyn DatabaseHandle>> {
    let handle = PostgresHandle::connect(target).await?;
    Ok(Box::new(handle))
}

/// A single database connection and cursor pair.
///
/// `execute` reports statements the server rejects as
/// `StatementOutcome::Error`; an `Err` means the transport itself failed.
#[async_trait]
pub trait DatabaseHandle: Send {
    /// Submits one statement and fetches its full result.
    async fn execute(&mut self, sql: &str) -> Result<StatementOutcome>;

    /// Commits the open transaction, if any.
    async fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction, if any.
    async fn rollback(&mut self) -> Result<()>;

    /// Discards the current cursor and acquires a fresh one on the same connection.
    async fn reset_cursor(&mut self) -> Result<()>;

    /// Closes the underlying connection.
    async fn close(&mut self) -> Result<()>;
}
