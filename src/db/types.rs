//! Statement outcome and value types for pgscratch.
//!
//! Defines what a `DatabaseHandle` hands back after running one statement.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as declared by the server.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a result set.
pub type Row = Vec<Value>;

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    Text(String),

    /// Calendar date.
    Date(NaiveDate),

    /// Time of day without a date part.
    Time(NaiveTime),

    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),

    /// Timestamp with time zone, in the offset the session reported it in.
    TimestampTz(DateTime<FixedOffset>),

    /// JSON or JSONB document.
    Json(serde_json::Value),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Any other type, already stringified by the driver.
    Other(String),
}

impl Value {
    /// Returns true for dates, times and timestamps.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) | Value::TimestampTz(_)
        )
    }

    /// Short type tag used in rendered temporal values, e.g. `<date>(...)`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Json(_) => "json",
            Value::Bytes(_) => "bytes",
            Value::Other(_) => "other",
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.to_string(),
            Value::Time(t) => t.to_string(),
            Value::Timestamp(ts) => ts.to_string(),
            Value::TimestampTz(ts) => ts.to_string(),
            Value::Json(j) => j.to_string(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::Other(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// Class of a statement the server rejected, derived from its SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Class 23: unique, foreign key, not-null and check violations.
    Integrity,
    /// Class 42: syntax errors, undefined tables or columns, permissions.
    Programming,
    /// Class 0A: feature not supported.
    NotSupported,
    /// Class 22: division by zero, invalid input syntax for a type, etc.
    Data,
    /// Anything else the server reported.
    Other,
}

impl ErrorKind {
    /// Maps a five-character SQLSTATE to its error kind.
    pub fn from_sqlstate(code: &str) -> Self {
        match code.get(..2) {
            Some("23") => Self::Integrity,
            Some("42") => Self::Programming,
            Some("0A") => Self::NotSupported,
            Some("22") => Self::Data,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrity => write!(f, "integrity"),
            Self::Programming => write!(f, "programming"),
            Self::NotSupported => write!(f, "not supported"),
            Self::Data => write!(f, "data"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// What happened when a statement was submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// The statement produced a result set (possibly empty).
    Rows { columns: Vec<ColumnInfo>, rows: Vec<Row> },

    /// The statement succeeded without a result set (DML, DDL).
    NoResult { rows_affected: u64 },

    /// The server rejected the statement; the transaction is aborted
    /// but the connection is still usable after a rollback.
    Error { kind: ErrorKind, message: String },
}

impl StatementOutcome {
    /// Creates a row-bearing outcome.
    pub fn rows(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self::Rows { columns, rows }
    }

    /// Creates a rejected-statement outcome.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}
