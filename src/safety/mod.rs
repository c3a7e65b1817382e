//! Statement classification and safety rewrites.
//!
//! Decides whether input is SQL or a scripting escape, and rewrites SQL
//! before it reaches the database: unbounded selects get an implicit limit,
//! schema drops against remote targets are refused.

mod classifier;
mod rewriter;

pub use classifier::{
    classify, ends_transaction, has_keyword, requires_autocommit, strip_force_tag, SafetyFacts,
    FORCE_TAG, SQL_PREFIXES,
};
pub use rewriter::{rewrite, SafetyRewriter};

use std::fmt;

/// How a piece of input text is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Sent to the database.
    Sql,
    /// Handed to the scripting escape.
    Script,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql => write!(f, "SQL"),
            Self::Script => write!(f, "Script"),
        }
    }
}

/// One unit of input, resolved and ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// The text as submitted.
    pub raw: String,
    /// Where the text is routed.
    pub kind: Kind,
    /// The SQL actually sent, for `Kind::Sql` statements.
    pub sql: Option<String>,
}

impl Statement {
    /// Classifies `raw` and, for SQL, strips the force tag and applies `rewriter`.
    pub fn prepare(raw: &str, rewriter: &SafetyRewriter, is_local: bool) -> crate::Result<Self> {
        let kind = classify(raw);
        let sql = match kind {
            Kind::Sql => Some(rewriter.rewrite(strip_force_tag(raw), is_local)?),
            Kind::Script => None,
        };
        Ok(Self {
            raw: raw.to_string(),
            kind,
            sql,
        })
    }
}
