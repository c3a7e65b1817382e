//! Safety rewrites applied to SQL before it is sent.

use tracing::debug;

use super::classifier::SafetyFacts;
use crate::config::DEFAULT_IMPLICIT_LIMIT;
use crate::error::{Result, ScratchError};

/// Applies the destructive guard and the implicit-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyRewriter {
    implicit_limit: u32,
}

impl Default for SafetyRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_IMPLICIT_LIMIT)
    }
}

impl SafetyRewriter {
    /// Creates a rewriter capping unbounded selects at `implicit_limit` rows.
    pub fn new(implicit_limit: u32) -> Self {
        Self { implicit_limit }
    }

    /// Returns the row cap appended to unbounded selects.
    pub fn implicit_limit(&self) -> u32 {
        self.implicit_limit
    }

    /// Returns the SQL that should actually be sent, or a policy violation.
    ///
    /// Schema drops are refused unless `is_local`. Selects without `limit`,
    /// `create` or `delete` get ` limit N` appended, keeping a trailing `;`.
    pub fn rewrite(&self, sql: &str, is_local: bool) -> Result<String> {
        let facts = SafetyFacts::of(sql);

        if facts.drops_schema && !is_local {
            return Err(ScratchError::policy(
                "Cannot drop schema on nonlocal connection!",
            ));
        }

        if !facts.wants_implicit_limit() {
            return Ok(sql.to_string());
        }

        let body = sql.trim_end();
        let (body, terminator) = match body.strip_suffix(';') {
            Some(stripped) => (stripped.trim_end(), ";"),
            None => (body, ""),
        };
        let rewritten = format!("{body} limit {}{terminator}", self.implicit_limit);
        debug!(limit = self.implicit_limit, "Appended implicit limit");
        Ok(rewritten)
    }
}

/// Convenience function to rewrite with the default limit.
pub fn rewrite(sql: &str, is_local: bool) -> Result<String> {
    SafetyRewriter::default().rewrite(sql, is_local)
}
