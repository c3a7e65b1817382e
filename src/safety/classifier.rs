//! Routing between SQL and the scripting escape.
//!
//! This is a prefix heuristic, not a parser: text whose first token is not
//! one of the known keywords is never treated as SQL, even when it is valid
//! SQL (`begin`, `grant`, `values ...`). Prefix it with `!s` to force it.

use regex::Regex;
use std::sync::LazyLock;

use super::Kind;

/// Tag that forces input to be treated as SQL.
pub const FORCE_TAG: &str = "!s";

/// Leading tokens that mark input as SQL.
pub const SQL_PREFIXES: &[&str] = &[
    FORCE_TAG, "alter", "create", "delete", "drop", "insert", "select", "update", "explain",
    "truncate", "with", "analyze", "vacuum", "commit", "refresh", "--",
];

static SELECT: LazyLock<Regex> = LazyLock::new(|| word_pattern("select"));
static LIMIT: LazyLock<Regex> = LazyLock::new(|| word_pattern("limit"));
static CREATE: LazyLock<Regex> = LazyLock::new(|| word_pattern("create"));
static DELETE: LazyLock<Regex> = LazyLock::new(|| word_pattern("delete"));

static DROP_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdrop\s+schema\b").expect("valid drop schema pattern")
});

static AUTOCOMMIT_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*(vacuum\b|(create|drop)\s+database\b|(create|drop)\s+(unique\s+)?index\s+concurrently\b|reindex\b.*\bconcurrently\b)",
    )
    .expect("valid autocommit pattern")
});

static TRANSACTION_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|;)\s*(commit|rollback|end|abort)(\s+(work|transaction))?\s*(;|$)")
        .expect("valid transaction end pattern")
});

fn word_pattern(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
        .expect("escaped word is a valid pattern")
}

/// Decides whether `text` is SQL or a scripting escape.
pub fn classify(text: &str) -> Kind {
    let head = text.trim_start();
    let is_sql = SQL_PREFIXES.iter().any(|prefix| {
        head.get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
    });

    if is_sql {
        Kind::Sql
    } else {
        Kind::Script
    }
}

/// Removes a leading `!s` force tag, along with whitespace before it.
///
/// Text without the tag is returned unchanged.
pub fn strip_force_tag(text: &str) -> &str {
    let head = text.trim_start();
    match head.get(..FORCE_TAG.len()) {
        Some(tag) if tag.eq_ignore_ascii_case(FORCE_TAG) => &head[FORCE_TAG.len()..],
        _ => text,
    }
}

/// Case-insensitive whole-word search anywhere in `text`.
pub fn has_keyword(text: &str, word: &str) -> bool {
    match word.to_lowercase().as_str() {
        "select" => SELECT.is_match(text),
        "limit" => LIMIT.is_match(text),
        "create" => CREATE.is_match(text),
        "delete" => DELETE.is_match(text),
        _ => word_pattern(word).is_match(text),
    }
}

/// True for statements PostgreSQL refuses to run inside a transaction block.
pub fn requires_autocommit(sql: &str) -> bool {
    AUTOCOMMIT_ONLY.is_match(sql)
}

/// True when `sql` closes the open transaction itself, e.g. a typed `commit`.
pub fn ends_transaction(sql: &str) -> bool {
    TRANSACTION_END.is_match(sql.trim())
}

/// Safety-relevant facts about a statement, gathered in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafetyFacts {
    pub has_select: bool,
    pub has_limit: bool,
    pub has_create: bool,
    pub has_delete: bool,
    pub drops_schema: bool,
}

impl SafetyFacts {
    /// Inspects `sql` for every fact the rewriter consults.
    pub fn of(sql: &str) -> Self {
        Self {
            has_select: SELECT.is_match(sql),
            has_limit: LIMIT.is_match(sql),
            has_create: CREATE.is_match(sql),
            has_delete: DELETE.is_match(sql),
            drops_schema: sql.contains("drop schema") || DROP_SCHEMA.is_match(sql),
        }
    }

    /// An unbounded read: a select with no explicit cap that is not DDL or a delete.
    pub fn wants_implicit_limit(&self) -> bool {
        self.has_select && !(self.has_limit || self.has_create || self.has_delete)
    }
}
