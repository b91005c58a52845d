//! Security policy for model-generated SQL.
//!
//! The checks run in a fixed order and the first failing one decides the
//! verdict:
//!
//! 1. **Empty statement**
//! 2. **Forbidden keywords**: case-insensitive, word-boundary match against
//!    [`FORBIDDEN_KEYWORDS`] anywhere in the text. Comments and string
//!    literals are not skipped, so `WHERE note = 'drop'` is rejected. An
//!    identifier that merely contains a keyword (`updated_at`, `created_by`)
//!    passes because `_` and letters are word characters.
//! 3. **Statement shape**: the statement must begin with `SELECT` or `WITH`
//!    and, when `sqlparser` can read it, must be exactly one query statement.
//!    Text the parser cannot read is still accepted by this check (PostgreSQL
//!    syntax outruns the parser); it falls back to a quote-aware scan for a
//!    statement separator.
//! 4. **Complexity**: at most [`MAX_SELECT_COUNT`] `SELECT` tokens.
//!
//! Validation is deterministic and keeps no state between calls.

use regex::Regex;
use serde::Serialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::sync::LazyLock;

pub const FORBIDDEN_KEYWORDS: [&str; 13] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE", "COMMIT", "ROLLBACK",
];

/// Ceiling on `SELECT` tokens, bounding nested-subquery blowup.
pub const MAX_SELECT_COUNT: usize = 5;

static KEYWORD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|keyword| (*keyword, word_pattern(keyword)))
        .collect()
});

static SELECT_TOKEN: LazyLock<Regex> = LazyLock::new(|| word_pattern("SELECT"));

fn word_pattern(keyword: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
        .expect("keyword patterns are fixed ASCII words")
}

/// Upstream self-check reported by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentSignal {
    pub matches_intent: bool,
    pub alternative_query: Option<String>,
}

/// Outcome of validating one candidate. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    is_safe: bool,
    matches_intent: bool,
    notes: String,
    alternative_query: Option<String>,
}

impl ValidationVerdict {
    fn safe(signal: Option<&IntentSignal>) -> Self {
        Self::build(true, String::new(), signal)
    }

    fn unsafe_because(notes: impl Into<String>, signal: Option<&IntentSignal>) -> Self {
        Self::build(false, notes.into(), signal)
    }

    fn build(is_safe: bool, notes: String, signal: Option<&IntentSignal>) -> Self {
        let (matches_intent, alternative_query) = match signal {
            Some(signal) => (signal.matches_intent, signal.alternative_query.clone()),
            None => (true, None),
        };
        let notes = if !matches_intent && is_safe {
            "Query may not match the user's intent".to_string()
        } else {
            notes
        };
        Self {
            is_safe,
            matches_intent,
            notes,
            alternative_query,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.is_safe
    }

    pub fn matches_intent(&self) -> bool {
        self.matches_intent
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn alternative_query(&self) -> Option<&str> {
        self.alternative_query.as_deref()
    }
}

/// Stateless validator; see the module docs for the policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityValidator;

impl SecurityValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, sql: &str, user_intent: &str) -> ValidationVerdict {
        self.validate_with_signal(sql, user_intent, None)
    }

    pub fn validate_with_signal(
        &self,
        sql: &str,
        user_intent: &str,
        signal: Option<&IntentSignal>,
    ) -> ValidationVerdict {
        let verdict = match check_policy(sql) {
            Ok(()) => ValidationVerdict::safe(signal),
            Err(reason) => ValidationVerdict::unsafe_because(reason, signal),
        };

        if !verdict.is_safe() {
            tracing::warn!(
                notes = %verdict.notes(),
                user_intent = %truncate(user_intent, 100),
                "Blocked generated SQL"
            );
        } else if !verdict.matches_intent() {
            tracing::info!(
                user_intent = %truncate(user_intent, 100),
                "Generated SQL flagged as diverging from intent"
            );
        }

        verdict
    }
}

fn check_policy(sql: &str) -> Result<(), String> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err("SQL query is empty".to_string());
    }

    if let Some(keyword) = find_forbidden_keyword(trimmed) {
        return Err(format!("Forbidden operation: {keyword}"));
    }

    if !starts_with_read_keyword(trimmed) {
        return Err("Only SELECT and WITH queries are allowed".to_string());
    }

    check_single_query(trimmed)?;

    if count_select_tokens(trimmed) > MAX_SELECT_COUNT {
        return Err(format!(
            "Query is too complex: more than {MAX_SELECT_COUNT} SELECT statements"
        ));
    }

    Ok(())
}

/// First denylisted keyword present in `sql`, in denylist order.
pub fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    KEYWORD_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(sql))
        .map(|(keyword, _)| *keyword)
}

/// Whether the trimmed, upper-cased statement begins with `SELECT` or `WITH`.
pub fn starts_with_read_keyword(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH")
}

pub fn count_select_tokens(sql: &str) -> usize {
    SELECT_TOKEN.find_iter(sql).count()
}

fn check_single_query(sql: &str) -> Result<(), String> {
    match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => match statements.as_slice() {
            [Statement::Query(_)] => Ok(()),
            [_] => Err("Only SELECT and WITH queries are allowed".to_string()),
            [] => Err("SQL query is empty".to_string()),
            _ => Err("Multiple SQL statements are not allowed".to_string()),
        },
        Err(e) => {
            tracing::debug!(error = %e, "SQL parser could not read statement, using lexical checks");
            if has_statement_separator(sql) {
                Err("Multiple SQL statements are not allowed".to_string())
            } else {
                Ok(())
            }
        }
    }
}

fn has_statement_separator(sql: &str) -> bool {
    find_statement_separator(sql).is_some()
}

/// Byte index of the first `;` outside single-quoted literals and
/// double-quoted identifiers.
pub fn find_statement_separator(sql: &str) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    for (idx, c) in sql.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => return Some(idx),
            _ => {}
        }
    }
    None
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
