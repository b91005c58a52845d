//! LIMIT/OFFSET introspection and rewriting.
//!
//! Statements are read with `sqlparser` first, so only the outermost query's
//! row limit counts and `LIMIT` text inside string literals or subqueries is
//! left alone. When the parser cannot read a statement the functions fall back
//! to a lexical scan that treats the last `LIMIT <n>` in the text as the
//! authoritative one.

use crate::types::PaginatedStatement;
use regex::Regex;
use sqlparser::ast::{Expr, Offset, OffsetRows, Query, Statement, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::sync::LazyLock;

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)").expect("static regex"));
static FOLLOWING_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s+OFFSET\s+\d+").expect("static regex"));
static PRECEDING_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOFFSET\s+\d+\s*$").expect("static regex"));
static OFFSET_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOFFSET\s+(\d+)").expect("static regex"));

/// Whether the statement carries its own row limit (`LIMIT` or `FETCH FIRST`).
pub fn has_explicit_limit(sql: &str) -> bool {
    match parse_single_query(sql) {
        Some(query) => query.limit.is_some() || query.fetch.is_some(),
        None => LIMIT_CLAUSE.is_match(sql),
    }
}

/// The statement's own row limit, when it is a literal integer.
pub fn extract_limit(sql: &str) -> Option<u64> {
    match parse_single_query(sql) {
        Some(query) => query.limit.as_ref().and_then(literal_u64).or_else(|| {
            query
                .fetch
                .as_ref()
                .and_then(|fetch| fetch.quantity.as_ref())
                .and_then(literal_u64)
        }),
        None => LIMIT_CLAUSE
            .captures_iter(sql)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok()),
    }
}

/// The statement's own row offset, when it is a literal integer.
pub fn extract_offset(sql: &str) -> Option<u64> {
    match parse_single_query(sql) {
        Some(query) => query
            .offset
            .as_ref()
            .and_then(|offset| literal_u64(&offset.value)),
        None => OFFSET_CLAUSE
            .captures_iter(sql)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok()),
    }
}

/// Replaces the statement's row limit and offset with `LIMIT batch_limit OFFSET offset`.
pub fn rewrite(sql: &str, batch_limit: u64, offset: u64) -> String {
    match parse_single_query(sql) {
        Some(mut query) => {
            query.limit = Some(number(batch_limit));
            query.offset = Some(Offset {
                value: number(offset),
                rows: OffsetRows::None,
            });
            query.fetch = None;
            query.to_string()
        }
        None => {
            tracing::debug!("Rewriting LIMIT/OFFSET lexically");
            rewrite_lexically(sql, batch_limit, offset)
        }
    }
}

/// [`rewrite`] packaged with the page bounds it applied.
pub fn paginate(sql: &str, batch_limit: u64, offset: u64) -> PaginatedStatement {
    PaginatedStatement {
        sql: rewrite(sql, batch_limit, offset),
        limit: batch_limit,
        offset,
    }
}

fn rewrite_lexically(sql: &str, batch_limit: u64, offset: u64) -> String {
    let mut statement = sql.to_string();

    if let Some(limit) = LIMIT_CLAUSE.find_iter(sql).last() {
        let mut start = limit.start();
        let mut end = limit.end();
        if let Some(following) = FOLLOWING_OFFSET.find(&sql[end..]) {
            end += following.end();
        } else if let Some(preceding) = PRECEDING_OFFSET.find(&sql[..start]) {
            start = preceding.start();
        }
        statement = format!("{}{}", &sql[..start], &sql[end..]);
    }

    let mut trimmed = statement.trim_end();
    while let Some(rest) = trimmed.strip_suffix(';') {
        trimmed = rest.trim_end();
    }
    format!("{trimmed} LIMIT {batch_limit} OFFSET {offset}")
}

fn parse_single_query(sql: &str) -> Option<Box<Query>> {
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    if statements.len() != 1 {
        return None;
    }
    match statements.pop()? {
        Statement::Query(query) => Some(query),
        _ => None,
    }
}

fn literal_u64(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}

fn number(n: u64) -> Expr {
    Expr::Value(Value::Number(n.to_string(), false))
}
