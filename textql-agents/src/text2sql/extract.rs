//! Pulls a SQL statement out of a free-form model answer.
//!
//! Stages, first hit wins:
//!
//! 1. the whole answer parses as JSON with a `sql_query` field
//! 2. the `{...}` span of the answer parses as such JSON
//! 3. text from the first `SELECT` or `WITH` word up to `;`, a fence or a
//!    blank line
//! 4. the whole answer
//!
//! The result is still untrusted; fences and terminators are left for the
//! sanitizer.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use textql_core::validator::find_statement_separator;
use textql_core::IntentSignal;

static READ_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(SELECT|WITH)\b").expect("static regex"));
static JSON_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^json\b\s*").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSql {
    pub sql: String,
    pub explanation: Option<String>,
    /// Present when the model reported its own intent check.
    pub signal: Option<IntentSignal>,
}

#[derive(Debug, Deserialize)]
struct SqlAnswer {
    #[serde(default, alias = "sql")]
    sql_query: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    matches_intent: Option<bool>,
    #[serde(default)]
    alternative_query: Option<String>,
}

pub fn extract_sql(response: &str) -> Option<ExtractedSql> {
    let body = response.trim();

    let from_json = std::iter::once(body)
        .chain(json_object(body))
        .find_map(parse_answer);
    if from_json.is_some() {
        return from_json;
    }

    if let Some(sql) = leading_statement(body) {
        return Some(plain(sql));
    }

    let whole = JSON_PREFIX.replace(body, "");
    let whole = whole.trim();
    if whole.is_empty() {
        None
    } else {
        Some(plain(whole))
    }
}

/// The span from the first `{` to the last `}`.
pub(crate) fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_answer(text: &str) -> Option<ExtractedSql> {
    let answer: SqlAnswer = serde_json::from_str(text).ok()?;
    let sql = answer.sql_query.filter(|sql| !sql.trim().is_empty())?;

    let alternative_query = answer
        .alternative_query
        .filter(|alt| !alt.trim().is_empty() && !alt.trim().eq_ignore_ascii_case("null"));
    let signal = (answer.matches_intent.is_some() || alternative_query.is_some()).then(|| {
        IntentSignal {
            matches_intent: answer.matches_intent.unwrap_or(true),
            alternative_query,
        }
    });

    Some(ExtractedSql {
        sql,
        explanation: answer.explanation,
        signal,
    })
}

fn leading_statement(body: &str) -> Option<&str> {
    let start = READ_KEYWORD.find(body)?.start();
    let rest = &body[start..];

    let end = [
        find_statement_separator(rest).map(|i| i + 1),
        rest.find("```"),
        rest.find("\n\n"),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(rest.len());

    let sql = rest[..end].trim();
    (!sql.is_empty()).then_some(sql)
}

fn plain(sql: &str) -> ExtractedSql {
    ExtractedSql {
        sql: sql.to_string(),
        explanation: None,
        signal: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json() {
        let extracted = extract_sql(
            r#"{"sql_query": "SELECT COUNT(*) FROM transactions", "explanation": "count rows"}"#,
        )
        .unwrap();
        assert_eq!(extracted.sql, "SELECT COUNT(*) FROM transactions");
        assert_eq!(extracted.explanation.as_deref(), Some("count rows"));
        assert_eq!(extracted.signal, None);
    }

    #[test]
    fn test_json_inside_prose_and_fences() {
        let response = "json\n```json\n{\"sql_query\": \"SELECT * FROM transactions LIMIT 5;\"}\n```\nHope this helps!";
        let extracted = extract_sql(response).unwrap();
        assert_eq!(extracted.sql, "SELECT * FROM transactions LIMIT 5;");
    }

    #[test]
    fn test_json_carries_intent_signal() {
        let extracted = extract_sql(
            r#"{"sql_query": "SELECT * FROM transactions", "matches_intent": false, "alternative_query": "SELECT COUNT(*) FROM transactions"}"#,
        )
        .unwrap();
        assert_eq!(
            extracted.signal,
            Some(IntentSignal {
                matches_intent: false,
                alternative_query: Some("SELECT COUNT(*) FROM transactions".to_string()),
            })
        );

        let extracted = extract_sql(
            r#"{"sql_query": "SELECT 1", "matches_intent": true, "alternative_query": "null"}"#,
        )
        .unwrap();
        assert_eq!(
            extracted.signal,
            Some(IntentSignal {
                matches_intent: true,
                alternative_query: None,
            })
        );
    }

    #[test]
    fn test_first_read_keyword_wins() {
        let response = "Here you go:\nWITH t AS (SELECT 1) SELECT * FROM t;\nThis counts rows.";
        assert_eq!(
            extract_sql(response).unwrap().sql,
            "WITH t AS (SELECT 1) SELECT * FROM t;"
        );
    }

    #[test]
    fn test_statement_ends_at_fence_or_blank_line() {
        let fenced = "```sql\nSELECT id\nFROM transactions\n```";
        assert_eq!(extract_sql(fenced).unwrap().sql, "SELECT id\nFROM transactions");

        let prose = "SELECT id FROM transactions\n\nThe query lists ids.";
        assert_eq!(extract_sql(prose).unwrap().sql, "SELECT id FROM transactions");
    }

    #[test]
    fn test_semicolon_inside_literal_does_not_end_statement() {
        let response = "SELECT * FROM transactions WHERE merchant_name = 'Cafe;Bar'; -- done";
        assert_eq!(
            extract_sql(response).unwrap().sql,
            "SELECT * FROM transactions WHERE merchant_name = 'Cafe;Bar';"
        );
    }

    #[test]
    fn test_json_without_sql_falls_through() {
        let response = r#"{"explanation": "no"} select 1"#;
        assert_eq!(extract_sql(response).unwrap().sql, "select 1");
    }

    #[test]
    fn test_whole_body_fallback() {
        assert_eq!(
            extract_sql("json DROP TABLE transactions").unwrap().sql,
            "DROP TABLE transactions"
        );
        assert_eq!(extract_sql("   "), None);
        assert_eq!(extract_sql("json"), None);
    }
}
