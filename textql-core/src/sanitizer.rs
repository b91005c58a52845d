//! Lexical cleanup of generator output.
//!
//! The sanitizer never looks at SQL semantics: it unwraps a markdown fence,
//! drops a language tag and trailing statement terminators. An empty result is
//! not an error here; [`crate::pipeline::QueryPipeline`] turns it into
//! [`crate::QueryError::EmptyInput`].

use crate::types::{CandidateQuery, SanitizedQuery};

const FENCE: &str = "```";

/// Language tags models put after an opening fence.
const LANGUAGE_TAGS: [&str; 5] = ["sql", "postgresql", "postgres", "pgsql", "psql"];

/// Cleans a candidate statement.
pub fn sanitize(raw: &CandidateQuery) -> SanitizedQuery {
    SanitizedQuery::new(clean_sql(raw.as_str()))
}

/// String-level form of [`sanitize`].
pub fn clean_sql(raw: &str) -> String {
    let mut sql = raw.trim();

    if let Some(fenced) = sql.strip_prefix(FENCE) {
        // Content of the first fenced section; an unclosed fence runs to the end.
        let inner = match fenced.find(FENCE) {
            Some(end) => &fenced[..end],
            None => fenced,
        };
        sql = strip_language_tag(inner).trim();
    }

    strip_terminators(sql).to_string()
}

fn strip_language_tag(content: &str) -> &str {
    let token_end = content
        .find(|c: char| c.is_whitespace())
        .unwrap_or(content.len());
    let token = &content[..token_end];

    if LANGUAGE_TAGS
        .iter()
        .any(|tag| token.eq_ignore_ascii_case(tag))
    {
        &content[token_end..]
    } else {
        content
    }
}

fn strip_terminators(sql: &str) -> &str {
    let mut sql = sql.trim_end();
    while let Some(rest) = sql.strip_suffix(';') {
        sql = rest.trim_end();
    }
    sql.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_with_language_tag() {
        let raw = "```sql\nSELECT * FROM transactions WHERE merchant_city = 'Shymkent' LIMIT 1;\n```";
        assert_eq!(
            clean_sql(raw),
            "SELECT * FROM transactions WHERE merchant_city = 'Shymkent' LIMIT 1"
        );
    }

    #[test]
    fn test_fenced_block_variants() {
        assert_eq!(clean_sql("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```SQL\nSELECT 1;\n```"), "SELECT 1");
        assert_eq!(clean_sql("```postgresql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```sql SELECT 1```"), "SELECT 1");
        // Unclosed fence
        assert_eq!(clean_sql("```sql\nSELECT 1;"), "SELECT 1");
        // Only the first fenced section is kept
        assert_eq!(
            clean_sql("```sql\nSELECT 1\n```\nsome prose\n```sql\nSELECT 2\n```"),
            "SELECT 1"
        );
    }

    #[test]
    fn test_tag_like_prefix_of_identifier_is_kept() {
        assert_eq!(clean_sql("```\nsqlite_table\n```"), "sqlite_table");
    }

    #[test]
    fn test_trailing_terminators_and_whitespace() {
        assert_eq!(clean_sql("  SELECT 1 ;  "), "SELECT 1");
        assert_eq!(clean_sql("SELECT 1;;\n ;"), "SELECT 1");
        assert_eq!(clean_sql("SELECT ';' AS sep"), "SELECT ';' AS sep");
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(clean_sql(""), "");
        assert_eq!(clean_sql("   \n\t"), "");
        assert_eq!(clean_sql("```sql\n```"), "");
        assert!(sanitize(&CandidateQuery::new(" ; ")).is_empty());
    }

    #[test]
    fn test_sanitizing_is_idempotent() {
        let inputs = [
            "```sql\nSELECT * FROM transactions;\n```",
            "SELECT a, b FROM t WHERE c = 'x';;",
            "  WITH x AS (SELECT 1) SELECT * FROM x  ",
            "SELECT 1",
            "",
        ];
        for input in inputs {
            let once = clean_sql(input);
            assert_eq!(clean_sql(&once), once, "not idempotent for {input:?}");
        }
    }
}
