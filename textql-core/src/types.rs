use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// One result row: column name to normalized JSON scalar, in result-set column order.
pub type Row = Map<String, Value>;

/// Raw statement text as produced by the text-to-SQL generator. Untrusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    text: String,
}

impl CandidateQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for CandidateQuery {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for CandidateQuery {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Statement text with markdown fencing and the trailing terminator removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SanitizedQuery(String);

impl SanitizedQuery {
    pub(crate) fn new(sql: String) -> Self {
        Self(sql)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SanitizedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A statement rewritten to fetch one page of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedStatement {
    pub sql: String,
    pub limit: u64,
    pub offset: u64,
}

/// A bounded group of rows emitted as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBatch {
    rows: Vec<Row>,
}

impl ResultBatch {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Renders the batch as one newline-terminated JSON array.
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(&self.rows)?;
        line.push('\n');
        Ok(line)
    }
}

/// Materialized query result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub data: Vec<Row>,
    /// Number of rows in `data`, after any row-cap truncation.
    pub row_count: usize,
    pub execution_time_ms: f64,
    /// Set when the row cap cut the result short.
    pub truncated: bool,
}

impl ExecutionResult {
    pub fn new(data: Vec<Row>, truncated: bool, elapsed: Duration) -> Self {
        Self {
            row_count: data.len(),
            data,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            truncated,
        }
    }
}
