//! Statement execution in two modes.
//!
//! - [`QueryExecutor::execute`] streams the statement as written, in batches
//!   of `batch_size` rows, with no row cap
//! - [`QueryExecutor::execute_bounded`] materializes at most
//!   `max_result_rows` rows, paging with rewritten `LIMIT`/`OFFSET` unless the
//!   statement already limits itself
//!
//! OFFSET paging is only deterministic when the statement has an `ORDER BY`;
//! without one the data store may return overlapping or missing rows across
//! pages.

use crate::backend::{QueryBackend, RowStream};
use crate::error::QueryError;
use crate::pagination;
use crate::types::{ExecutionResult, ResultBatch, Row};
use crate::validator;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_MAX_RESULT_ROWS: usize = 10_000;

/// Batches of rows in result order. Dropping the stream releases the connection.
pub type BatchStream = BoxStream<'static, Result<ResultBatch, QueryError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub batch_size: usize,
    pub max_result_rows: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_result_rows: DEFAULT_MAX_RESULT_ROWS,
        }
    }
}

#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
    settings: ExecutorSettings,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>, settings: ExecutorSettings) -> Self {
        Self {
            backend,
            settings: ExecutorSettings {
                batch_size: settings.batch_size.max(1),
                max_result_rows: settings.max_result_rows.max(1),
            },
        }
    }

    pub fn settings(&self) -> ExecutorSettings {
        self.settings
    }

    /// Streams `sql` unmodified. Each batch holds `batch_size` rows except
    /// possibly the last; an empty result yields no batches.
    pub fn execute(&self, sql: &str) -> Result<BatchStream, QueryError> {
        ensure_read_statement(sql)?;
        info!(batch_size = self.settings.batch_size, "Streaming query");

        let rows = self.backend.stream_rows(sql.to_string());
        Ok(into_batches(rows, self.settings.batch_size))
    }

    /// Runs `sql` to completion, keeping at most `max_result_rows` rows.
    pub async fn execute_bounded(&self, sql: &str) -> Result<ExecutionResult, QueryError> {
        ensure_read_statement(sql)?;
        let start = Instant::now();

        let (rows, truncated) = if pagination::has_explicit_limit(sql) {
            self.fetch_verbatim(sql).await?
        } else {
            self.fetch_paginated(sql).await?
        };

        let result = ExecutionResult::new(rows, truncated, start.elapsed());
        info!(
            row_count = result.row_count,
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );
        Ok(result)
    }

    /// Pulls one row past the cap to learn whether the result was cut; the
    /// rest of the statement's own LIMIT is never fetched.
    async fn fetch_verbatim(&self, sql: &str) -> Result<(Vec<Row>, bool), QueryError> {
        debug!("Statement limits itself, executing verbatim");
        let cap = self.settings.max_result_rows;

        let mut rows: Vec<Row> = self
            .backend
            .stream_rows(sql.to_string())
            .take(cap.saturating_add(1))
            .try_collect()
            .await?;

        let truncated = rows.len() > cap;
        rows.truncate(cap);
        if truncated {
            info!(max_result_rows = cap, "Result truncated at row cap");
        }
        Ok((rows, truncated))
    }

    async fn fetch_paginated(&self, sql: &str) -> Result<(Vec<Row>, bool), QueryError> {
        let batch_size = self.settings.batch_size;
        let cap = self.settings.max_result_rows;
        // A bare OFFSET in the statement is where paging starts.
        let base_offset = pagination::extract_offset(sql).unwrap_or(0);

        let mut rows: Vec<Row> = Vec::new();
        let mut offset = 0u64;

        loop {
            let page = pagination::paginate(sql, batch_size as u64, base_offset + offset);
            debug!(limit = page.limit, offset = page.offset, "Fetching page");

            let fetched = self.backend.fetch_all(&page.sql).await?;
            let fetched_len = fetched.len();
            rows.extend(fetched);

            if rows.len() >= cap {
                // A short last page means the source ran dry exactly at the cap.
                let truncated = rows.len() > cap || fetched_len == batch_size;
                rows.truncate(cap);
                if truncated {
                    info!(max_result_rows = cap, "Result truncated at row cap");
                }
                return Ok((rows, truncated));
            }

            if fetched_len < batch_size {
                return Ok((rows, false));
            }

            offset += batch_size as u64;
        }
    }
}

/// Rejects anything that does not open with SELECT or WITH.
pub fn ensure_read_statement(sql: &str) -> Result<(), QueryError> {
    if validator::starts_with_read_keyword(sql) {
        Ok(())
    } else {
        Err(QueryError::InvalidQuery(
            "Only SELECT queries are allowed".to_string(),
        ))
    }
}

/// Groups a row stream into batches of `batch_size` rows.
///
/// An error ends the stream after the rows before it have been flushed.
pub fn into_batches(rows: RowStream, batch_size: usize) -> BatchStream {
    struct State {
        rows: RowStream,
        pending_error: Option<QueryError>,
        done: bool,
    }

    let state = State {
        rows,
        pending_error: None,
        done: false,
    };

    stream::unfold(state, move |mut state| async move {
        if let Some(error) = state.pending_error.take() {
            state.done = true;
            return Some((Err(error), state));
        }
        if state.done {
            return None;
        }

        let mut batch = Vec::with_capacity(batch_size.min(1024));
        while batch.len() < batch_size {
            match state.rows.next().await {
                Some(Ok(row)) => batch.push(row),
                Some(Err(error)) => {
                    state.done = true;
                    if batch.is_empty() {
                        return Some((Err(error), state));
                    }
                    state.pending_error = Some(error);
                    break;
                }
                None => {
                    state.done = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some((Ok(ResultBatch::new(batch)), state))
        }
    })
    .boxed()
}
