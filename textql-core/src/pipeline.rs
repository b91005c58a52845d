//! Sanitize, validate and then execute, in that order.

use crate::error::QueryError;
use crate::executor::{BatchStream, QueryExecutor};
use crate::sanitizer;
use crate::types::{CandidateQuery, ExecutionResult, SanitizedQuery};
use crate::validator::{IntentSignal, SecurityValidator, ValidationVerdict};
use tracing::warn;

/// A statement that passed sanitizing and validation.
///
/// Only [`QueryPipeline::prepare`] builds one, so holding a `PreparedQuery`
/// means the validator judged the statement safe.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    sql: SanitizedQuery,
    verdict: ValidationVerdict,
}

impl PreparedQuery {
    pub fn sql(&self) -> &str {
        self.sql.as_str()
    }

    pub fn verdict(&self) -> &ValidationVerdict {
        &self.verdict
    }
}

#[derive(Clone)]
pub struct QueryPipeline {
    validator: SecurityValidator,
    executor: QueryExecutor,
}

impl QueryPipeline {
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            validator: SecurityValidator::new(),
            executor,
        }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Cleans and checks a candidate. Nothing touches the data store here.
    pub fn prepare(
        &self,
        candidate: &CandidateQuery,
        user_intent: &str,
        signal: Option<&IntentSignal>,
    ) -> Result<PreparedQuery, QueryError> {
        let sql = sanitizer::sanitize(candidate);
        if sql.is_empty() {
            return Err(QueryError::EmptyInput);
        }

        let verdict = self
            .validator
            .validate_with_signal(sql.as_str(), user_intent, signal);
        if !verdict.is_safe() {
            warn!(notes = verdict.notes(), "Rejected generated SQL");
            return Err(QueryError::SecurityViolation(verdict.notes().to_string()));
        }

        Ok(PreparedQuery { sql, verdict })
    }

    pub fn stream(&self, prepared: &PreparedQuery) -> Result<BatchStream, QueryError> {
        self.executor.execute(prepared.sql())
    }

    pub async fn materialize(&self, prepared: &PreparedQuery) -> Result<ExecutionResult, QueryError> {
        self.executor.execute_bounded(prepared.sql()).await
    }
}
