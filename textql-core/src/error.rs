/// Failure kinds surfaced by the query pipeline.
///
/// Callers decide the outward mapping: `EmptyInput`, `SecurityViolation` and
/// `InvalidQuery` are caller or generator faults, `ExecutionFailure` is a
/// server fault and its message never carries connection details.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Nothing to execute: the SQL query is empty")]
    EmptyInput,
    #[error("Query violates security policy: {0}")]
    SecurityViolation(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Execution failure: {0}")]
    ExecutionFailure(String),
}

impl QueryError {
    /// True for errors caused by the submitted statement rather than the server.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, QueryError::ExecutionFailure(_))
    }
}

// SQLSTATE classes that point at the statement itself.
const STATEMENT_FAULT_CLASSES: [&str; 4] = ["42", "22", "0A", "21"];
const READ_ONLY_VIOLATION: &str = "25006";
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                if code == READ_ONLY_VIOLATION {
                    QueryError::SecurityViolation(format!(
                        "write attempted in a read-only session: {}",
                        db_err.message()
                    ))
                } else if code == QUERY_CANCELED {
                    QueryError::ExecutionFailure("statement timeout exceeded".to_string())
                } else if STATEMENT_FAULT_CLASSES
                    .iter()
                    .any(|class| code.starts_with(class))
                {
                    QueryError::InvalidQuery(db_err.message().to_string())
                } else {
                    tracing::error!(sqlstate = %code, error = %db_err, "Database error");
                    QueryError::ExecutionFailure("database error".to_string())
                }
            }
            sqlx::Error::PoolTimedOut => {
                QueryError::ExecutionFailure("connection pool exhausted".to_string())
            }
            sqlx::Error::PoolClosed => {
                QueryError::ExecutionFailure("connection pool closed".to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                tracing::error!(error = %err, "Failed to decode result column");
                QueryError::ExecutionFailure("failed to decode result row".to_string())
            }
            _ => {
                tracing::error!(error = %err, "Database unavailable");
                QueryError::ExecutionFailure("database unavailable".to_string())
            }
        }
    }
}
