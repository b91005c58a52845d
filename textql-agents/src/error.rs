use textql_core::QueryError;
use textql_llm_sdk::error::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Text2SqlError {
    #[error("SQL generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Model response did not contain a SQL query")]
    NoSql,

    #[error(transparent)]
    Query(#[from] QueryError),
}
