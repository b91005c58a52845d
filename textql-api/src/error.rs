use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use textql_agents::Text2SqlError;
use textql_core::QueryError;
use thiserror::Error;

use crate::models::ErrorResponse;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("SQL generation failed: {0}")]
    Generation(String),

    #[error("Failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<Text2SqlError> for ApiError {
    fn from(err: Text2SqlError) -> Self {
        match err {
            Text2SqlError::Query(query_err) => ApiError::Query(query_err),
            other => ApiError::Generation(other.to_string()),
        }
    }
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::MissingField(_) | ApiError::InvalidBody(_) => "invalid_request",
            ApiError::Query(QueryError::EmptyInput) => "empty_query",
            ApiError::Query(QueryError::SecurityViolation(_)) => "security_violation",
            ApiError::Query(QueryError::InvalidQuery(_)) => "invalid_query",
            ApiError::Query(QueryError::ExecutionFailure(_)) | ApiError::Encoding(_) => {
                "internal_error"
            }
            ApiError::Generation(_) => "generation_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_)
            | ApiError::InvalidBody(_)
            | ApiError::Query(QueryError::EmptyInput)
            | ApiError::Query(QueryError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            ApiError::Query(QueryError::SecurityViolation(_)) => StatusCode::FORBIDDEN,
            ApiError::Query(QueryError::ExecutionFailure(_)) | ApiError::Encoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Generation(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
            self.to_string()
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: self.error_type().to_string(),
            message,
        })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
