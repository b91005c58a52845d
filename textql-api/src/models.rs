use serde::{Deserialize, Serialize};
use textql_agents::OutputFormat;
use textql_core::ExecutionResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub sql: String,
    pub output_format: OutputFormat,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationResponse {
    pub requires_clarification: bool,
    pub content: String,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
