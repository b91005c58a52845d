#![allow(dead_code)]

use actix_web::web;
use std::sync::{Arc, Mutex};
use textql_agents::{Text2SqlAgent, Text2SqlConfig};
use textql_api::state::AppState;
use textql_core::backend::memory::MemoryBackend;
use textql_core::{ExecutorSettings, QueryBackend, QueryExecutor, QueryPipeline};
use textql_llm_sdk::client::LlmClient;
use textql_llm_sdk::error::LlmError;
use textql_llm_sdk::types::{CompletionRequest, CompletionResponse, ContentBlock, Role, Usage};

pub const TABLE_FORMAT: &str = r#"{"output_format": "table", "confidence_score": 0.92, "clarification_question": null, "refined_query": ""}"#;

/// Replays canned answers in order, repeating the last one.
pub struct MockLlmClient {
    pub responses: Vec<String>,
    pub call_count: Arc<Mutex<usize>>,
    pub fail: bool,
}

impl MockLlmClient {
    pub fn with_responses(responses: &[&str]) -> Self {
        MockLlmClient {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            call_count: Arc::new(Mutex::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        MockLlmClient {
            responses: Vec::new(),
            call_count: Arc::new(Mutex::new(0)),
            fail: true,
        }
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut call_count = self.call_count.lock().unwrap();
        let idx = *call_count;
        *call_count += 1;
        drop(call_count);

        if self.fail {
            return Err(LlmError::api_error(503, "model overloaded".to_string()));
        }

        let text = self.responses[idx.min(self.responses.len() - 1)].clone();
        Ok(CompletionResponse {
            content: vec![ContentBlock::Text { text }],
            role: Role::Assistant,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
            stop_reason: Some("STOP".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Answer carrying `sql` the way the model is prompted to reply.
pub fn sql_answer(sql: &str) -> String {
    serde_json::json!({ "sql_query": sql, "explanation": "test" }).to_string()
}

pub fn test_state(
    llm: Arc<MockLlmClient>,
    backend: Arc<MemoryBackend>,
    settings: ExecutorSettings,
) -> web::Data<AppState> {
    let executor = QueryExecutor::new(backend as Arc<dyn QueryBackend>, settings);
    let agent = Text2SqlAgent::new(llm as Arc<dyn LlmClient>, Text2SqlConfig::default());
    web::Data::new(AppState::new(Arc::new(agent), QueryPipeline::new(executor)))
}
