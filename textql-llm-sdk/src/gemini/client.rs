use super::types::*;
use crate::client::LlmClient;
use crate::error::LlmError;
use crate::models::gemini::GEMINI_2_5_FLASH;
use crate::types::{
    CompletionRequest, CompletionResponse, ContentBlock, ResponseFormat, Role, Usage,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini API client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::authentication("API key cannot be empty"));
        }

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Network { source: e })?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: GEMINI_2_5_FLASH.to_string(),
            http_client,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Default model for requests that do not name one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_content(
        &self,
        model: impl Into<String>,
        request: GeminiGenerateContentRequest,
    ) -> Result<GeminiGenerateContentResponse, LlmError> {
        let model = model.into();
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LlmError::authentication(format!("Invalid API key format: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(model = %model, "Sending Gemini generateContent request");

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network { source: e })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_body) {
                return Err(Self::map_error(
                    error_response.error.code,
                    error_response.error.message,
                ));
            }

            return Err(LlmError::api_error(status.as_u16(), error_body));
        }

        let generate_response = response
            .json::<GeminiGenerateContentResponse>()
            .await
            .map_err(|e| LlmError::internal(format!("Failed to parse response: {}", e)))?;

        Ok(generate_response)
    }

    fn map_error(status: u16, message: String) -> LlmError {
        match status {
            400 => LlmError::invalid_request(message),
            401 | 403 => LlmError::Authentication { message },
            429 => LlmError::rate_limit(message, None),
            _ => LlmError::api_error(status, message),
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let contents = request
            .messages
            .into_iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => GeminiRole::Model,
                    Role::User | Role::System => GeminiRole::User,
                };
                let parts = msg
                    .content
                    .into_iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => GeminiPart::text(text),
                    })
                    .collect();
                GeminiContent { role, parts }
            })
            .collect();

        let generation_config = GenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            max_output_tokens: (request.max_tokens > 0).then_some(request.max_tokens),
            stop_sequences: request.stop_sequences,
            response_mime_type: match request.response_format {
                Some(ResponseFormat::JsonObject) => Some("application/json".to_string()),
                _ => None,
            },
        };

        let gemini_request = GeminiGenerateContentRequest {
            contents,
            system_instruction: request.system.map(|text| GeminiContent {
                role: GeminiRole::User,
                parts: vec![GeminiPart::text(text)],
            }),
            generation_config: Some(generation_config),
        };

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model
        };

        let response = self.generate_content(model, gemini_request).await?;

        let text = response
            .text()
            .ok_or_else(|| LlmError::internal("Gemini returned no candidates"))?;
        let stop_reason = response
            .candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.clone());
        let usage = response
            .usage_metadata
            .map(|usage| Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: vec![ContentBlock::Text { text }],
            role: Role::Assistant,
            usage,
            stop_reason,
        })
    }

    fn provider_name(&self) -> &str {
        crate::providers::GOOGLE
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
