use crate::config::LlmConfig;
use anyhow::anyhow;
use std::sync::Arc;
use textql_llm_sdk::client::LlmClient;
use textql_llm_sdk::gemini::GeminiClient;

pub fn create_llm_client(config: &LlmConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("No LLM API key configured. Set LLM_API_KEY or llm.api_key."))?;

    let mut client = GeminiClient::new(api_key)?.with_model(&config.model);
    if let Some(url) = config.api_url.as_deref().filter(|url| !url.is_empty()) {
        client = client.with_base_url(url);
    }

    tracing::info!(model = %config.model, "Using Gemini for SQL generation");
    Ok(Arc::new(client))
}
