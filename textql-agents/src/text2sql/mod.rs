use crate::error::Text2SqlError;
use std::sync::Arc;
use textql_core::{CandidateQuery, IntentSignal, PreparedQuery, QueryError, QueryPipeline};
use textql_llm_sdk::client::LlmClient;
use textql_llm_sdk::types::{CompletionRequest, Message, ResponseFormat};

pub mod extract;
mod format;
pub mod prompt;

pub use format::{FormatDecision, OutputFormat, FALLBACK_CONFIDENCE};


/// Characters of generated SQL written to the log.
const LOGGED_SQL_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct Text2SqlConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Regenerations allowed after an empty or unsafe candidate.
    pub max_retries: u32,
}

impl Default for Text2SqlConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens: 5000,
            max_retries: 3,
        }
    }
}

/// One model answer reduced to a candidate statement.
#[derive(Debug, Clone)]
pub struct GeneratedSql {
    pub candidate: CandidateQuery,
    pub explanation: Option<String>,
    pub signal: Option<IntentSignal>,
}

/// What to do with a user question.
#[derive(Debug, Clone)]
pub enum Plan {
    /// The model wants more context before generating SQL.
    Clarification(FormatDecision),
    Ready {
        decision: FormatDecision,
        prepared: PreparedQuery,
    },
}

/// Turns natural-language questions about the `transactions` table into
/// validated SQL.
pub struct Text2SqlAgent {
    client: Arc<dyn LlmClient>,
    config: Text2SqlConfig,
    system_prompt: String,
}

impl Text2SqlAgent {
    pub fn new(client: Arc<dyn LlmClient>, config: Text2SqlConfig) -> Self {
        Self {
            client,
            config,
            system_prompt: prompt::system_prompt(),
        }
    }

    pub fn config(&self) -> &Text2SqlConfig {
        &self.config
    }

    pub async fn determine_output_format(
        &self,
        question: &str,
    ) -> Result<FormatDecision, Text2SqlError> {
        let response = self.ask(prompt::format_prompt(question)).await?;
        let decision = FormatDecision::parse(&response, question);
        tracing::info!(
            output_format = ?decision.output_format,
            confidence = decision.confidence_score,
            clarification = decision.clarification_question.is_some(),
            "Output format decided"
        );
        Ok(decision)
    }

    pub async fn generate(&self, question: &str) -> Result<GeneratedSql, Text2SqlError> {
        let response = self.ask(prompt::sql_prompt(question)).await?;
        let extracted = extract::extract_sql(&response).ok_or(Text2SqlError::NoSql)?;

        tracing::info!(
            sql = %truncate(&extracted.sql, LOGGED_SQL_CHARS),
            "Generated SQL"
        );

        Ok(GeneratedSql {
            candidate: CandidateQuery::new(extracted.sql),
            explanation: extracted.explanation,
            signal: extracted.signal,
        })
    }

    /// Generates until the pipeline accepts a candidate.
    ///
    /// Empty and unsafe candidates are regenerated up to `max_retries` times;
    /// after that the last rejection is returned.
    pub async fn generate_prepared(
        &self,
        question: &str,
        pipeline: &QueryPipeline,
    ) -> Result<PreparedQuery, Text2SqlError> {
        let mut retries = 0;

        loop {
            let generated = self.generate(question).await?;
            match pipeline.prepare(&generated.candidate, question, generated.signal.as_ref()) {
                Ok(prepared) => return Ok(prepared),
                Err(err @ (QueryError::EmptyInput | QueryError::SecurityViolation(_)))
                    if retries < self.config.max_retries =>
                {
                    retries += 1;
                    tracing::warn!(retries, error = %err, "Candidate rejected, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn plan(
        &self,
        question: &str,
        pipeline: &QueryPipeline,
    ) -> Result<Plan, Text2SqlError> {
        let decision = self.determine_output_format(question).await?;
        if decision.clarification_question.is_some() {
            return Ok(Plan::Clarification(decision));
        }

        let prepared = self
            .generate_prepared(decision.query_text(), pipeline)
            .await?;
        Ok(Plan::Ready { decision, prepared })
    }

    async fn ask(&self, prompt: String) -> Result<String, Text2SqlError> {
        let request = CompletionRequest {
            messages: vec![Message::user(prompt)],
            max_tokens: self.config.max_output_tokens,
            model: self.client.model_name().to_string(),
            system: Some(self.system_prompt.clone()),
            temperature: Some(self.config.temperature),
            top_p: None,
            stop_sequences: None,
            response_format: Some(ResponseFormat::JsonObject),
        };

        let response = self.client.complete(request).await?;
        Ok(response.text())
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
