use serde::{Deserialize, Deserializer, Serialize};

/// How the client should present the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    #[default]
    Table,
    Graph,
    Diagram,
}

/// Confidence assigned when the model's format answer cannot be read.
pub const FALLBACK_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDecision {
    pub output_format: OutputFormat,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    #[serde(default, deserialize_with = "nullable_text")]
    pub clarification_question: Option<String>,
    #[serde(default)]
    pub refined_query: String,
}

fn default_confidence() -> f64 {
    FALLBACK_CONFIDENCE
}

/// Treats `null`, `""` and the string `"null"` alike.
fn nullable_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| {
        let text = text.trim();
        !text.is_empty() && !text.eq_ignore_ascii_case("null")
    }))
}

impl FormatDecision {
    pub fn fallback(question: &str) -> Self {
        Self {
            output_format: OutputFormat::Table,
            confidence_score: FALLBACK_CONFIDENCE,
            clarification_question: None,
            refined_query: question.to_string(),
        }
    }

    /// Reads the model's answer, falling back to a table for anything unreadable.
    pub fn parse(response: &str, question: &str) -> Self {
        let body = super::extract::json_object(response).unwrap_or(response);
        match serde_json::from_str::<FormatDecision>(body) {
            Ok(mut decision) => {
                if decision.refined_query.trim().is_empty() {
                    decision.refined_query = question.to_string();
                }
                decision
            }
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable format decision, using table");
                Self::fallback(question)
            }
        }
    }

    /// The question SQL should be generated for.
    pub fn query_text(&self) -> &str {
        &self.refined_query
    }
}
