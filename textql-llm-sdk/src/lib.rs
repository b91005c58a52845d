//! # TextQL LLM SDK
//!
//! Provider-agnostic completion client used by the text-to-SQL agent, with a
//! Google Gemini implementation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use textql_llm_sdk::client::LlmClient;
//! use textql_llm_sdk::gemini::GeminiClient;
//! use textql_llm_sdk::types::{CompletionRequest, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GeminiClient::new("your-api-key")?;
//!     let response = client
//!         .complete(CompletionRequest::new(
//!             client.model_name(),
//!             vec![Message::user("Hello, Gemini!")],
//!         ))
//!         .await?;
//!
//!     println!("Response: {}", response.text());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod gemini;
pub mod models;
pub mod providers;
pub mod types;

pub use client::LlmClient;
pub use error::LlmError;

#[cfg(test)]
mod tests {
    use crate::gemini::GeminiClient;
    use crate::types::{ContentBlock, Message, Role};

    #[test]
    fn test_gemini_client_creation() {
        let client = GeminiClient::new("test-key");
        assert!(client.is_ok());
    }

    #[test]
    fn test_gemini_client_creation_empty_key() {
        let client = GeminiClient::new("");
        assert!(client.is_err());
    }

    #[test]
    fn test_message_creation() {
        let message = Message::user("Hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content.len(), 1);
        match &message.content[0] {
            ContentBlock::Text { text } => assert_eq!(text, "Hello"),
        }
    }
}
