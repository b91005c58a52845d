use textql_llm_sdk::client::LlmClient;
use textql_llm_sdk::error::LlmError;
use textql_llm_sdk::gemini::GeminiClient;
use textql_llm_sdk::types::{CompletionRequest, Message, ResponseFormat};

const MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

#[tokio::test]
async fn test_complete_returns_candidate_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", MODEL_PATH)
        .match_header("x-goog-api-key", "test-key")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"generationConfig": {"responseMimeType": "application/json"}}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            {"text": "thinking...", "thought": true},
                            {"text": "{\"sql\": \"SELECT 1\"}"}
                        ]
                    },
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5, "totalTokenCount": 17}
            }"#,
        )
        .create_async()
        .await;

    let client = GeminiClient::new("test-key")
        .unwrap()
        .with_base_url(server.url());

    let mut request = CompletionRequest::new("gemini-2.5-flash", vec![Message::user("hi")]);
    request.response_format = Some(ResponseFormat::JsonObject);

    let response = client.complete(request).await.unwrap();

    assert_eq!(response.text(), r#"{"sql": "SELECT 1"}"#);
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.usage.output_tokens, 5);
    assert_eq!(response.stop_reason.as_deref(), Some("STOP"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_error_is_mapped() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", MODEL_PATH)
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}}"#,
        )
        .create_async()
        .await;

    let client = GeminiClient::new("test-key")
        .unwrap()
        .with_base_url(server.url());

    let err = client
        .complete(CompletionRequest::new("", vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::RateLimit { .. }));
}

#[tokio::test]
async fn test_unstructured_error_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", MODEL_PATH)
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = GeminiClient::new("test-key")
        .unwrap()
        .with_base_url(server.url());

    let err = client
        .complete(CompletionRequest::new("gemini-2.5-flash", vec![Message::user("hi")]))
        .await
        .unwrap_err();

    match err {
        LlmError::Api { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message, "bad gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_candidates_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", MODEL_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": []}"#)
        .create_async()
        .await;

    let client = GeminiClient::new("test-key")
        .unwrap()
        .with_base_url(server.url());

    let err = client
        .complete(CompletionRequest::new("gemini-2.5-flash", vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Internal { .. }));
}
