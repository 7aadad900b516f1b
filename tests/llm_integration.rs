//! Integration tests against the live Gemini API.
//!
//! These tests make real API calls.
//! Run with: GEMINI_API_KEY=your_key cargo test --test llm_integration -- --ignored

use chat_forge::generation::parse_conversation;
use chat_forge::generation::Fallbacks;
use chat_forge::llm::providers::gemini::DEFAULT_GEMINI_MODEL;
use chat_forge::llm::{GeminiProvider, GenerationRequest, LlmProvider, Message};

fn get_test_api_key() -> String {
    std::env::var("GEMINI_API_KEY")
        .expect("GEMINI_API_KEY environment variable must be set for integration tests")
}

fn create_test_client() -> GeminiProvider {
    GeminiProvider::new(get_test_api_key(), DEFAULT_GEMINI_MODEL, 60).expect("client")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        DEFAULT_GEMINI_MODEL,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(content.contains('4'), "Response should contain '4', got: {}", content);
    assert!(response.usage.total_tokens > 0, "Should have token usage");
}

#[tokio::test]
#[ignore]
async fn test_conversation_prompt_parses() {
    let client = create_test_client();

    let prompt = "Generate a 4-message conversation between a financial advisor named Alice \
                  and a client named Allen about retirement savings.\n\
                  Format the conversation exactly as follows:\n\
                  {\"speaker\": \"advisor\", \"text\": \"...\"}\n\
                  {\"speaker\": \"client\", \"text\": \"...\"}\n\
                  Do not include any other text.";
    let request = GenerationRequest::new(DEFAULT_GEMINI_MODEL, vec![Message::user(prompt)])
        .with_temperature(0.3)
        .with_max_tokens(600);

    let response = client.generate(request).await.expect("generation");
    let content = response.first_content().expect("content");
    let lines = parse_conversation(
        content,
        Fallbacks {
            advisor_opening: "How can I help you today?",
            client_closing: "Thank you for the information.",
        },
    );
    assert!(lines.len() >= 2, "Expected parsed lines, got: {content}");
}
