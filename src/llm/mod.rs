//! LLM integration for chat-forge.
//!
//! Providers implement [`LlmProvider`]. Three are built in:
//!
//! - `mock`: canned conversations, no network access
//! - `gemini`: Google Gemini over its REST API, keyed by an API key
//! - `openai`: any OpenAI-compatible `/chat/completions` endpoint
//!   (OpenAI, LiteLLM proxies, OpenRouter)
//!
//! Calls are wrapped in [`retry_with_backoff`] by the generator.
//!
//! ```ignore
//! use chat_forge::config::GeneratorConfig;
//! use chat_forge::llm::{create_provider, GenerationRequest, Message};
//!
//! let provider = create_provider(&GeneratorConfig::default())?;
//! let request = GenerationRequest::new("", vec![Message::user("Small Talk")]);
//! let response = provider.generate(request).await?;
//! ```

pub mod litellm;
pub mod providers;
pub mod retry;

use std::sync::Arc;
use tracing::info;

use crate::config::GeneratorConfig;
use crate::error::LlmError;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};
pub use providers::{GeminiProvider, MockProvider};
pub use retry::{is_retryable, retry_with_backoff, RetryPolicy};

/// Builds the provider named by `config.llm_provider`.
///
/// HTTP providers read their API key from the environment variable named by
/// `config.api_key_env`.
pub fn create_provider(config: &GeneratorConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let name = config.llm_provider.trim().to_lowercase();
    let provider: Arc<dyn LlmProvider> = match name.as_str() {
        "mock" => Arc::new(MockProvider::new()),
        "gemini" => {
            let api_key = read_api_key(&config.api_key_env)?;
            let provider = match &config.api_base {
                Some(base) => GeminiProvider::with_base_url(
                    api_key,
                    base.as_str(),
                    config.model_name.as_str(),
                    config.request_timeout_secs,
                )?,
                None => GeminiProvider::new(
                    api_key,
                    config.model_name.as_str(),
                    config.request_timeout_secs,
                )?,
            };
            Arc::new(provider)
        }
        "openai" | "litellm" => {
            let api_key = read_api_key(&config.api_key_env)?;
            let base = config
                .api_base
                .as_deref()
                .unwrap_or(litellm::OPENAI_BASE_URL);
            Arc::new(LiteLlmClient::new(
                base,
                Some(api_key),
                config.model_name.as_str(),
                config.request_timeout_secs,
            )?)
        }
        _ => return Err(LlmError::UnknownProvider(config.llm_provider.clone())),
    };

    info!(provider = provider.name(), model = %config.model_name, "Initialized LLM provider");
    Ok(provider)
}

fn read_api_key(var: &str) -> Result<String, LlmError> {
    std::env::var(var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| LlmError::MissingApiKey(var.to_string()))
}

/// Builds the request sent for one conversation prompt.
pub fn conversation_request(config: &GeneratorConfig, prompt: String) -> GenerationRequest {
    GenerationRequest::new(config.model_name.clone(), vec![Message::user(prompt)])
        .with_temperature(config.temperature)
        .with_top_p(config.top_p)
        .with_top_k(config.top_k)
        .with_max_tokens(config.max_output_tokens)
        .with_penalties(config.presence_penalty, config.frequency_penalty)
        .with_stop_sequences(config.stop_sequences.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_needs_no_key() {
        let config = GeneratorConfig::default().with_llm_provider("Mock");
        let provider = create_provider(&config).expect("mock provider");
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_unknown_provider() {
        let config = GeneratorConfig::default().with_llm_provider("vertex");
        assert!(matches!(
            create_provider(&config),
            Err(LlmError::UnknownProvider(name)) if name == "vertex"
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = GeneratorConfig::default().with_llm_provider("gemini");
        config.api_key_env = "CHAT_FORGE_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(matches!(
            create_provider(&config),
            Err(LlmError::MissingApiKey(var)) if var == "CHAT_FORGE_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn test_conversation_request_carries_sampling_settings() {
        let config = GeneratorConfig::default();
        let request = conversation_request(&config, "prompt".to_string());
        assert_eq!(request.messages, vec![Message::user("prompt")]);
        assert_eq!(request.max_tokens, Some(config.max_output_tokens));
        assert_eq!(request.top_k, Some(config.top_k));
        assert_eq!(request.stop, config.stop_sequences);
    }
}
