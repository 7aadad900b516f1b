//! LLM provider implementations.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;

// Re-export the main LlmProvider trait from litellm for convenience
pub use super::litellm::LlmProvider;
