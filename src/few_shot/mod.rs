//! Few-shot example strategies.
//!
//! Example conversations live as `.txt` files under the configured examples
//! directory and are looked up by naming convention, from the most specific
//! match (`category/topic/subtopic*.txt`) down to `generic*.txt`.

mod basic;

use rand_chacha::ChaCha8Rng;

use crate::models::TopicPath;

pub use basic::BasicFewShotStrategy;

/// Strategy for choosing example conversations to embed in prompts.
pub trait FewShotStrategy: Send + Sync {
    /// Registry name of this strategy.
    fn name(&self) -> &'static str;

    /// Returns example conversation texts for the given conversation.
    fn get_examples(
        &self,
        conversation_type: &str,
        topic: &TopicPath,
        rng: &mut ChaCha8Rng,
    ) -> Vec<String>;

    /// Renders examples as a prompt section. Empty input renders as "".
    fn format_examples(&self, examples: &[String]) -> String {
        if examples.is_empty() {
            return String::new();
        }

        let mut formatted = String::from(
            "Here are some example conversations similar to what I want you to generate:\n\n",
        );
        for (i, example) in examples.iter().enumerate() {
            formatted.push_str(&format!("EXAMPLE {}:\n{}\n\n", i + 1, example));
        }
        formatted.push_str(
            "Now, generate a new conversation following a similar format, but don't copy these examples directly.\n",
        );
        formatted
    }
}
