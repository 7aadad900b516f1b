//! Generation strategies: conversation blueprints, prompt construction and
//! LLM response parsing.
//!
//! A strategy turns a selected topic into a [`ManifestBlueprint`], renders
//! the blueprint into a prompt, and parses the model output back into
//! [`ChatLine`]s. Parsing is shared between strategies; only the fallback
//! lines used to guarantee both speakers differ.

mod company_tagging;
mod financial_advisory;
mod parsing;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::companies::CompanyCatalog;
use crate::config::MessageLengthRatio;
use crate::error::GenerationError;
use crate::models::{ChatLine, TopicPath};

pub use company_tagging::CompanyTaggingGeneration;
pub use financial_advisory::FinancialAdvisoryGeneration;
pub use parsing::{parse_conversation, Fallbacks};

/// Output format instructions shared by every prompt.
pub(crate) const FORMAT_INSTRUCTIONS: &str = r#"
Format the conversation exactly as follows:
{"speaker": "advisor", "text": "Hello [client name], how can I help you today?"}
{"speaker": "client", "text": "Hi [advisor name], I'm interested in discussing [topic]."}
...

Do not include any other text, explanations, or commentary outside of this format.
"#;

/// Style used when a message format has no dedicated description.
const DEFAULT_FORMAT_STYLE: &str = "professional, clear, helpful";

/// Coarse length bucket derived from the requested message count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationLength {
    Short,
    Medium,
    Long,
}

impl ConversationLength {
    /// Short below 8 messages, long above 12.
    pub fn from_message_count(num_messages: usize) -> Self {
        if num_messages < 8 {
            Self::Short
        } else if num_messages > 12 {
            Self::Long
        } else {
            Self::Medium
        }
    }

    /// Message length mix for this bucket. Medium conversations use the
    /// configured ratio.
    pub fn message_length_distribution(self, configured: MessageLengthRatio) -> MessageLengthRatio {
        match self {
            Self::Short => MessageLengthRatio::new(0.6, 0.3, 0.1),
            Self::Long => MessageLengthRatio::new(0.3, 0.4, 0.3),
            Self::Medium => configured,
        }
    }
}

/// Plan for a single conversation, produced before the prompt is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestBlueprint {
    pub category: String,
    pub main_topic: String,
    pub subtopic: Option<String>,
    pub conversation_type: String,
    pub message_format: String,
    pub conversation_length: ConversationLength,
    pub company_targeting_enabled: bool,
    pub key_companies: Vec<String>,
    pub message_style: String,
    pub typical_message_length: MessageLengthRatio,
}

/// Everything a strategy needs to render a prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub advisor: &'a str,
    pub client: &'a str,
    pub conversation_type: &'a str,
    pub num_messages: usize,
    pub blueprint: &'a ManifestBlueprint,
    /// Pre-formatted few-shot section, empty when there are no examples.
    pub examples_block: &'a str,
}

/// Strategy for planning, prompting and parsing one kind of conversation.
pub trait GenerationStrategy: Send + Sync {
    /// Registry name of this strategy.
    fn name(&self) -> &'static str;

    fn create_manifest_blueprint(
        &self,
        conversation_type: &str,
        topic: &TopicPath,
        num_messages: usize,
        rng: &mut ChaCha8Rng,
    ) -> ManifestBlueprint;

    fn construct_prompt(
        &self,
        request: &PromptRequest<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Result<String, GenerationError>;

    /// Parses a raw model response. Returns an empty list when nothing in
    /// the response looks like a conversation.
    fn process_llm_response(&self, response: &str) -> Vec<ChatLine>;

    /// Companies this strategy draws from, used for mention detection.
    fn company_catalog(&self) -> &CompanyCatalog;
}

/// Looks up the message format by conversation type, then by main topic.
pub fn message_format_for(
    formats: &BTreeMap<String, String>,
    conversation_type: &str,
    main_topic: &str,
) -> String {
    formats
        .get(conversation_type)
        .or_else(|| formats.get(main_topic))
        .cloned()
        .unwrap_or_else(|| "formal".to_string())
}

/// Describes the writing style implied by a message format.
pub fn format_style(message_format: &str) -> &'static str {
    match message_format {
        "formal" => "professional, structured, detailed, uses industry terminology",
        "informal" => "conversational, friendly, uses simpler language",
        "confidential" => "discreet, careful, sensitive, focused on privacy",
        "structured" => "organized, analytical, fact-based, methodical",
        _ => DEFAULT_FORMAT_STYLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_length_thresholds() {
        assert_eq!(ConversationLength::from_message_count(2), ConversationLength::Short);
        assert_eq!(ConversationLength::from_message_count(7), ConversationLength::Short);
        assert_eq!(ConversationLength::from_message_count(8), ConversationLength::Medium);
        assert_eq!(ConversationLength::from_message_count(12), ConversationLength::Medium);
        assert_eq!(ConversationLength::from_message_count(13), ConversationLength::Long);
    }

    #[test]
    fn test_length_distribution() {
        let configured = MessageLengthRatio::new(0.5, 0.25, 0.25);
        assert_eq!(
            ConversationLength::Short.message_length_distribution(configured),
            MessageLengthRatio::new(0.6, 0.3, 0.1)
        );
        assert_eq!(
            ConversationLength::Medium.message_length_distribution(configured),
            configured
        );
        assert_eq!(
            ConversationLength::Long.message_length_distribution(configured),
            MessageLengthRatio::new(0.3, 0.4, 0.3)
        );
    }

    #[test]
    fn test_message_format_lookup_order() {
        let mut formats = BTreeMap::new();
        formats.insert("Small Talk".to_string(), "informal".to_string());
        formats.insert("Retirement".to_string(), "confidential".to_string());

        assert_eq!(message_format_for(&formats, "Small Talk", "Retirement"), "informal");
        assert_eq!(message_format_for(&formats, "Other", "Retirement"), "confidential");
        assert_eq!(message_format_for(&formats, "Other", "Other"), "formal");
    }

    #[test]
    fn test_format_style() {
        assert_eq!(format_style("informal"), "conversational, friendly, uses simpler language");
        assert_eq!(format_style("casual"), "professional, clear, helpful");
    }

    #[test]
    fn test_blueprint_serializes_lowercase_length() {
        let blueprint = ManifestBlueprint {
            category: "Investments".to_string(),
            main_topic: "Bonds".to_string(),
            subtopic: None,
            conversation_type: "Small Talk".to_string(),
            message_format: "formal".to_string(),
            conversation_length: ConversationLength::Short,
            company_targeting_enabled: false,
            key_companies: Vec::new(),
            message_style: format_style("formal").to_string(),
            typical_message_length: MessageLengthRatio::default(),
        };
        let value = serde_json::to_value(&blueprint).expect("serialize");
        assert_eq!(value["conversation_length"], "short");
        assert_eq!(value["main_topic"], "Bonds");
    }
}
