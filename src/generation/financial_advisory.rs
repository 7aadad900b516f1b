use rand::prelude::*;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tera::{Context, Tera};
use tracing::{error, info, warn};

use super::{
    format_style, message_format_for, parse_conversation, ConversationLength, Fallbacks,
    GenerationStrategy, ManifestBlueprint, PromptRequest, FORMAT_INSTRUCTIONS,
};
use crate::companies::{select_key_companies, CompanyCatalog, SelectionMode};
use crate::config::{CompanyTargeting, GeneratorConfig, MessageLengthRatio};
use crate::error::GenerationError;
use crate::models::{ChatLine, TopicPath};

const DEFAULT_PERSONA: &str = "Financial Advisor";

const COMMUNICATION_STYLES: &[&str] = &[
    "professional yet approachable",
    "analytical and detailed",
    "friendly and engaging",
    "straightforward and pragmatic",
    "calm and reassuring",
    "assertive and confident",
    "informal yet professional",
    "strategic and decisive",
    "compassionate and thoughtful",
];

const FALLBACKS: Fallbacks = Fallbacks {
    advisor_opening: "How can I help you today?",
    client_closing: "Thank you for the information.",
};

const PROMPT_TEMPLATE: &str = r#"You are a conversation generator AI that creates realistic synthetic conversations between a financial advisor and their client.

Generate a conversation between {{ advisor }} (a {{ persona }}, age {{ age }}, {{ communication_style }}) and their client {{ client }}.

Conversation Category: {{ category }}
Topic Area: {{ main_topic }}
{% if has_subtopic %}Specific Topic: {{ subtopic }}
{% endif %}Conversation Type: {{ conversation_type }}
Message Format: {{ message_format }}
Number of Messages: {{ num_messages }}

The conversation should be natural and realistic, showing both participants engaging meaningfully on the topic. The advisor should demonstrate expertise and professionalism, while the client should ask relevant questions and express concerns.
{% if has_companies %}
During the conversation, naturally mention and discuss the following companies:
{{ companies | join(sep=", ") }}

Ensure the companies are integrated naturally into the discussion, relevant to the conversation topic, and not forced or artificial.
{% endif %}{{ format_instructions }}{% if has_examples %}
{{ examples }}{% endif %}"#;

/// Advisor/client conversations across the financial advisory taxonomy,
/// optionally mentioning companies from the configured catalog.
pub struct FinancialAdvisoryGeneration {
    personas: Vec<String>,
    message_formats: BTreeMap<String, String>,
    message_length_ratio: MessageLengthRatio,
    targeting: CompanyTargeting,
    catalog: CompanyCatalog,
}

impl FinancialAdvisoryGeneration {
    pub fn new(config: &GeneratorConfig) -> Self {
        let targeting = config.company_targeting.clone();
        let catalog = if targeting.enabled {
            load_catalog(config)
        } else {
            CompanyCatalog::default()
        };

        Self {
            personas: config.personas.clone(),
            message_formats: config.message_formats.clone(),
            message_length_ratio: config.message_length_ratio,
            targeting,
            catalog,
        }
    }
}

fn load_catalog(config: &GeneratorConfig) -> CompanyCatalog {
    let Some(path) = &config.company_data_file else {
        warn!("Company targeting is enabled but no company data file is configured");
        return CompanyCatalog::default();
    };

    match CompanyCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error loading company data file");
            CompanyCatalog::default()
        }
    }
}

impl GenerationStrategy for FinancialAdvisoryGeneration {
    fn name(&self) -> &'static str {
        "financial_advisory"
    }

    fn create_manifest_blueprint(
        &self,
        conversation_type: &str,
        topic: &TopicPath,
        num_messages: usize,
        rng: &mut ChaCha8Rng,
    ) -> ManifestBlueprint {
        let key_companies =
            select_key_companies(&self.catalog, &self.targeting, SelectionMode::NamesOnly, rng);
        let conversation_length = ConversationLength::from_message_count(num_messages);
        let message_format =
            message_format_for(&self.message_formats, conversation_type, &topic.topic);

        info!(
            category = %topic.category,
            topic = %topic.topic,
            subtopic = topic.subtopic.as_deref().unwrap_or(""),
            "Created manifest blueprint"
        );

        ManifestBlueprint {
            category: topic.category.clone(),
            main_topic: topic.topic.clone(),
            subtopic: topic.subtopic.clone(),
            conversation_type: conversation_type.to_string(),
            message_style: format_style(&message_format).to_string(),
            message_format,
            conversation_length,
            company_targeting_enabled: !key_companies.is_empty(),
            key_companies,
            typical_message_length: conversation_length
                .message_length_distribution(self.message_length_ratio),
        }
    }

    fn construct_prompt(
        &self,
        request: &PromptRequest<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Result<String, GenerationError> {
        let blueprint = request.blueprint;
        let persona = self
            .personas
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PERSONA);
        let age: u32 = rng.random_range(30..=60);
        let communication_style = COMMUNICATION_STYLES
            .choose(rng)
            .copied()
            .unwrap_or(COMMUNICATION_STYLES[0]);

        let mut context = Context::new();
        context.insert("advisor", request.advisor);
        context.insert("client", request.client);
        context.insert("persona", persona);
        context.insert("age", &age);
        context.insert("communication_style", communication_style);
        context.insert("category", &blueprint.category);
        context.insert("main_topic", &blueprint.main_topic);
        context.insert("has_subtopic", &blueprint.subtopic.is_some());
        context.insert("subtopic", blueprint.subtopic.as_deref().unwrap_or(""));
        context.insert("conversation_type", request.conversation_type);
        context.insert("message_format", &blueprint.message_format);
        context.insert("num_messages", &request.num_messages);
        context.insert(
            "has_companies",
            &(blueprint.company_targeting_enabled && !blueprint.key_companies.is_empty()),
        );
        context.insert("companies", &blueprint.key_companies);
        context.insert("format_instructions", FORMAT_INSTRUCTIONS);
        context.insert("has_examples", &!request.examples_block.is_empty());
        context.insert("examples", request.examples_block);

        Ok(Tera::one_off(PROMPT_TEMPLATE, &context, false)?)
    }

    fn process_llm_response(&self, response: &str) -> Vec<ChatLine> {
        parse_conversation(response, FALLBACKS)
    }

    fn company_catalog(&self) -> &CompanyCatalog {
        &self.catalog
    }
}
