use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tera::{Context, Tera};
use tracing::{error, info, warn};

use super::{
    format_style, message_format_for, parse_conversation, ConversationLength, Fallbacks,
    GenerationStrategy, ManifestBlueprint, PromptRequest, FORMAT_INSTRUCTIONS,
};
use crate::companies::{
    group_company_aliases, select_key_companies, CompanyCatalog, SelectionMode,
};
use crate::config::{CompanyTargeting, GeneratorConfig, MessageLengthRatio};
use crate::error::GenerationError;
use crate::models::{ChatLine, TopicPath};

const DEFAULT_PERSONA: &str = "Financial Analyst";

const FALLBACKS: Fallbacks = Fallbacks {
    advisor_opening: "Let's discuss some interesting companies in the market today.",
    client_closing: "Thank you for the information about these companies.",
};

const PROMPT_TEMPLATE: &str = r#"You are a conversation generator AI that creates realistic synthetic conversations between a financial professional and their client about companies and markets.

Generate a conversation between {{ advisor }} (a {{ persona }}) and their client {{ client }}.

Conversation Category: {{ category }}
Topic Area: {{ main_topic }}
{% if has_subtopic %}Specific Topic: {{ subtopic }}
{% endif %}Conversation Type: {{ conversation_type }}
Message Format: {{ message_format }}
Message Style: {{ message_style }}
Number of Messages: {{ num_messages }}

The conversation should focus on financial markets and company-specific information, discussing corporate news, stock performance, and investment opportunities related to specific companies.
{% if has_companies %}
During the conversation, prominently feature and discuss the following companies:
{{ companies | join(sep=", ") }}

IMPORTANT INSTRUCTIONS FOR COMPANY MENTIONS:
1. Each company should be mentioned at least twice in the conversation
2. Use a variety of ways to refer to the same company - sometimes formal name, sometimes ticker,
   sometimes abbreviations as shown in the company list above
3. Discuss specific aspects of these companies such as:
   - Recent financial performance
   - Market position
   - Product announcements
   - Leadership changes
   - Stock price movements
   - Competitive position
4. Make the company mentions natural and relevant to the conversation topic
5. Some companies should be discussed in detail while others might be mentioned for comparison
6. When referring to tickers, sometimes use formats like: AAPL, $AAPL, or Apple (AAPL)
{% else %}
During the conversation, naturally incorporate mentions of at least 2-3 relevant companies in the discussion.
Choose companies that would be appropriate for the conversation topic and discuss aspects like:
- Recent financial performance
- Market position
- Product announcements
- Leadership changes
- Stock price movements
{% endif %}{{ format_instructions }}{% if has_examples %}
{{ examples }}{% endif %}"#;

/// Market conversations built around specific companies, their tickers and
/// alternative names.
pub struct CompanyTaggingGeneration {
    personas: Vec<String>,
    message_formats: BTreeMap<String, String>,
    message_length_ratio: MessageLengthRatio,
    targeting: CompanyTargeting,
    catalog: CompanyCatalog,
}

impl CompanyTaggingGeneration {
    pub fn new(config: &GeneratorConfig) -> Self {
        if !config.company_targeting.enabled {
            info!("Enabling company targeting for company tagging generation");
        }
        let targeting = CompanyTargeting {
            enabled: true,
            probability: 1.0,
            ..config.company_targeting.clone()
        };

        Self {
            personas: config.personas.clone(),
            message_formats: config.message_formats.clone(),
            message_length_ratio: config.message_length_ratio,
            targeting,
            catalog: load_catalog(config),
        }
    }
}

/// Loads the configured catalog, falling back to the built-in sample.
fn load_catalog(config: &GeneratorConfig) -> CompanyCatalog {
    let Some(path) = &config.company_data_file else {
        warn!("Company data file path is empty, using fallback sample company data");
        return CompanyCatalog::sample();
    };

    match CompanyCatalog::load(path) {
        Ok(catalog) if !catalog.is_empty() => catalog,
        Ok(_) => {
            warn!(path = %path.display(), "Company data file is empty, using fallback sample company data");
            CompanyCatalog::sample()
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error loading company data file");
            warn!("Using fallback sample company data");
            CompanyCatalog::sample()
        }
    }
}

/// Writing style for a conversation type, falling back to the format style.
pub fn type_style(conversation_type: &str, message_format: &str) -> &'static str {
    match conversation_type {
        "Trade discussions" => "direct, actionable, focused on timing and opportunity",
        "Deal negotiations" => "persuasive, specific, detail-oriented, monetary focus",
        "Stock analysis" => "analytical, data-driven, evaluative, predictive",
        "Market updates" => "informative, current, trend-focused, comparative",
        "News on specific companies" => "factual, timely, specific, impact-oriented",
        "Earnings reports discussions" => {
            "numerical, performance-oriented, comparative to expectations"
        }
        _ => format_style(message_format),
    }
}

impl GenerationStrategy for CompanyTaggingGeneration {
    fn name(&self) -> &'static str {
        "company_tagging"
    }

    fn create_manifest_blueprint(
        &self,
        conversation_type: &str,
        topic: &TopicPath,
        num_messages: usize,
        rng: &mut ChaCha8Rng,
    ) -> ManifestBlueprint {
        let key_companies =
            select_key_companies(&self.catalog, &self.targeting, SelectionMode::WithAliases, rng);
        let conversation_length = ConversationLength::from_message_count(num_messages);
        let message_format =
            message_format_for(&self.message_formats, conversation_type, &topic.topic);

        info!(
            companies = key_companies.len(),
            "Created company tagging manifest blueprint"
        );

        ManifestBlueprint {
            category: topic.category.clone(),
            main_topic: topic.topic.clone(),
            subtopic: topic.subtopic.clone(),
            conversation_type: conversation_type.to_string(),
            message_style: type_style(conversation_type, &message_format).to_string(),
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

        let has_companies = blueprint.company_targeting_enabled && !blueprint.key_companies.is_empty();
        let companies: Vec<String> = group_company_aliases(&blueprint.key_companies)
            .iter()
            .map(|group| group.display())
            .collect();

        let mut context = Context::new();
        context.insert("advisor", request.advisor);
        context.insert("client", request.client);
        context.insert("persona", persona);
        context.insert("category", &blueprint.category);
        context.insert("main_topic", &blueprint.main_topic);
        context.insert("has_subtopic", &blueprint.subtopic.is_some());
        context.insert("subtopic", blueprint.subtopic.as_deref().unwrap_or(""));
        context.insert("conversation_type", request.conversation_type);
        context.insert("message_format", &blueprint.message_format);
        context.insert("message_style", &blueprint.message_style);
        context.insert("num_messages", &request.num_messages);
        context.insert("has_companies", &has_companies);
        context.insert("companies", &companies);
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
