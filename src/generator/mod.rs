//! Conversation generation run.
//!
//! [`SyntheticChatGenerator`] ties the strategies together:
//!
//! 1. **Planning** - advisor, client, conversation type and length per conversation
//! 2. **Prompting** - topic selection, manifest blueprint, few-shot examples, prompt
//! 3. **LLM call** - wrapped in [`retry_with_backoff`]
//! 4. **Assembly** - parsing, timestamps, company mention detection, manifest record
//! 5. **Persistence** - buffered JSON files grouped by advisor/client pair
//!
//! # Example
//!
//! ```ignore
//! use chat_forge::config::GeneratorConfig;
//! use chat_forge::generator::SyntheticChatGenerator;
//! use chat_forge::llm::create_provider;
//!
//! let config = GeneratorConfig::from_file("configs/financial_advisory_mock.yaml")?;
//! let provider = create_provider(&config)?;
//! let mut generator = SyntheticChatGenerator::new(config, provider)?;
//! let summary = generator.generate_conversations().await?;
//! println!("{} conversations in {}", summary.generated, summary.output_dir.display());
//! ```

pub mod buffer;
pub mod dedup;
pub mod manifest;
pub mod summary;

pub use buffer::{write_conversation_file, ConversationBuffer};
pub use dedup::{content_hash, Deduplicator};
pub use manifest::{manifest_file_name, ManifestRecord, ManifestWriter};
pub use summary::{CompanyBuckets, RunSummary};

use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use rand::prelude::*;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::companies::{MentionDetector, MentionReport};
use crate::config::GeneratorConfig;
use crate::datetime::{create_datetime_strategy, planned_dates, DatetimeStrategy};
use crate::error::GenerationError;
use crate::few_shot::FewShotStrategy;
use crate::generation::{GenerationStrategy, ManifestBlueprint, PromptRequest};
use crate::llm::{conversation_request, retry_with_backoff, GenerationRequest, LlmProvider, RetryPolicy};
use crate::models::{SingleConversation, Taxonomy, TopicPath};
use crate::strategies::StrategyRegistry;
use crate::taxonomy::TaxonomyStrategy;
use crate::utils::short_hex;

/// Conversation type used when neither the config nor the taxonomy lists any.
const FALLBACK_CONVERSATION_TYPE: &str = "General";

/// Who talks about what, drawn before any prompt is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationPlan {
    pub conv_number: usize,
    pub advisor: String,
    pub client: String,
    pub conversation_type: String,
    pub num_messages: usize,
}

/// A conversation ready to be sent to the model.
struct PreparedConversation {
    plan: ConversationPlan,
    topic: TopicPath,
    blueprint: ManifestBlueprint,
    request: GenerationRequest,
}

/// Result of generating one conversation.
#[derive(Debug, Clone)]
pub enum ConversationOutcome {
    Generated {
        conversation: SingleConversation,
        mentions: MentionReport,
    },
    /// Same dialogue as an earlier conversation in this run.
    Duplicate,
}

/// Drives a full generation run.
pub struct SyntheticChatGenerator {
    config: GeneratorConfig,
    run_id: String,
    output_dir: PathBuf,
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    taxonomy_strategy: Box<dyn TaxonomyStrategy>,
    generation_strategy: Box<dyn GenerationStrategy>,
    few_shot_strategy: Box<dyn FewShotStrategy>,
    datetime_strategy: Option<Box<dyn DatetimeStrategy>>,
    taxonomy: Taxonomy,
    conversation_types: Vec<String>,
    detector: MentionDetector,
    manifest: Option<ManifestWriter>,
    dedup: Option<Deduplicator>,
    planned_dates: Vec<NaiveDate>,
    /// Plans, topics, companies and few-shot picks.
    rng: ChaCha8Rng,
    /// Conversation and message timestamps. Kept apart from `rng` so a seed
    /// yields the same prompts whatever the concurrency.
    timing_rng: ChaCha8Rng,
}

impl SyntheticChatGenerator {
    /// Builds a generator using the built-in strategies.
    pub fn new(config: GeneratorConfig, provider: Arc<dyn LlmProvider>) -> Result<Self, GenerationError> {
        Self::with_registry(config, provider, &StrategyRegistry::with_builtins())
    }

    /// Builds a generator, resolving strategy names through `registry`.
    ///
    /// Creates `output_dir/run_id` and opens the run manifest. A manifest
    /// that cannot be opened is logged and the run continues without one.
    ///
    /// # Errors
    ///
    /// Fails on unknown strategy names, an unreadable taxonomy or an
    /// output directory that cannot be created.
    pub fn with_registry(
        config: GeneratorConfig,
        provider: Arc<dyn LlmProvider>,
        registry: &StrategyRegistry,
    ) -> Result<Self, GenerationError> {
        let run_id = config.run_id.clone().unwrap_or_else(default_run_id);
        info!(run_id = %run_id, "Using run id");

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        debug!(seed, "Seeded generator RNG");

        let taxonomy_strategy = registry.create_taxonomy(&config.taxonomy_strategy, &config)?;
        let generation_strategy = registry.create_generation(&config.generation_strategy, &config)?;
        let few_shot_strategy = registry.create_few_shot(&config.few_shot_strategy, &config)?;
        let taxonomy = taxonomy_strategy.load_taxonomy(&config.taxonomy_file)?;

        let output_dir = config.output_dir.join(&run_id);
        std::fs::create_dir_all(&output_dir).map_err(crate::error::OutputError::from)?;
        info!(dir = %output_dir.display(), "Created output directory");

        let manifest = match ManifestWriter::open(&config.conversation_manifest_dir, &run_id) {
            Ok(writer) => Some(writer),
            Err(e) => {
                warn!(error = %e, "Could not set up manifest, conversation manifests will not be saved");
                None
            }
        };

        let mut timing_rng = ChaCha8Rng::seed_from_u64(rng.random());
        let datetime_strategy = create_datetime_strategy(&config.datetime);
        let planned = datetime_strategy
            .as_ref()
            .map(|strategy| {
                let (start, end) = strategy.period();
                let distribution =
                    strategy.message_count_distribution(start, end, config.num_conversations, &mut timing_rng);
                planned_dates(&distribution, &mut timing_rng)
            })
            .unwrap_or_default();

        let conversation_types = if config.conversation_types.is_empty() {
            let from_taxonomy: Vec<String> = taxonomy.conversation_types.keys().cloned().collect();
            if from_taxonomy.is_empty() {
                vec![FALLBACK_CONVERSATION_TYPE.to_string()]
            } else {
                from_taxonomy
            }
        } else {
            config.conversation_types.clone()
        };

        let detector = MentionDetector::new(generation_strategy.company_catalog());
        let dedup = config.deduplicate.then(Deduplicator::new);
        let retry = RetryPolicy::from(&config.retry);

        Ok(Self {
            config,
            run_id,
            output_dir,
            provider,
            retry,
            taxonomy_strategy,
            generation_strategy,
            few_shot_strategy,
            datetime_strategy,
            taxonomy,
            conversation_types,
            detector,
            manifest,
            dedup,
            planned_dates: planned,
            rng,
            timing_rng,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest.as_ref().map(ManifestWriter::path)
    }

    /// Draws the cast, type and length of conversation `conv_number`.
    pub fn plan_conversation(&mut self, conv_number: usize) -> ConversationPlan {
        let advisor = pick(&self.config.advisor_names, &mut self.rng, "Advisor");
        let client = pick(&self.config.client_names, &mut self.rng, "Client");
        let conversation_type = pick(&self.conversation_types, &mut self.rng, FALLBACK_CONVERSATION_TYPE);
        let (min, max) = (self.config.min_messages, self.config.max_messages.max(self.config.min_messages));
        let num_messages = self.rng.random_range(min..=max);
        debug!(conv_number, %advisor, %client, %conversation_type, num_messages, "Planned conversation");

        ConversationPlan {
            conv_number,
            advisor,
            client,
            conversation_type,
            num_messages,
        }
    }

    /// Generates one conversation end to end.
    pub async fn generate_single_conversation(
        &mut self,
        advisor: &str,
        client: &str,
        conversation_type: &str,
        num_messages: usize,
        conv_number: usize,
    ) -> Result<ConversationOutcome, GenerationError> {
        let plan = ConversationPlan {
            conv_number,
            advisor: advisor.to_string(),
            client: client.to_string(),
            conversation_type: conversation_type.to_string(),
            num_messages,
        };
        let prepared = self.prepare(plan)?;
        let response = call_llm(self.provider.clone(), self.retry, prepared.request.clone()).await;
        self.finish(prepared, response)
    }

    /// Runs the whole generation, writing run files as buffers fill.
    pub async fn generate_conversations(&mut self) -> Result<RunSummary, GenerationError> {
        let total = self.config.num_conversations;
        info!(run_id = %self.run_id, total, concurrency = self.config.concurrency, "Starting synthetic data generation");

        let mut summary = RunSummary::new(&self.run_id, &self.output_dir, total);
        let mut buffer = ConversationBuffer::new(
            &self.output_dir,
            &self.config.json_version,
            self.config.max_buffered_per_pair,
        );

        if self.config.concurrency <= 1 {
            for i in 1..=total {
                let plan = self.plan_conversation(i);
                let outcome = match self.prepare(plan.clone()) {
                    Ok(prepared) => {
                        let response =
                            call_llm(self.provider.clone(), self.retry, prepared.request.clone()).await;
                        self.finish(prepared, response)
                    }
                    Err(e) => Err(e),
                };
                self.record(&plan, outcome, &mut buffer, &mut summary)?;
                self.after_conversation(i, &mut buffer)?;
            }
        } else {
            let mut prepared = Vec::with_capacity(total);
            for i in 1..=total {
                let plan = self.plan_conversation(i);
                prepared.push(self.prepare(plan.clone()).map_err(|e| (plan, e)));
            }

            let provider = self.provider.clone();
            let retry = self.retry;
            let mut responses = stream::iter(prepared)
                .map(move |item| {
                    let provider = provider.clone();
                    async move {
                        match item {
                            Ok(p) => {
                                let response = call_llm(provider, retry, p.request.clone()).await;
                                Ok((p, response))
                            }
                            Err(failed) => Err(failed),
                        }
                    }
                })
                .buffered(self.config.concurrency);

            let mut i = 0;
            while let Some(item) = responses.next().await {
                i += 1;
                let (plan, outcome) = match item {
                    Ok((p, response)) => {
                        let plan = p.plan.clone();
                        (plan, self.finish(p, response))
                    }
                    Err((plan, e)) => (plan, Err(e)),
                };
                self.record(&plan, outcome, &mut buffer, &mut summary)?;
                self.after_conversation(i, &mut buffer)?;
            }
        }

        buffer.flush_all()?;
        summary.files = buffer.written_files().to_vec();
        if let Some(dedup) = &self.dedup {
            debug!(unique = dedup.unique_count(), "Distinct conversations seen");
        }
        summary.log();
        info!(
            run_id = %self.run_id,
            generated = summary.generated,
            requested = total,
            "Completed synthetic data generation"
        );
        Ok(summary)
    }

    /// Steps that need the RNG or the strategies, up to the prompt.
    fn prepare(&mut self, plan: ConversationPlan) -> Result<PreparedConversation, GenerationError> {
        let topic = self
            .taxonomy_strategy
            .select_topic(&self.taxonomy.topics, &mut self.rng);

        let blueprint = self.generation_strategy.create_manifest_blueprint(
            &plan.conversation_type,
            &topic,
            plan.num_messages,
            &mut self.rng,
        );

        let examples = self
            .few_shot_strategy
            .get_examples(&plan.conversation_type, &topic, &mut self.rng);
        let examples_block = self.few_shot_strategy.format_examples(&examples);

        let request = PromptRequest {
            advisor: &plan.advisor,
            client: &plan.client,
            conversation_type: &plan.conversation_type,
            num_messages: plan.num_messages,
            blueprint: &blueprint,
            examples_block: &examples_block,
        };
        let prompt = self.generation_strategy.construct_prompt(&request, &mut self.rng)?;
        debug!(conv_number = plan.conv_number, prompt_chars = prompt.len(), "Constructed prompt");

        Ok(PreparedConversation {
            request: conversation_request(&self.config, prompt),
            plan,
            topic,
            blueprint,
        })
    }

    /// Steps after the model has answered.
    fn finish(
        &mut self,
        prepared: PreparedConversation,
        response: Result<String, GenerationError>,
    ) -> Result<ConversationOutcome, GenerationError> {
        let PreparedConversation {
            plan,
            topic,
            blueprint,
            ..
        } = prepared;
        let text = response?;

        let lines = self.generation_strategy.process_llm_response(&text);
        if lines.is_empty() {
            return Err(GenerationError::NoLines);
        }

        let hash = content_hash(&lines);
        if self.dedup.as_ref().is_some_and(|dedup| dedup.contains(&hash)) {
            warn!(conv_number = plan.conv_number, "Duplicate conversation skipped");
            return Ok(ConversationOutcome::Duplicate);
        }

        let mut conversation = SingleConversation {
            conversation_id: format!("{}_{}_{}", self.run_id, plan.conv_number, short_hex(8)),
            timestamp: Local::now().naive_local(),
            category: topic.category.clone(),
            topic: topic.formatted_topic(),
            lines,
            company_mentions: blueprint.key_companies.clone(),
        };

        if let Some(strategy) = self.datetime_strategy.as_ref() {
            let planned = self.planned_dates.get(plan.conv_number.saturating_sub(1)).copied();
            let start = strategy.conversation_timestamp(planned, &mut self.timing_rng);
            strategy.apply_timestamps(&mut conversation, start, &mut self.timing_rng)?;
        }
        if let Some(dedup) = self.dedup.as_mut() {
            dedup.insert(hash);
        }

        let mentions = if self.detector.is_empty() {
            MentionReport::default()
        } else {
            self.detector.check(&conversation.lines)
        };
        if blueprint.company_targeting_enabled && !mentions.has_company_mentions {
            warn!(
                conversation_id = %conversation.conversation_id,
                key_companies = ?blueprint.key_companies,
                "Targeted companies not mentioned"
            );
        }

        if let Some(manifest) = self.manifest.as_mut() {
            let record = ManifestRecord {
                conversation_id: conversation.conversation_id.clone(),
                conv_number: plan.conv_number,
                advisor: plan.advisor.clone(),
                client: plan.client.clone(),
                category: topic.category.clone(),
                topic: topic.topic.clone(),
                subtopic: topic.subtopic.clone(),
                timestamp: conversation.timestamp,
                company_targeting_enabled: blueprint.company_targeting_enabled,
                key_companies: blueprint.key_companies.clone(),
                companies_found: mentions.companies_found.clone(),
                has_company_mentions: mentions.has_company_mentions,
                num_messages_requested: plan.num_messages,
                num_messages_actual: conversation.lines.len(),
            };
            if let Err(e) = manifest.append(&record) {
                warn!(error = %e, "Failed to write manifest record");
            }
        }

        debug!(
            conversation_id = %conversation.conversation_id,
            advisor = %plan.advisor,
            client = %plan.client,
            messages = conversation.lines.len(),
            "Generated conversation"
        );
        Ok(ConversationOutcome::Generated {
            conversation,
            mentions,
        })
    }

    fn record(
        &self,
        plan: &ConversationPlan,
        outcome: Result<ConversationOutcome, GenerationError>,
        buffer: &mut ConversationBuffer,
        summary: &mut RunSummary,
    ) -> Result<(), GenerationError> {
        match outcome {
            Ok(ConversationOutcome::Generated {
                conversation,
                mentions,
            }) => {
                summary.record_conversation(
                    &plan.advisor,
                    &plan.client,
                    conversation.timestamp,
                    conversation.company_mentions.len(),
                    &mentions.companies_found,
                );
                buffer.push(&plan.advisor, &plan.client, conversation)?;
            }
            Ok(ConversationOutcome::Duplicate) => summary.record_duplicate(),
            Err(e) => {
                error!(conv_number = plan.conv_number, error = %e, "Error generating conversation, skipping");
                summary.record_failure();
            }
        }
        Ok(())
    }

    fn after_conversation(&self, i: usize, buffer: &mut ConversationBuffer) -> Result<(), GenerationError> {
        if i % self.config.flush_interval.max(1) == 0 {
            buffer.flush_all()?;
        }
        if i % 10 == 0 {
            info!(done = i, total = self.config.num_conversations, "Generation progress");
        }
        Ok(())
    }
}

/// `%Y%m%d_%H%M%S_` followed by six hex characters.
pub fn default_run_id() -> String {
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), short_hex(6))
}

fn pick(items: &[String], rng: &mut ChaCha8Rng, fallback: &str) -> String {
    items
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

async fn call_llm(
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    request: GenerationRequest,
) -> Result<String, GenerationError> {
    let response = retry_with_backoff(policy, |attempt| {
        let provider = provider.clone();
        let request = request.clone();
        async move {
            if attempt > 0 {
                debug!(attempt, provider = provider.name(), "Retrying LLM call");
            }
            provider.generate(request).await
        }
    })
    .await?;

    response
        .first_content()
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or(GenerationError::EmptyResponse)
}
