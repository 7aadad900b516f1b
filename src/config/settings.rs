use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::datetime::DatetimeConfig;
use crate::error::ConfigError;

/// Retry settings for LLM calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_secs: f64,
    pub max_backoff_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff_secs: 1.0,
            max_backoff_secs: 32.0,
        }
    }
}

/// Relative share of short, medium and long messages in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageLengthRatio {
    pub short: f64,
    pub medium: f64,
    pub long: f64,
}

impl MessageLengthRatio {
    pub const fn new(short: f64, medium: f64, long: f64) -> Self {
        Self {
            short,
            medium,
            long,
        }
    }
}

impl Default for MessageLengthRatio {
    fn default() -> Self {
        Self::new(0.4, 0.3, 0.3)
    }
}

/// Settings controlling whether and how companies are injected into prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyTargeting {
    pub enabled: bool,
    /// Chance that a given conversation is targeted at all.
    pub probability: f64,
    pub min_companies: usize,
    pub max_companies: usize,
}

impl Default for CompanyTargeting {
    fn default() -> Self {
        Self {
            enabled: false,
            probability: 0.8,
            min_companies: 1,
            max_companies: 3,
        }
    }
}

/// Complete configuration for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    // LLM settings
    pub project_id: String,
    pub run_id: Option<String>,
    /// Provider name: `mock`, `gemini` or `openai`.
    pub llm_provider: String,
    pub model_name: String,
    pub location: String,
    /// Overrides the provider's default endpoint.
    pub api_base: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub stop_sequences: Vec<String>,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,

    // Output settings
    pub output_dir: PathBuf,
    pub json_version: String,
    pub conversation_manifest_dir: PathBuf,
    pub log_file: Option<PathBuf>,

    // Volume settings
    pub num_conversations: usize,
    pub min_messages: usize,
    pub max_messages: usize,
    /// Number of LLM calls allowed in flight at once.
    pub concurrency: usize,
    pub seed: Option<u64>,
    /// Flush every buffered group after this many conversations.
    pub flush_interval: usize,
    /// Flush a single advisor/client group once it holds this many conversations.
    pub max_buffered_per_pair: usize,
    pub deduplicate: bool,

    // Strategy settings
    pub taxonomy_strategy: String,
    pub generation_strategy: String,
    pub few_shot_strategy: String,
    pub taxonomy_file: PathBuf,
    pub few_shot_examples_dir: PathBuf,
    /// `uniform`, `normal` or `custom`.
    pub topic_distribution: String,
    /// Weights keyed by `category/topic/subtopic` or `category/topic`.
    pub topic_weights: BTreeMap<String, f64>,

    // Cast and formats
    pub message_length_ratio: MessageLengthRatio,
    pub advisor_names: Vec<String>,
    pub client_names: Vec<String>,
    pub personas: Vec<String>,
    pub conversation_types: Vec<String>,
    /// Message format keyed by conversation type or topic.
    pub message_formats: BTreeMap<String, String>,

    // Company targeting
    pub company_data_file: Option<PathBuf>,
    pub company_targeting: CompanyTargeting,

    pub datetime: DatetimeConfig,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            run_id: None,
            llm_provider: "mock".to_string(),
            model_name: "gemini-1.5-flash-002".to_string(),
            location: "us-central1".to_string(),
            api_base: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.3,
            top_p: 1.0,
            top_k: 40,
            max_output_tokens: 1200,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            stop_sequences: Vec::new(),
            request_timeout_secs: 120,
            retry: RetryConfig::default(),

            output_dir: PathBuf::from("synthetic_data"),
            json_version: "5".to_string(),
            conversation_manifest_dir: PathBuf::from("conversation_scripts"),
            log_file: None,

            num_conversations: 20,
            min_messages: 2,
            max_messages: 10,
            concurrency: 1,
            seed: None,
            flush_interval: 5,
            max_buffered_per_pair: 10,
            deduplicate: true,

            taxonomy_strategy: "financial_advisory".to_string(),
            generation_strategy: "financial_advisory".to_string(),
            few_shot_strategy: "basic".to_string(),
            taxonomy_file: PathBuf::from("taxonomies/financial_advisory.json"),
            few_shot_examples_dir: PathBuf::from("few_shot_examples"),
            topic_distribution: "uniform".to_string(),
            topic_weights: BTreeMap::new(),

            message_length_ratio: MessageLengthRatio::default(),
            advisor_names: strings(&[
                "Alice Johnson",
                "Bob Smith",
                "Carol Williams",
                "David Brown",
                "Eve Davis",
            ]),
            client_names: strings(&["Allen", "Betty", "Charles", "Diana", "Edward"]),
            personas: strings(&[
                "Senior Wealth Advisor",
                "Investment Portfolio Manager",
                "Retirement Planning Specialist",
                "Private Banking Advisor",
                "Financial Planner",
            ]),
            conversation_types: strings(&[
                "Small Talk",
                "Market Commentary",
                "Client Personal Concerns",
                "Product & Service Inquiry",
                "Business/Advisory",
            ]),
            message_formats: [
                ("Small Talk", "informal"),
                ("Market Commentary", "structured"),
                ("Client Personal Concerns", "confidential"),
                ("Product & Service Inquiry", "formal"),
                ("Business/Advisory", "formal"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),

            company_data_file: None,
            company_targeting: CompanyTargeting::default(),

            datetime: DatetimeConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML or JSON file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    /// Keys that are absent keep their default values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Parse` if its contents are malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else if content.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Applies overrides from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CHAT_FORGE_RUN_ID`: Run identifier
    /// - `CHAT_FORGE_OUTPUT_DIR`: Output directory
    /// - `CHAT_FORGE_LLM_PROVIDER`: Provider name
    /// - `CHAT_FORGE_MODEL_NAME`: Model identifier
    /// - `CHAT_FORGE_NUM_CONVERSATIONS`: Number of conversations to generate
    /// - `CHAT_FORGE_SEED`: RNG seed
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CHAT_FORGE_RUN_ID") {
            self.run_id = Some(val);
        }

        if let Ok(val) = std::env::var("CHAT_FORGE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CHAT_FORGE_LLM_PROVIDER") {
            self.llm_provider = val;
        }

        if let Ok(val) = std::env::var("CHAT_FORGE_MODEL_NAME") {
            self.model_name = val;
        }

        if let Ok(val) = std::env::var("CHAT_FORGE_NUM_CONVERSATIONS") {
            self.num_conversations = parse_env_value(&val, "CHAT_FORGE_NUM_CONVERSATIONS")?;
        }

        if let Ok(val) = std::env::var("CHAT_FORGE_SEED") {
            self.seed = Some(parse_env_value(&val, "CHAT_FORGE_SEED")?);
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_conversations == 0 {
            return Err(invalid("num_conversations must be greater than 0"));
        }

        if self.min_messages == 0 {
            return Err(invalid("min_messages must be greater than 0"));
        }

        if self.min_messages > self.max_messages {
            return Err(invalid("min_messages cannot exceed max_messages"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature must be between 0.0 and 2.0"));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(invalid("top_p must be between 0.0 and 1.0"));
        }

        if self.advisor_names.is_empty() {
            return Err(invalid("advisor_names cannot be empty"));
        }

        if self.client_names.is_empty() {
            return Err(invalid("client_names cannot be empty"));
        }

        if self.concurrency == 0 {
            return Err(invalid("concurrency must be greater than 0"));
        }

        if self.flush_interval == 0 {
            return Err(invalid("flush_interval must be greater than 0"));
        }

        if self.max_buffered_per_pair == 0 {
            return Err(invalid("max_buffered_per_pair must be greater than 0"));
        }

        let targeting = &self.company_targeting;
        if !(0.0..=1.0).contains(&targeting.probability) {
            return Err(invalid("company_targeting.probability must be between 0.0 and 1.0"));
        }

        if targeting.min_companies > targeting.max_companies {
            return Err(invalid(
                "company_targeting.min_companies cannot exceed max_companies",
            ));
        }

        if self.retry.initial_backoff_secs < 0.0
            || self.retry.max_backoff_secs < self.retry.initial_backoff_secs
        {
            return Err(invalid(
                "retry backoff must be non-negative and max_backoff_secs >= initial_backoff_secs",
            ));
        }

        self.datetime.validate()
    }

    /// Builder method to set the run ID.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Builder method to set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder method to set the manifest directory.
    pub fn with_manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.conversation_manifest_dir = dir.into();
        self
    }

    /// Builder method to set the number of conversations.
    pub fn with_num_conversations(mut self, count: usize) -> Self {
        self.num_conversations = count;
        self
    }

    /// Builder method to set the LLM provider.
    pub fn with_llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = provider.into();
        self
    }

    /// Builder method to set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationFailed(message.to_string())
}

/// Parses an environment variable value into the target type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
