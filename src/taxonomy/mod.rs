//! Taxonomy strategies: load a nested JSON topic tree, flatten it into
//! [`TopicPath`] leaves and pick one per conversation.
//!
//! Two layouts are understood:
//!
//! ```text
//! { "Category": { "Topic": ["Subtopic", ...], "Other Topic": "..." },
//!   "Flat Category": ["Topic", ...] }
//! ```
//!
//! Company tagging taxonomies add a top-level `conversation_types` object
//! describing each conversation type.

mod company_tagging;
mod financial_advisory;
mod selection;

use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::error::TaxonomyError;
use crate::models::{Taxonomy, TopicPath};

pub use company_tagging::CompanyTaggingTaxonomy;
pub use financial_advisory::FinancialAdvisoryTaxonomy;
pub use selection::{TopicDistribution, TopicSelector};

/// Key holding conversation type metadata in company tagging taxonomies.
pub const CONVERSATION_TYPES_KEY: &str = "conversation_types";

/// Layout of a taxonomy file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyFormat {
    FinancialAdvisory,
    CompanyTagging,
}

impl TaxonomyFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FinancialAdvisory => "financial_advisory",
            Self::CompanyTagging => "company_tagging",
        }
    }
}

/// Detects the taxonomy layout from its top-level keys.
pub fn detect_taxonomy_format(raw: &Value) -> TaxonomyFormat {
    if raw.get(CONVERSATION_TYPES_KEY).is_some() {
        TaxonomyFormat::CompanyTagging
    } else {
        TaxonomyFormat::FinancialAdvisory
    }
}

/// Strategy for loading a taxonomy and selecting topics from it.
pub trait TaxonomyStrategy: Send + Sync {
    /// Registry name of this strategy.
    fn name(&self) -> &'static str;

    /// Loads and flattens the taxonomy stored at `path`.
    fn load_taxonomy(&self, path: &Path) -> Result<Taxonomy, TaxonomyError>;

    /// Flattens a raw taxonomy tree into topic leaves.
    fn flatten_taxonomy(&self, raw: &Value) -> Vec<TopicPath>;

    /// Topic used when the taxonomy has no topics at all.
    fn default_topic(&self) -> TopicPath;

    /// Selector applying the configured topic distribution.
    fn selector(&self) -> &TopicSelector;

    /// Picks one topic from `topics`.
    fn select_topic(&self, topics: &[TopicPath], rng: &mut ChaCha8Rng) -> TopicPath {
        match self.selector().select(topics, rng) {
            Some(topic) => topic.clone(),
            None => {
                warn!(strategy = self.name(), "No topics available, using default topic");
                self.default_topic()
            }
        }
    }
}

/// Reads a taxonomy file and checks that its root is a JSON object.
pub(crate) fn read_taxonomy_file(path: &Path) -> Result<Value, TaxonomyError> {
    if !path.exists() {
        return Err(TaxonomyError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let raw: Value = serde_json::from_str(&content)?;
    if !raw.is_object() {
        return Err(TaxonomyError::InvalidStructure(format!(
            "root of {} must be an object",
            path.display()
        )));
    }
    Ok(raw)
}

/// Flattens the category tree, skipping any top-level key in `skip`.
pub(crate) fn flatten_topic_tree(raw: &Value, skip: &[&str]) -> Vec<TopicPath> {
    let Some(categories) = raw.as_object() else {
        return Vec::new();
    };

    let mut topics = Vec::new();
    for (category, content) in categories {
        if skip.contains(&category.as_str()) {
            continue;
        }

        match content {
            Value::Object(entries) => {
                for (topic, subtopics) in entries {
                    match subtopics {
                        Value::Array(items) => {
                            topics.extend(items.iter().filter_map(value_label).map(|sub| {
                                TopicPath::new(category.as_str(), topic.as_str(), Some(sub))
                            }));
                        }
                        _ => topics.push(TopicPath::new(category.as_str(), topic.as_str(), None)),
                    }
                }
            }
            Value::Array(items) => {
                topics.extend(
                    items
                        .iter()
                        .filter_map(value_label)
                        .map(|topic| TopicPath::new(category.as_str(), topic, None)),
                );
            }
            _ => {}
        }
    }
    topics
}

/// Display label for a leaf value. Non-scalar leaves are skipped.
fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Name for a taxonomy loaded from `path`, taken from the file stem.
pub(crate) fn taxonomy_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("taxonomy")
        .to_string()
}

pub(crate) fn log_loaded(taxonomy: &Taxonomy) {
    if taxonomy.topics.is_empty() {
        warn!(name = %taxonomy.name, "Taxonomy contains no topics");
    } else {
        info!(
            name = %taxonomy.name,
            topics = taxonomy.topics.len(),
            conversation_types = taxonomy.conversation_types.len(),
            "Loaded taxonomy"
        );
    }
}
