use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use super::{
    flatten_topic_tree, log_loaded, read_taxonomy_file, taxonomy_name, TaxonomyStrategy,
    TopicSelector, CONVERSATION_TYPES_KEY,
};
use crate::error::TaxonomyError;
use crate::models::{ConversationTypeInfo, Taxonomy, TopicPath};

/// Taxonomy strategy for company-mention focused conversations.
pub struct CompanyTaggingTaxonomy {
    selector: TopicSelector,
}

impl CompanyTaggingTaxonomy {
    pub fn new(selector: TopicSelector) -> Self {
        Self { selector }
    }

    /// Parses the `conversation_types` section. Malformed entries are skipped.
    pub fn parse_conversation_types(raw: &Value) -> BTreeMap<String, ConversationTypeInfo> {
        let Some(types) = raw.get(CONVERSATION_TYPES_KEY).and_then(Value::as_object) else {
            return BTreeMap::new();
        };

        types
            .iter()
            .filter_map(|(name, info)| {
                match serde_json::from_value::<ConversationTypeInfo>(info.clone()) {
                    Ok(parsed) => Some((name.clone(), parsed)),
                    Err(e) => {
                        warn!(conversation_type = %name, error = %e, "Skipping malformed conversation type");
                        None
                    }
                }
            })
            .collect()
    }
}

impl TaxonomyStrategy for CompanyTaggingTaxonomy {
    fn name(&self) -> &'static str {
        "company_tagging"
    }

    fn load_taxonomy(&self, path: &Path) -> Result<Taxonomy, TaxonomyError> {
        let raw = read_taxonomy_file(path)?;
        let taxonomy = Taxonomy {
            name: taxonomy_name(path),
            topics: self.flatten_taxonomy(&raw),
            conversation_types: Self::parse_conversation_types(&raw),
            raw,
        };
        log_loaded(&taxonomy);
        Ok(taxonomy)
    }

    fn flatten_taxonomy(&self, raw: &Value) -> Vec<TopicPath> {
        flatten_topic_tree(raw, &[CONVERSATION_TYPES_KEY])
    }

    fn default_topic(&self) -> TopicPath {
        TopicPath::new("Market Commentary", "General Market Update", None)
    }

    fn selector(&self) -> &TopicSelector {
        &self.selector
    }
}
