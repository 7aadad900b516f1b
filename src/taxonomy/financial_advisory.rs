use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::{
    flatten_topic_tree, log_loaded, read_taxonomy_file, taxonomy_name, TaxonomyStrategy,
    TopicSelector,
};
use crate::error::TaxonomyError;
use crate::models::{Taxonomy, TopicPath};

/// Taxonomy strategy for advisor/client financial conversations.
pub struct FinancialAdvisoryTaxonomy {
    selector: TopicSelector,
}

impl FinancialAdvisoryTaxonomy {
    pub fn new(selector: TopicSelector) -> Self {
        Self { selector }
    }
}

impl TaxonomyStrategy for FinancialAdvisoryTaxonomy {
    fn name(&self) -> &'static str {
        "financial_advisory"
    }

    fn load_taxonomy(&self, path: &Path) -> Result<Taxonomy, TaxonomyError> {
        let raw = read_taxonomy_file(path)?;
        let taxonomy = Taxonomy {
            name: taxonomy_name(path),
            topics: self.flatten_taxonomy(&raw),
            conversation_types: BTreeMap::new(),
            raw,
        };
        log_loaded(&taxonomy);
        Ok(taxonomy)
    }

    fn flatten_taxonomy(&self, raw: &Value) -> Vec<TopicPath> {
        flatten_topic_tree(raw, &[])
    }

    fn default_topic(&self) -> TopicPath {
        TopicPath::new("General", "General Conversation", None)
    }

    fn selector(&self) -> &TopicSelector {
        &self.selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_select() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("financial_advisory.json");
        std::fs::write(
            &path,
            r#"{"Investments": {"Stocks": ["Dividends"]}, "Small Talk": ["Weather"]}"#,
        )
        .expect("write");

        let strategy = FinancialAdvisoryTaxonomy::new(TopicSelector::uniform());
        let taxonomy = strategy.load_taxonomy(&path).expect("load");
        assert_eq!(taxonomy.name, "financial_advisory");
        assert_eq!(taxonomy.topics.len(), 2);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let topic = strategy.select_topic(&taxonomy.topics, &mut rng);
        assert!(taxonomy.topics.contains(&topic));
    }

    #[test]
    fn test_empty_taxonomy_uses_default_topic() {
        let strategy = FinancialAdvisoryTaxonomy::new(TopicSelector::uniform());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let topic = strategy.select_topic(&[], &mut rng);
        assert_eq!(topic.category, "General");
        assert_eq!(topic.topic, "General Conversation");
        assert_eq!(topic.subtopic, None);
    }
}
