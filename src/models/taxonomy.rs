use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A leaf of the flattened taxonomy tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPath {
    pub category: String,
    pub topic: String,
    pub subtopic: Option<String>,
}

impl TopicPath {
    pub fn new(
        category: impl Into<String>,
        topic: impl Into<String>,
        subtopic: Option<String>,
    ) -> Self {
        Self {
            category: category.into(),
            topic: topic.into(),
            subtopic: subtopic.filter(|s| !s.is_empty()),
        }
    }

    /// `topic.subtopic`, or `topic` when there is no subtopic.
    pub fn formatted_topic(&self) -> String {
        match &self.subtopic {
            Some(sub) => format!("{}.{}", self.topic, sub),
            None => self.topic.clone(),
        }
    }

    /// Key used to look up custom topic weights.
    pub fn weight_key(&self) -> String {
        match &self.subtopic {
            Some(sub) => format!("{}/{}/{}", self.category, self.topic, sub),
            None => self.short_weight_key(),
        }
    }

    pub fn short_weight_key(&self) -> String {
        format!("{}/{}", self.category, self.topic)
    }
}

/// Company tagging parameters attached to a conversation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyTaggingInfo {
    pub enabled: bool,
    pub company_count_options: Vec<usize>,
    pub probability: f64,
    pub min_companies: usize,
    pub max_companies: usize,
}

impl Default for CompanyTaggingInfo {
    fn default() -> Self {
        Self {
            enabled: true,
            company_count_options: vec![1, 2, 3],
            probability: 0.8,
            min_companies: 1,
            max_companies: 3,
        }
    }
}

/// Per-type metadata found in company tagging taxonomies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationTypeInfo {
    pub description: String,
    pub message_format: String,
    pub message_style: String,
    pub typical_message_length: String,
    pub example_keywords: Vec<String>,
    pub company_tagging: CompanyTaggingInfo,
}

/// A loaded taxonomy.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    pub name: String,
    pub topics: Vec<TopicPath>,
    pub conversation_types: BTreeMap<String, ConversationTypeInfo>,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_topic() {
        let with_sub = TopicPath::new("Investments", "Stocks", Some("Dividends".to_string()));
        assert_eq!(with_sub.formatted_topic(), "Stocks.Dividends");
        assert_eq!(with_sub.weight_key(), "Investments/Stocks/Dividends");

        let without = TopicPath::new("Investments", "Bonds", Some(String::new()));
        assert_eq!(without.subtopic, None);
        assert_eq!(without.formatted_topic(), "Bonds");
        assert_eq!(without.weight_key(), "Investments/Bonds");
    }

    #[test]
    fn test_conversation_type_info_defaults() {
        let info: ConversationTypeInfo =
            serde_json::from_str(r#"{"description": "Trades"}"#).expect("parse");
        assert_eq!(info.description, "Trades");
        assert!(info.company_tagging.enabled);
        assert_eq!(info.company_tagging.company_count_options, vec![1, 2, 3]);
    }
}
