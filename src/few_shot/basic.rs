use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::FewShotStrategy;
use crate::models::TopicPath;

/// Maximum number of example files sampled per conversation.
const MAX_EXAMPLES: usize = 2;

/// Loads examples from the filesystem, falling back from specific to generic.
pub struct BasicFewShotStrategy {
    examples_dir: PathBuf,
}

impl BasicFewShotStrategy {
    pub fn new(examples_dir: impl Into<PathBuf>) -> Self {
        Self {
            examples_dir: examples_dir.into(),
        }
    }

    pub fn examples_dir(&self) -> &Path {
        &self.examples_dir
    }

    /// Glob patterns relative to the examples directory, most specific first.
    pub fn search_patterns(conversation_type: &str, topic: &TopicPath) -> Vec<String> {
        let component = |raw: &str| glob::Pattern::escape(&sanitize_path_component(raw));
        let category = component(&topic.category);
        let main_topic = component(&topic.topic);

        let mut patterns = Vec::with_capacity(5);
        if let Some(sub) = &topic.subtopic {
            patterns.push(format!("{category}/{main_topic}/{}*.txt", component(sub)));
        }
        patterns.push(format!("{category}/{main_topic}*.txt"));
        patterns.push(format!("{category}*.txt"));
        patterns.push(format!("{}*.txt", component(conversation_type)));
        patterns.push("generic*.txt".to_string());
        patterns
    }

    fn matching_files(&self, pattern: &str) -> Vec<PathBuf> {
        let base = glob::Pattern::escape(&self.examples_dir.to_string_lossy());
        let full = format!("{}/{}", base.trim_end_matches('/'), pattern);
        match glob::glob(&full) {
            Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
            Err(e) => {
                warn!(pattern = %full, error = %e, "Invalid few-shot glob pattern");
                Vec::new()
            }
        }
    }
}

impl FewShotStrategy for BasicFewShotStrategy {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn get_examples(
        &self,
        conversation_type: &str,
        topic: &TopicPath,
        rng: &mut ChaCha8Rng,
    ) -> Vec<String> {
        if !self.examples_dir.is_dir() {
            debug!(dir = %self.examples_dir.display(), "Few-shot examples directory not found");
            return Vec::new();
        }

        let mut examples = Vec::new();
        for pattern in Self::search_patterns(conversation_type, topic) {
            let mut files = self.matching_files(&pattern);
            if files.is_empty() {
                continue;
            }

            files.shuffle(rng);
            files.truncate(MAX_EXAMPLES);
            examples.extend(files.iter().filter_map(|path| load_example_file(path)));

            if !examples.is_empty() {
                break;
            }
        }

        info!(
            count = examples.len(),
            category = %topic.category,
            topic = %topic.topic,
            subtopic = topic.subtopic.as_deref().unwrap_or(""),
            "Found few-shot examples"
        );
        examples
    }
}

/// Reads and trims an example file. Unreadable or blank files yield `None`.
fn load_example_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error loading few-shot example");
            None
        }
    }
}

/// Replaces characters that are unsafe in paths with `_` and lowercases.
pub fn sanitize_path_component(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn topic() -> TopicPath {
        TopicPath::new("Investments", "Stock Market", Some("Tech Stocks".to_string()))
    }

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(path, content).expect("write example");
    }

    #[test]
    fn test_sanitize_path_component() {
        assert_eq!(sanitize_path_component("Stock Market"), "stock_market");
        assert_eq!(sanitize_path_component("Business/Advisory"), "business_advisory");
        assert_eq!(sanitize_path_component("Q&A: \"Why?\""), "q&a___why__");
    }

    #[test]
    fn test_search_patterns_order() {
        let patterns = BasicFewShotStrategy::search_patterns("Small Talk", &topic());
        assert_eq!(
            patterns,
            vec![
                "investments/stock_market/tech_stocks*.txt",
                "investments/stock_market*.txt",
                "investments*.txt",
                "small_talk*.txt",
                "generic*.txt",
            ]
        );

        let no_sub = TopicPath::new("Investments", "Bonds", None);
        assert_eq!(BasicFewShotStrategy::search_patterns("x", &no_sub).len(), 4);
    }

    #[test]
    fn test_most_specific_match_wins() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "investments/stock_market/tech_stocks_1.txt", "  specific  ");
        write(dir.path(), "generic_1.txt", "generic");

        let strategy = BasicFewShotStrategy::new(dir.path());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let examples = strategy.get_examples("Small Talk", &topic(), &mut rng);
        assert_eq!(examples, vec!["specific"]);
    }

    #[test]
    fn test_falls_back_past_blank_files() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "investments_1.txt", "   \n");
        write(dir.path(), "small_talk_1.txt", "by type");

        let strategy = BasicFewShotStrategy::new(dir.path());
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let examples = strategy.get_examples("Small Talk", &topic(), &mut rng);
        assert_eq!(examples, vec!["by type"]);
    }

    #[test]
    fn test_samples_at_most_two() {
        let dir = TempDir::new().expect("temp dir");
        for i in 0..5 {
            write(dir.path(), &format!("generic_{i}.txt"), &format!("example {i}"));
        }

        let strategy = BasicFewShotStrategy::new(dir.path());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let examples = strategy.get_examples("Other", &topic(), &mut rng);
        assert_eq!(examples.len(), 2);
        assert_ne!(examples[0], examples[1]);
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let strategy = BasicFewShotStrategy::new("/nonexistent/few_shot");
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert!(strategy.get_examples("Small Talk", &topic(), &mut rng).is_empty());
    }

    #[test]
    fn test_format_examples() {
        let strategy = BasicFewShotStrategy::new("unused");
        assert_eq!(strategy.format_examples(&[]), "");

        let formatted = strategy.format_examples(&["one".to_string(), "two".to_string()]);
        assert!(formatted.starts_with("Here are some example conversations"));
        assert!(formatted.contains("EXAMPLE 1:\none\n\nEXAMPLE 2:\ntwo\n\n"));
        assert!(formatted.ends_with("don't copy these examples directly.\n"));
    }
}
