//! Company reference data: the catalog loaded from disk, the selection of
//! companies injected into prompts, and detection of company mentions in
//! generated text.

mod detection;
mod selection;

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::OutputError;

pub use detection::{MentionDetector, MentionReport};
pub use selection::{group_company_aliases, select_key_companies, AliasGroup, SelectionMode};

/// A company that conversations may mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Canonical display name.
    pub name: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub formal_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    /// Alternative names. Accepts a list or a `;`-separated string.
    #[serde(default, deserialize_with = "list_or_delimited")]
    pub variations: Vec<String>,
    #[serde(default, deserialize_with = "list_or_delimited")]
    pub misspellings: Vec<String>,
}

impl Company {
    pub fn new(name: impl Into<String>, ticker: Option<&str>, industry: Option<&str>) -> Self {
        Self {
            name: name.into(),
            ticker: ticker.map(str::to_string),
            industry: industry.map(str::to_string),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrDelimited {
    List(Vec<String>),
    Delimited(String),
}

fn list_or_delimited<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<ListOrDelimited>::deserialize(deserializer)?;
    let items = match raw {
        None => Vec::new(),
        Some(ListOrDelimited::List(items)) => items,
        Some(ListOrDelimited::Delimited(text)) => text.split(';').map(str::to_string).collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// The set of companies available to a generation run.
#[derive(Debug, Clone, Default)]
pub struct CompanyCatalog {
    companies: Vec<Company>,
}

impl CompanyCatalog {
    pub fn new(companies: Vec<Company>) -> Self {
        Self { companies }
    }

    /// Loads a list of companies from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self, OutputError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let companies: Vec<Company> = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        let companies: Vec<Company> = companies
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .collect();
        info!(count = companies.len(), path = %path.display(), "Loaded company data");
        Ok(Self { companies })
    }

    /// Built-in fallback catalog used when no company data can be loaded.
    pub fn sample() -> Self {
        Self::new(vec![
            Company::new("Acme Corp", Some("ACME"), Some("Technology")),
            Company::new("Globex", Some("GBX"), Some("Manufacturing")),
            Company::new("Stark Industries", Some("STRK"), Some("Defense")),
            Company::new("Wayne Enterprises", Some("WNTR"), Some("Conglomerate")),
            Company::new("Oscorp", Some("OSC"), Some("Pharmaceuticals")),
        ])
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_with_delimited_variations() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("companies.yaml");
        std::fs::write(
            &path,
            "- name: Johnson & Johnson\n  ticker: JNJ\n  variations: \"J&J; JnJ\"\n- name: Visa\n  ticker: V\n  misspellings: [Vissa]\n- name: \"  \"\n",
        )
        .expect("write");

        let catalog = CompanyCatalog::load(&path).expect("load");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.companies()[0].variations, vec!["J&J", "JnJ"]);
        assert_eq!(catalog.companies()[1].misspellings, vec!["Vissa"]);
        assert_eq!(catalog.companies()[1].formal_name, None);
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("companies.json");
        std::fs::write(
            &path,
            r#"[{"name": "Microsoft", "ticker": "MSFT", "formal_name": "Microsoft Corporation"}]"#,
        )
        .expect("write");

        let catalog = CompanyCatalog::load(&path).expect("load");
        assert_eq!(
            catalog.companies()[0].formal_name.as_deref(),
            Some("Microsoft Corporation")
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(CompanyCatalog::load(Path::new("/nonexistent/companies.json")).is_err());
    }

    #[test]
    fn test_sample_catalog() {
        let catalog = CompanyCatalog::sample();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.companies()[0].ticker.as_deref(), Some("ACME"));
    }
}
