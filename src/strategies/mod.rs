//! Name-based registry of taxonomy, generation and few-shot strategies.
//!
//! The generator looks strategies up by the names given in its
//! configuration. Built-in strategies are registered by
//! [`StrategyRegistry::with_builtins`]; callers may register more.

use std::collections::BTreeMap;

use crate::config::GeneratorConfig;
use crate::error::StrategyError;
use crate::few_shot::{BasicFewShotStrategy, FewShotStrategy};
use crate::generation::{CompanyTaggingGeneration, FinancialAdvisoryGeneration, GenerationStrategy};
use crate::taxonomy::{
    CompanyTaggingTaxonomy, FinancialAdvisoryTaxonomy, TaxonomyStrategy, TopicSelector,
};

pub type TaxonomyFactory = fn(&GeneratorConfig) -> Box<dyn TaxonomyStrategy>;
pub type GenerationFactory = fn(&GeneratorConfig) -> Box<dyn GenerationStrategy>;
pub type FewShotFactory = fn(&GeneratorConfig) -> Box<dyn FewShotStrategy>;

/// Maps strategy names to constructors.
#[derive(Default)]
pub struct StrategyRegistry {
    taxonomy: BTreeMap<String, TaxonomyFactory>,
    generation: BTreeMap<String, GenerationFactory>,
    few_shot: BTreeMap<String, FewShotFactory>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in strategy.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_taxonomy("financial_advisory", |config| {
            Box::new(FinancialAdvisoryTaxonomy::new(TopicSelector::from_config(config)))
        });
        registry.register_taxonomy("company_tagging", |config| {
            Box::new(CompanyTaggingTaxonomy::new(TopicSelector::from_config(config)))
        });
        registry.register_generation("financial_advisory", |config| {
            Box::new(FinancialAdvisoryGeneration::new(config))
        });
        registry.register_generation("company_tagging", |config| {
            Box::new(CompanyTaggingGeneration::new(config))
        });
        registry.register_few_shot("basic", |config| {
            Box::new(BasicFewShotStrategy::new(&config.few_shot_examples_dir))
        });
        registry
    }

    pub fn register_taxonomy(&mut self, name: impl Into<String>, factory: TaxonomyFactory) {
        self.taxonomy.insert(name.into(), factory);
    }

    pub fn register_generation(&mut self, name: impl Into<String>, factory: GenerationFactory) {
        self.generation.insert(name.into(), factory);
    }

    pub fn register_few_shot(&mut self, name: impl Into<String>, factory: FewShotFactory) {
        self.few_shot.insert(name.into(), factory);
    }

    pub fn create_taxonomy(
        &self,
        name: &str,
        config: &GeneratorConfig,
    ) -> Result<Box<dyn TaxonomyStrategy>, StrategyError> {
        lookup(&self.taxonomy, "taxonomy", name).map(|factory| factory(config))
    }

    pub fn create_generation(
        &self,
        name: &str,
        config: &GeneratorConfig,
    ) -> Result<Box<dyn GenerationStrategy>, StrategyError> {
        lookup(&self.generation, "generation", name).map(|factory| factory(config))
    }

    pub fn create_few_shot(
        &self,
        name: &str,
        config: &GeneratorConfig,
    ) -> Result<Box<dyn FewShotStrategy>, StrategyError> {
        lookup(&self.few_shot, "few-shot", name).map(|factory| factory(config))
    }

    pub fn taxonomy_names(&self) -> Vec<&str> {
        self.taxonomy.keys().map(String::as_str).collect()
    }

    pub fn generation_names(&self) -> Vec<&str> {
        self.generation.keys().map(String::as_str).collect()
    }

    pub fn few_shot_names(&self) -> Vec<&str> {
        self.few_shot.keys().map(String::as_str).collect()
    }
}

fn lookup<F: Copy>(
    table: &BTreeMap<String, F>,
    kind: &'static str,
    name: &str,
) -> Result<F, StrategyError> {
    table.get(name).copied().ok_or_else(|| StrategyError::Unknown {
        kind,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(
            registry.taxonomy_names(),
            vec!["company_tagging", "financial_advisory"]
        );
        assert_eq!(
            registry.generation_names(),
            vec!["company_tagging", "financial_advisory"]
        );
        assert_eq!(registry.few_shot_names(), vec!["basic"]);
    }

    #[test]
    fn test_create_by_name() {
        let registry = StrategyRegistry::with_builtins();
        let config = GeneratorConfig::default();

        let taxonomy = registry
            .create_taxonomy("company_tagging", &config)
            .expect("taxonomy");
        assert_eq!(taxonomy.name(), "company_tagging");

        let generation = registry
            .create_generation("financial_advisory", &config)
            .expect("generation");
        assert_eq!(generation.name(), "financial_advisory");

        let few_shot = registry.create_few_shot("basic", &config).expect("few-shot");
        assert_eq!(few_shot.name(), "basic");
    }

    #[test]
    fn test_unknown_name() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .create_generation("voice_of_customer", &GeneratorConfig::default())
            .err()
            .expect("unknown strategy");
        assert!(matches!(
            err,
            StrategyError::Unknown { kind: "generation", ref name } if name == "voice_of_customer"
        ));
        assert_eq!(err.to_string(), "Unknown generation strategy: voice_of_customer");
    }

    #[test]
    fn test_custom_registration_overrides() {
        let mut registry = StrategyRegistry::new();
        assert!(registry
            .create_few_shot("basic", &GeneratorConfig::default())
            .is_err());
        registry.register_few_shot("basic", |_| Box::new(BasicFewShotStrategy::new("elsewhere")));
        assert!(registry
            .create_few_shot("basic", &GeneratorConfig::default())
            .is_ok());
    }
}
