use rand::prelude::*;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::GeneratorConfig;
use crate::models::TopicPath;
use crate::utils::weighted_index;

/// How topics are drawn from the flattened taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicDistribution {
    /// Every topic is equally likely.
    Uniform,
    /// Topics in the middle of the list are favoured.
    Normal,
    /// Topics are weighted by `topic_weights`.
    Custom,
}

impl TopicDistribution {
    /// Parses a distribution name, falling back to uniform for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "uniform" => Self::Uniform,
            "normal" => Self::Normal,
            "custom" => Self::Custom,
            other => {
                warn!(distribution = other, "Unknown topic distribution, using uniform");
                Self::Uniform
            }
        }
    }
}

/// Draws topics according to a [`TopicDistribution`].
#[derive(Debug, Clone)]
pub struct TopicSelector {
    distribution: TopicDistribution,
    weights: BTreeMap<String, f64>,
}

impl TopicSelector {
    pub fn new(distribution: TopicDistribution, weights: BTreeMap<String, f64>) -> Self {
        Self {
            distribution,
            weights,
        }
    }

    pub fn uniform() -> Self {
        Self::new(TopicDistribution::Uniform, BTreeMap::new())
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(
            TopicDistribution::from_name(&config.topic_distribution),
            config.topic_weights.clone(),
        )
    }

    pub fn distribution(&self) -> TopicDistribution {
        self.distribution
    }

    /// Selects a topic, or `None` when `topics` is empty.
    pub fn select<'a>(&self, topics: &'a [TopicPath], rng: &mut ChaCha8Rng) -> Option<&'a TopicPath> {
        if topics.is_empty() {
            return None;
        }

        match self.distribution {
            TopicDistribution::Uniform => topics.choose(rng),
            TopicDistribution::Normal => Some(&topics[normal_index(topics.len(), rng)]),
            TopicDistribution::Custom => {
                let weights: Vec<f64> = topics.iter().map(|t| self.weight_for(t)).collect();
                match weighted_index(&weights, rng) {
                    Some(idx) => topics.get(idx),
                    None => {
                        warn!("All topic weights are zero, using uniform selection");
                        topics.choose(rng)
                    }
                }
            }
        }
    }

    /// Weight for a topic: full key first, then `category/topic`, else 1.0.
    fn weight_for(&self, topic: &TopicPath) -> f64 {
        self.weights
            .get(&topic.weight_key())
            .or_else(|| self.weights.get(&topic.short_weight_key()))
            .copied()
            .unwrap_or(1.0)
    }
}

/// Index drawn from N((n-1)/2, n/6), rounded and clamped to the list.
fn normal_index(len: usize, rng: &mut ChaCha8Rng) -> usize {
    let mean = (len as f64 - 1.0) / 2.0;
    let std_dev = (len as f64 / 6.0).max(f64::EPSILON);
    match rand_distr::Normal::new(mean, std_dev) {
        Ok(normal) => {
            let sampled: f64 = rng.sample(normal);
            sampled.round().clamp(0.0, (len - 1) as f64) as usize
        }
        Err(_) => rng.random_range(0..len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(n: usize) -> Vec<TopicPath> {
        (0..n)
            .map(|i| TopicPath::new("Cat", format!("Topic {i}"), None))
            .collect()
    }

    #[test]
    fn test_unknown_distribution_falls_back_to_uniform() {
        assert_eq!(TopicDistribution::from_name("zipf"), TopicDistribution::Uniform);
        assert_eq!(TopicDistribution::from_name("Normal"), TopicDistribution::Normal);
    }

    #[test]
    fn test_empty_topics_select_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(TopicSelector::uniform().select(&[], &mut rng).is_none());
    }

    #[test]
    fn test_normal_favours_the_middle() {
        let list = topics(9);
        let selector = TopicSelector::new(TopicDistribution::Normal, BTreeMap::new());
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts = [0usize; 9];
        for _ in 0..2000 {
            let chosen = selector.select(&list, &mut rng).expect("topic");
            let idx = list.iter().position(|t| t == chosen).expect("present");
            counts[idx] += 1;
        }
        assert!(counts[4] > counts[0]);
        assert!(counts[4] > counts[8]);
    }

    #[test]
    fn test_custom_weights_use_full_then_short_key() {
        let list = vec![
            TopicPath::new("Cat", "A", Some("x".to_string())),
            TopicPath::new("Cat", "B", None),
            TopicPath::new("Cat", "C", None),
        ];
        let weights: BTreeMap<String, f64> = [
            ("Cat/A/x".to_string(), 0.0),
            ("Cat/B".to_string(), 5.0),
            ("Cat/C".to_string(), 0.0),
        ]
        .into_iter()
        .collect();
        let selector = TopicSelector::new(TopicDistribution::Custom, weights);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(selector.select(&list, &mut rng).map(|t| t.topic.as_str()), Some("B"));
        }
    }

    #[test]
    fn test_custom_all_zero_weights_still_selects() {
        let list = topics(3);
        let weights = list
            .iter()
            .map(|t| (t.weight_key(), 0.0))
            .collect::<BTreeMap<_, _>>();
        let selector = TopicSelector::new(TopicDistribution::Custom, weights);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(selector.select(&list, &mut rng).is_some());
    }

    #[test]
    fn test_single_topic_normal() {
        let list = topics(1);
        let selector = TopicSelector::new(TopicDistribution::Normal, BTreeMap::new());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(selector.select(&list, &mut rng), Some(&list[0]));
    }
}
