use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::{Company, CompanyCatalog};
use crate::config::CompanyTargeting;

/// Whether key companies are listed by name only or with their aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    NamesOnly,
    WithAliases,
}

/// Draws the companies a conversation should feature.
///
/// Returns an empty list when targeting is disabled, the catalog is empty,
/// the probability roll fails, or the catalog holds fewer companies than the
/// drawn count.
pub fn select_key_companies(
    catalog: &CompanyCatalog,
    targeting: &CompanyTargeting,
    mode: SelectionMode,
    rng: &mut ChaCha8Rng,
) -> Vec<String> {
    if !targeting.enabled || catalog.is_empty() {
        return Vec::new();
    }

    if rng.random::<f64>() >= targeting.probability {
        return Vec::new();
    }

    let min = targeting.min_companies.min(targeting.max_companies);
    let count = rng.random_range(min..=targeting.max_companies);
    if count == 0 || catalog.len() < count {
        return Vec::new();
    }

    let mut pool: Vec<&Company> = catalog.companies().iter().collect();
    pool.shuffle(rng);
    pool.truncate(count);

    match mode {
        SelectionMode::NamesOnly => pool.iter().map(|c| c.name.clone()).collect(),
        SelectionMode::WithAliases => pool
            .iter()
            .flat_map(|company| with_aliases(company, rng))
            .collect(),
    }
}

/// The company name followed by a random subset of its aliases.
fn with_aliases(company: &Company, rng: &mut ChaCha8Rng) -> Vec<String> {
    let mut items = vec![company.name.clone()];

    if let Some(ticker) = company.ticker.as_deref().filter(|t| !t.is_empty()) {
        if rng.random::<f64>() > 0.3 {
            items.push(ticker.to_string());
        }
    }

    if let Some(formal) = company
        .formal_name
        .as_deref()
        .filter(|f| !f.is_empty() && *f != company.name)
    {
        if rng.random::<f64>() > 0.7 {
            items.push(formal.to_string());
        }
    }

    for variation in &company.variations {
        if rng.random::<f64>() > 0.8 {
            items.push(variation.clone());
        }
    }

    for misspelling in &company.misspellings {
        if rng.random::<f64>() > 0.9 {
            items.push(misspelling.clone());
        }
    }

    items
}

/// A base company name together with the other ways it is referred to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasGroup {
    pub base: String,
    pub aliases: Vec<String>,
}

impl AliasGroup {
    /// `Base (also referred to as: a, b)`, or just `Base`.
    pub fn display(&self) -> String {
        if self.aliases.is_empty() {
            self.base.clone()
        } else {
            format!("{} (also referred to as: {})", self.base, self.aliases.join(", "))
        }
    }
}

/// Groups a flat list of names, tickers and variations by company.
///
/// Items of one or two characters only join a group whose base is their
/// uppercase form. Longer items join the first group whose base contains
/// them, or which they contain.
pub fn group_company_aliases(items: &[String]) -> Vec<AliasGroup> {
    let mut groups: Vec<AliasGroup> = Vec::new();

    for item in items {
        let item_lower = item.to_lowercase();
        let target = if item.chars().count() <= 2 {
            let upper = item.to_uppercase();
            groups.iter().position(|g| g.base == upper)
        } else {
            groups.iter().position(|g| {
                let base_lower = g.base.to_lowercase();
                base_lower.contains(&item_lower) || item_lower.contains(&base_lower)
            })
        };

        match target {
            Some(idx) => {
                let group = &mut groups[idx];
                if group.base != *item && !group.aliases.contains(item) {
                    group.aliases.push(item.clone());
                }
            }
            None => groups.push(AliasGroup {
                base: item.clone(),
                aliases: Vec::new(),
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targeting(enabled: bool, probability: f64, min: usize, max: usize) -> CompanyTargeting {
        CompanyTargeting {
            enabled,
            probability,
            min_companies: min,
            max_companies: max,
        }
    }

    fn catalog() -> CompanyCatalog {
        CompanyCatalog::new(vec![
            Company {
                name: "Microsoft".to_string(),
                ticker: Some("MSFT".to_string()),
                formal_name: Some("Microsoft Corporation".to_string()),
                variations: vec!["MS".to_string()],
                ..Company::default()
            },
            Company::new("Apple", Some("AAPL"), None),
            Company::new("Visa", Some("V"), None),
        ])
    }

    #[test]
    fn test_disabled_targeting_selects_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let picked = select_key_companies(
            &catalog(),
            &targeting(false, 1.0, 1, 2),
            SelectionMode::NamesOnly,
            &mut rng,
        );
        assert!(picked.is_empty());
    }

    #[test]
    fn test_zero_probability_selects_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let picked = select_key_companies(
                &catalog(),
                &targeting(true, 0.0, 1, 2),
                SelectionMode::NamesOnly,
                &mut rng,
            );
            assert!(picked.is_empty());
        }
    }

    #[test]
    fn test_names_only_selection_is_distinct_and_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..50 {
            let picked = select_key_companies(
                &catalog(),
                &targeting(true, 1.0, 1, 3),
                SelectionMode::NamesOnly,
                &mut rng,
            );
            assert!((1..=3).contains(&picked.len()));
            let mut unique = picked.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), picked.len());
        }
    }

    #[test]
    fn test_catalog_smaller_than_count_selects_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let picked = select_key_companies(
            &catalog(),
            &targeting(true, 1.0, 4, 5),
            SelectionMode::NamesOnly,
            &mut rng,
        );
        assert!(picked.is_empty());
    }

    #[test]
    fn test_with_aliases_starts_each_company_with_its_name() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let names = ["Microsoft", "Apple", "Visa"];
        for _ in 0..20 {
            let picked = select_key_companies(
                &catalog(),
                &targeting(true, 1.0, 3, 3),
                SelectionMode::WithAliases,
                &mut rng,
            );
            assert!(names.contains(&picked[0].as_str()));
            let canonical = picked.iter().filter(|p| names.contains(&p.as_str())).count();
            assert_eq!(canonical, 3);
        }
    }

    #[test]
    fn test_group_company_aliases() {
        let items: Vec<String> = ["Microsoft", "MSFT", "Microsoft Corporation", "Visa", "V"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let groups = group_company_aliases(&items);

        // "MSFT" shares no substring with "Microsoft" so it starts its own group
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].base, "Microsoft");
        assert_eq!(groups[0].aliases, vec!["Microsoft Corporation"]);
        assert_eq!(
            groups[0].display(),
            "Microsoft (also referred to as: Microsoft Corporation)"
        );
        assert_eq!(groups[2].display(), "Visa");
        assert_eq!(groups[3].base, "V");
    }

    #[test]
    fn test_short_item_joins_uppercase_group() {
        let items: Vec<String> = ["GE", "ge"].iter().map(|s| s.to_string()).collect();
        let groups = group_company_aliases(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].aliases, vec!["ge"]);
    }
}
