//! Company mention detection over generated conversation text.
//!
//! Names, formal names and variations match case-insensitively and must be
//! delimited by non-word characters (or the text edges), so names containing
//! punctuation such as `J&J` or `Apple Inc.` still match cleanly. Tickers of
//! three or more characters match as uppercase standalone words or after a
//! `$`. One- and two-character tickers collide with ordinary words ("V",
//! "A", "GE") and only count in explicit ticker contexts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Company, CompanyCatalog};
use crate::models::ChatLine;

/// Result of scanning a conversation for company mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionReport {
    pub has_company_mentions: bool,
    /// Canonical names in catalog order.
    pub companies_found: Vec<String>,
}

struct CompanyPatterns {
    name: String,
    patterns: Vec<Regex>,
}

/// Compiled mention patterns for every company in a catalog.
pub struct MentionDetector {
    companies: Vec<CompanyPatterns>,
}

/// Context words that mark a short ticker as a ticker, placed before it.
const SHORT_TICKER_PREFIXES: &[&str] = &[
    "invested in",
    "buy",
    "sell",
    "trade",
    "owns",
    "hold",
    "holding",
    "position in",
    "exposure to",
    "returns for",
    "price of",
];

impl MentionDetector {
    pub fn new(catalog: &CompanyCatalog) -> Self {
        let companies = catalog
            .companies()
            .iter()
            .map(|company| CompanyPatterns {
                name: company.name.clone(),
                patterns: compile_patterns(company),
            })
            .collect();
        Self { companies }
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// Scans every line and reports which companies are mentioned.
    pub fn check(&self, lines: &[ChatLine]) -> MentionReport {
        let companies_found: Vec<String> = self
            .companies
            .iter()
            .filter(|company| {
                lines
                    .iter()
                    .any(|line| company.patterns.iter().any(|re| re.is_match(&line.text)))
            })
            .map(|company| company.name.clone())
            .collect();

        MentionReport {
            has_company_mentions: !companies_found.is_empty(),
            companies_found,
        }
    }
}

fn compile_patterns(company: &Company) -> Vec<Regex> {
    let mut sources = Vec::new();

    let names = std::iter::once(company.name.as_str())
        .chain(company.formal_name.as_deref())
        .chain(company.variations.iter().map(String::as_str));
    for name in names.map(str::trim).filter(|n| !n.is_empty()) {
        sources.push(format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(name)));
    }

    if let Some(ticker) = company.ticker.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let t = regex::escape(&ticker.to_uppercase());
        if ticker.chars().count() >= 3 {
            sources.push(format!(r"(?:^|\W){t}(?:\W|$)"));
            sources.push(format!(r"(?i)\${t}(?:\W|$)"));
        } else {
            sources.extend(short_ticker_sources(&t));
        }
    }

    sources
        .into_iter()
        .filter_map(|source| match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(company = %company.name, error = %e, "Skipping invalid mention pattern");
                None
            }
        })
        .collect()
}

/// Strict patterns for a one- or two-character ticker `t` (already escaped).
///
/// Context words are case-insensitive while the ticker itself must be
/// uppercase, which keeps "very", "valid" and "value" from matching `V`.
fn short_ticker_sources(t: &str) -> Vec<String> {
    let prefixes = SHORT_TICKER_PREFIXES.join("|");
    vec![
        format!(r"\${t}(?:\W|$)"),
        format!(r"(?:^|\W){t} ?\("),
        format!(r"\b(?i:ticker|symbol|stock):?\s+{t}(?:\W|$)"),
        format!(r"(?:^|\W){t}\s+(?i:stock|shares)\b"),
        format!(r"\b(?i:{prefixes})\s+{t}(?:\W|$)"),
        format!(r"\b(?i:the)\s+{t}\s+(?i:ticker)\b"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CompanyCatalog {
        CompanyCatalog::new(vec![
            Company {
                name: "Apple".to_string(),
                ticker: Some("AAPL".to_string()),
                formal_name: Some("Apple Inc.".to_string()),
                variations: vec!["Apple Inc".to_string()],
                ..Company::default()
            },
            Company {
                name: "Microsoft".to_string(),
                ticker: Some("MSFT".to_string()),
                formal_name: Some("Microsoft Corporation".to_string()),
                ..Company::default()
            },
            Company {
                name: "Johnson & Johnson".to_string(),
                ticker: Some("JNJ".to_string()),
                variations: vec!["J&J".to_string()],
                ..Company::default()
            },
            Company {
                name: "Visa".to_string(),
                ticker: Some("V".to_string()),
                formal_name: Some("Visa Inc.".to_string()),
                ..Company::default()
            },
        ])
    }

    fn lines(texts: &[&str]) -> Vec<ChatLine> {
        texts.iter().map(|t| ChatLine::advisor(*t)).collect()
    }

    #[test]
    fn test_detects_names_tickers_and_variations() {
        let detector = MentionDetector::new(&catalog());
        let report = detector.check(&lines(&[
            "I recommend investing in Apple. Their new products look promising.",
            "Yes, MSFT has shown strong growth in their cloud business.",
            "J&J is stable, but growth might be slower.",
        ]));

        assert!(report.has_company_mentions);
        assert_eq!(
            report.companies_found,
            vec!["Apple", "Microsoft", "Johnson & Johnson"]
        );
    }

    #[test]
    fn test_short_ticker_valid_contexts() {
        let detector = MentionDetector::new(&catalog());
        for text in [
            "$V has been trending upward.",
            "V stock is worth considering.",
            "Let's look at the ticker V performance.",
            "I recommend buying V shares.",
            "Your position in V could be increased.",
            "Do you hold V in the retirement account?",
            "Check the V ticker before the open.",
            "What is the price of V today?",
            "It trades as V (NYSE).",
        ] {
            let report = detector.check(&lines(&[text]));
            assert_eq!(report.companies_found, vec!["Visa"], "failed on: {text}");
        }
    }

    #[test]
    fn test_short_ticker_invalid_contexts() {
        let detector = MentionDetector::new(&catalog());
        for text in [
            "I've been very impressed with their growth.",
            "Let me give you a valid explanation.",
            "We value your business highly.",
            "Vitamin V is not a stock tip.",
        ] {
            let report = detector.check(&lines(&[text]));
            assert!(!report.has_company_mentions, "false positive on: {text}");
        }
    }

    #[test]
    fn test_long_ticker_requires_uppercase_or_dollar() {
        let detector = MentionDetector::new(&catalog());
        assert!(!detector.check(&lines(&["the jnj note"])).has_company_mentions);
        assert!(detector.check(&lines(&["I like $jnj here"])).has_company_mentions);
        assert!(detector.check(&lines(&["JNJ, AAPL."])).has_company_mentions);
    }

    #[test]
    fn test_names_are_case_insensitive_and_delimited() {
        let detector = MentionDetector::new(&catalog());
        assert!(detector.check(&lines(&["what about APPLE?"])).has_company_mentions);
        assert!(!detector.check(&lines(&["pineapples are great"])).has_company_mentions);
        let report = detector.check(&lines(&["Shares of Apple Inc. rose."]));
        assert_eq!(report.companies_found, vec!["Apple"]);
    }

    #[test]
    fn test_empty_catalog() {
        let detector = MentionDetector::new(&CompanyCatalog::default());
        assert!(detector.is_empty());
        assert_eq!(detector.check(&lines(&["Apple"])), MentionReport::default());
    }
}
