//! Shared utility functions for chat-forge.
//!
//! Covers filename sanitizing, short random identifiers, weighted sampling
//! and JSON extraction from LLM responses.

pub mod json_extraction;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

pub use json_extraction::{extract_json_array, find_matching_bracket, strip_code_fences};

/// Removes characters that are invalid in filenames on common platforms.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

/// Keeps alphanumerics, `_` and `-`, replacing everything else with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Random lowercase hex string of `len` characters taken from a v4 UUID.
pub fn short_hex(len: usize) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..len.min(hex.len())].to_string()
}

/// Picks an index with probability proportional to its weight.
///
/// Negative weights count as zero. Returns `None` when every weight is zero.
pub fn weighted_index(weights: &[f64], rng: &mut ChaCha8Rng) -> Option<usize> {
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let roll: f64 = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        cumulative += weight.max(0.0);
        if roll < cumulative {
            return Some(idx);
        }
    }

    // Float rounding can leave the roll just past the last boundary
    weights.iter().rposition(|w| *w > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Alice Johnson"), "Alice Johnson");
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "abcdefghij");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Alice Johnson"), "Alice_Johnson");
        assert_eq!(sanitize_name("O'Brien-Smith"), "O_Brien-Smith");
    }

    #[test]
    fn test_short_hex() {
        let id = short_hex(6);
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_weighted_index_skips_zero_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let idx = weighted_index(&[0.0, 1.0, 0.0], &mut rng);
            assert_eq!(idx, Some(1));
        }
        assert_eq!(weighted_index(&[0.0, 0.0], &mut rng), None);
        assert_eq!(weighted_index(&[], &mut rng), None);
    }
}
