//! Exact-duplicate detection for generated conversations.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::models::ChatLine;

/// Hex-encoded SHA-256 over each line's speaker code and text.
///
/// Timestamps are ignored, so the same dialogue generated twice hashes the
/// same even when its timing differs.
pub fn content_hash(lines: &[ChatLine]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.speaker.code().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(line.text.as_bytes());
        hasher.update(b"\x1e");
    }
    hex::encode(hasher.finalize())
}

/// Set of content hashes seen so far in a run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a conversation with this [`content_hash`] was already kept.
    pub fn contains(&self, hash: &str) -> bool {
        self.seen.contains(hash)
    }

    /// Marks a hash as kept. Call once the conversation is accepted.
    pub fn insert(&mut self, hash: String) -> bool {
        self.seen.insert(hash)
    }

    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_dialogue_is_duplicate() {
        let mut dedup = Deduplicator::new();
        let lines = vec![ChatLine::advisor("Hello"), ChatLine::client("Hi there")];
        assert!(!dedup.contains(&content_hash(&lines)));
        assert!(dedup.insert(content_hash(&lines)));

        let mut retimed = lines.clone();
        retimed[0].timestamp = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 0, 0));
        assert!(dedup.contains(&content_hash(&retimed)));
        assert!(!dedup.insert(content_hash(&retimed)));
        assert_eq!(dedup.unique_count(), 1);
    }

    #[test]
    fn test_checking_does_not_record() {
        let dedup = Deduplicator::new();
        let hash = content_hash(&[ChatLine::advisor("Hello")]);
        assert!(!dedup.contains(&hash));
        assert!(!dedup.contains(&hash));
        assert_eq!(dedup.unique_count(), 0);
    }

    #[test]
    fn test_speaker_changes_hash() {
        let a = vec![ChatLine::advisor("Hello")];
        let b = vec![ChatLine::client("Hello")];
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_line_boundaries_matter() {
        let split = vec![ChatLine::advisor("ab"), ChatLine::advisor("c")];
        let joined = vec![ChatLine::advisor("a"), ChatLine::advisor("bc")];
        assert_ne!(content_hash(&split), content_hash(&joined));
        assert_eq!(content_hash(&split).len(), 64);
    }
}
