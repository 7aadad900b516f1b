//! Helpers for pulling JSON out of free-form LLM responses.
//!
//! Models frequently wrap their answer in a Markdown code fence or surround a
//! JSON array with chatter. These helpers locate the JSON payload without
//! trying to repair it.

use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:[A-Za-z]+)?[ \t]*\r?\n?([\s\S]*?)\r?\n?```").expect("Invalid regex for code fences")
});

/// Returns the contents of the first Markdown code fence, or the input
/// unchanged when there is none.
pub fn strip_code_fences(content: &str) -> &str {
    CODE_FENCE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(content)
}

/// Find the index of the `]` matching the `[` at the start of `s`.
///
/// Brackets inside JSON string literals are ignored.
///
/// # Returns
///
/// The index of the matching closing `]`, or None if not found.
pub fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '[' if !in_string => {
                depth += 1;
            }
            ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Returns the text as a JSON array candidate when, after trimming, it is
/// exactly one balanced `[...]` block.
pub fn extract_json_array(content: &str) -> Option<&str> {
    let trimmed = strip_code_fences(content).trim();
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return None;
    }
    let end = find_matching_bracket(trimmed)?;
    (end == trimmed.len() - 1).then_some(trimmed)
}
