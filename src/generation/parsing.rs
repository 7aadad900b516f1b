use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::models::{ChatLine, Speaker};
use crate::utils::extract_json_array;

static BRACED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{\s*"speaker"\s*:\s*"(advisor|client)"\s*,\s*"text"\s*:\s*"(.+?)"\s*\}"#)
        .expect("Invalid regex for braced lines")
});
static UNBRACED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"speaker"\s*:\s*"(advisor|client)"\s*,\s*"text"\s*:\s*"(.+?)""#)
        .expect("Invalid regex for unbraced lines")
});
static LABELLED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?si)(advisor|client):\s*"(.+?)""#).expect("Invalid regex for labelled lines")
});

/// Lines inserted when a parsed conversation lacks one of the speakers.
#[derive(Debug, Clone, Copy)]
pub struct Fallbacks {
    /// Prepended when no advisor line was parsed.
    pub advisor_opening: &'static str,
    /// Appended when no client line was parsed.
    pub client_closing: &'static str,
}

#[derive(Deserialize)]
struct RawLine {
    speaker: Value,
    text: String,
}

/// Parses an LLM response into chat lines.
///
/// A JSON array of `{speaker, text}` objects is preferred. Otherwise the
/// response is scanned for JSON-like objects, bare `"speaker": .., "text": ..`
/// pairs, and finally `advisor: "..."` lines, stopping at the first pass that
/// yields anything. When lines were found but one participant never speaks,
/// the matching fallback line is added.
pub fn parse_conversation(response: &str, fallbacks: Fallbacks) -> Vec<ChatLine> {
    let mut lines = parse_json_array(response).unwrap_or_default();

    if lines.is_empty() {
        lines = scan(response, &BRACED_LINE, true);
    }
    if lines.is_empty() {
        lines = scan(response, &UNBRACED_LINE, true);
    }
    if lines.is_empty() {
        lines = scan(response, &LABELLED_LINE, false);
    }

    if lines.is_empty() {
        warn!(response_len = response.len(), "No conversation lines found in response");
        return lines;
    }

    if !lines.iter().any(|l| l.speaker == Speaker::Client) {
        lines.push(ChatLine::client(fallbacks.client_closing));
    }
    if !lines.iter().any(|l| l.speaker == Speaker::Advisor) {
        lines.insert(0, ChatLine::advisor(fallbacks.advisor_opening));
    }

    lines
}

fn parse_json_array(response: &str) -> Option<Vec<ChatLine>> {
    let array = extract_json_array(response)?;
    let raw: Vec<RawLine> = match serde_json::from_str(array) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "Response array is not a list of chat lines");
            return None;
        }
    };

    let lines: Vec<ChatLine> = raw
        .into_iter()
        .filter_map(|line| {
            let speaker = match &line.speaker {
                Value::String(label) => Speaker::from_label(label),
                Value::Number(n) => Speaker::from_label(&n.to_string()),
                _ => None,
            }?;
            Some(ChatLine::new(speaker, line.text.trim()))
        })
        .collect();
    Some(lines)
}

fn scan(response: &str, re: &Regex, unescape: bool) -> Vec<ChatLine> {
    re.captures_iter(response)
        .filter_map(|caps| {
            let speaker = Speaker::from_label(caps.get(1)?.as_str())?;
            let raw = caps.get(2)?.as_str();
            let text = if unescape {
                raw.replace("\\\"", "\"").replace("\\n", " ")
            } else {
                raw.trim().to_string()
            };
            Some(ChatLine::new(speaker, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACKS: Fallbacks = Fallbacks {
        advisor_opening: "How can I help you today?",
        client_closing: "Thank you for the information.",
    };

    #[test]
    fn test_parses_json_lines() {
        let response = r#"{"speaker": "advisor", "text": "Hello Sam, how can I help?"}
{"speaker": "client", "text": "I want to talk about \"bonds\".\nAnd stocks."}"#;
        let lines = parse_conversation(response, FALLBACKS);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].speaker, Speaker::Advisor);
        assert_eq!(lines[1].text, r#"I want to talk about "bonds". And stocks."#);
    }

    #[test]
    fn test_parses_json_array_in_code_fence() {
        let response = "```json\n[{\"speaker\": \"advisor\", \"text\": \"Hi\"}, {\"speaker\": \"0\", \"text\": \"Hello\"}]\n```";
        let lines = parse_conversation(response, FALLBACKS);
        assert_eq!(
            lines,
            vec![ChatLine::advisor("Hi"), ChatLine::client("Hello")]
        );
    }

    #[test]
    fn test_parses_unbraced_pairs() {
        let response = r#""speaker": "advisor", "text": "Morning."
"speaker": "client", "text": "Morning to you.""#;
        let lines = parse_conversation(response, FALLBACKS);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "Morning to you.");
    }

    #[test]
    fn test_parses_labelled_lines() {
        let response = "Advisor: \" Welcome back. \"\nClient: \"Thanks.\"";
        let lines = parse_conversation(response, FALLBACKS);
        assert_eq!(
            lines,
            vec![ChatLine::advisor("Welcome back."), ChatLine::client("Thanks.")]
        );
    }

    #[test]
    fn test_adds_missing_speakers() {
        let advisor_only = r#"{"speaker": "advisor", "text": "Just me."}"#;
        let lines = parse_conversation(advisor_only, FALLBACKS);
        assert_eq!(lines.last(), Some(&ChatLine::client(FALLBACKS.client_closing)));

        let client_only = r#"{"speaker": "client", "text": "Just me."}"#;
        let lines = parse_conversation(client_only, FALLBACKS);
        assert_eq!(lines.first(), Some(&ChatLine::advisor(FALLBACKS.advisor_opening)));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_line_patterns_compile() {
        for re in [&*BRACED_LINE, &*UNBRACED_LINE, &*LABELLED_LINE] {
            assert_eq!(re.captures_len(), 3);
        }
    }

    #[test]
    fn test_unparseable_response_is_empty() {
        assert!(parse_conversation("I cannot help with that.", FALLBACKS).is_empty());
        assert!(parse_conversation("", FALLBACKS).is_empty());
    }
}
