use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Participant of a conversation. Serialized as `"0"` (client) or `"1"` (advisor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    #[serde(rename = "0")]
    Client,
    #[serde(rename = "1")]
    Advisor,
}

impl Speaker {
    /// Parses the role names used in LLM output (`advisor`/`client`) as well
    /// as the serialized codes.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "advisor" | "1" => Some(Self::Advisor),
            "client" | "0" => Some(Self::Client),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Client => "0",
            Self::Advisor => "1",
        }
    }
}

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl ChatLine {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: None,
        }
    }

    pub fn advisor(text: impl Into<String>) -> Self {
        Self::new(Speaker::Advisor, text)
    }

    pub fn client(text: impl Into<String>) -> Self {
        Self::new(Speaker::Client, text)
    }
}

/// One generated conversation between an advisor and a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleConversation {
    pub conversation_id: String,
    pub timestamp: NaiveDateTime,
    pub category: String,
    /// Formatted as `topic.subtopic`, or just `topic`.
    pub topic: String,
    pub lines: Vec<ChatLine>,
    #[serde(default)]
    pub company_mentions: Vec<String>,
}

/// The on-disk unit: a batch of conversations for one advisor/client pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationFile {
    pub version: String,
    pub advisor: String,
    pub client: String,
    pub conversations: Vec<SingleConversation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_serializes_as_code() {
        let line = ChatLine::advisor("Hello");
        let json = serde_json::to_value(&line).expect("serialize");
        assert_eq!(json["speaker"], "1");
        assert!(json["timestamp"].is_null());

        let parsed: ChatLine =
            serde_json::from_str(r#"{"speaker": "0", "text": "Hi"}"#).expect("parse");
        assert_eq!(parsed.speaker, Speaker::Client);
        assert_eq!(parsed.timestamp, None);
    }

    #[test]
    fn test_speaker_from_label() {
        assert_eq!(Speaker::from_label("Advisor"), Some(Speaker::Advisor));
        assert_eq!(Speaker::from_label("client"), Some(Speaker::Client));
        assert_eq!(Speaker::from_label("1"), Some(Speaker::Advisor));
        assert_eq!(Speaker::from_label("narrator"), None);
    }
}
