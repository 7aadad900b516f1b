//! Data models shared across chat-forge.
//!
//! Conversation records are what the generator writes to disk; taxonomy
//! records describe the topic tree the strategies sample from.

mod conversation;
mod taxonomy;

pub use conversation::{ChatLine, ConversationFile, SingleConversation, Speaker};
pub use taxonomy::{CompanyTaggingInfo, ConversationTypeInfo, Taxonomy, TopicPath};
