//! In-memory grouping of conversations by advisor/client pair, flushed to
//! JSON files in the run directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::OutputError;
use crate::models::{ConversationFile, SingleConversation};
use crate::utils::{sanitize_filename, short_hex};

struct PairBuffer {
    advisor: String,
    client: String,
    conversations: Vec<SingleConversation>,
}

/// `(advisor, client)`.
type PairKey = (String, String);

/// Buffers conversations per advisor/client pair.
pub struct ConversationBuffer {
    output_dir: PathBuf,
    version: String,
    max_per_pair: usize,
    groups: BTreeMap<PairKey, PairBuffer>,
    written: Vec<PathBuf>,
}

impl ConversationBuffer {
    /// # Arguments
    ///
    /// * `output_dir` - Run directory files are written into.
    /// * `version` - Value of the `version` field in every file.
    /// * `max_per_pair` - A group is flushed as soon as it holds this many conversations.
    pub fn new(output_dir: impl Into<PathBuf>, version: impl Into<String>, max_per_pair: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            version: version.into(),
            max_per_pair: max_per_pair.max(1),
            groups: BTreeMap::new(),
            written: Vec::new(),
        }
    }

    /// Adds a conversation, flushing its group when it reaches the limit.
    /// Returns the path written, if any.
    pub fn push(
        &mut self,
        advisor: &str,
        client: &str,
        conversation: SingleConversation,
    ) -> Result<Option<PathBuf>, OutputError> {
        let key = (advisor.to_string(), client.to_string());
        let group = self.groups.entry(key.clone()).or_insert_with(|| PairBuffer {
            advisor: advisor.to_string(),
            client: client.to_string(),
            conversations: Vec::new(),
        });
        group.conversations.push(conversation);

        if group.conversations.len() >= self.max_per_pair {
            return self.flush_group(&key);
        }
        Ok(None)
    }

    /// Writes every non-empty group and clears it.
    pub fn flush_all(&mut self) -> Result<Vec<PathBuf>, OutputError> {
        let keys: Vec<PairKey> = self.groups.keys().cloned().collect();
        debug!(pending = self.pending(), groups = keys.len(), "Flushing all buffer groups");
        let mut paths = Vec::new();
        for key in keys {
            if let Some(path) = self.flush_group(&key)? {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Writes one group. The group keeps its conversations if the write fails.
    fn flush_group(&mut self, key: &PairKey) -> Result<Option<PathBuf>, OutputError> {
        let Some(group) = self.groups.get_mut(key) else {
            return Ok(None);
        };
        if group.conversations.is_empty() {
            return Ok(None);
        }

        let mut file = ConversationFile {
            version: self.version.clone(),
            advisor: group.advisor.clone(),
            client: group.client.clone(),
            conversations: std::mem::take(&mut group.conversations),
        };
        match write_conversation_file(&self.output_dir, &file) {
            Ok(path) => {
                self.written.push(path.clone());
                Ok(Some(path))
            }
            Err(e) => {
                group.conversations = std::mem::take(&mut file.conversations);
                Err(e)
            }
        }
    }

    /// Conversations currently held in memory.
    pub fn pending(&self) -> usize {
        self.groups.values().map(|g| g.conversations.len()).sum()
    }

    /// Every file written so far, in write order.
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }
}

/// Writes `file` as pretty JSON to `{advisor}_{client}_{6hex}.json` inside `dir`.
pub fn write_conversation_file(dir: &Path, file: &ConversationFile) -> Result<PathBuf, OutputError> {
    fs::create_dir_all(dir)?;
    let name = format!(
        "{}_{}_{}.json",
        sanitize_filename(&file.advisor),
        sanitize_filename(&file.client),
        short_hex(6)
    );
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(file)?;
    fs::write(&path, json)?;

    info!(
        path = %path.display(),
        conversations = file.conversations.len(),
        "Saved conversation file"
    );
    debug!(advisor = %file.advisor, client = %file.client, "Flushed buffer group");
    Ok(path)
}
