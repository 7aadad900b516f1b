//! Per-run conversation manifest, written as JSON lines.
//!
//! One record is appended per generated conversation. The post-processing
//! step reads these files back to attach `key_companies` to the run output.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::OutputError;

/// Directory under the system temp dir used when the configured manifest
/// directory cannot be created.
pub const FALLBACK_MANIFEST_DIR: &str = "chat_factory_manifests";

/// Bookkeeping for one generated conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub conversation_id: String,
    pub conv_number: usize,
    pub advisor: String,
    pub client: String,
    pub category: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub timestamp: NaiveDateTime,
    pub company_targeting_enabled: bool,
    #[serde(default)]
    pub key_companies: Vec<String>,
    #[serde(default)]
    pub companies_found: Vec<String>,
    #[serde(default)]
    pub has_company_mentions: bool,
    #[serde(default)]
    pub num_messages_requested: usize,
    #[serde(default)]
    pub num_messages_actual: usize,
}

/// File name of the manifest for `run_id`.
pub fn manifest_file_name(run_id: &str) -> String {
    format!("conversation_manifest_{run_id}.log")
}

/// Appends manifest records to `conversation_manifest_{run_id}.log`.
pub struct ManifestWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ManifestWriter {
    /// Opens the manifest for `run_id` inside `dir`, falling back to the
    /// system temp directory when `dir` cannot be created.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::Io` when neither location is writable.
    pub fn open(dir: &Path, run_id: &str) -> Result<Self, OutputError> {
        let dir = match fs::create_dir_all(dir) {
            Ok(()) => dir.to_path_buf(),
            Err(e) => {
                let fallback = std::env::temp_dir().join(FALLBACK_MANIFEST_DIR);
                warn!(
                    dir = %dir.display(),
                    fallback = %fallback.display(),
                    error = %e,
                    "Could not create manifest directory, using temporary directory"
                );
                fs::create_dir_all(&fallback)?;
                fallback
            }
        };

        let path = dir.join(manifest_file_name(run_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Writing conversation manifest");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and flushes it to disk.
    pub fn append(&mut self, record: &ManifestRecord) -> Result<(), OutputError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str) -> ManifestRecord {
        ManifestRecord {
            conversation_id: id.to_string(),
            conv_number: 1,
            advisor: "Alice Johnson".to_string(),
            client: "Allen".to_string(),
            category: "Investments".to_string(),
            topic: "Stocks".to_string(),
            subtopic: Some("Dividends".to_string()),
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|d| d.and_hms_opt(10, 30, 0))
                .expect("timestamp"),
            company_targeting_enabled: true,
            key_companies: vec!["Apple".to_string()],
            companies_found: vec!["Apple".to_string()],
            has_company_mentions: true,
            num_messages_requested: 6,
            num_messages_actual: 6,
        }
    }

    #[test]
    fn test_appends_json_lines() {
        let dir = TempDir::new().expect("tempdir");
        let mut writer = ManifestWriter::open(dir.path(), "run1").expect("open");
        writer.append(&record("run1_1_aaaa")).expect("append");
        writer.append(&record("run1_2_bbbb")).expect("append");

        let path = dir.path().join("conversation_manifest_run1.log");
        assert_eq!(writer.path(), path);
        let content = fs::read_to_string(&path).expect("read");
        let records: Vec<ManifestRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).expect("record"))
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].conversation_id, "run1_2_bbbb");
        assert_eq!(records[0].key_companies, vec!["Apple"]);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().expect("tempdir");
        ManifestWriter::open(dir.path(), "r")
            .and_then(|mut w| w.append(&record("a")))
            .expect("first");
        ManifestWriter::open(dir.path(), "r")
            .and_then(|mut w| w.append(&record("b")))
            .expect("second");
        let content =
            fs::read_to_string(dir.path().join(manifest_file_name("r"))).expect("read");
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_falls_back_when_dir_is_a_file() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").expect("write");

        let run_id = format!("fallback_{}", crate::utils::short_hex(8));
        let writer = ManifestWriter::open(&blocker, &run_id).expect("fallback");
        assert!(writer.path().starts_with(std::env::temp_dir().join(FALLBACK_MANIFEST_DIR)));
        let _ = fs::remove_file(writer.path());
    }
}
