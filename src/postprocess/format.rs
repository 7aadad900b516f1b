use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::{json_files, resolved};
use crate::error::OutputError;
use crate::utils::sanitize_name;

/// Counts from a formatting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatStats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub conversations_written: usize,
}

/// Splits each run file in `source` into `target/{advisor}/{client}_{idx}.json`.
///
/// Each output holds `{version, lines}`. Indices start at 1 and continue
/// across run files of the same advisor/client pair, so no file is
/// overwritten.
///
/// # Errors
///
/// Returns `OutputError::SameDirectory` when `source` and `target` resolve to
/// the same path and `OutputError::MissingDirectory` when `source` is absent.
pub fn format_conversations(source: &Path, target: &Path) -> Result<FormatStats, OutputError> {
    if resolved(source) == resolved(target) {
        return Err(OutputError::SameDirectory(source.display().to_string()));
    }
    if !source.is_dir() {
        return Err(OutputError::MissingDirectory(source.display().to_string()));
    }

    if target.exists() {
        warn!(dir = %target.display(), "Target directory already exists, files may be overwritten");
    }
    fs::create_dir_all(target)?;

    let files = json_files(source, 1);
    if files.is_empty() {
        warn!(dir = %source.display(), "No JSON files found in source directory");
    }
    info!(count = files.len(), dir = %source.display(), "Formatting run files");

    let mut stats = FormatStats::default();
    let mut next_index: HashMap<PathBuf, usize> = HashMap::new();

    for path in files {
        let data: Value = match fs::read_to_string(&path)
            .map_err(OutputError::from)
            .and_then(|s| serde_json::from_str(&s).map_err(OutputError::from))
        {
            Ok(data) => data,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to read source file, skipping");
                stats.files_skipped += 1;
                continue;
            }
        };

        let advisor = data.get("advisor").and_then(Value::as_str).unwrap_or("UnknownAdvisor");
        let client = data.get("client").and_then(Value::as_str).unwrap_or("UnknownClient");
        let version = data.get("version").cloned().unwrap_or_else(|| json!("1.0"));

        let conversations = match data.get("conversations").and_then(Value::as_array) {
            Some(list) if !list.is_empty() => list,
            _ => {
                warn!(file = %path.display(), "No conversations found, skipping");
                stats.files_skipped += 1;
                continue;
            }
        };

        let advisor_dir = target.join(sanitize_name(advisor));
        fs::create_dir_all(&advisor_dir)?;
        let client_name = sanitize_name(client);
        let base = advisor_dir.join(&client_name);

        for conversation in conversations {
            let Some(conversation) = conversation.as_object() else {
                warn!(file = %path.display(), "Skipping non-object conversation");
                continue;
            };

            let idx = next_index.entry(base.clone()).or_insert(0);
            *idx += 1;
            let output = json!({
                "version": version,
                "lines": conversation.get("lines").cloned().unwrap_or_else(|| json!([])),
            });
            let out_path = advisor_dir.join(format!("{client_name}_{idx}.json"));
            fs::write(&out_path, serde_json::to_string_pretty(&output)?)?;
            stats.conversations_written += 1;
        }
        stats.files_processed += 1;
    }

    info!(
        files = stats.files_processed,
        skipped = stats.files_skipped,
        conversations = stats.conversations_written,
        target = %target.display(),
        "Formatting complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_file(advisor: &str, client: &str, count: usize) -> String {
        let conversations: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "conversation_id": format!("c{i}"),
                    "category": "Investments",
                    "lines": [{"speaker": "1", "text": format!("Hello {i}")}]
                })
            })
            .collect();
        json!({"version": "5", "advisor": advisor, "client": client, "conversations": conversations})
            .to_string()
    }

    #[test]
    fn test_splits_into_per_conversation_files() {
        let dir = TempDir::new().expect("tempdir");
        let source = dir.path().join("run");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("a.json"), run_file("Alice Johnson", "Allen", 2)).expect("write");
        fs::write(source.join("b.json"), run_file("Alice Johnson", "Allen", 1)).expect("write");
        fs::write(source.join("empty.json"), run_file("Bob", "Betty", 0)).expect("write");
        fs::write(source.join("bad.json"), "not json").expect("write");

        let target = dir.path().join("formatted");
        let stats = format_conversations(&source, &target).expect("format");
        assert_eq!(
            stats,
            FormatStats {
                files_processed: 2,
                files_skipped: 2,
                conversations_written: 3
            }
        );

        let advisor_dir = target.join("Alice_Johnson");
        for idx in 1..=3 {
            assert!(advisor_dir.join(format!("Allen_{idx}.json")).exists());
        }
        let first: Value = serde_json::from_str(
            &fs::read_to_string(advisor_dir.join("Allen_1.json")).expect("read"),
        )
        .expect("json");
        assert_eq!(first["version"], "5");
        assert_eq!(first["lines"][0]["text"], "Hello 0");
        assert!(first.get("conversation_id").is_none());
    }

    #[test]
    fn test_same_directory_is_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = format_conversations(dir.path(), dir.path()).err().expect("error");
        assert!(matches!(err, OutputError::SameDirectory(_)));
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().expect("tempdir");
        let err = format_conversations(&dir.path().join("absent"), &dir.path().join("out"))
            .err()
            .expect("error");
        assert!(matches!(err, OutputError::MissingDirectory(_)));
    }
}
