use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

use super::json_files;
use crate::error::OutputError;
use crate::generator::ManifestRecord;

/// `conversation_id` to the companies its prompt targeted.
pub type ManifestMapping = BTreeMap<String, Vec<String>>;

/// Counts from a manifest merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub files: usize,
    pub conversations: usize,
    /// Conversations that received a `key_companies` field.
    pub updated: usize,
}

/// Reads every `conversation_manifest_{run_id}*.log` in `manifest_dir`.
///
/// Lines that are not manifest records are logged and skipped. Records
/// with no key companies are left out of the mapping.
///
/// # Errors
///
/// Returns `OutputError::MissingDirectory` when `manifest_dir` does not exist.
pub fn load_manifest_mapping(manifest_dir: &Path, run_id: &str) -> Result<ManifestMapping, OutputError> {
    if !manifest_dir.is_dir() {
        return Err(OutputError::MissingDirectory(manifest_dir.display().to_string()));
    }

    let pattern = manifest_dir.join(format!(
        "conversation_manifest_{}*.log",
        glob::Pattern::escape(run_id)
    ));
    let pattern = pattern.to_string_lossy();
    let files: Vec<_> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid manifest pattern");
            Vec::new()
        }
    };
    info!(count = files.len(), pattern = %pattern, "Found manifest files");

    let mut mapping = ManifestMapping::new();
    for path in files {
        let file = fs::File::open(&path)?;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ManifestRecord>(line) {
                Ok(record) if !record.key_companies.is_empty() => {
                    mapping.insert(record.conversation_id, record.key_companies);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(file = %path.display(), line = line_no + 1, error = %e, "Skipping bad manifest line");
                }
            }
        }
    }

    info!(conversations = mapping.len(), "Loaded manifest mapping");
    Ok(mapping)
}

/// Copies every run file under `synthetic_dir` into `output_dir`, adding
/// `key_companies` to conversations found in `mapping`.
///
/// Relative paths are preserved. Files that are not run files are skipped
/// with a warning.
pub fn merge_manifest_into_synthetic(
    synthetic_dir: &Path,
    output_dir: &Path,
    mapping: &ManifestMapping,
) -> Result<MergeStats, OutputError> {
    if !synthetic_dir.is_dir() {
        return Err(OutputError::MissingDirectory(synthetic_dir.display().to_string()));
    }
    if super::resolved(synthetic_dir) == super::resolved(output_dir) {
        return Err(OutputError::SameDirectory(synthetic_dir.display().to_string()));
    }

    let mut stats = MergeStats::default();
    for path in json_files(synthetic_dir, usize::MAX) {
        let mut data: Value = match fs::read_to_string(&path)
            .map_err(OutputError::from)
            .and_then(|s| serde_json::from_str(&s).map_err(OutputError::from))
        {
            Ok(data) => data,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };

        let Some(conversations) = data.get_mut("conversations").and_then(Value::as_array_mut) else {
            warn!(file = %path.display(), "Skipping file with unexpected structure");
            continue;
        };

        for conversation in conversations.iter_mut() {
            stats.conversations += 1;
            let companies = conversation
                .get("conversation_id")
                .and_then(Value::as_str)
                .and_then(|id| mapping.get(id));
            if let (Some(companies), Some(object)) = (companies, conversation.as_object_mut()) {
                object.insert("key_companies".to_string(), Value::from(companies.clone()));
                stats.updated += 1;
            }
        }

        let relative = path.strip_prefix(synthetic_dir).unwrap_or(&path);
        let target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, serde_json::to_string_pretty(&data)?)?;
        debug!(file = %target.display(), "Merged manifest data");
        stats.files += 1;
    }

    info!(
        files = stats.files,
        conversations = stats.conversations,
        updated = stats.updated,
        "Manifest merge complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest_line(id: &str, companies: &[&str]) -> String {
        serde_json::json!({
            "conversation_id": id,
            "conv_number": 1,
            "advisor": "Alice",
            "client": "Allen",
            "category": "Investments",
            "topic": "Stocks",
            "subtopic": null,
            "timestamp": "2024-05-01T10:00:00",
            "company_targeting_enabled": !companies.is_empty(),
            "key_companies": companies,
        })
        .to_string()
    }

    #[test]
    fn test_load_mapping_skips_bad_and_empty() {
        let dir = TempDir::new().expect("tempdir");
        let content = [
            manifest_line("r1_1_a", &["Apple", "Tesla"]),
            "not json".to_string(),
            manifest_line("r1_2_b", &[]),
        ]
        .join("\n");
        fs::write(dir.path().join("conversation_manifest_r1.log"), content).expect("write");
        fs::write(
            dir.path().join("conversation_manifest_r1_part2.log"),
            manifest_line("r1_3_c", &["Nvidia"]),
        )
        .expect("write");
        fs::write(
            dir.path().join("conversation_manifest_other.log"),
            manifest_line("x", &["Ford"]),
        )
        .expect("write");

        let mapping = load_manifest_mapping(dir.path(), "r1").expect("mapping");
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["r1_1_a"], vec!["Apple", "Tesla"]);
        assert!(mapping.contains_key("r1_3_c"));
        assert!(!mapping.contains_key("x"));
    }

    #[test]
    fn test_missing_manifest_dir() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_manifest_mapping(&dir.path().join("absent"), "r1").err().expect("error");
        assert!(matches!(err, OutputError::MissingDirectory(_)));
    }

    #[test]
    fn test_merge_adds_key_companies() {
        let dir = TempDir::new().expect("tempdir");
        let synthetic = dir.path().join("synthetic");
        fs::create_dir_all(&synthetic).expect("mkdir");
        let run_file = serde_json::json!({
            "version": "5",
            "advisor": "Alice",
            "client": "Allen",
            "conversations": [
                {"conversation_id": "r1_1_a", "lines": []},
                {"conversation_id": "r1_2_b", "lines": []}
            ]
        });
        fs::write(synthetic.join("Alice_Allen_abc123.json"), run_file.to_string()).expect("write");
        fs::write(synthetic.join("broken.json"), "{").expect("write");

        let mut mapping = ManifestMapping::new();
        mapping.insert("r1_1_a".to_string(), vec!["Apple".to_string()]);

        let output = dir.path().join("merged");
        let stats = merge_manifest_into_synthetic(&synthetic, &output, &mapping).expect("merge");
        assert_eq!(
            stats,
            MergeStats {
                files: 1,
                conversations: 2,
                updated: 1
            }
        );

        let merged: Value = serde_json::from_str(
            &fs::read_to_string(output.join("Alice_Allen_abc123.json")).expect("read"),
        )
        .expect("json");
        assert_eq!(merged["conversations"][0]["key_companies"][0], "Apple");
        assert!(merged["conversations"][1].get("key_companies").is_none());
    }

    #[test]
    fn test_merge_rejects_same_directory() {
        let dir = TempDir::new().expect("tempdir");
        let err = merge_manifest_into_synthetic(dir.path(), dir.path(), &ManifestMapping::new())
            .err()
            .expect("error");
        assert!(matches!(err, OutputError::SameDirectory(_)));
    }
}
