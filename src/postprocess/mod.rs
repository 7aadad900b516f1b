//! Post-processing of generator output.
//!
//! - [`merge_manifest_into_synthetic`] attaches the `key_companies` recorded
//!   in a run's manifest to each conversation of the run files.
//! - [`format_conversations`] splits run files into one file per
//!   conversation, keeping only `version` and `lines`.
//! - [`create_validation_set`] flattens run files into one CSV row per
//!   conversation with its ground truth labels.

mod format;
mod merge;
mod validation;

pub use format::{format_conversations, FormatStats};
pub use merge::{load_manifest_mapping, merge_manifest_into_synthetic, ManifestMapping, MergeStats};
pub use validation::{create_validation_set, ValidationStats, VALIDATION_HEADER};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `.json` files under `dir`, sorted by path. `max_depth` of 1 means the
/// directory itself only.
pub(crate) fn json_files(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    files
}

/// Absolute form of `path`, resolving symlinks when it exists.
pub(crate) fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_files_depth() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("b.json"), "{}").expect("write");
        std::fs::write(dir.path().join("a.JSON"), "{}").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "").expect("write");
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");
        std::fs::write(dir.path().join("nested/c.json"), "{}").expect("write");

        let top = json_files(dir.path(), 1);
        assert_eq!(top.len(), 2);
        assert!(top[0].ends_with("a.JSON"));
        assert_eq!(json_files(dir.path(), usize::MAX).len(), 3);
    }
}
