use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::json_files;
use crate::error::OutputError;

/// Column order of the validation set.
pub const VALIDATION_HEADER: [&str; 10] = [
    "conversation_id",
    "advisor",
    "client",
    "version",
    "date",
    "category",
    "topic",
    "company_mentions",
    "full_text",
    "source_file",
];

/// Separator for list-valued columns.
const LIST_DELIMITER: &str = "|";

/// Counts from building a validation set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub rows_written: usize,
}

/// One row per conversation, ground truth labels next to the joined text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidationRow {
    conversation_id: String,
    advisor: String,
    client: String,
    version: String,
    date: String,
    category: String,
    topic: String,
    company_mentions: String,
    full_text: String,
    source_file: String,
}

impl ValidationRow {
    fn fields(&self) -> [&str; 10] {
        [
            &self.conversation_id,
            &self.advisor,
            &self.client,
            &self.version,
            &self.date,
            &self.category,
            &self.topic,
            &self.company_mentions,
            &self.full_text,
            &self.source_file,
        ]
    }
}

/// Flattens the run files in `source` into a single CSV at `output`.
///
/// Every conversation becomes a row carrying its labels (`category`, `topic`,
/// `company_mentions` joined with `|`), the conversation date as
/// `YYYY-MM-DD` and the line texts joined with newlines. Unreadable run files
/// are logged and skipped. No file is written when no conversation was found.
///
/// # Errors
///
/// Returns `OutputError::MissingDirectory` when `source` is absent and
/// `OutputError::OutputIsDirectory` when `output` is a directory.
pub fn create_validation_set(source: &Path, output: &Path) -> Result<ValidationStats, OutputError> {
    if !source.is_dir() {
        return Err(OutputError::MissingDirectory(source.display().to_string()));
    }
    if output.is_dir() {
        return Err(OutputError::OutputIsDirectory(output.display().to_string()));
    }

    let files = json_files(source, 1);
    if files.is_empty() {
        warn!(dir = %source.display(), "No JSON files found in source directory");
    }
    info!(count = files.len(), dir = %source.display(), "Building validation set");

    let mut stats = ValidationStats::default();
    let mut rows = Vec::new();

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

        let Some(conversations) = data.get("conversations").and_then(Value::as_array) else {
            warn!(file = %path.display(), "Expected a conversations list, skipping");
            stats.files_skipped += 1;
            continue;
        };

        let source_file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let advisor = text_field(&data, "advisor").unwrap_or_else(|| "UnknownAdvisor".to_string());
        let client = text_field(&data, "client").unwrap_or_else(|| "UnknownClient".to_string());
        let version = text_field(&data, "version").unwrap_or_else(|| "UnknownVersion".to_string());

        for (idx, conversation) in conversations.iter().enumerate() {
            if !conversation.is_object() {
                warn!(file = %source_file, idx, "Skipping non-object conversation");
                continue;
            }

            let conversation_id = text_field(conversation, "conversation_id")
                .unwrap_or_else(|| format!("{stem}_conv_{idx}"));
            let date = conversation
                .get("timestamp")
                .and_then(Value::as_str)
                .map(|raw| {
                    conversation_date(raw).unwrap_or_else(|| {
                        warn!(conversation_id = %conversation_id, timestamp = raw, "Unparseable timestamp, date left empty");
                        String::new()
                    })
                })
                .unwrap_or_default();

            rows.push(ValidationRow {
                advisor: advisor.clone(),
                client: client.clone(),
                version: version.clone(),
                date,
                category: text_field(conversation, "category").unwrap_or_default(),
                topic: text_field(conversation, "topic").unwrap_or_default(),
                company_mentions: company_mentions(conversation),
                full_text: full_text(conversation),
                source_file: source_file.clone(),
                conversation_id,
            });
        }
        stats.files_processed += 1;
    }

    if rows.is_empty() {
        warn!(dir = %source.display(), "No conversations found, validation set not written");
        return Ok(stats);
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(fs::File::create(output)?);
    write_record(&mut writer, &VALIDATION_HEADER)?;
    for row in &rows {
        write_record(&mut writer, &row.fields())?;
    }
    writer.flush()?;
    stats.rows_written = rows.len();

    info!(
        files = stats.files_processed,
        skipped = stats.files_skipped,
        rows = stats.rows_written,
        output = %output.display(),
        "Validation set written"
    );
    Ok(stats)
}

/// String or number field rendered as text; empty strings count as missing.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn conversation_date(raw: &str) -> Option<String> {
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

fn company_mentions(conversation: &Value) -> String {
    let Some(mentions) = conversation.get("company_mentions").and_then(Value::as_array) else {
        return String::new();
    };
    mentions
        .iter()
        .map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(LIST_DELIMITER)
}

fn full_text(conversation: &Value) -> String {
    let Some(lines) = conversation.get("lines").and_then(Value::as_array) else {
        debug!("Conversation has no lines list");
        return String::new();
    };
    lines
        .iter()
        .filter_map(|line| line.get("text").and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Writes one CSV record, quoting fields that hold a delimiter, quote or
/// line break.
fn write_record<W: Write>(writer: &mut W, fields: &[&str]) -> std::io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        if field.contains([',', '"', '\n', '\r']) {
            write!(writer, "\"{}\"", field.replace('"', "\"\""))?;
        } else {
            writer.write_all(field.as_bytes())?;
        }
    }
    writer.write_all(b"\r\n")
}
