use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::info;

use crate::error::{ChatforestError, Result};
use crate::render::render_analysis_report;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\w*\n?").expect("valid regex"));
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static DOT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}").expect("valid regex"));
static ZERO_WIDTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{200B}-\x{200D}\x{FEFF}]").expect("valid regex"));

const MIN_CONTENT_CHARS: usize = 3;
const DUPLICATE_PREFIX_CHARS: usize = 100;
const MAX_CLEAN_CONTENT_CHARS: usize = 50_000;

const MINIMAL_COLUMNS: &[&str] = &["id", "conversation_id", "parent_id", "role", "content"];
const FULL_COLUMNS: &[&str] = &[
    "id",
    "conversation_id",
    "conversation_title",
    "parent_id",
    "role",
    "content",
    "timestamp",
    "status",
    "content_length",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub clean: bool,
    pub minimal: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            clean: true,
            minimal: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertStats {
    pub total_messages: usize,
    pub empty_content_removed: usize,
    pub system_messages_removed: usize,
    pub duplicates_removed: usize,
    pub oversized_removed: usize,
}

/// One message flattened out of a ChatGPT export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub id: String,
    pub conversation_id: String,
    pub conversation_title: String,
    pub parent_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub rows: Vec<ExportRow>,
    pub stats: ConvertStats,
}

/// Content profile of converted rows, written next to the CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportAnalysis {
    pub conversations: usize,
    pub messages: usize,
    /// Rows per role, most frequent first.
    pub role_counts: Vec<(String, usize)>,
    pub average_content_chars: f64,
    pub longest_content_chars: usize,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
}

impl ExportAnalysis {
    pub fn from_rows(rows: &[ExportRow]) -> Self {
        let mut conversations = HashSet::new();
        let mut roles = HashMap::<&str, usize>::new();
        let mut total_chars = 0;
        let mut longest_content_chars = 0;
        let mut first_timestamp: Option<f64> = None;
        let mut last_timestamp: Option<f64> = None;

        for row in rows {
            conversations.insert(row.conversation_id.as_str());
            *roles.entry(row.role.as_str()).or_default() += 1;

            let chars = row.content.chars().count();
            total_chars += chars;
            longest_content_chars = longest_content_chars.max(chars);

            if let Some(timestamp) = row.timestamp {
                first_timestamp = Some(first_timestamp.map_or(timestamp, |t| t.min(timestamp)));
                last_timestamp = Some(last_timestamp.map_or(timestamp, |t| t.max(timestamp)));
            }
        }

        let mut role_counts: Vec<(String, usize)> = roles
            .into_iter()
            .map(|(role, count)| (role.to_string(), count))
            .collect();
        role_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        #[allow(clippy::cast_precision_loss)]
        let average_content_chars = if rows.is_empty() {
            0.0
        } else {
            total_chars as f64 / rows.len() as f64
        };

        Self {
            conversations: conversations.len(),
            messages: rows.len(),
            role_counts,
            average_content_chars,
            longest_content_chars,
            first_timestamp,
            last_timestamp,
        }
    }
}

pub fn load_chatgpt_export(path: &Path, options: ConvertOptions) -> Result<Conversion> {
    let raw = fs::read_to_string(path).map_err(|source| ChatforestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    convert_chatgpt_export(&raw, path, options)
}

pub fn convert_chatgpt_export(
    raw_json: &str,
    path: &Path,
    options: ConvertOptions,
) -> Result<Conversion> {
    let value =
        serde_json::from_str::<Value>(raw_json).map_err(|source| ChatforestError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;

    let mut stats = ConvertStats::default();
    let mut seen_prefixes = HashSet::<String>::new();
    let mut rows = Vec::new();

    for conversation in value.as_array().into_iter().flatten() {
        let conversation_id = string_field(conversation.get("id"));
        let conversation_title = conversation
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled")
            .to_string();

        let Some(mapping) = conversation.get("mapping").and_then(Value::as_object) else {
            continue;
        };

        for (mapping_id, entry) in mapping {
            let Some(message) = entry.get("message").filter(|m| !m.is_null()) else {
                continue;
            };
            stats.total_messages += 1;

            let role = string_field(message.pointer("/author/role"));
            let mut content = extract_parts(message.pointer("/content/parts"));
            if options.clean {
                content = clean_content(&content);
            }

            if content.trim().chars().count() < MIN_CONTENT_CHARS {
                stats.empty_content_removed += 1;
                continue;
            }

            if role == "system"
                && message
                    .pointer("/metadata/is_visually_hidden_from_conversation")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            {
                stats.system_messages_removed += 1;
                continue;
            }

            let prefix: String = content
                .to_lowercase()
                .chars()
                .take(DUPLICATE_PREFIX_CHARS)
                .collect();
            if !seen_prefixes.insert(prefix) {
                stats.duplicates_removed += 1;
                continue;
            }

            rows.push(ExportRow {
                id: message
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or(mapping_id.as_str())
                    .to_string(),
                conversation_id: conversation_id.clone(),
                conversation_title: conversation_title.clone(),
                parent_id: string_field(entry.get("parent")),
                role,
                content,
                timestamp: message.get("create_time").and_then(Value::as_f64),
                status: string_field(message.get("status")),
            });
        }
    }

    if options.clean {
        let before = rows.len();
        rows.retain(|row| row.content.chars().count() < MAX_CLEAN_CONTENT_CHARS);
        stats.oversized_removed = before - rows.len();
        rows.sort_by(|a, b| {
            a.conversation_id
                .cmp(&b.conversation_id)
                .then_with(|| compare_timestamps(a.timestamp, b.timestamp))
        });
    }

    info!(
        total = stats.total_messages,
        kept = rows.len(),
        "converted chat export"
    );
    Ok(Conversion { rows, stats })
}

/// Normalizes exported message text to a single clean line.
pub fn clean_content(text: &str) -> String {
    let text = WHITESPACE_RE.replace_all(text.trim(), " ");
    let text = CODE_FENCE_RE.replace_all(&text, "");
    let text = HTML_TAG_RE.replace_all(&text, "");
    let text = DOT_RUN_RE.replace_all(&text, "...");
    let text = ZERO_WIDTH_RE.replace_all(&text, "");
    text.trim().to_string()
}

pub fn write_rows_csv<W: Write>(
    writer: W,
    rows: &[ExportRow],
    minimal: bool,
    path: &Path,
) -> Result<()> {
    let csv_error = |source| ChatforestError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_writer(writer);
    let columns = if minimal { MINIMAL_COLUMNS } else { FULL_COLUMNS };
    writer.write_record(columns).map_err(csv_error)?;

    for row in rows {
        if minimal {
            writer
                .write_record([
                    row.id.as_str(),
                    row.conversation_id.as_str(),
                    row.parent_id.as_str(),
                    row.role.as_str(),
                    row.content.as_str(),
                ])
                .map_err(csv_error)?;
        } else {
            let timestamp = row.timestamp.map(|t| t.to_string()).unwrap_or_default();
            let content_length = row.content.chars().count().to_string();
            writer
                .write_record([
                    row.id.as_str(),
                    row.conversation_id.as_str(),
                    row.conversation_title.as_str(),
                    row.parent_id.as_str(),
                    row.role.as_str(),
                    row.content.as_str(),
                    timestamp.as_str(),
                    row.status.as_str(),
                    content_length.as_str(),
                ])
                .map_err(csv_error)?;
        }
    }

    writer.flush().map_err(|source| ChatforestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_rows_csv(path: &Path, rows: &[ExportRow], minimal: bool) -> Result<()> {
    let file = fs::File::create(path).map_err(|source| ChatforestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_rows_csv(file, rows, minimal, path)
}

/// `<stem>_cleaned.csv` or `<stem>_raw.csv` next to the input file.
pub fn default_output_path(input: &Path, clean: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "conversations".to_string());
    let suffix = if clean { "cleaned" } else { "raw" };
    input.with_file_name(format!("{stem}_{suffix}.csv"))
}

/// `<stem>_analysis.txt` in `dir`.
pub fn default_analysis_path(input: &Path, dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "conversations".to_string());
    dir.join(format!("{stem}_analysis.txt"))
}

pub fn save_analysis_report(path: &Path, source: &Path, analysis: &ExportAnalysis) -> Result<()> {
    fs::write(path, render_analysis_report(source, analysis)).map_err(|source| {
        ChatforestError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn extract_parts(parts: Option<&Value>) -> String {
    let mut chunks = Vec::new();
    for part in parts.and_then(Value::as_array).into_iter().flatten() {
        if let Some(text) = part.as_str() {
            chunks.push(text.to_string());
        } else if part.is_object() {
            chunks.push(part.to_string());
        }
    }
    chunks.join(" ")
}

fn compare_timestamps(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use crate::convert::{
        ConvertOptions, ExportAnalysis, clean_content, convert_chatgpt_export,
        default_analysis_path, default_output_path, load_chatgpt_export, save_analysis_report,
        save_rows_csv,
    };
    use crate::ingest::load_rows_csv;

    const EXPORT: &str = r#"[
  {
    "id": "conv-b",
    "title": "Second",
    "mapping": {
      "root": {"message": null, "parent": null},
      "m3": {"parent": "m2", "message": {"id": "m3", "author": {"role": "assistant"}, "create_time": 30.0, "status": "finished_successfully", "content": {"parts": ["Sure,   here <b>it</b> is..... done", {"asset": "img"}]}}},
      "m2": {"parent": null, "message": {"id": "m2", "author": {"role": "user"}, "create_time": 20.0, "content": {"parts": ["Can you help?"]}}}
    }
  },
  {
    "id": "conv-a",
    "title": "First",
    "mapping": {
      "s1": {"parent": null, "message": {"id": "s1", "author": {"role": "system"}, "metadata": {"is_visually_hidden_from_conversation": true}, "content": {"parts": ["hidden system prompt"]}}},
      "u1": {"parent": "s1", "message": {"author": {"role": "user"}, "create_time": 10.0, "content": {"parts": ["Can you help?"]}}},
      "u2": {"parent": "u1", "message": {"id": "u2", "author": {"role": "user"}, "content": {"parts": ["ok"]}}}
    }
  }
]"#;

    #[test]
    fn clean_content_normalizes_text() {
        assert_eq!(
            clean_content("  ```rust\nlet x = 1;``` <p>hi</p>\u{200B} wait......  "),
            "let x = 1; hi wait..."
        );
    }

    #[test]
    fn export_rows_are_filtered_and_counted() {
        let conversion = convert_chatgpt_export(
            EXPORT,
            Path::new("/tmp/conversations.json"),
            ConvertOptions::default(),
        )
        .expect("convert");

        let ids: Vec<&str> = conversion.rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
        assert_eq!(conversion.stats.total_messages, 5);
        assert_eq!(conversion.stats.system_messages_removed, 1);
        assert_eq!(conversion.stats.empty_content_removed, 1);
        assert_eq!(conversion.stats.duplicates_removed, 1);

        let reply = &conversion.rows[1];
        assert_eq!(reply.parent_id, "m2");
        assert_eq!(reply.content, "Sure, here it is... done {\"asset\":\"img\"}");
    }

    #[test]
    fn raw_conversion_keeps_text_and_mapping_keys() {
        let conversion = convert_chatgpt_export(
            EXPORT,
            Path::new("/tmp/conversations.json"),
            ConvertOptions {
                clean: false,
                minimal: true,
            },
        )
        .expect("convert");

        let reply = conversion
            .rows
            .iter()
            .find(|row| row.id == "m3")
            .expect("reply row");
        assert_eq!(
            reply.content,
            "Sure,   here <b>it</b> is..... done {\"asset\":\"img\"}"
        );
    }

    #[test]
    fn mapping_entries_keep_file_order() {
        let export = r#"[{"id": "c1", "title": "Order", "mapping": {
            "zz": {"parent": null, "message": {"id": "zz", "author": {"role": "user"}, "content": {"parts": ["Repeated question"]}}},
            "aa": {"parent": "zz", "message": {"id": "aa", "author": {"role": "user"}, "content": {"parts": ["Another message"]}}},
            "mm": {"parent": "aa", "message": {"id": "mm", "author": {"role": "user"}, "content": {"parts": ["REPEATED question"]}}}
        }}]"#;

        let conversion = convert_chatgpt_export(
            export,
            Path::new("/tmp/conversations.json"),
            ConvertOptions {
                clean: false,
                minimal: false,
            },
        )
        .expect("convert");

        let ids: Vec<&str> = conversion.rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["zz", "aa"]);
        assert_eq!(conversion.stats.duplicates_removed, 1);
    }

    #[test]
    fn analysis_profiles_kept_rows() {
        let conversion = convert_chatgpt_export(
            EXPORT,
            Path::new("/tmp/conversations.json"),
            ConvertOptions::default(),
        )
        .expect("convert");

        let analysis = ExportAnalysis::from_rows(&conversion.rows);
        assert_eq!(analysis.conversations, 1);
        assert_eq!(analysis.messages, 2);
        assert_eq!(
            analysis.role_counts,
            vec![("assistant".to_string(), 1), ("user".to_string(), 1)]
        );
        assert_eq!(analysis.longest_content_chars, 40);
        assert!((analysis.average_content_chars - 26.5).abs() < f64::EPSILON);
        assert_eq!(analysis.first_timestamp, Some(20.0));
        assert_eq!(analysis.last_timestamp, Some(30.0));

        let empty = ExportAnalysis::from_rows(&[]);
        assert_eq!(empty.messages, 0);
        assert!(empty.average_content_chars.abs() < f64::EPSILON);
    }

    #[test]
    fn analysis_report_is_written_beside_output() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("conversations.json");
        fs::write(&input, EXPORT).expect("write");

        let conversion = load_chatgpt_export(&input, ConvertOptions::default()).expect("convert");
        let path = default_analysis_path(&input, temp.path());
        assert_eq!(path, temp.path().join("conversations_analysis.txt"));

        save_analysis_report(&path, &input, &ExportAnalysis::from_rows(&conversion.rows))
            .expect("save");
        let report = fs::read_to_string(&path).expect("read");
        assert!(report.starts_with("ChatGPT Conversations Analysis Report\n"));
        assert!(report.contains("Total messages: 2\n"));
        assert!(report.contains("  user: 1 messages\n"));
        assert!(report.contains("Longest message: 40 characters\n"));
    }

    #[test]
    fn invalid_json_reports_path() {
        let err = convert_chatgpt_export(
            "{",
            Path::new("/tmp/broken.json"),
            ConvertOptions::default(),
        )
        .expect_err("must fail");
        assert!(format!("{err}").contains("invalid json in /tmp/broken.json"));
    }

    #[test]
    fn written_csv_loads_back_as_rows() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("conversations.json");
        fs::write(&input, EXPORT).expect("write");

        let conversion = load_chatgpt_export(&input, ConvertOptions::default())
            .expect("convert");
        let output = default_output_path(&input, true);
        assert_eq!(output, temp.path().join("conversations_cleaned.csv"));
        save_rows_csv(&output, &conversion.rows, false).expect("save");

        let header = fs::read_to_string(&output).expect("read");
        assert!(header.starts_with(
            "id,conversation_id,conversation_title,parent_id,role,content,timestamp,status,content_length\n"
        ));

        let report = load_rows_csv(&output).expect("load");
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].parent_id, "m2");
    }
}
