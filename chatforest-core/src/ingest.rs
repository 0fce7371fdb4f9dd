use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::error::{ChatforestError, Result};
use crate::model::{Role, Row};

const ID_HEADERS: &[&str] = &["id"];
const CONVERSATION_ID_HEADERS: &[&str] = &["conversation_id", "conversation id"];
const PARENT_ID_HEADERS: &[&str] = &["parent_id", "parent id"];
const ROLE_HEADERS: &[&str] = &["role"];
const CONTENT_HEADERS: &[&str] = &["content"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: Vec<Row>,
    /// Records skipped for a missing required field or an unknown role.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    id: usize,
    conversation_id: usize,
    parent_id: usize,
    role: usize,
    content: usize,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let fields: Vec<String> = headers
            .iter()
            .map(|field| field.trim().to_lowercase())
            .collect();
        let find = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| fields.iter().position(|field| field == name))
        };

        let columns = [
            ("id", find(ID_HEADERS)),
            ("conversation_id", find(CONVERSATION_ID_HEADERS)),
            ("parent_id", find(PARENT_ID_HEADERS)),
            ("role", find(ROLE_HEADERS)),
            ("content", find(CONTENT_HEADERS)),
        ];

        let missing: Vec<String> = columns
            .iter()
            .filter(|(_, position)| position.is_none())
            .map(|(name, _)| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ChatforestError::MissingColumns(missing));
        }

        let [id, conversation_id, parent_id, role, content] = columns.map(|(_, p)| p.unwrap_or(0));
        Ok(Self {
            id,
            conversation_id,
            parent_id,
            role,
            content,
        })
    }

    fn row(&self, record: &StringRecord) -> Option<Row> {
        let field = |position: usize| record.get(position).unwrap_or_default();

        let id = field(self.id).trim();
        let conversation_id = field(self.conversation_id).trim();
        let content = field(self.content);
        if id.is_empty() || conversation_id.is_empty() || content.is_empty() {
            return None;
        }
        let role = field(self.role).parse::<Role>().ok()?;

        Some(Row {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            parent_id: field(self.parent_id).trim().to_string(),
            role,
            content: content.to_string(),
        })
    }
}

pub fn load_rows_csv(path: &Path) -> Result<LoadReport> {
    let file = File::open(path).map_err(|source| ChatforestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rows_csv(file, path)
}

/// Reads headered CSV rows, dropping records that fail validation.
pub fn parse_rows_csv<R: Read>(reader: R, path: &Path) -> Result<LoadReport> {
    let csv_error = |source| ChatforestError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnMap::from_headers(reader.headers().map_err(csv_error)?)?;

    let mut rows = Vec::new();
    let mut dropped = 0;
    for (record_idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        match columns.row(&record) {
            Some(row) => rows.push(row),
            None => {
                debug!(record = record_idx + 1, "dropping invalid chat row");
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, path = %path.display(), "skipped rows missing required fields");
    }
    if rows.is_empty() {
        return Err(ChatforestError::NoValidRows {
            path: path.to_path_buf(),
        });
    }

    Ok(LoadReport { rows, dropped })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use crate::ingest::{load_rows_csv, parse_rows_csv};
    use crate::model::Role;

    #[test]
    fn headers_match_case_insensitively_with_spaces() {
        let raw = "ID,Conversation ID,Parent Id,ROLE,Content,extra\na,c1,,user,Hi,x\nb,c1,a,assistant,\"Hello, there\",y\n";

        let report = parse_rows_csv(raw.as_bytes(), Path::new("/tmp/mock.csv")).expect("parse");
        assert_eq!(report.dropped, 0);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].parent_id, "a");
        assert_eq!(report.rows[1].role, Role::Assistant);
        assert_eq!(report.rows[1].content, "Hello, there");
    }

    #[test]
    fn missing_columns_are_listed() {
        let raw = "id,role,content\na,user,Hi\n";
        let err = parse_rows_csv(raw.as_bytes(), Path::new("/tmp/mock.csv")).expect_err("must fail");
        assert_eq!(
            format!("{err}"),
            "csv file is missing required columns: conversation_id, parent_id"
        );
    }

    #[test]
    fn invalid_rows_are_dropped() {
        let raw = "id,conversation_id,parent_id,role,content\na,c1,,user,Hi\n,c1,,user,no id\nb,,,user,no conversation\nc,c1,,moderator,bad role\nd,c1,a,assistant,\ne,c1\n,,,,\n";

        let report = parse_rows_csv(raw.as_bytes(), Path::new("/tmp/mock.csv")).expect("parse");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].id, "a");
        assert_eq!(report.dropped, 5);
    }

    #[test]
    fn no_valid_rows_is_an_error() {
        let raw = "id,conversation_id,parent_id,role,content\n,c1,,user,Hi\n";
        let err = parse_rows_csv(raw.as_bytes(), Path::new("/tmp/mock.csv")).expect_err("must fail");
        assert!(format!("{err}").contains("no valid chat data"));
    }

    #[test]
    fn loads_from_disk() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("chat.csv");
        fs::write(
            &path,
            "id,conversation_id,parent_id,role,content\na,c1,,user,Hi\n",
        )
        .expect("write");

        let report = load_rows_csv(&path).expect("load");
        assert_eq!(report.rows.len(), 1);

        let err = load_rows_csv(&temp.path().join("missing.csv")).expect_err("must fail");
        assert!(format!("{err}").contains("i/o error"));
    }
}
