//! Delimited-text roster parsing.
//!
//! A roster needs `identifier` and `name` columns; `grade` and `group` are
//! optional. Headers are matched case-insensitively and the Spanish export
//! names (`curp`, `nombre`, `grado`, `grupo`) are accepted as aliases. The
//! delimiter is sniffed from the header line (comma, semicolon or tab).
//!
//! Structural problems with the header reject the whole upload. Problems with
//! a single row are kept next to that row so the generator can report them
//! and carry on with the rest.

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{NewStudent, normalize_identifier};

const IDENTIFIER_HEADERS: &[&str] = &["identifier", "curp"];
const NAME_HEADERS: &[&str] = &["name", "nombre"];
const GRADE_HEADERS: &[&str] = &["grade", "grado"];
const GROUP_HEADERS: &[&str] = &["group", "grupo"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("missing identifier")]
    MissingIdentifier,
    #[error("missing name")]
    MissingName,
    #[error("malformed row: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterLine {
    /// 1-based line in the uploaded file, header included.
    pub line: u64,
    pub parsed: Result<NewStudent, RowError>,
}

impl RosterLine {
    /// Best-effort identifier for reports, even when the row failed.
    pub fn identifier(&self) -> Option<&str> {
        self.parsed.as_ref().ok().map(|s| s.identifier.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub lines: Vec<RosterLine>,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

struct Columns {
    identifier: usize,
    name: usize,
    grade: Option<usize>,
    group: Option<usize>,
}

fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim().to_lowercase();
        aliases.iter().any(|alias| *alias == header)
    })
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .filter(|d| header.bytes().any(|b| b == *d))
        .unwrap_or(b',')
}

fn field(record: &StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<NewStudent, RowError> {
    let identifier = normalize_identifier(&field(record, Some(columns.identifier)));
    if identifier.is_empty() {
        return Err(RowError::MissingIdentifier);
    }

    let name = field(record, Some(columns.name));
    if name.is_empty() {
        return Err(RowError::MissingName);
    }

    Ok(NewStudent {
        identifier,
        name,
        grade: field(record, columns.grade),
        group: field(record, columns.group),
    })
}

#[instrument(skip(text), fields(bytes = text.len()))]
pub fn parse_roster(text: &str) -> Result<Roster, AppError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(AppError::Validation("Roster file is empty".to_string()));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("Roster header could not be read: {}", e)))?
        .clone();

    let identifier = find_column(&headers, IDENTIFIER_HEADERS).ok_or_else(|| {
        AppError::Validation("Roster is missing the 'identifier' column".to_string())
    })?;
    let name = find_column(&headers, NAME_HEADERS)
        .ok_or_else(|| AppError::Validation("Roster is missing the 'name' column".to_string()))?;

    let columns = Columns {
        identifier,
        name,
        grade: find_column(&headers, GRADE_HEADERS),
        group: find_column(&headers, GROUP_HEADERS),
    };

    let mut lines = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let line = match result {
            Ok(record) => {
                if record.iter().all(|value| value.trim().is_empty()) {
                    continue;
                }
                RosterLine {
                    line: record.position().map(|p| p.line()).unwrap_or(fallback_line),
                    parsed: parse_row(&record, &columns),
                }
            }
            Err(e) => RosterLine {
                line: e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line),
                parsed: Err(RowError::Malformed(e.to_string())),
            },
        };
        lines.push(line);
    }

    info!(rows = lines.len(), "Parsed roster");
    Ok(Roster { lines })
}
