//! CSV header extraction and data row counting
//!
//! Reads the first record of a staged file as the header row and streams
//! the rest of the file to count data records. Row widths are not checked;
//! the processing engine deals with ragged rows.
//!
//! Line count policy: blank records (every field empty or whitespace) are
//! not counted, wherever they appear. A missing trailing newline does not
//! change the count.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::ParserConfig;

use super::error::IngestError;

/// Records read between two cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 1024;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Header row and data record count of a CSV file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvSummary {
    pub headers: Vec<String>,
    pub line_count: u64,
}

/// Byte-level dialect handed to the CSV reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    /// `None` when quotes are escaped by doubling them
    pub escape: Option<u8>,
}

fn single_ascii(option: &'static str, value: &str) -> Result<u8, IngestError> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(IngestError::InvalidDialect {
            option,
            value: value.to_string(),
        }),
    }
}

impl Dialect {
    pub fn from_config(config: &ParserConfig) -> Result<Self, IngestError> {
        let delimiter = single_ascii("delimiter", &config.delimiter)?;
        let quote = single_ascii("enclosure", &config.enclosure)?;
        let escape = if config.escape.is_empty() {
            None
        } else {
            let escape = single_ascii("escape", &config.escape)?;
            (escape != quote).then_some(escape)
        };
        Ok(Self {
            delimiter,
            quote,
            escape,
        })
    }

    fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(true)
            .escape(self.escape);
        builder
    }
}

/// Normalize a raw header cell into the key form used for contact fields.
///
/// Lowercases, turns whitespace, `-` and `.` into `_`, drops anything else
/// that is not a letter, digit or `_`, and collapses repeated `_`. Accented
/// and non-Latin letters are kept.
pub fn sanitize_header(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(BYTE_ORDER_MARK).trim();
    let mut key = String::with_capacity(trimmed.len());
    for c in trimmed.chars().flat_map(char::to_lowercase) {
        let c = if c.is_whitespace() || c == '-' || c == '.' {
            '_'
        } else if c.is_alphanumeric() || c == '_' {
            c
        } else {
            continue;
        };
        if c == '_' && key.ends_with('_') {
            continue;
        }
        key.push(c);
    }
    key.trim_matches('_').to_string()
}

fn is_blank_header(record: &StringRecord) -> bool {
    record
        .iter()
        .all(|field| field.trim_start_matches(BYTE_ORDER_MARK).trim().is_empty())
}

fn is_blank_record(record: &ByteRecord) -> bool {
    record
        .iter()
        .all(|field| field.iter().all(u8::is_ascii_whitespace))
}

/// Read failures of the underlying file are staging problems, not bad input.
fn read_error(e: csv::Error) -> IngestError {
    if !e.is_io_error() {
        return IngestError::MalformedCsv(e);
    }
    match e.into_kind() {
        csv::ErrorKind::Io(io) => IngestError::StagingFailed(io),
        other => IngestError::StagingFailed(std::io::Error::other(format!("{:?}", other))),
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), IngestError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(IngestError::Cancelled),
        _ => Ok(()),
    }
}

/// Read the header row and count data records from any reader.
pub fn read_summary<R: Read>(
    source: R,
    dialect: &Dialect,
    cancel: Option<&CancellationToken>,
) -> Result<CsvSummary, IngestError> {
    let mut reader = dialect.reader_builder().from_reader(source);

    let mut header = StringRecord::new();
    let has_header = reader
        .read_record(&mut header)
        .map_err(read_error)?;
    if !has_header || is_blank_header(&header) {
        return Err(IngestError::EmptyFile);
    }
    let headers: Vec<String> = header.iter().map(sanitize_header).collect();

    let mut record = ByteRecord::new();
    let mut seen: u64 = 0;
    let mut line_count: u64 = 0;
    loop {
        if seen % CANCEL_CHECK_INTERVAL == 0 {
            check_cancelled(cancel)?;
        }
        if !reader
            .read_byte_record(&mut record)
            .map_err(read_error)?
        {
            break;
        }
        seen += 1;
        if !is_blank_record(&record) {
            line_count += 1;
        }
    }

    Ok(CsvSummary {
        headers,
        line_count,
    })
}

/// Read the header row and count data records of a staged file.
pub fn read_file(
    path: &Path,
    config: &ParserConfig,
    cancel: Option<&CancellationToken>,
) -> Result<CsvSummary, IngestError> {
    let dialect = Dialect::from_config(config)?;
    let file = File::open(path).map_err(IngestError::StagingFailed)?;
    let summary = read_summary(file, &dialect, cancel)?;
    debug!(
        "Read {} headers and {} data rows from {}",
        summary.headers.len(),
        summary.line_count,
        path.display()
    );
    Ok(summary)
}
