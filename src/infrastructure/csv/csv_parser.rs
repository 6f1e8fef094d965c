// ============================================================
// CSV PARSER
// ============================================================
// Tokenize CSV exports into a header row plus raw, possibly ragged rows

use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::domain::error::{AppError, Result};
use crate::domain::table::RawTable;

/// CSV tokenizer. Quoting follows RFC 4180; column counts are never validated.
#[derive(Debug, Clone, Default)]
pub struct CsvParser {
    /// Fixed delimiter; `None` detects it from the content
    delimiter: Option<u8>,

    /// Whether to trim whitespace from values
    trim: bool,
}

impl CsvParser {
    /// Create a parser that detects the delimiter and keeps values untrimmed
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Decode uploaded bytes and tokenize them.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<RawTable> {
        let content = decode_text(bytes);
        self.parse_content(&content)
    }

    /// Tokenize CSV text. The first record becomes the header row. Blank lines
    /// and records made of a single empty field are skipped; an empty input
    /// yields an empty table.
    pub fn parse_content(&self, content: &str) -> Result<RawTable> {
        let delimiter = self
            .delimiter
            .unwrap_or_else(|| Self::detect_delimiter(content));

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .has_headers(false)
            .flexible(true) // Allow rows with different lengths
            .from_reader(content.as_bytes());

        let mut records = reader
            .records()
            .enumerate()
            .filter(|(_, result)| !matches!(result, Ok(record) if is_empty_record(record)));

        let headers = match records.next() {
            Some((_, result)) => result
                .map_err(|e| {
                    AppError::ParseError(format!("Failed to read CSV headers: {}", e))
                })?
                .iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for (index, result) in records {
            let record = result.map_err(|e| {
                AppError::ParseError(format!("Failed to parse CSV record {}: {}", index + 1, e))
            })?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        debug!(
            delimiter = %(delimiter as char),
            columns = headers.len(),
            rows = rows.len(),
            "Tokenized CSV content"
        );

        Ok(RawTable::new(headers, rows))
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        let sample_lines: Vec<_> = content
            .lines()
            .filter(|line| !line.is_empty())
            .take(10)
            .collect();
        if sample_lines.is_empty() {
            return best_delimiter;
        }

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;

            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

/// A quoted empty line (`""`) carries no data.
fn is_empty_record(record: &StringRecord) -> bool {
    record.len() == 1 && record[0].is_empty()
}

/// UTF-8 with the BOM removed; malformed UTF-8 is read as Windows-1252.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }

    warn!("CSV input is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text
}
