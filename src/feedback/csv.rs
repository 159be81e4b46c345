//! Append-only CSV file store.
//!
//! Each submission appends exactly one line; the file is never rewritten,
//! which keeps concurrent submissions from clobbering earlier rows.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{AccuracyRating, FeedbackError, FeedbackRecord, FeedbackStore, UsabilityRating};

const HEADER: &str = "name,usability,accuracy,suggestion";

/// Feedback store appending rows to a local CSV file.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    /// Use the CSV file at `path`, creating it on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> FeedbackError {
        FeedbackError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FeedbackStore for CsvStore {
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        record.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        let new_file = file
            .metadata()
            .map_err(|source| self.io_error(source))?
            .len()
            == 0;

        let mut line = String::new();
        if new_file {
            line.push_str(HEADER);
            line.push('\n');
        }
        line.push_str(&format_row(record));
        line.push('\n');
        // One write call per submission keeps the append atomic enough for
        // line-sized rows on local filesystems.
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))?;
        file.flush().map_err(|source| self.io_error(source))
    }

    fn records(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let mut rows = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if idx == 0 || line.is_empty() {
                continue;
            }
            rows.push(parse_row(&line)?);
        }
        Ok(rows)
    }
}

fn format_row(record: &FeedbackRecord) -> String {
    format!(
        "{},{},{},{}",
        quote_field(&record.name),
        record.usability.as_str(),
        record.accuracy.as_str(),
        quote_field(&record.suggestion),
    )
}

/// Quote a field only when it would otherwise break the row shape.
///
/// Rows are read back line by line, so embedded line breaks are flattened
/// to spaces rather than quoted.
fn quote_field(value: &str) -> String {
    let value = value.replace(['\n', '\r'], " ");
    if value.contains([',', '"']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

fn parse_row(line: &str) -> Result<FeedbackRecord, FeedbackError> {
    let fields = split_row(line);
    if fields.len() != 4 {
        return Err(FeedbackError::MalformedRow(line.to_string()));
    }
    let usability = UsabilityRating::parse(&fields[1])
        .ok_or_else(|| FeedbackError::InvalidRating(fields[1].clone()))?;
    let accuracy = AccuracyRating::parse(&fields[2])
        .ok_or_else(|| FeedbackError::InvalidRating(fields[2].clone()))?;
    Ok(FeedbackRecord {
        name: fields[0].clone(),
        usability,
        accuracy,
        suggestion: fields[3].clone(),
    })
}

/// Split one CSV row, honoring quoted fields with doubled quotes.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}
