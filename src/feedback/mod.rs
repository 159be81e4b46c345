//! Feedback records and append-only stores.
//!
//! Every backend appends one record atomically (a single SQL insert, a
//! single CSV line, or a single POST), so concurrent submissions cannot
//! lose each other's rows. Backend failures are surfaced as errors for the
//! caller to downgrade to warnings; the session memory table stays valid
//! regardless of what the durable backend does.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod csv;
mod memory;
mod sheet;
mod sqlite;

pub use csv::CsvStore;
pub use memory::MemoryStore;
pub use sheet::SheetStore;
pub use sqlite::{DB_FILE_NAME, SqliteStore};

/// Ease-of-use rating offered by the feedback form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsabilityRating {
    Excellent,
    Good,
    Average,
    Poor,
}

impl UsabilityRating {
    /// Canonical storage token for file and database backends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Average => "average",
            Self::Poor => "poor",
        }
    }

    /// Parse a storage token back into a rating.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "average" => Some(Self::Average),
            "poor" => Some(Self::Poor),
            _ => None,
        }
    }
}

/// Prediction-accuracy rating offered by the feedback form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyRating {
    VeryAccurate,
    Accurate,
    NotAccurate,
}

impl AccuracyRating {
    /// Canonical storage token for file and database backends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryAccurate => "very_accurate",
            Self::Accurate => "accurate",
            Self::NotAccurate => "not_accurate",
        }
    }

    /// Parse a storage token back into a rating.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "very_accurate" => Some(Self::VeryAccurate),
            "accurate" => Some(Self::Accurate),
            "not_accurate" => Some(Self::NotAccurate),
            _ => None,
        }
    }
}

/// One submitted feedback entry, identified only by insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Submitter name; must be non-empty.
    pub name: String,
    /// Ease-of-use rating.
    pub usability: UsabilityRating,
    /// Prediction-accuracy rating.
    pub accuracy: AccuracyRating,
    /// Free-text suggestion; may be empty.
    #[serde(default)]
    pub suggestion: String,
}

impl FeedbackRecord {
    /// Enforce required-field non-emptiness before any backend write.
    pub fn validate(&self) -> Result<(), FeedbackError> {
        if self.name.trim().is_empty() {
            return Err(FeedbackError::EmptyName);
        }
        Ok(())
    }
}

/// Errors raised by feedback validation and store backends.
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// The record's name field is empty.
    #[error("Feedback name must not be empty")]
    EmptyName,
    /// A file-backed store could not be read or written.
    #[error("Could not access feedback file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    /// A stored row carries a rating token this build does not recognize.
    #[error("Unrecognized rating '{0}' in feedback store")]
    InvalidRating(String),
    /// A stored CSV row does not have the expected columns.
    #[error("Malformed feedback row: {0}")]
    MalformedRow(String),
    /// The feedback database rejected an operation.
    #[error("Feedback database error: {0}")]
    Sql(#[from] rusqlite::Error),
    /// The sheet gateway endpoint is not an acceptable URL.
    #[error("Invalid sheet endpoint: {0}")]
    InvalidEndpoint(String),
    /// The sheet gateway could not be reached.
    #[error("Sheet gateway transport error: {0}")]
    Transport(String),
    /// The sheet gateway answered with a failure status.
    #[error("Sheet gateway rejected the request: HTTP {status}: {body}")]
    ServerStatus { status: u16, body: String },
    /// The sheet gateway answered with an unusable body.
    #[error("Invalid sheet gateway response: {0}")]
    Json(String),
}

/// Append-only feedback storage.
pub trait FeedbackStore {
    /// Append one validated record.
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), FeedbackError>;
    /// Return all records in insertion order.
    fn records(&self) -> Result<Vec<FeedbackRecord>, FeedbackError>;
}

#[cfg(test)]
pub(crate) fn sample_record(name: &str) -> FeedbackRecord {
    FeedbackRecord {
        name: name.to_string(),
        usability: UsabilityRating::Good,
        accuracy: AccuracyRating::Accurate,
        suggestion: "Add a BMI field".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_rejected() {
        let mut record = sample_record("Ada");
        record.name = "   ".to_string();
        assert!(matches!(record.validate(), Err(FeedbackError::EmptyName)));
        assert!(sample_record("Ada").validate().is_ok());
    }

    #[test]
    fn rating_tokens_round_trip() {
        for rating in [
            UsabilityRating::Excellent,
            UsabilityRating::Good,
            UsabilityRating::Average,
            UsabilityRating::Poor,
        ] {
            assert_eq!(UsabilityRating::parse(rating.as_str()), Some(rating));
        }
        for rating in [
            AccuracyRating::VeryAccurate,
            AccuracyRating::Accurate,
            AccuracyRating::NotAccurate,
        ] {
            assert_eq!(AccuracyRating::parse(rating.as_str()), Some(rating));
        }
        assert_eq!(UsabilityRating::parse("great"), None);
    }

    #[test]
    fn record_json_uses_snake_case_ratings() {
        let json = serde_json::to_string(&sample_record("Ada")).unwrap();
        assert!(json.contains("\"good\""));
        assert!(json.contains("\"accurate\""));
        let parsed: FeedbackRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_record("Ada"));
    }
}
