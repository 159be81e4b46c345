//! Loading and integrity verification for persisted JSON artifacts.
//!
//! Model and scaler artifacts are serde-JSON files produced by the training
//! side. Loading reads the file once, optionally verifies a SHA-256 digest
//! pinned in the config, and parses into the typed artifact struct. The
//! caller runs the artifact's own `validate()` afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while loading a persisted artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact file could not be read.
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The artifact file is not valid JSON for the expected type.
    #[error("Failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The artifact parsed but failed its structural validation.
    #[error("Artifact {path} failed validation: {reason}")]
    Invalid { path: PathBuf, reason: String },
    /// The artifact bytes do not match the pinned digest.
    #[error("Artifact {path} SHA-256 mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    /// A configured digest is not a 64-character hex string.
    #[error("Invalid SHA-256 value; expected 64 hex characters, got '{0}'")]
    InvalidChecksum(String),
}

/// Load a JSON artifact, optionally verifying its SHA-256 digest first.
pub fn load_json<T: DeserializeOwned>(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(expected) = expected_sha256 {
        let expected = normalize_sha256(expected)?;
        let actual = sha256_hex(&bytes);
        if actual != expected {
            return Err(ArtifactError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate and lowercase a SHA-256 hex digest.
pub fn normalize_sha256(value: &str) -> Result<String, ArtifactError> {
    let trimmed = value.trim();
    if trimmed.len() != 64 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ArtifactError::InvalidChecksum(trimmed.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
