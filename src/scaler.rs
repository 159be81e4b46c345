//! Fitted z-score transform applied through a side vector.
//!
//! The persisted scaler was fit on its own fixed column layout, which does
//! not match the classifier's input layout. The transform is therefore never
//! applied to the classifier's native vector: a side vector over the
//! scaler's columns is built, transformed once, and only the configured
//! columns are spliced back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::{self, ArtifactError};
use crate::features::{FeatureVector, RawInput, RawValue};

/// Fitted scales at or below this are treated as constant columns.
const MIN_SCALE: f32 = 1e-10;

/// Errors raised while applying the fitted transform.
#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    /// The side vector length differs from the fitted column count.
    #[error("Scaler was fit on {expected} columns but received {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Versioned z-score scaler artifact fit on a fixed named column layout.
///
/// `apply_to` pins, per deployment, which transformed columns are spliced
/// back into the classifier vector; the code never guesses that set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZScoreScaler {
    /// Artifact format version.
    pub model_version: i64,
    /// Ordered column layout the transform was fit on.
    pub columns: Vec<String>,
    /// Per-column mean learned at fit time.
    pub mean: Vec<f32>,
    /// Per-column scale (standard deviation) learned at fit time.
    pub scale: Vec<f32>,
    /// Transformed columns spliced back into the classifier vector.
    pub apply_to: Vec<String>,
}

impl ZScoreScaler {
    /// Load a scaler artifact from a JSON file, optionally checksum-verified.
    pub fn load_json(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ArtifactError> {
        let scaler: Self = artifact::load_json(path, expected_sha256)?;
        scaler.validate().map_err(|reason| ArtifactError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(scaler)
    }

    /// Validate structural invariants of the artifact.
    pub fn validate(&self) -> Result<(), String> {
        if self.columns.is_empty() {
            return Err("scaler has no fitted columns".to_string());
        }
        if self.mean.len() != self.columns.len() {
            return Err(format!(
                "mean has {} entries but {} columns are fitted",
                self.mean.len(),
                self.columns.len()
            ));
        }
        if self.scale.len() != self.columns.len() {
            return Err(format!(
                "scale has {} entries but {} columns are fitted",
                self.scale.len(),
                self.columns.len()
            ));
        }
        if !self.scale.iter().all(|value| value.is_finite()) {
            return Err("scale contains non-finite values".to_string());
        }
        for column in &self.apply_to {
            if !self.columns.contains(column) {
                return Err(format!("apply_to column '{column}' is not a fitted column"));
            }
        }
        Ok(())
    }

    /// Standardize one row laid out in the scaler's own column order.
    pub fn transform(&self, side: &[f32]) -> Result<Vec<f32>, ScalerError> {
        if side.len() != self.columns.len() {
            return Err(ScalerError::ShapeMismatch {
                expected: self.columns.len(),
                actual: side.len(),
            });
        }
        Ok(side
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&value, (&mean, &scale))| {
                let centered = value - mean;
                if scale > MIN_SCALE { centered / scale } else { centered }
            })
            .collect())
    }

    /// Apply the transform through a side vector and splice results back.
    ///
    /// Each scaler column is sourced from the classifier vector when present,
    /// else from the raw input's numeric fields, else a neutral 0.0
    /// placeholder. Only `apply_to` columns are written back; every other
    /// vector entry is untouched. Must be applied exactly once per
    /// prediction: a second application re-centers already-standardized
    /// values and diverges.
    pub fn rescale(&self, vector: &mut FeatureVector, raw: &RawInput) -> Result<(), ScalerError> {
        let side: Vec<f32> = self
            .columns
            .iter()
            .map(|column| {
                vector
                    .get(column)
                    .or_else(|| raw.get(column).and_then(RawValue::as_feature))
                    .unwrap_or(0.0)
            })
            .collect();
        let transformed = self.transform(&side)?;
        for (column, value) in self.columns.iter().zip(&transformed) {
            if self.apply_to.iter().any(|name| name == column) {
                vector.set(column, *value);
            }
        }
        Ok(())
    }
}
