//! Prediction engine combining loaded artifacts into per-request assessments.
//!
//! Artifacts are loaded once at startup, cross-validated at construction,
//! and injected here as immutable state. The engine itself holds no caches
//! and mutates nothing between requests.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::features::{AssembleError, RawInput, assemble};
use crate::model::RiskModel;
use crate::scaler::{ScalerError, ZScoreScaler};

/// Binary verdict reported for a prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    /// The classifier assigned the high-risk class.
    HighRisk,
    /// The classifier assigned the low-risk class.
    LowRisk,
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskVerdict::HighRisk => write!(f, "HIGH RISK"),
            RiskVerdict::LowRisk => write!(f, "LOW RISK"),
        }
    }
}

/// Outcome of a single prediction request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    /// Reported verdict.
    pub verdict: RiskVerdict,
    /// Probability of the high-risk class in `[0, 1]`.
    pub probability_high: f32,
    /// Confidence in the reported verdict in `[0, 1]`.
    pub confidence: f32,
}

/// Errors raised while serving one prediction request.
#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    /// The raw input could not be assembled into the classifier layout.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    /// The scaler side vector did not match the fitted transform.
    #[error(transparent)]
    Scale(#[from] ScalerError),
}

/// Errors raised while wiring artifacts together at startup.
#[derive(Debug, Error)]
pub enum PredictorSetupError {
    /// The model artifact failed validation.
    #[error("Invalid model artifact: {0}")]
    InvalidModel(String),
    /// The scaler artifact failed validation.
    #[error("Invalid scaler artifact: {0}")]
    InvalidScaler(String),
    /// The scaler wants to splice a column the model layout does not have.
    #[error("Scaler splice column '{0}' is not in the model feature layout")]
    SpliceColumnMissing(String),
}

/// Immutable prediction engine over validated artifacts.
#[derive(Debug)]
pub struct Predictor {
    model: RiskModel,
    scaler: Option<ZScoreScaler>,
}

impl Predictor {
    /// Wire validated artifacts together, cross-checking their layouts.
    pub fn new(
        model: RiskModel,
        scaler: Option<ZScoreScaler>,
    ) -> Result<Self, PredictorSetupError> {
        model.validate().map_err(PredictorSetupError::InvalidModel)?;
        if let Some(scaler) = &scaler {
            scaler
                .validate()
                .map_err(PredictorSetupError::InvalidScaler)?;
            for column in &scaler.apply_to {
                if !model.feature_names.iter().any(|name| name == column) {
                    return Err(PredictorSetupError::SpliceColumnMissing(column.clone()));
                }
            }
        }
        Ok(Self { model, scaler })
    }

    /// The model artifact this engine serves.
    pub fn model(&self) -> &RiskModel {
        &self.model
    }

    /// Run one request: assemble, rescale once, classify.
    pub fn assess(&self, raw: &RawInput) -> Result<RiskAssessment, PredictError> {
        let mut vector = assemble(raw, &self.model.feature_names, &self.model.encodings)?;
        if let Some(scaler) = &self.scaler {
            scaler.rescale(&mut vector, raw)?;
        }
        let probability_high = self.model.predict_proba(&vector);
        let verdict = if probability_high >= 0.5 {
            RiskVerdict::HighRisk
        } else {
            RiskVerdict::LowRisk
        };
        let confidence = match verdict {
            RiskVerdict::HighRisk => probability_high,
            RiskVerdict::LowRisk => 1.0 - probability_high,
        };
        debug!(%verdict, probability_high, "Served prediction");
        Ok(RiskAssessment {
            verdict,
            probability_high,
            confidence,
        })
    }
}
