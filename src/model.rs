//! Versioned logistic risk classifier artifact.
//!
//! The model is an opaque collaborator from the pipeline's point of view: it
//! consumes the feature vector positionally and performs no name-based
//! validation. Schema fidelity is owned by [`crate::features::assemble`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::{self, ArtifactError};
use crate::features::{CategoryEncodings, CategoryMap, FeatureVector};

/// Default filename for the model artifact under the models directory.
pub const MODEL_FILE_NAME: &str = "risk_model.json";

/// Default bundled model id.
pub const DEFAULT_MODEL_ID: &str = "insurance_risk_logreg_v1";

/// Input layout the bundled artifact is fitted on, in training order.
pub const DEFAULT_FEATURE_LAYOUT: &[&str] = &[
    "arthritis",
    "mental_health",
    "diastolic_bp",
    "hypertension",
    "total_claims_paid",
    "smoker",
    "systolic_bp",
    "chronic_count",
    "age",
    "risk_score",
];

/// Smoker labels accepted by the bundled encoding.
pub const SMOKER_LABELS: &[(&str, i64)] = &[("No", 0), ("Yes", 1), ("Occasional", 2)];

/// Versioned binary risk classifier over a named, ordered feature layout.
///
/// Category encodings are persisted inside the artifact so the label-to-code
/// tables cannot drift from the weights they were trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    /// Stable identifier of the trained artifact.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Artifact format version.
    pub model_version: i64,
    /// Ordered feature layout the classifier was fitted on.
    pub feature_names: Vec<String>,
    /// One weight per feature, in layout order.
    pub weights: Vec<f32>,
    /// Intercept term.
    pub bias: f32,
    /// Softening factor applied to the logit; must be positive.
    pub temperature: f32,
    /// Label-to-code tables for categorical fields.
    #[serde(default)]
    pub encodings: CategoryEncodings,
}

impl RiskModel {
    /// Construct the bundled default classifier with zero-initialized weights.
    pub fn bundled() -> Self {
        let feature_names: Vec<String> = DEFAULT_FEATURE_LAYOUT
            .iter()
            .map(|name| (*name).to_string())
            .collect();
        let weights = vec![0.0; feature_names.len()];
        let mut encodings = CategoryEncodings::new();
        encodings.insert(
            "smoker".to_string(),
            CategoryMap::from_pairs(SMOKER_LABELS.iter().copied()),
        );
        Self {
            model_id: Some(DEFAULT_MODEL_ID.to_string()),
            model_version: 1,
            feature_names,
            weights,
            bias: 0.0,
            temperature: 1.0,
            encodings,
        }
    }

    /// Load a model artifact from a JSON file, optionally checksum-verified.
    pub fn load_json(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ArtifactError> {
        let model: Self = artifact::load_json(path, expected_sha256)?;
        model.validate().map_err(|reason| ArtifactError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(model)
    }

    /// Validate structural invariants of the artifact.
    pub fn validate(&self) -> Result<(), String> {
        if self.feature_names.is_empty() {
            return Err("model has no input features".to_string());
        }
        if self.weights.len() != self.feature_names.len() {
            return Err(format!(
                "weights has {} entries but {} features are fitted",
                self.weights.len(),
                self.feature_names.len()
            ));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err("temperature must be > 0".to_string());
        }
        for (field, map) in &self.encodings {
            if !self.feature_names.iter().any(|name| name == field) {
                return Err(format!(
                    "encoding for '{field}' does not match any input feature"
                ));
            }
            map.validate()
                .map_err(|reason| format!("encoding for '{field}': {reason}"))?;
        }
        Ok(())
    }

    /// Raw logit for a feature row consumed positionally.
    pub fn predict_raw(&self, features: &[f32]) -> f32 {
        let mut sum = self.bias;
        for (idx, weight) in self.weights.iter().enumerate() {
            sum += weight * features.get(idx).copied().unwrap_or(0.0);
        }
        sum / self.temperature.max(1e-6)
    }

    /// Probability of the high-risk class, in `[0, 1]`.
    pub fn predict_proba(&self, vector: &FeatureVector) -> f32 {
        sigmoid(self.predict_raw(vector.values()))
    }

    /// Binary class: 1 for high risk, 0 for low risk.
    pub fn predict(&self, vector: &FeatureVector) -> u8 {
        if self.predict_proba(vector) >= 0.5 { 1 } else { 0 }
    }
}

/// Numerically-stable logistic function.
fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{RawInput, assemble};
    use std::io::Write;

    #[test]
    fn bundled_model_validates() {
        let model = RiskModel::bundled();
        model.validate().unwrap();
        assert_eq!(model.feature_names.len(), 10);
        assert_eq!(model.encodings["smoker"].code("Occasional"), Some(2));
    }

    #[test]
    fn zero_weights_predict_even_odds() {
        let model = RiskModel::bundled();
        let raw: RawInput = serde_json::from_str(
            r#"{"arthritis": true, "mental_health": false, "diastolic_bp": 80,
                "hypertension": false, "total_claims_paid": 0, "smoker": "No",
                "systolic_bp": 120, "chronic_count": 1, "age": 40,
                "risk_score": 0.5}"#,
        )
        .unwrap();
        let vector = assemble(&raw, &model.feature_names, &model.encodings).unwrap();
        let proba = model.predict_proba(&vector);
        assert!((proba - 0.5).abs() < 1e-6);
        assert_eq!(model.predict(&vector), 1);
    }

    #[test]
    fn weights_move_probability_monotonically() {
        let mut model = RiskModel::bundled();
        let layout = vec!["age".to_string()];
        model.feature_names = layout.clone();
        model.weights = vec![0.1];
        model.encodings.clear();
        let raw_young: RawInput = serde_json::from_str(r#"{"age": 20}"#).unwrap();
        let raw_old: RawInput = serde_json::from_str(r#"{"age": 80}"#).unwrap();

        let young = assemble(&raw_young, &layout, &model.encodings).unwrap();
        let old = assemble(&raw_old, &layout, &model.encodings).unwrap();
        assert!(model.predict_proba(&old) > model.predict_proba(&young));
    }

    #[test]
    fn validate_rejects_weight_length_mismatch() {
        let mut model = RiskModel::bundled();
        model.weights.pop();
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_temperature() {
        let mut model = RiskModel::bundled();
        model.temperature = 0.0;
        assert!(model.validate().is_err());
        model.temperature = f32::NAN;
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_encoding_for_unknown_feature() {
        let mut model = RiskModel::bundled();
        model.encodings.insert(
            "plan_type".to_string(),
            CategoryMap::from_pairs([("Basic", 0), ("Premium", 1)]),
        );
        assert!(model.validate().is_err());
    }

    #[test]
    fn load_json_round_trips_artifact() {
        let model = RiskModel::bundled();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&model).unwrap().as_bytes())
            .unwrap();
        let loaded = RiskModel::load_json(file.path(), None).unwrap();
        assert_eq!(loaded.feature_names, model.feature_names);
        assert_eq!(loaded.model_id.as_deref(), Some(DEFAULT_MODEL_ID));
    }

    #[test]
    fn load_json_rejects_invalid_artifact() {
        let mut model = RiskModel::bundled();
        model.temperature = -1.0;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&model).unwrap().as_bytes())
            .unwrap();
        let err = RiskModel::load_json(file.path(), None).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert!(sigmoid(50.0) > 0.999);
        assert!(sigmoid(-50.0) < 0.001);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }
}
