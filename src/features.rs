//! Raw form input to classifier feature vector assembly.
//!
//! The classifier consumes its input positionally, so the assembler owns
//! schema fidelity: the produced vector always has exactly the names and
//! order of the model's fitted layout, or assembly fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw value captured for a single form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Yes/no flag, coerced to 0/1.
    Bool(bool),
    /// Whole-number entry (counts, blood pressure readings).
    Int(i64),
    /// Fractional entry (scores, amounts).
    Float(f64),
    /// Categorical label resolved through a [`CategoryMap`].
    Label(String),
}

impl RawValue {
    /// Numeric reading of the value, if it has one.
    pub fn as_feature(&self) -> Option<f32> {
        self.as_f64().map(|value| value as f32)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            RawValue::Int(value) => Some(*value as f64),
            RawValue::Float(value) => Some(*value),
            RawValue::Label(_) => None,
        }
    }
}

/// One prediction request's worth of raw field values.
///
/// May carry extra fields the classifier layout does not use; those are
/// consumed by the scaler side vector or discarded.
pub type RawInput = BTreeMap<String, RawValue>;

/// Label-to-code table for one categorical field.
///
/// Mirrors the encoding used when the classifier was trained. The table is
/// closed: a label without an entry is a rejected input, never a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap(BTreeMap<String, i64>);

impl CategoryMap {
    /// Build a map from `(label, code)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(label, code)| (label.to_string(), code))
                .collect(),
        )
    }

    /// Look up the training-time code for a label.
    pub fn code(&self, label: &str) -> Option<i64> {
        self.0.get(label).copied()
    }

    /// Number of labels in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the table is non-empty with distinct codes.
    pub fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() {
            return Err("category map has no labels".to_string());
        }
        let mut codes: Vec<i64> = self.0.values().copied().collect();
        codes.sort_unstable();
        codes.dedup();
        if codes.len() != self.0.len() {
            return Err("category map assigns the same code to multiple labels".to_string());
        }
        Ok(())
    }
}

/// Category tables per categorical field, persisted with the model artifact.
pub type CategoryEncodings = BTreeMap<String, CategoryMap>;

/// Named, ordered numeric input consumed positionally by the classifier.
///
/// Names and values stay aligned by construction; the only mutation is an
/// in-place splice by name from the scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f32>,
}

impl FeatureVector {
    /// Feature names in classifier order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Feature values in classifier order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Look up a value by feature name.
    pub fn get(&self, name: &str) -> Option<f32> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.values[idx])
    }

    /// Overwrite a value by feature name, returning whether the name exists.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no features.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Errors raised while assembling a feature vector.
#[derive(Debug, Error, PartialEq)]
pub enum AssembleError {
    /// A categorical label has no code in its field's category map.
    #[error("Unknown category '{value}' for field '{field}'")]
    UnknownCategory { field: String, value: String },
    /// The raw input cannot supply a field the classifier layout requires.
    #[error("Feature layout requires missing field '{field}'")]
    SchemaMismatch { field: String },
}

/// Derived feature computed from another raw field.
const BMI_CATEGORY_FIELD: &str = "bmi_category";
const BMI_SOURCE_FIELD: &str = "bmi";

/// Discretize a body-mass-index value into ordinal buckets 0..=3.
///
/// Boundary ties use strict less-than, so a value exactly at 24.9 falls
/// into bucket 2. The boundaries must match what the classifier was trained
/// against and are not rounded to clinical thresholds.
pub fn bmi_bucket(bmi: f64) -> f32 {
    if bmi < 18.5 {
        0.0
    } else if bmi < 24.9 {
        1.0
    } else if bmi < 29.9 {
        2.0
    } else {
        3.0
    }
}

/// Deterministically convert raw input into the classifier's feature vector.
///
/// Bool fields coerce to 0/1, categorical labels resolve through their
/// category map, derived fields are computed from their source field, and
/// the result is projected into `layout` order. Extra raw fields are
/// discarded. Pure; no side effects.
pub fn assemble(
    raw: &RawInput,
    layout: &[String],
    encodings: &CategoryEncodings,
) -> Result<FeatureVector, AssembleError> {
    let mut values = Vec::with_capacity(layout.len());
    for name in layout {
        values.push(resolve_field(name, raw, encodings)?);
    }
    Ok(FeatureVector {
        names: layout.to_vec(),
        values,
    })
}

fn resolve_field(
    name: &str,
    raw: &RawInput,
    encodings: &CategoryEncodings,
) -> Result<f32, AssembleError> {
    match raw.get(name) {
        Some(RawValue::Label(label)) => {
            let code = encodings
                .get(name)
                .and_then(|map| map.code(label))
                .ok_or_else(|| AssembleError::UnknownCategory {
                    field: name.to_string(),
                    value: label.clone(),
                })?;
            Ok(code as f32)
        }
        Some(value) => Ok(value
            .as_feature()
            .unwrap_or_default()),
        None => derive_field(name, raw).ok_or_else(|| AssembleError::SchemaMismatch {
            field: name.to_string(),
        }),
    }
}

/// Compute a derived layout field that is absent from the raw input.
fn derive_field(name: &str, raw: &RawInput) -> Option<f32> {
    if name == BMI_CATEGORY_FIELD {
        let bmi = raw.get(BMI_SOURCE_FIELD)?.as_f64()?;
        return Some(bmi_bucket(bmi));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn smoker_encodings() -> CategoryEncodings {
        let mut encodings = CategoryEncodings::new();
        encodings.insert(
            "smoker".to_string(),
            CategoryMap::from_pairs([("No", 0), ("Yes", 1), ("Occasional", 2)]),
        );
        encodings
    }

    #[test]
    fn assemble_preserves_layout_names_and_order() {
        let mut raw = RawInput::new();
        raw.insert("age".to_string(), RawValue::Int(40));
        raw.insert("smoker".to_string(), RawValue::Label("Yes".to_string()));
        raw.insert("risk_score".to_string(), RawValue::Float(0.5));
        raw.insert("ignored_extra".to_string(), RawValue::Int(99));

        let layout = layout(&["smoker", "age", "risk_score"]);
        let vector = assemble(&raw, &layout, &smoker_encodings()).unwrap();
        assert_eq!(vector.names(), layout.as_slice());
        assert_eq!(vector.values(), &[1.0, 40.0, 0.5]);
    }

    #[test]
    fn bools_coerce_to_unit_flags() {
        let mut raw = RawInput::new();
        raw.insert("arthritis".to_string(), RawValue::Bool(true));
        raw.insert("hypertension".to_string(), RawValue::Bool(false));

        let layout = layout(&["arthritis", "hypertension"]);
        let vector = assemble(&raw, &layout, &CategoryEncodings::new()).unwrap();
        assert_eq!(vector.values(), &[1.0, 0.0]);
    }

    #[test]
    fn unknown_label_is_rejected_not_defaulted() {
        let mut raw = RawInput::new();
        raw.insert("smoker".to_string(), RawValue::Label("Unknown".to_string()));

        let layout = layout(&["smoker"]);
        let err = assemble(&raw, &layout, &smoker_encodings()).unwrap_err();
        assert_eq!(
            err,
            AssembleError::UnknownCategory {
                field: "smoker".to_string(),
                value: "Unknown".to_string(),
            }
        );
    }

    #[test]
    fn label_without_category_map_is_rejected() {
        let mut raw = RawInput::new();
        raw.insert("region".to_string(), RawValue::Label("north".to_string()));

        let layout = layout(&["region"]);
        let err = assemble(&raw, &layout, &CategoryEncodings::new()).unwrap_err();
        assert!(matches!(err, AssembleError::UnknownCategory { .. }));
    }

    #[test]
    fn missing_required_field_is_schema_mismatch() {
        let raw = RawInput::new();
        let layout = layout(&["age"]);
        let err = assemble(&raw, &layout, &CategoryEncodings::new()).unwrap_err();
        assert_eq!(
            err,
            AssembleError::SchemaMismatch {
                field: "age".to_string(),
            }
        );
    }

    #[test]
    fn bmi_category_derives_from_raw_bmi() {
        let mut raw = RawInput::new();
        raw.insert("bmi".to_string(), RawValue::Float(31.2));

        let layout = layout(&["bmi_category"]);
        let vector = assemble(&raw, &layout, &CategoryEncodings::new()).unwrap();
        assert_eq!(vector.values(), &[3.0]);
    }

    #[test]
    fn bmi_bucket_boundary_law() {
        assert_eq!(bmi_bucket(18.4), 0.0);
        assert_eq!(bmi_bucket(18.5), 1.0);
        assert_eq!(bmi_bucket(24.9), 2.0);
        assert_eq!(bmi_bucket(29.9), 3.0);
        assert_eq!(bmi_bucket(30.0), 3.0);
    }

    #[test]
    fn category_map_validate_rejects_duplicate_codes() {
        let map = CategoryMap::from_pairs([("No", 0), ("Yes", 0)]);
        assert!(map.validate().is_err());
        assert!(CategoryMap::default().validate().is_err());
        assert!(smoker_encodings()["smoker"].validate().is_ok());
    }

    #[test]
    fn feature_vector_splice_by_name() {
        let mut raw = RawInput::new();
        raw.insert("age".to_string(), RawValue::Int(40));
        let layout = layout(&["age"]);
        let mut vector = assemble(&raw, &layout, &CategoryEncodings::new()).unwrap();

        assert!(vector.set("age", -1.25));
        assert!(!vector.set("absent", 0.0));
        assert_eq!(vector.get("age"), Some(-1.25));
        assert_eq!(vector.get("absent"), None);
    }

    #[test]
    fn raw_value_json_shapes() {
        let raw: RawInput = serde_json::from_str(
            r#"{"age": 40, "smoker": "No", "arthritis": true, "risk_score": 0.5}"#,
        )
        .unwrap();
        assert_eq!(raw["age"], RawValue::Int(40));
        assert_eq!(raw["smoker"], RawValue::Label("No".to_string()));
        assert_eq!(raw["arthritis"], RawValue::Bool(true));
        assert_eq!(raw["risk_score"], RawValue::Float(0.5));
    }
}
