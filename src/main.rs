#![deny(missing_docs)]
#![deny(warnings)]

//! Console entry point for the medrisk risk predictor.
//!
//! `medrisk predict <input.json>` loads the configured artifacts and prints
//! a verdict for one raw input. `medrisk feedback <feedback.json>` appends a
//! feedback record to the configured backend; backend failures are warnings,
//! not errors, so feedback keeps working when the durable store is down.

use std::path::Path;
use std::process::ExitCode;

use medrisk::config::{self, AppConfig, FeedbackBackendChoice, FeedbackSettings};
use medrisk::feedback::{
    CsvStore, FeedbackError, FeedbackRecord, FeedbackStore, MemoryStore, SheetStore, SqliteStore,
};
use medrisk::features::RawInput;
use medrisk::logging;
use medrisk::model::RiskModel;
use medrisk::predict::Predictor;
use medrisk::scaler::ZScoreScaler;

fn main() -> ExitCode {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [command, path] if command == "predict" => run_predict(Path::new(path)),
        [command, path] if command == "feedback" => run_feedback(Path::new(path)),
        _ => {
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!("Usage: medrisk predict <input.json>");
    eprintln!("       medrisk feedback <feedback.json>");
}

fn load_config() -> AppConfig {
    match config::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(%err, "Falling back to default configuration");
            AppConfig::default()
        }
    }
}

/// Load artifacts and serve a single prediction request.
///
/// Artifact load failure is fatal to the prediction capability; the
/// feedback command keeps working regardless.
fn run_predict(input_path: &Path) -> ExitCode {
    let settings = load_config();
    let predictor = match build_predictor(&settings) {
        Ok(predictor) => predictor,
        Err(message) => {
            tracing::error!(%message, "Prediction capability unavailable");
            eprintln!("Prediction unavailable: {message}");
            return ExitCode::FAILURE;
        }
    };

    let raw = match read_json::<RawInput>(input_path) {
        Ok(raw) => raw,
        Err(message) => {
            eprintln!("Could not read input: {message}");
            return ExitCode::FAILURE;
        }
    };

    match predictor.assess(&raw) {
        Ok(assessment) => {
            println!(
                "{} patient (confidence {:.1}%)",
                assessment.verdict,
                f64::from(assessment.confidence) * 100.0
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "Prediction rejected");
            eprintln!("Prediction failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn build_predictor(settings: &AppConfig) -> Result<Predictor, String> {
    let model_path = settings
        .artifacts
        .model_path()
        .map_err(|err| err.to_string())?;
    let model = RiskModel::load_json(&model_path, settings.artifacts.model_sha256.as_deref())
        .map_err(|err| err.to_string())?;

    let scaler_path = settings
        .artifacts
        .scaler_path()
        .map_err(|err| err.to_string())?;
    let scaler = if scaler_path.exists() {
        Some(
            ZScoreScaler::load_json(&scaler_path, settings.artifacts.scaler_sha256.as_deref())
                .map_err(|err| err.to_string())?,
        )
    } else {
        tracing::info!(path = %scaler_path.display(), "No scaler artifact; serving unscaled features");
        None
    };

    Predictor::new(model, scaler).map_err(|err| err.to_string())
}

/// Validate and append one feedback record.
fn run_feedback(record_path: &Path) -> ExitCode {
    let settings = load_config();
    let record = match read_json::<FeedbackRecord>(record_path) {
        Ok(record) => record,
        Err(message) => {
            eprintln!("Could not read feedback: {message}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = record.validate() {
        eprintln!("Feedback rejected: {err}");
        return ExitCode::FAILURE;
    }

    let mut store = open_feedback_store(&settings.feedback);
    match store.append(&record) {
        Ok(()) => {
            println!("Thank you for your feedback!");
            if let Ok(rows) = store.records() {
                println!("Collected feedback rows: {}", rows.len());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Losing the durable copy must not fail the submission.
            tracing::warn!(%err, "Feedback not persisted to the configured backend");
            eprintln!("Warning: feedback could not be persisted: {err}");
            println!("Thank you for your feedback!");
            ExitCode::SUCCESS
        }
    }
}

/// Open the configured backend, degrading to the session table on failure.
fn open_feedback_store(settings: &FeedbackSettings) -> Box<dyn FeedbackStore> {
    match try_open_feedback_store(settings) {
        Ok(store) => store,
        Err(message) => {
            tracing::warn!(%message, "Feedback backend unavailable; using session memory");
            eprintln!("Warning: feedback backend unavailable: {message}");
            Box::new(MemoryStore::new())
        }
    }
}

fn try_open_feedback_store(
    settings: &FeedbackSettings,
) -> Result<Box<dyn FeedbackStore>, String> {
    match settings.backend {
        FeedbackBackendChoice::Memory => Ok(Box::new(MemoryStore::new())),
        FeedbackBackendChoice::Csv => {
            let path = settings.csv_path().map_err(|err| err.to_string())?;
            Ok(Box::new(CsvStore::new(path)))
        }
        FeedbackBackendChoice::Sqlite => {
            let path = settings.sqlite_path().map_err(|err| err.to_string())?;
            let store = SqliteStore::open(path).map_err(|err| err.to_string())?;
            Ok(Box::new(store))
        }
        FeedbackBackendChoice::Sheet => {
            let url = settings
                .sheet_url
                .as_deref()
                .ok_or_else(|| FeedbackError::InvalidEndpoint("no sheet_url configured".into()).to_string())?;
            let store =
                SheetStore::new(url, settings.sheet_token.clone()).map_err(|err| err.to_string())?;
            Ok(Box::new(store))
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|err| format!("{}: {err}", path.display()))?;
    serde_json::from_str(&data).map_err(|err| format!("{}: {err}", path.display()))
}
