//! Supervised phishing classifier
//!
//! `ClassifierHandle` owns the lifecycle of the fitted model. The first
//! prediction loads the persisted artifact; when there is none it trains from
//! the corpus and persists the result; when that also fails the handle runs in
//! degraded mode and every prediction is the neutral 0.5. Reloading holds the
//! write lock, so concurrent predictions see either the old model or the new
//! one, never a mix.

pub mod artifact;
pub mod corpus;
pub mod logistic;
pub mod tfidf;

pub use artifact::{ClassifierArtifact, TrainingReport};
pub use corpus::{load_corpus, CorpusRow};

use crate::config::ClassifierConfig;
use crate::email::{HeaderParser, ParsedEmail, RawEmail};
use crate::error::{ArtifactError, PipelineError, TrainingError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Probability reported while no model is available
pub const FALLBACK_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub is_phishing: bool,
    pub probability: f64,
    /// True when the value came from degraded mode rather than a model
    pub fallback: bool,
}

impl Prediction {
    pub fn fallback() -> Self {
        Self {
            is_phishing: false,
            probability: FALLBACK_PROBABILITY,
            fallback: true,
        }
    }
}

/// Inputs the classifier can score. The text is subject, body and sender
/// joined by single spaces, the same layout the model was trained on.
pub trait ClassifierText {
    fn classifier_text(&self) -> String;
}

impl ClassifierText for ParsedEmail {
    fn classifier_text(&self) -> String {
        format!("{} {} {}", self.subject, self.body, self.sender.raw)
    }
}

impl ClassifierText for CorpusRow {
    fn classifier_text(&self) -> String {
        format!("{} {} {}", self.subject, self.body, self.from_email)
    }
}

impl ClassifierText for RawEmail {
    fn classifier_text(&self) -> String {
        HeaderParser::default().parse_email(self).classifier_text()
    }
}

impl ClassifierText for str {
    fn classifier_text(&self) -> String {
        self.to_string()
    }
}

/// Corpus-row shaped JSON without the label
#[derive(Deserialize)]
struct RowText {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    from_email: String,
}

impl ClassifierText for RowText {
    fn classifier_text(&self) -> String {
        format!("{} {} {}", self.subject, self.body, self.from_email)
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// Persisted artifact was read and validated
    Loaded,
    /// No usable artifact; trained from the corpus instead
    Trained(TrainingReport),
    /// Neither worked; predictions use the fallback value
    Fallback {
        artifact: ArtifactError,
        training: TrainingError,
    },
}

#[derive(Debug, Clone)]
enum ModelState {
    Unloaded,
    Ready(Arc<ClassifierArtifact>),
    Degraded(String),
}

pub struct ClassifierHandle {
    config: ClassifierConfig,
    state: RwLock<ModelState>,
}

impl ClassifierHandle {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ModelState::Unloaded),
        }
    }

    pub fn with_artifact(config: ClassifierConfig, artifact: ClassifierArtifact) -> Self {
        Self {
            config,
            state: RwLock::new(ModelState::Ready(Arc::new(artifact))),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Load the persisted artifact, training from the corpus when it is
    /// missing or unreadable. Replaces whatever model was active.
    pub fn reload(&self) -> LoadOutcome {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (next, outcome) = self.resolve_model();
        *state = next;
        outcome
    }

    /// Returns `None` when a model (or the degraded state) is already in place
    pub fn ensure_loaded(&self) -> Option<LoadOutcome> {
        if let Ok(state) = self.state.read() {
            if !matches!(*state, ModelState::Unloaded) {
                return None;
            }
        }

        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another caller may have loaded while we waited for the write lock
        if !matches!(*state, ModelState::Unloaded) {
            return None;
        }
        let (next, outcome) = self.resolve_model();
        *state = next;
        Some(outcome)
    }

    fn resolve_model(&self) -> (ModelState, LoadOutcome) {
        let model_path = Path::new(&self.config.model_path);
        let artifact_error = match ClassifierArtifact::load(model_path) {
            Ok(artifact) => {
                log::info!("Loaded classifier from {}", model_path.display());
                return (ModelState::Ready(Arc::new(artifact)), LoadOutcome::Loaded);
            }
            Err(e) => e,
        };

        log::info!("{}; training a new classifier", artifact_error);
        let trained = load_corpus(&self.config.corpus_path)
            .and_then(|rows| ClassifierArtifact::train(&rows, &self.config));

        match trained {
            Ok(artifact) => {
                if let Err(e) = artifact.save(model_path) {
                    log::warn!("Trained classifier could not be persisted: {}", e);
                }
                let report = artifact.report.clone();
                (ModelState::Ready(Arc::new(artifact)), LoadOutcome::Trained(report))
            }
            Err(training_error) => {
                let reason = format!("{}; {}", artifact_error, training_error);
                log::warn!("ML model not loaded: {}. Using fallback score {}", reason, FALLBACK_PROBABILITY);
                (
                    ModelState::Degraded(reason),
                    LoadOutcome::Fallback {
                        artifact: artifact_error,
                        training: training_error,
                    },
                )
            }
        }
    }

    /// Train from the configured corpus, persist, and activate the result
    pub fn train_from_corpus(&self) -> Result<TrainingReport, TrainingError> {
        let rows = load_corpus(&self.config.corpus_path)?;
        self.train(&rows)
    }

    pub fn train(&self, rows: &[CorpusRow]) -> Result<TrainingReport, TrainingError> {
        let artifact = ClassifierArtifact::train(rows, &self.config)?;
        artifact
            .save(&self.config.model_path)
            .map_err(TrainingError::ArtifactWrite)?;
        let report = artifact.report.clone();
        self.replace(artifact);
        Ok(report)
    }

    pub fn replace(&self, artifact: ClassifierArtifact) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = ModelState::Ready(Arc::new(artifact));
    }

    pub fn artifact(&self) -> Option<Arc<ClassifierArtifact>> {
        self.ensure_loaded();
        match self.state.read() {
            Ok(state) => match &*state {
                ModelState::Ready(artifact) => Some(Arc::clone(artifact)),
                _ => None,
            },
            Err(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.ensure_loaded();
        match self.state.read() {
            Ok(state) => matches!(*state, ModelState::Degraded(_)),
            Err(_) => true,
        }
    }

    /// Why the handle fell back to the fixed probability, if it did
    pub fn degraded_reason(&self) -> Option<String> {
        self.ensure_loaded();
        match self.state.read() {
            Ok(state) => match &*state {
                ModelState::Degraded(reason) => Some(reason.clone()),
                _ => None,
            },
            Err(_) => Some("classifier state lock poisoned".to_string()),
        }
    }

    pub fn predict<T: ClassifierText + ?Sized>(&self, input: &T) -> Prediction {
        match self.artifact() {
            Some(artifact) => artifact.predict_text(&input.classifier_text()),
            None => {
                log::warn!(
                    "Classifier unavailable, using fallback probability {}",
                    FALLBACK_PROBABILITY
                );
                Prediction::fallback()
            }
        }
    }

    /// Score a JSON document shaped either as a saved email
    /// (`from`/`headers`/`body`) or as a corpus row (`subject`/`body`/`from_email`)
    pub fn predict_json(&self, value: &Value) -> Result<Prediction, PipelineError> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(PipelineError::UnsupportedInput(format!(
                    "expected a JSON object, got {}",
                    json_kind(other)
                )))
            }
        };

        if map.contains_key("headers") || map.contains_key("from") {
            let email: RawEmail = serde_json::from_value(value.clone())
                .map_err(|e| PipelineError::UnsupportedInput(e.to_string()))?;
            Ok(self.predict(&email))
        } else if map.contains_key("from_email") || map.contains_key("subject") || map.contains_key("body") {
            let row: RowText = serde_json::from_value(value.clone())
                .map_err(|e| PipelineError::UnsupportedInput(e.to_string()))?;
            Ok(self.predict(&row))
        } else {
            Err(PipelineError::UnsupportedInput(
                "object has neither email nor corpus-row fields".to_string(),
            ))
        }
    }

    /// Score a saved-email JSON file
    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<Prediction, PipelineError> {
        let email = RawEmail::from_file(path)?;
        Ok(self.predict(&email))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_corpus() -> Vec<CorpusRow> {
        let phishing = [
            ("Urgent account suspended", "Verify your password immediately or your account will be suspended"),
            ("Verify your account", "Your account password expired, verify immediately"),
            ("Security alert", "Unusual login detected, verify account password urgent"),
            ("Action required", "Account suspended, confirm password immediately"),
            ("Lottery winner", "Claim your lottery prize, verify account details urgent"),
            ("Password reset", "Reset password immediately, account suspended"),
            ("Final notice", "Urgent verify account or suspended permanently"),
            ("Billing problem", "Update payment, verify account password immediately"),
            ("Account locked", "Account locked, verify password urgent"),
            ("Confirm identity", "Confirm identity, account suspended, verify immediately"),
            ("Urgent verification", "Verify password account suspended immediately"),
            ("Prize notification", "Lottery prize waiting, verify account urgent"),
            ("Suspicious activity", "Suspended account, verify password immediately"),
            ("Update required", "Urgent update, verify account password"),
            ("Mailbox full", "Verify password immediately, mailbox account suspended"),
            ("Tax refund", "Refund pending, verify account immediately urgent"),
            ("Delivery failed", "Verify account password, package suspended urgent"),
            ("Wallet frozen", "Wallet account suspended, verify password immediately"),
            ("Urgent payroll", "Verify payroll account password immediately"),
            ("Access expiring", "Access suspended, verify account password urgent"),
        ];
        let legitimate = [
            ("Team meeting agenda", "Agenda for the planning meeting on Thursday"),
            ("Lunch plans", "Lunch with the team after the quarterly meeting"),
            ("Quarterly report", "Quarterly report draft for planning review"),
            ("Project update", "Project planning notes and meeting agenda"),
            ("Weekend plans", "Family lunch on Saturday at the park"),
            ("Meeting notes", "Notes from the quarterly planning meeting"),
            ("Conference schedule", "Conference agenda and lunch schedule"),
            ("Birthday party", "Cake and lunch for the team birthday"),
            ("Design review", "Design review meeting agenda attached"),
            ("Budget planning", "Quarterly budget planning meeting notes"),
            ("Recipe", "Recipe for the lunch potluck next week"),
            ("Office move", "Office move planning and meeting schedule"),
            ("Book club", "Book club meeting agenda for Friday"),
            ("Holiday schedule", "Holiday schedule and team lunch"),
            ("Sprint retro", "Retro meeting agenda and planning notes"),
            ("Hiking trip", "Trip planning for the weekend hike and lunch"),
            ("Newsletter", "Monthly newsletter with quarterly highlights"),
            ("Training session", "Training agenda and lunch provided"),
            ("Board meeting", "Board meeting agenda for quarterly review"),
            ("Welcome aboard", "Welcome lunch and onboarding meeting agenda"),
        ];

        phishing
            .iter()
            .map(|(s, b)| CorpusRow::new(s, b, "security@account-alerts.net", true))
            .chain(
                legitimate
                    .iter()
                    .map(|(s, b)| CorpusRow::new(s, b, "colleague@example.com", false)),
            )
            .collect()
    }

    fn handle_in(dir: &Path, corpus: Option<&[CorpusRow]>) -> ClassifierHandle {
        let corpus_path = dir.join("corpus.csv");
        if let Some(rows) = corpus {
            let mut writer = csv::Writer::from_path(&corpus_path).unwrap();
            for row in rows {
                writer.serialize(row).unwrap();
            }
            writer.flush().unwrap();
        }
        ClassifierHandle::new(ClassifierConfig {
            model_path: dir.join("model.json").to_string_lossy().into_owned(),
            corpus_path: corpus_path.to_string_lossy().into_owned(),
            ..ClassifierConfig::default()
        })
    }

    #[test]
    fn test_fallback_without_model_or_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle_in(dir.path(), None);

        let prediction = handle.predict("Urgent: verify your password");
        assert_eq!(prediction, Prediction::fallback());
        assert_eq!(prediction.probability, 0.5);
        assert!(!prediction.is_phishing);
        assert!(handle.is_degraded());

        let reason = handle.degraded_reason().unwrap();
        assert!(reason.contains("No classifier artifact at"), "{}", reason);
        assert!(reason.contains("Training corpus unavailable at"), "{}", reason);
    }

    #[test]
    fn test_trains_and_persists_when_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = sample_corpus();
        let handle = handle_in(dir.path(), Some(&corpus));

        match handle.ensure_loaded() {
            Some(LoadOutcome::Trained(report)) => assert_eq!(report.test_size, 8),
            other => panic!("expected training, got {:?}", other),
        }
        assert!(dir.path().join("model.json").exists());
        assert!(!handle.is_degraded());

        // A fresh handle now loads the persisted artifact
        let second = handle_in(dir.path(), None);
        assert!(matches!(second.ensure_loaded(), Some(LoadOutcome::Loaded)));
        assert_eq!(
            second.predict("verify account password").probability,
            handle.predict("verify account password").probability
        );
    }

    #[test]
    fn test_ensure_loaded_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle_in(dir.path(), None);
        assert!(handle.ensure_loaded().is_some());
        assert!(handle.ensure_loaded().is_none());
    }

    #[test]
    fn test_reload_recovers_from_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle_in(dir.path(), None);
        assert!(handle.is_degraded());

        let corpus = sample_corpus();
        let mut writer = csv::Writer::from_path(dir.path().join("corpus.csv")).unwrap();
        for row in &corpus {
            writer.serialize(row).unwrap();
        }
        writer.flush().unwrap();

        assert!(matches!(handle.reload(), LoadOutcome::Trained(_)));
        assert!(!handle.is_degraded());
        assert_eq!(handle.degraded_reason(), None);
        assert!(!handle.predict("verify account password").fallback);
    }

    #[test]
    fn test_predict_email_and_row_shapes() {
        let artifact =
            ClassifierArtifact::train(&sample_corpus(), &ClassifierConfig::default()).unwrap();
        let handle = ClassifierHandle::with_artifact(ClassifierConfig::default(), artifact);

        let email = json!({
            "from": "Security <security@account-alerts.net>",
            "headers": {"Subject": "Account suspended", "Date": "Mon, 13 Jan 2025 03:10:00 +0000"},
            "body": "Verify your password immediately"
        });
        let row = json!({
            "subject": "Account suspended",
            "body": "Verify your password immediately",
            "from_email": "security@account-alerts.net"
        });

        let from_email = handle.predict_json(&email).unwrap();
        let from_row = handle.predict_json(&row).unwrap();
        assert!(from_email.is_phishing);
        assert!(from_row.is_phishing);
        assert!(!from_row.fallback);
    }

    #[test]
    fn test_predict_json_rejects_other_shapes() {
        let handle = ClassifierHandle::new(ClassifierConfig::default());
        assert!(matches!(
            handle.predict_json(&json!([1, 2])),
            Err(PipelineError::UnsupportedInput(_))
        ));
        assert!(matches!(
            handle.predict_json(&json!({"unrelated": true})),
            Err(PipelineError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_predict_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("email.json");
        std::fs::write(
            &path,
            r#"{"from": "Alice <alice@example.com>", "headers": {"Subject": "Lunch"}, "body": "Team lunch agenda"}"#,
        )
        .unwrap();

        let artifact =
            ClassifierArtifact::train(&sample_corpus(), &ClassifierConfig::default()).unwrap();
        let handle = ClassifierHandle::with_artifact(ClassifierConfig::default(), artifact);
        let prediction = handle.predict_file(&path).unwrap();
        assert!(!prediction.is_phishing);
    }
}
