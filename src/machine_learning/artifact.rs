//! Persisted classifier: fitted vectorizer, fitted model and the metrics it
//! was accepted with. Stored as a single JSON document.

use super::corpus::{train_test_split, CorpusRow};
use super::logistic::{LogisticRegression, TrainingParams};
use super::tfidf::{SparseVector, TfidfVectorizer};
use super::{ClassifierText, Prediction};
use crate::config::ClassifierConfig;
use crate::error::{ArtifactError, TrainingError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ARTIFACT_VERSION: u32 = 1;

/// Probability above which the classifier calls an email phishing
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub train_size: usize,
    pub test_size: usize,
}

impl TrainingReport {
    /// Metrics for the positive (phishing) class
    pub fn from_predictions(predicted: &[bool], actual: &[bool], train_size: usize) -> Self {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        let mut correct = 0usize;
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p, a) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
            if p == a {
                correct += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            accuracy: ratio(correct, actual.len()),
            precision,
            recall,
            f1,
            train_size,
            test_size: actual.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    pub vectorizer: TfidfVectorizer,
    pub model: LogisticRegression,
    pub report: TrainingReport,
}

impl ClassifierArtifact {
    pub fn train(rows: &[CorpusRow], config: &ClassifierConfig) -> Result<Self, TrainingError> {
        if rows.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }
        if !has_both_classes(rows.iter()) {
            return Err(TrainingError::SingleClass);
        }

        let (train, test) = train_test_split(rows, config.test_fraction, config.split_seed)?;
        if !has_both_classes(train.iter().copied()) {
            return Err(TrainingError::SingleClass);
        }

        let texts: Vec<String> = train.iter().map(|r| r.classifier_text()).collect();
        let labels: Vec<bool> = train.iter().map(|r| r.is_phishing).collect();
        let vectorizer = TfidfVectorizer::fit(&texts, config.max_features);
        let matrix: Vec<SparseVector> = texts.iter().map(|t| vectorizer.transform(t)).collect();

        log::debug!(
            "Fitting classifier on {} rows, {} features",
            train.len(),
            vectorizer.vocabulary_size()
        );
        let model = LogisticRegression::fit(
            &matrix,
            &labels,
            vectorizer.vocabulary_size(),
            TrainingParams {
                learning_rate: config.learning_rate,
                epochs: config.epochs,
                l2_penalty: config.l2_penalty,
            },
        );

        let mut artifact = Self {
            version: ARTIFACT_VERSION,
            trained_at: Utc::now(),
            vectorizer,
            model,
            report: TrainingReport::from_predictions(&[], &[], 0),
        };

        let predicted: Vec<bool> = test
            .iter()
            .map(|r| artifact.predict_text(&r.classifier_text()).is_phishing)
            .collect();
        let actual: Vec<bool> = test.iter().map(|r| r.is_phishing).collect();
        artifact.report = TrainingReport::from_predictions(&predicted, &actual, train.len());

        log::info!(
            "Held-out accuracy {:.3} (precision {:.3}, recall {:.3}, f1 {:.3}) on {} rows",
            artifact.report.accuracy,
            artifact.report.precision,
            artifact.report.recall,
            artifact.report.f1,
            artifact.report.test_size
        );

        if artifact.report.accuracy < config.min_holdout_accuracy {
            return Err(TrainingError::BelowAccuracy {
                accuracy: artifact.report.accuracy,
                minimum: config.min_holdout_accuracy,
            });
        }
        Ok(artifact)
    }

    pub fn predict_text(&self, text: &str) -> Prediction {
        let row = self.vectorizer.transform(text);
        let probability = self.model.probability(&row);
        Prediction {
            is_phishing: probability > DECISION_THRESHOLD,
            probability,
            fallback: false,
        }
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.version != ARTIFACT_VERSION {
            return Err(ArtifactError::Invalid(format!(
                "unsupported artifact version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.vectorizer.idf().len() != self.vectorizer.vocabulary_size() {
            return Err(ArtifactError::Invalid(
                "idf length does not match vocabulary".to_string(),
            ));
        }
        if self.model.n_features() != self.vectorizer.vocabulary_size() {
            return Err(ArtifactError::Invalid(format!(
                "model has {} weights for a vocabulary of {}",
                self.model.n_features(),
                self.vectorizer.vocabulary_size()
            )));
        }
        if !self.model.is_finite() || self.vectorizer.idf().iter().any(|v| !v.is_finite()) {
            return Err(ArtifactError::Invalid("non-finite parameters".to_string()));
        }
        Ok(())
    }

    /// Write via a temporary sibling then rename, so readers never observe a
    /// half-written file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        log::info!("Saved classifier artifact to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArtifactError::Missing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&content)?;
        artifact.validate()?;
        Ok(artifact)
    }
}

fn has_both_classes<'a>(mut rows: impl Iterator<Item = &'a CorpusRow> + Clone) -> bool {
    rows.clone().any(|r| r.is_phishing) && rows.any(|r| !r.is_phishing)
}
