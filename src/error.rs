//! Error types for the scoring pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by a scoring or batch call
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A score handed to fusion is outside [0, 1]; indicates an upstream defect
    #[error("{field} score {value} is outside [0, 1]")]
    ScoreOutOfRange { field: &'static str, value: f64 },

    /// Classifier input is neither an email record nor a corpus row
    #[error("Unsupported classifier input: {0}")]
    UnsupportedInput(String),

    /// Email document could not be turned into a ParsedEmail
    #[error("Malformed email document: {0}")]
    Email(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Training failures are reported to the caller, who decides whether to retry
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Training corpus unavailable at {path}: {source}")]
    CorpusUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Training corpus is malformed: {0}")]
    CorpusMalformed(String),

    #[error("Training corpus is empty or too small to split")]
    EmptyCorpus,

    #[error("Training corpus contains a single class; both labels are required")]
    SingleClass,

    #[error("Held-out accuracy {accuracy:.3} is below the required minimum {minimum:.3}")]
    BelowAccuracy { accuracy: f64, minimum: f64 },

    #[error("Failed to persist trained artifact: {0}")]
    ArtifactWrite(#[source] ArtifactError),
}

/// Problems reading or writing a persisted classifier artifact
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("No classifier artifact at {0}")]
    Missing(PathBuf),

    #[error("Artifact IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Artifact is invalid: {0}")]
    Invalid(String),
}
