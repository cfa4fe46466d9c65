//! Email phishing risk scoring.
//!
//! A [`pipeline::RiskPipeline`] parses a saved email, runs the heuristic
//! [`rules`] and the supervised [`machine_learning`] classifier, and fuses
//! both into a verdict. The [`anomaly`] module works on whole batches and
//! flags emails sent at unusual times.

pub mod anomaly;
pub mod batch;
pub mod config;
pub mod domain_utils;
pub mod email;
pub mod error;
pub mod explain;
pub mod fusion;
pub mod machine_learning;
pub mod normalization;
pub mod pipeline;
pub mod rules;

pub use config::PipelineConfig;
pub use email::{HeaderParser, ParsedEmail, RawEmail};
pub use error::{PipelineError, Result};
pub use fusion::{fuse, FusedResult, Verdict};
pub use pipeline::{RiskAssessment, RiskPipeline};
