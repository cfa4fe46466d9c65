//! Explanation hand-off
//!
//! The pipeline does not write prose itself. It packages the scores and the
//! email text into an `ExplanationContext` and hands it to an `Explainer`,
//! typically a client for an external language-model service.

use crate::fusion::Verdict;
use serde::{Deserialize, Serialize};

/// Used whenever an explainer fails
pub const FALLBACK_EXPLANATION: &str = "Explanation not available.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationContext {
    /// Normalized text, or the raw body/subject when normalization left nothing
    pub text: String,
    pub subject: String,
    pub sender: String,
    pub ml_score: f64,
    pub rule_score: f64,
    pub final_score: f64,
    pub verdict: Verdict,
    pub triggered_rules: Vec<String>,
}

impl ExplanationContext {
    /// Analyst prompt for a language-model explainer
    pub fn prompt(&self) -> String {
        format!(
            "You are a security analyst. Analyze the following email:\n\n\
             Subject: {}\nFrom: {}\nBody: {}\n\n\
             Prediction: {}\nML score: {:.2}\nRule score: {:.2}\nFinal score: {:.2}\n\n\
             Provide a concise explanation why this email is considered {}.\n\
             Give a risk assessment and any red flags in simple bullet points.\n",
            self.subject,
            self.sender,
            self.text,
            self.verdict,
            self.ml_score,
            self.rule_score,
            self.final_score,
            self.verdict
        )
    }
}

pub trait Explainer: Send + Sync {
    fn explain(&self, context: &ExplanationContext) -> anyhow::Result<String>;
}

/// Offline explainer listing the signals behind the verdict
pub struct SummaryExplainer;

impl Explainer for SummaryExplainer {
    fn explain(&self, context: &ExplanationContext) -> anyhow::Result<String> {
        let mut lines = vec![format!(
            "Classified as {} (final score {:.2}: model {:.2}, rules {:.2}).",
            context.verdict, context.final_score, context.ml_score, context.rule_score
        )];
        if context.triggered_rules.is_empty() {
            lines.push("- No heuristic rules triggered".to_string());
        }
        for rule in &context.triggered_rules {
            let description = match rule.as_str() {
                "suspicious_keywords" => "Subject or body uses pressure or credential keywords",
                "sender_identity" => "Sender address is malformed or impersonates a known brand",
                "link_count" => "Body contains an unusually high number of links",
                other => other,
            };
            lines.push(format!("- {}", description));
        }
        Ok(lines.join("\n"))
    }
}

/// Run an explainer, falling back to the fixed text on failure
pub fn explain_or_fallback(explainer: &dyn Explainer, context: &ExplanationContext) -> String {
    match explainer.explain(context) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            log::warn!("Explainer returned an empty explanation");
            FALLBACK_EXPLANATION.to_string()
        }
        Err(e) => {
            log::warn!("Failed to generate explanation: {}", e);
            FALLBACK_EXPLANATION.to_string()
        }
    }
}
