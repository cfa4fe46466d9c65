//! Per-email risk scoring: parse, normalize, rules and classifier, fuse.

use crate::config::PipelineConfig;
use crate::email::{HeaderParser, ParsedEmail, RawEmail};
use crate::error::Result;
use crate::explain::{explain_or_fallback, ExplanationContext, Explainer};
use crate::fusion::{fuse, FusedResult};
use crate::machine_learning::ClassifierHandle;
use crate::normalization::{NormalizedText, TextNormalizer};
use crate::rules::{RuleEngine, RuleEvaluation};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub subject: String,
    pub sender: String,
    #[serde(flatten)]
    pub fused: FusedResult,
    pub rules: RuleEvaluation,
    pub normalized: NormalizedText,
    /// The classifier had no model and answered with the fallback probability
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl RiskAssessment {
    pub fn explanation_context(&self, email: &ParsedEmail) -> ExplanationContext {
        let text = if !self.normalized.clean_text.is_empty() {
            self.normalized.clean_text.clone()
        } else if !email.body.is_empty() {
            email.body.clone()
        } else {
            email.subject.clone()
        };

        ExplanationContext {
            text,
            subject: email.subject.clone(),
            sender: email.sender.raw.clone(),
            ml_score: self.fused.ml_score,
            rule_score: self.fused.rule_score,
            final_score: self.fused.final_score,
            verdict: self.fused.verdict,
            triggered_rules: self.rules.triggered.clone(),
        }
    }
}

/// Entry point for scoring. The classifier handle is shared, so several
/// pipelines (or threads) can score against one loaded model.
pub struct RiskPipeline {
    parser: HeaderParser,
    normalizer: TextNormalizer,
    rules: RuleEngine,
    classifier: Arc<ClassifierHandle>,
}

impl RiskPipeline {
    pub fn new(config: &PipelineConfig, classifier: Arc<ClassifierHandle>) -> Self {
        Self {
            parser: HeaderParser::from_config(&config.domains),
            normalizer: TextNormalizer::new(),
            rules: RuleEngine::from_config(&config.rules),
            classifier,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config,
            Arc::new(ClassifierHandle::new(config.classifier.clone())),
        )
    }

    pub fn classifier(&self) -> &Arc<ClassifierHandle> {
        &self.classifier
    }

    pub fn parser(&self) -> &HeaderParser {
        &self.parser
    }

    pub fn parse(&self, raw: &RawEmail) -> ParsedEmail {
        self.parser.parse_email(raw)
    }

    pub fn assess(&self, email: &ParsedEmail) -> Result<RiskAssessment> {
        let normalized = self.normalizer.normalize_email(&email.subject, &email.body);
        let rules = self.rules.evaluate_detailed(email);
        let prediction = self.classifier.predict(email);
        let fused = fuse(prediction.probability, rules.score)?;

        log::debug!(
            "Scored {:?} from {:?}: ml={:.3} rule={:.3} final={:.3} verdict={} triggered={:?}",
            email.subject,
            email.sender.raw,
            fused.ml_score,
            fused.rule_score,
            fused.final_score,
            fused.verdict,
            rules.triggered
        );

        Ok(RiskAssessment {
            subject: email.subject.clone(),
            sender: email.sender.raw.clone(),
            fused,
            rules,
            normalized,
            degraded: prediction.fallback,
            explanation: None,
        })
    }

    pub fn assess_raw(&self, raw: &RawEmail) -> Result<RiskAssessment> {
        self.assess(&self.parse(raw))
    }

    /// Score, then attach an explanation. A failing explainer never fails the
    /// call; the fixed fallback text is attached instead.
    pub fn assess_with(&self, email: &ParsedEmail, explainer: &dyn Explainer) -> Result<RiskAssessment> {
        let mut assessment = self.assess(email)?;
        let context = assessment.explanation_context(email);
        assessment.explanation = Some(explain_or_fallback(explainer, &context));
        Ok(assessment)
    }
}
