//! Score Fusion
//!
//! Combines the classifier probability and the rule score into the final
//! score and verdict. This is the only place the weighting lives.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ML_WEIGHT: f64 = 0.7;
pub const RULE_WEIGHT: f64 = 0.3;
/// Final scores strictly above this are phishing
pub const VERDICT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Phishing,
    Legitimate,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Phishing => write!(f, "Phishing"),
            Verdict::Legitimate => write!(f, "Legitimate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub ml_score: f64,
    pub rule_score: f64,
    pub final_score: f64,
    pub verdict: Verdict,
}

/// Out-of-range or NaN inputs are rejected, never clamped
pub fn fuse(ml_score: f64, rule_score: f64) -> Result<FusedResult> {
    check_unit("ml", ml_score)?;
    check_unit("rule", rule_score)?;

    let final_score = ML_WEIGHT * ml_score + RULE_WEIGHT * rule_score;
    let verdict = if final_score > VERDICT_THRESHOLD {
        Verdict::Phishing
    } else {
        Verdict::Legitimate
    };

    Ok(FusedResult {
        ml_score,
        rule_score,
        final_score,
        verdict,
    })
}

fn check_unit(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::ScoreOutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_sum() {
        let pairs = [(0.0, 0.0), (1.0, 1.0), (0.9, 1.0 / 3.0), (0.25, 2.0 / 3.0), (0.5, 0.0)];
        for (ml, rule) in pairs {
            let result = fuse(ml, rule).unwrap();
            assert!((result.final_score - (0.7 * ml + 0.3 * rule)).abs() < 1e-12);
            assert_eq!(result.ml_score, ml);
            assert_eq!(result.rule_score, rule);
            assert_eq!(
                result.verdict == Verdict::Phishing,
                result.final_score > VERDICT_THRESHOLD
            );
        }
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(fuse(0.9, 1.0).unwrap().verdict, Verdict::Phishing);
        assert_eq!(fuse(0.1, 0.0).unwrap().verdict, Verdict::Legitimate);
        // Fallback probability needs two rules to reach a phishing verdict
        assert_eq!(fuse(0.5, 1.0 / 3.0).unwrap().verdict, Verdict::Legitimate);
        assert_eq!(fuse(0.5, 2.0 / 3.0).unwrap().verdict, Verdict::Phishing);
    }

    #[test]
    fn test_exact_threshold_is_legitimate() {
        // 0.7 * 0.5 + 0.3 * 0.5 lands exactly on 0.5
        let result = fuse(0.5, 0.5).unwrap();
        assert!((result.final_score - 0.5).abs() < 1e-12);
        assert_eq!(result.verdict, Verdict::Legitimate);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            fuse(1.2, 0.0),
            Err(PipelineError::ScoreOutOfRange { field: "ml", .. })
        ));
        assert!(matches!(
            fuse(0.5, -0.01),
            Err(PipelineError::ScoreOutOfRange { field: "rule", .. })
        ));
        assert!(fuse(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Phishing.to_string(), "Phishing");
        assert_eq!(Verdict::Legitimate.to_string(), "Legitimate");
    }
}
