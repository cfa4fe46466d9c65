pub mod keywords;
pub mod links;
pub mod sender;

use crate::config::RulesConfig;
use crate::email::ParsedEmail;
use serde::{Deserialize, Serialize};

/// Lowercased views of the email shared by every rule
pub struct RuleContext<'a> {
    pub email: &'a ParsedEmail,
    pub subject: String,
    pub body: String,
}

impl<'a> RuleContext<'a> {
    pub fn new(email: &'a ParsedEmail) -> Self {
        Self {
            email,
            subject: email.subject.to_lowercase(),
            body: email.body.to_lowercase(),
        }
    }
}

/// A single deterministic predicate. Each rule contributes at most one point.
pub trait Rule: Send + Sync {
    fn triggered(&self, context: &RuleContext) -> bool;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    /// triggered / total, in [0, 1]
    pub score: f64,
    pub triggered: Vec<String>,
    pub total: usize,
}

/// Stateless heuristic scorer. The score is always triggered rules over the
/// number of registered rules, so adding a rule widens the denominator.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::from_config(&RulesConfig::default())
    }
}

impl RuleEngine {
    pub fn from_config(config: &RulesConfig) -> Self {
        Self {
            rules: vec![
                Box::new(keywords::KeywordRule::new(&config.suspicious_keywords)),
                Box::new(sender::SenderRule::new(&config.brands)),
                Box::new(links::LinkCountRule::new(config.link_threshold)),
            ],
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn evaluate(&self, email: &ParsedEmail) -> f64 {
        self.evaluate_detailed(email).score
    }

    pub fn evaluate_detailed(&self, email: &ParsedEmail) -> RuleEvaluation {
        let context = RuleContext::new(email);
        let triggered: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.triggered(&context))
            .map(|rule| rule.name().to_string())
            .collect();

        let total = self.rules.len();
        let score = if total == 0 {
            0.0
        } else {
            triggered.len() as f64 / total as f64
        };

        RuleEvaluation {
            score,
            triggered,
            total,
        }
    }
}
