use super::{Rule, RuleContext};

/// Any suspicious keyword in the subject or body
pub struct KeywordRule {
    keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn matched_keywords<'a>(&'a self, context: &RuleContext) -> Vec<&'a str> {
        self.keywords
            .iter()
            .filter(|k| context.subject.contains(k.as_str()) || context.body.contains(k.as_str()))
            .map(|k| k.as_str())
            .collect()
    }
}

impl Rule for KeywordRule {
    fn triggered(&self, context: &RuleContext) -> bool {
        self.keywords
            .iter()
            .any(|k| context.subject.contains(k.as_str()) || context.body.contains(k.as_str()))
    }

    fn name(&self) -> &str {
        "suspicious_keywords"
    }
}
