use super::{Rule, RuleContext};
use regex::Regex;

/// More than `threshold` URLs in the body
pub struct LinkCountRule {
    threshold: usize,
    link_regex: Regex,
}

impl LinkCountRule {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            link_regex: Regex::new(r"https?://\S+").expect("link pattern is valid"),
        }
    }

    pub fn count_links(&self, text: &str) -> usize {
        self.link_regex.find_iter(text).count()
    }
}

impl Rule for LinkCountRule {
    fn triggered(&self, context: &RuleContext) -> bool {
        let count = self.count_links(&context.body);
        if count > self.threshold {
            log::debug!("{} links exceed threshold {}", count, self.threshold);
            return true;
        }
        false
    }

    fn name(&self) -> &str {
        "link_count"
    }
}
