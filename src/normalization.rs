use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lowercased, markup-free text plus its word tokens
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedText {
    pub clean_text: String,
    pub tokens: Vec<String>,
}

/// Turns subject/body text into `NormalizedText`. Stateless apart from the
/// compiled patterns, so one instance can be shared freely.
pub struct TextNormalizer {
    block_regex: Regex,
    comment_regex: Regex,
    tag_regex: Regex,
    whitespace_regex: Regex,
    token_regex: Regex,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            block_regex: Regex::new(r"(?is)<(script|style|head)\b[^>]*>.*?</(script|style|head)\s*>")
                .expect("block pattern is valid"),
            comment_regex: Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"),
            tag_regex: Regex::new(r"</?[a-zA-Z!][^>]*>").expect("tag pattern is valid"),
            whitespace_regex: Regex::new(r"\s+").expect("whitespace pattern is valid"),
            token_regex: Regex::new(r"\w+").expect("token pattern is valid"),
        }
    }

    /// Strip markup, decode entities, case-fold, collapse whitespace, tokenize.
    /// Malformed markup degrades to best-effort text; this never fails.
    pub fn normalize(&self, raw: &str) -> NormalizedText {
        let text = self.strip_markup(raw).to_lowercase();
        // Entity names are matched after case-folding; decoded text is folded again
        let text = self.decode_html_entities(&text).to_lowercase();
        let clean_text = self.whitespace_regex.replace_all(&text, " ").trim().to_string();
        let tokens = self.tokenize(&clean_text);

        NormalizedText { clean_text, tokens }
    }

    /// Normalize `subject` and `body` as one document
    pub fn normalize_email(&self, subject: &str, body: &str) -> NormalizedText {
        self.normalize(&format!("{} {}", subject, body))
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.token_regex
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    fn strip_markup(&self, text: &str) -> String {
        if !text.contains('<') {
            return text.to_string();
        }
        let text = self.block_regex.replace_all(text, " ");
        let text = self.comment_regex.replace_all(&text, " ");
        self.tag_regex.replace_all(&text, " ").into_owned()
    }

    fn decode_html_entities(&self, text: &str) -> String {
        if !text.contains('&') {
            return text.to_string();
        }
        html_escape::decode_html_entities(text).into_owned()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_collapses_whitespace() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize("<p>Hello   <b>World</b></p>\n\n<br/>Click  HERE ");
        assert_eq!(result.clean_text, "hello world click here");
        assert_eq!(result.tokens, vec!["hello", "world", "click", "here"]);
    }

    #[test]
    fn test_drops_script_and_style_blocks() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize(
            "<style>.x { color: red }</style><script>alert('hi')</script><div>Account locked</div>",
        );
        assert_eq!(result.clean_text, "account locked");
    }

    #[test]
    fn test_decodes_entities() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize("Tom &amp; Jerry&nbsp;&#39;s &#x41;ccount");
        assert_eq!(result.clean_text, "tom & jerry 's account");
    }

    #[test]
    fn test_decodes_accented_and_uppercase_entities() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize("Tom &AMP; Jerry caf&eacute; &Eacute;T&Eacute;");
        assert_eq!(result.clean_text, "tom & jerry café été");
        assert_eq!(result.tokens, vec!["tom", "jerry", "café", "été"]);

        let again = normalizer.normalize(&result.clean_text);
        assert_eq!(again, result);
    }

    #[test]
    fn test_empty_input() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize("   ");
        assert_eq!(result.clean_text, "");
        assert!(result.tokens.is_empty());
    }

    #[test]
    fn test_malformed_markup_is_best_effort() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize("<div class='x'>unclosed <b attribute");
        assert!(result.clean_text.contains("unclosed"));

        let comparison = normalizer.normalize("if a < b and c > d");
        assert_eq!(comparison.clean_text, "if a < b and c > d");
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        let normalizer = TextNormalizer::new();
        for input in [
            "URGENT:   Verify your PASSWORD now",
            "  multiple\t\tspaces\nand lines ",
            "Ünïcödé Text — with dashes",
            "",
        ] {
            let once = normalizer.normalize(input);
            let twice = normalizer.normalize(&once.clean_text);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_normalize_email_combines_subject_and_body() {
        let normalizer = TextNormalizer::new();
        let result = normalizer.normalize_email("Account Alert", "<p>Verify now</p>");
        assert_eq!(result.clean_text, "account alert verify now");
    }
}
