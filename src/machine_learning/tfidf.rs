//! Term-frequency / inverse-document-frequency vectorizer
//!
//! Tokens are lowercase runs of two or more word characters with English stop
//! words removed. IDF is smoothed (`ln((1 + n) / (1 + df)) + 1`) and every row
//! is L2-normalised, so documents of different length land on the same scale.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};

/// Sparse row: (feature index, weight), sorted by index
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone, Serialize)]
pub struct TfidfVectorizer {
    terms: Vec<String>,
    idf: Vec<f64>,
    #[serde(skip_serializing)]
    index: HashMap<String, usize>,
    #[serde(skip_serializing)]
    token_regex: Regex,
    #[serde(skip_serializing)]
    stop_words: HashSet<&'static str>,
}

#[derive(Deserialize)]
struct VectorizerParts {
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl<'de> Deserialize<'de> for TfidfVectorizer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = VectorizerParts::deserialize(deserializer)?;
        Ok(Self::from_parts(parts.terms, parts.idf))
    }
}

impl PartialEq for TfidfVectorizer {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms && self.idf == other.idf
    }
}

impl TfidfVectorizer {
    fn from_parts(terms: Vec<String>, idf: Vec<f64>) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            terms,
            idf,
            index,
            token_regex: Regex::new(r"\b\w\w+\b").expect("token pattern is valid"),
            stop_words: ENGLISH_STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Learn vocabulary and IDF weights, keeping the `max_features` most
    /// frequent terms across the corpus
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Self {
        let mut vectorizer = Self::from_parts(Vec::new(), Vec::new());

        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let tokens = vectorizer.analyze(doc.as_ref());
            let mut seen = HashSet::new();
            for token in tokens {
                *term_counts.entry(token.clone()).or_insert(0) += 1;
                if seen.insert(token.clone()) {
                    *doc_freq.entry(token).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        terms.sort();

        let n_docs = documents.len() as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        vectorizer.terms = terms;
        vectorizer.idf = idf;
        vectorizer.index = index;
        vectorizer
    }

    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in self.analyze(document) {
            if let Some(&i) = self.index.get(&token) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(i, tf)| (i, tf * self.idf[i]))
            .collect();
        row.sort_by_key(|(i, _)| *i);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    fn analyze(&self, document: &str) -> Vec<String> {
        let lowered = document.to_lowercase();
        self.token_regex
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| !self.stop_words.contains(t))
            .map(str::to_string)
            .collect()
    }
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "be", "became", "because", "become", "becomes", "been", "before",
    "beforehand", "behind", "being", "below", "beside", "besides", "between", "beyond", "both",
    "but", "by", "can", "cannot", "could", "did", "do", "does", "done", "down", "due", "during",
    "each", "eg", "either", "else", "elsewhere", "enough", "etc", "even", "ever", "every",
    "everyone", "everything", "everywhere", "except", "few", "for", "former", "formerly",
    "from", "further", "had", "has", "have", "he", "hence", "her", "here", "hereafter",
    "hereby", "herein", "hers", "herself", "him", "himself", "his", "how", "however", "i",
    "ie", "if", "in", "indeed", "into", "is", "it", "its", "itself", "just", "latter", "least",
    "less", "ltd", "many", "may", "me", "meanwhile", "might", "mine", "more", "moreover",
    "most", "mostly", "much", "must", "my", "myself", "namely", "neither", "never",
    "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now",
    "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
    "please", "rather", "re", "same", "seem", "seemed", "seeming", "seems", "several", "she",
    "should", "since", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "than", "that", "the", "their", "them",
    "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore", "therein",
    "thereupon", "these", "they", "this", "those", "though", "through", "throughout", "thru",
    "thus", "to", "together", "too", "toward", "towards", "under", "until", "up", "upon", "us",
    "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon",
    "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_builds_sorted_vocabulary_without_stop_words() {
        let docs = ["The invoice is attached", "Verify the invoice now"];
        let vectorizer = TfidfVectorizer::fit(&docs, 100);

        assert_eq!(vectorizer.terms(), &["attached", "invoice", "verify"]);
        // "invoice" appears in both documents, so it carries the lowest idf
        let idf = vectorizer.idf();
        assert!(idf[1] < idf[0]);
        assert!((idf[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let docs = ["alpha alpha alpha beta", "alpha gamma gamma"];
        let vectorizer = TfidfVectorizer::fit(&docs, 2);
        assert_eq!(vectorizer.terms(), &["alpha", "gamma"]);
    }

    #[test]
    fn test_transform_is_l2_normalised() {
        let docs = ["account suspended verify account", "team lunch friday"];
        let vectorizer = TfidfVectorizer::fit(&docs, 100);
        let row = vectorizer.transform("Account verify");

        let norm: f64 = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(row.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_unknown_terms_give_empty_row() {
        let vectorizer = TfidfVectorizer::fit(&["known words"], 100);
        assert!(vectorizer.transform("completely unseen").is_empty());
        assert!(vectorizer.transform("").is_empty());
    }

    #[test]
    fn test_single_character_tokens_ignored() {
        let vectorizer = TfidfVectorizer::fit(&["a b c word"], 100);
        assert_eq!(vectorizer.terms(), &["word"]);
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let vectorizer = TfidfVectorizer::fit(&["reset password link", "quarterly report"], 100);
        let json = serde_json::to_string(&vectorizer).unwrap();
        let restored: TfidfVectorizer = serde_json::from_str(&json).unwrap();

        assert_eq!(
            vectorizer.transform("password report"),
            restored.transform("password report")
        );
    }
}
