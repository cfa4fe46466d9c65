//! Labelled training corpus
//!
//! The corpus is a CSV file with `subject`, `body`, `from_email` and
//! `is_phishing` columns. Labels accept `1`/`0` as well as `true`/`false`.

use crate::error::TrainingError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRow {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(deserialize_with = "deserialize_label")]
    pub is_phishing: bool,
}

impl CorpusRow {
    pub fn new(subject: &str, body: &str, from_email: &str, is_phishing: bool) -> Self {
        Self {
            subject: subject.to_string(),
            body: body.to_string(),
            from_email: from_email.to_string(),
            is_phishing,
        }
    }
}

fn deserialize_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid is_phishing label {:?}",
            other
        ))),
    }
}

pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<CorpusRow>, TrainingError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TrainingError::CorpusUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_corpus(file)?;
    log::info!("Loaded {} corpus rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn read_corpus<R: std::io::Read>(reader: R) -> Result<Vec<CorpusRow>, TrainingError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in csv_reader.deserialize::<CorpusRow>().enumerate() {
        // +2: one for the header line, one for 1-based numbering
        let row = record.map_err(|e| TrainingError::CorpusMalformed(format!("line {}: {}", i + 2, e)))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Seeded shuffle then split; the test side gets `ceil(n * test_fraction)` rows
pub fn train_test_split(
    rows: &[CorpusRow],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<&CorpusRow>, Vec<&CorpusRow>), TrainingError> {
    let n = rows.len();
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n < 2 || n_test == 0 || n_test >= n {
        return Err(TrainingError::EmptyCorpus);
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices[..n_test].iter().map(|&i| &rows[i]).collect();
    let train = indices[n_test..].iter().map(|&i| &rows[i]).collect();
    Ok((train, test))
}
