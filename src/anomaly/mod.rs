//! Temporal anomaly detection over a batch of emails
//!
//! Each email is reduced to the hour and weekday it was sent. An isolation
//! forest is fitted over the whole batch and every row is labelled `1`
//! (normal) or `-1` (outlier). The forest is rebuilt per batch unless a
//! saved one is supplied.

pub mod features;
pub mod isolation_forest;

pub use features::{AnomalyFeatureExtractor, AnomalyFeatureRow, UNPARSED};
pub use isolation_forest::{ForestParams, IsolationForest};

use crate::config::AnomalyConfig;
use crate::email::ParsedEmail;
use serde::{Deserialize, Serialize};

/// What to do with rows whose timestamp could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelPolicy {
    /// Fit on every row, sentinel (-1, -1) points included
    #[default]
    Include,
    /// Fit on rows with a parsed timestamp only; all rows are still scored
    ExcludeFromFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// `-1` outlier, `1` normal
    pub anomaly_score: i8,
    pub is_anomaly: bool,
}

impl AnomalyResult {
    pub fn from_score(anomaly_score: i8) -> Self {
        Self {
            anomaly_score,
            is_anomaly: anomaly_score == -1,
        }
    }

    pub fn normal() -> Self {
        Self::from_score(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    #[serde(flatten)]
    pub features: AnomalyFeatureRow,
    #[serde(flatten)]
    pub result: AnomalyResult,
}

#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub rows: Vec<ScoredRow>,
    /// `None` when there were too few rows to fit on
    pub forest: Option<IsolationForest>,
}

impl DetectionReport {
    pub fn flagged(&self) -> impl Iterator<Item = &ScoredRow> {
        self.rows.iter().filter(|r| r.result.is_anomaly)
    }
}

pub struct AnomalyDetector {
    config: AnomalyConfig,
    extractor: AnomalyFeatureExtractor,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        let extractor = AnomalyFeatureExtractor::new(&config);
        Self { config, extractor }
    }

    pub fn extract(&self, emails: &[ParsedEmail]) -> Vec<AnomalyFeatureRow> {
        self.extractor.extract(emails)
    }

    fn params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.config.n_trees,
            max_samples: self.config.max_samples,
            contamination: self.config.contamination,
            seed: self.config.seed,
        }
    }

    pub fn fit(&self, rows: &[AnomalyFeatureRow]) -> Option<IsolationForest> {
        let points: Vec<Vec<f64>> = rows
            .iter()
            .filter(|r| match self.config.sentinel_policy {
                SentinelPolicy::Include => true,
                SentinelPolicy::ExcludeFromFit => r.has_timestamp(),
            })
            .map(AnomalyFeatureRow::point)
            .collect();

        let forest = IsolationForest::fit(&points, self.params());
        match &forest {
            Some(_) => log::info!("Fitted anomaly model on {} of {} rows", points.len(), rows.len()),
            None => log::warn!(
                "Only {} rows available to fit the anomaly model; all rows treated as normal",
                points.len()
            ),
        }
        forest
    }

    /// Fit a fresh forest on the batch, then score every row against it
    pub fn detect(&self, rows: Vec<AnomalyFeatureRow>) -> DetectionReport {
        let forest = self.fit(&rows);
        let scored = match &forest {
            Some(forest) => Self::score_rows(forest, rows),
            None => rows
                .into_iter()
                .map(|features| ScoredRow {
                    features,
                    result: AnomalyResult::normal(),
                })
                .collect(),
        };

        let report = DetectionReport {
            rows: scored,
            forest,
        };
        log::info!(
            "{} of {} rows flagged as anomalous",
            report.flagged().count(),
            report.rows.len()
        );
        report
    }

    /// Score rows against an already fitted forest
    pub fn detect_with(forest: &IsolationForest, rows: Vec<AnomalyFeatureRow>) -> Vec<ScoredRow> {
        Self::score_rows(forest, rows)
    }

    pub fn detect_emails(&self, emails: &[ParsedEmail]) -> DetectionReport {
        self.detect(self.extract(emails))
    }

    fn score_rows(forest: &IsolationForest, rows: Vec<AnomalyFeatureRow>) -> Vec<ScoredRow> {
        rows.into_iter()
            .map(|features| {
                let result = AnomalyResult::from_score(forest.predict(&features.point()));
                ScoredRow { features, result }
            })
            .collect()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{HeaderParser, Headers};

    const WEEKDAYS: [&str; 5] = ["Mon", "Tue", "Wed", "Thu", "Fri"];

    /// 100 emails spread over 09:00-17:00, Monday 6 Jan to Friday 10 Jan 2025
    fn office_hours_batch() -> Vec<ParsedEmail> {
        let parser = HeaderParser::default();
        (0..100)
            .map(|i| {
                let day = i % 5;
                let hour = 9 + (i % 9);
                let date = format!(
                    "{}, {:02} Jan 2025 {:02}:{:02}:00 +0000",
                    WEEKDAYS[day],
                    6 + day,
                    hour,
                    (i * 7) % 60
                );
                let headers: Headers = vec![("Date", date)].into_iter().collect();
                parser.parse_parts("Colleague <colleague@example.com>", "Status update", "Notes attached", headers)
            })
            .collect()
    }

    fn dated(date: &str, subject: &str) -> ParsedEmail {
        let headers: Headers = vec![("Date", date)].into_iter().collect();
        HeaderParser::default().parse_parts("Night Owl <owl@example.net>", subject, "hello", headers)
    }

    #[test]
    fn test_sunday_three_am_is_flagged() {
        let mut emails = office_hours_batch();
        emails.push(dated("Sun, 12 Jan 2025 03:00:00 +0000", "Late night"));

        let report = AnomalyDetector::default().detect_emails(&emails);
        assert_eq!(report.rows.len(), 101);

        let late = &report.rows[100];
        assert_eq!((late.features.hour, late.features.day_of_week), (3, 6));
        assert_eq!(late.result.anomaly_score, -1);
        assert!(late.result.is_anomaly);

        let flagged = report.flagged().count();
        assert!(flagged <= 10, "flagged {}", flagged);
    }

    #[test]
    fn test_scores_are_plus_or_minus_one() {
        let report = AnomalyDetector::default().detect_emails(&office_hours_batch());
        for row in &report.rows {
            assert!(row.result.anomaly_score == 1 || row.result.anomaly_score == -1);
            assert_eq!(row.result.is_anomaly, row.result.anomaly_score == -1);
        }
    }

    #[test]
    fn test_too_few_rows_are_all_normal() {
        let emails = vec![dated("Sun, 12 Jan 2025 03:00:00 +0000", "only one")];
        let report = AnomalyDetector::default().detect_emails(&emails);
        assert!(report.forest.is_none());
        assert_eq!(report.rows[0].result, AnomalyResult::normal());
    }

    #[test]
    fn test_exclude_sentinels_from_fit() {
        let mut emails = office_hours_batch();
        for _ in 0..20 {
            emails.push(dated("garbage", "undated"));
        }

        let excluding = AnomalyDetector::new(AnomalyConfig {
            sentinel_policy: SentinelPolicy::ExcludeFromFit,
            ..AnomalyConfig::default()
        })
        .detect_emails(&emails);
        let including = AnomalyDetector::default().detect_emails(&emails);
        let dated_only = AnomalyDetector::default().detect_emails(&office_hours_batch());

        // Every row is still scored, sentinel rows included
        assert_eq!(excluding.rows.len(), 120);
        assert!(excluding.rows[100..].iter().all(|r| !r.features.has_timestamp()));
        // Undated rows leave the fitted model untouched
        assert_eq!(excluding.forest, dated_only.forest);
        assert_ne!(including.forest, dated_only.forest);
    }

    #[test]
    fn test_saved_forest_scores_new_batch() {
        let detector = AnomalyDetector::default();
        let mut emails = office_hours_batch();
        emails.push(dated("Sun, 12 Jan 2025 03:00:00 +0000", "late"));
        let forest = detector.detect_emails(&emails).forest.unwrap();

        let rows = detector.extract(&[
            dated("Wed, 08 Jan 2025 13:00:00 +0000", "midweek"),
            dated("Sun, 19 Jan 2025 03:30:00 +0000", "late again"),
        ]);
        let scored = AnomalyDetector::detect_with(&forest, rows);
        assert!(!scored[0].result.is_anomaly);
        assert!(scored[1].result.is_anomaly);
    }

    #[test]
    fn test_scored_row_serializes_flat() {
        let row = ScoredRow {
            features: AnomalyFeatureRow {
                hour: 3,
                day_of_week: 6,
                body_length: 5,
                subject: "Late".to_string(),
                sender: "owl@example.net".to_string(),
            },
            result: AnomalyResult::from_score(-1),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["hour"], 3);
        assert_eq!(value["anomaly_score"], -1);
        assert_eq!(value["is_anomaly"], true);
    }
}
