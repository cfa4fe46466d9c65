use crate::config::AnomalyConfig;
use crate::email::ParsedEmail;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Stand-in for hour and day when the Date header cannot be parsed
pub const UNPARSED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyFeatureRow {
    /// 0-23, or -1
    pub hour: i32,
    /// Monday = 0 .. Sunday = 6, or -1
    pub day_of_week: i32,
    /// Character count of the body
    pub body_length: usize,
    pub subject: String,
    pub sender: String,
}

impl AnomalyFeatureRow {
    pub fn has_timestamp(&self) -> bool {
        self.hour != UNPARSED && self.day_of_week != UNPARSED
    }

    /// Point in the (hour, day_of_week) plane the detector works on
    pub fn point(&self) -> Vec<f64> {
        vec![self.hour as f64, self.day_of_week as f64]
    }
}

pub struct AnomalyFeatureExtractor {
    /// Configured format with any leading weekday directive removed
    date_format: String,
    skips_weekday: bool,
    prefix_len: usize,
}

impl AnomalyFeatureExtractor {
    pub fn new(config: &AnomalyConfig) -> Self {
        let format = config.date_format.trim_start();
        let (date_format, skips_weekday) = match format
            .strip_prefix("%a")
            .or_else(|| format.strip_prefix("%A"))
        {
            Some(rest) => (rest.trim_start_matches(is_weekday_separator).to_string(), true),
            None => (config.date_format.clone(), false),
        };

        Self {
            date_format,
            skips_weekday,
            prefix_len: config.date_prefix_len,
        }
    }

    /// Hour and Monday-based weekday from the leading part of a Date header.
    /// The weekday always comes from the calendar date; a weekday name in the
    /// header is skipped, even when it disagrees with the date.
    pub fn parse_timestamp(&self, value: &str) -> Option<(i32, i32)> {
        let prefix = match value.char_indices().nth(self.prefix_len) {
            Some((end, _)) => &value[..end],
            None => value,
        };
        let mut text = prefix.trim();
        if self.skips_weekday {
            text = text
                .trim_start_matches(|c: char| c.is_ascii_alphabetic())
                .trim_start_matches(is_weekday_separator);
        }
        let parsed = NaiveDateTime::parse_from_str(text, &self.date_format).ok()?;
        Some((
            parsed.hour() as i32,
            parsed.weekday().num_days_from_monday() as i32,
        ))
    }

    pub fn extract_one(&self, index: usize, email: &ParsedEmail) -> AnomalyFeatureRow {
        let date = email.headers.get("Date").unwrap_or_default();
        let (hour, day_of_week) = match self.parse_timestamp(date) {
            Some(parsed) => parsed,
            None => {
                log::warn!("Row {}: unparseable Date header {:?}", index, date);
                (UNPARSED, UNPARSED)
            }
        };

        AnomalyFeatureRow {
            hour,
            day_of_week,
            body_length: email.body.chars().count(),
            subject: email.subject.clone(),
            sender: email.sender.raw.clone(),
        }
    }

    /// One row per email, in input order
    pub fn extract(&self, emails: &[ParsedEmail]) -> Vec<AnomalyFeatureRow> {
        emails
            .iter()
            .enumerate()
            .map(|(i, email)| self.extract_one(i, email))
            .collect()
    }
}

fn is_weekday_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

impl Default for AnomalyFeatureExtractor {
    fn default() -> Self {
        Self::new(&AnomalyConfig::default())
    }
}
