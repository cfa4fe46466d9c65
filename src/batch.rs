//! Batch runs over a directory of saved-email JSON documents

use crate::anomaly::{AnomalyDetector, DetectionReport};
use crate::email::{HeaderParser, ParsedEmail, RawEmail};
use crate::error::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SavedEmail {
    pub path: PathBuf,
    pub email: RawEmail,
}

/// Read every `*.json` file in `dir`, ordered by file name. Files that cannot
/// be read or parsed are logged and skipped; only an unreadable directory is
/// an error.
pub fn load_saved_emails<P: AsRef<Path>>(dir: P) -> Result<Vec<SavedEmail>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut emails = Vec::with_capacity(paths.len());
    for path in paths {
        match RawEmail::from_file(&path) {
            Ok(email) => emails.push(SavedEmail { path, email }),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    log::info!(
        "Loaded {} saved emails from {}",
        emails.len(),
        dir.as_ref().display()
    );
    Ok(emails)
}

pub fn parse_saved(parser: &HeaderParser, saved: &[SavedEmail]) -> Vec<ParsedEmail> {
    saved.iter().map(|s| parser.parse_email(&s.email)).collect()
}

/// Load a directory and run the anomaly detector over it. Report rows line up
/// with the returned emails.
pub fn run_anomaly_batch<P: AsRef<Path>>(
    dir: P,
    parser: &HeaderParser,
    detector: &AnomalyDetector,
) -> Result<(Vec<SavedEmail>, DetectionReport)> {
    let saved = load_saved_emails(dir)?;
    let parsed = parse_saved(parser, &saved);
    let report = detector.detect_emails(&parsed);
    Ok((saved, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_email(dir: &Path, name: &str, date: &str, subject: &str) {
        let doc = json!({
            "from": "Colleague <colleague@example.com>",
            "headers": {"Subject": subject, "Date": date, "From": "Colleague <colleague@example.com>"},
            "body": "Notes attached"
        });
        std::fs::write(dir.join(name), doc.to_string()).unwrap();
    }

    #[test]
    fn test_load_skips_bad_files_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_email(dir.path(), "2.json", "Tue, 07 Jan 2025 10:00:00 +0000", "second");
        write_email(dir.path(), "1.json", "Mon, 06 Jan 2025 10:00:00 +0000", "first");
        std::fs::write(dir.path().join("3.json"), "{broken").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let saved = load_saved_emails(dir.path()).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].email.headers.get("Subject"), Some("first"));
        assert_eq!(saved[1].email.headers.get("Subject"), Some("second"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        assert!(load_saved_emails("/nonexistent/phishscore/emails").is_err());
    }

    #[test]
    fn test_run_anomaly_batch_flags_night_email() {
        let dir = tempfile::tempdir().unwrap();
        let weekdays = ["Mon", "Tue", "Wed", "Thu", "Fri"];
        for i in 0..60usize {
            let day = i % 5;
            let date = format!(
                "{}, {:02} Jan 2025 {:02}:15:00 +0000",
                weekdays[day],
                6 + day,
                9 + i % 9
            );
            write_email(dir.path(), &format!("{:03}.json", i), &date, "status");
        }
        write_email(dir.path(), "999.json", "Sun, 12 Jan 2025 03:00:00 +0000", "night");
        write_email(dir.path(), "998.json", "sometime last week", "undated");

        let (saved, report) =
            run_anomaly_batch(dir.path(), &HeaderParser::default(), &AnomalyDetector::default())
                .unwrap();

        assert_eq!(saved.len(), 62);
        assert_eq!(report.rows.len(), 62);
        let night = &report.rows[61];
        assert_eq!(night.features.subject, "night");
        assert!(night.result.is_anomaly);
        assert!(!report.rows[60].features.has_timestamp());
    }
}
