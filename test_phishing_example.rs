#![allow(clippy::uninlined_format_args)]

use phishscore::explain::SummaryExplainer;
use phishscore::machine_learning::{ClassifierArtifact, ClassifierHandle, CorpusRow};
use phishscore::{PipelineConfig, RawEmail, RiskPipeline};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Testing the PayPal credential-phishing example...");

    let raw = RawEmail::from_json_str(
        r#"{
  "from": "PayPal Support <scam@evil.ru>",
  "headers": {
    "Subject": "Urgent: your account has been limited",
    "Date": "Sun, 12 Jan 2025 03:14:07 +0000",
    "From": "PayPal Support <scam@evil.ru>"
  },
  "body": "<html><body><p>URGENT! Please verify your password within 24 hours.</p><a href=\"http://evil.ru/login\">Click here</a> http://evil.ru/a http://evil.ru/b http://evil.ru/c http://evil.ru/d</body></html>"
}"#,
    )?;

    let config = PipelineConfig::default();

    // Default paths: unless a saved model or corpus exists, the classifier answers 0.5
    let degraded = Arc::new(ClassifierHandle::new(config.classifier.clone()));
    let pipeline = RiskPipeline::new(&config, degraded);
    let email = pipeline.parse(&raw);
    println!("\n=== Sender ===");
    println!("  name:      {:?}", email.sender.name);
    println!("  address:   {}", email.sender.address);
    println!("  domain:    {:?}", email.sender.domain);

    let assessment = pipeline.assess(&email)?;
    println!("\n=== Scores (classifier fallback: {}) ===", assessment.degraded);
    println!("  ML score:    {:.3}", assessment.fused.ml_score);
    println!("  Rule score:  {:.3} {:?}", assessment.fused.rule_score, assessment.rules.triggered);
    println!("  Final score: {:.3}", assessment.fused.final_score);
    println!("  Verdict:     {}", assessment.fused.verdict);

    // A tiny in-memory corpus gives the classifier something to say
    let corpus = vec![
        CorpusRow::new("Verify your account", "Urgent: confirm your password now", "alert@secure-login.ru", true),
        CorpusRow::new("Account limited", "Click here to restore access", "service@paypa1.com", true),
        CorpusRow::new("You won the lottery", "Claim your prize, verify bank details", "prize@winner.biz", true),
        CorpusRow::new("Password expires today", "Verify your password to keep access", "it@helpdesk-mail.net", true),
        CorpusRow::new("Team lunch", "Pizza on Friday at noon", "alice@example.com", false),
        CorpusRow::new("Quarterly report", "Draft attached for review", "bob@example.com", false),
        CorpusRow::new("Meeting notes", "Notes from the planning meeting", "carol@example.com", false),
        CorpusRow::new("Holiday schedule", "Office closed next Monday", "hr@example.com", false),
    ];
    let artifact = ClassifierArtifact::train(&corpus, &config.classifier)?;
    let trained = Arc::new(ClassifierHandle::with_artifact(config.classifier.clone(), artifact));
    let pipeline = RiskPipeline::new(&config, trained);

    let assessment = pipeline.assess_with(&email, &SummaryExplainer)?;
    println!("\n=== Scores (trained on {} rows) ===", corpus.len());
    println!("  ML score:    {:.3}", assessment.fused.ml_score);
    println!("  Rule score:  {:.3}", assessment.fused.rule_score);
    println!("  Final score: {:.3}", assessment.fused.final_score);
    println!("  Verdict:     {}", assessment.fused.verdict);
    if let Some(explanation) = &assessment.explanation {
        println!("\n{}", explanation);
    }

    Ok(())
}
