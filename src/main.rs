use clap::{Arg, Command};
use log::LevelFilter;
use phishscore::anomaly::AnomalyDetector;
use phishscore::batch::run_anomaly_batch;
use phishscore::email::{HeaderParser, RawEmail};
use phishscore::explain::SummaryExplainer;
use phishscore::machine_learning::ClassifierHandle;
use phishscore::pipeline::RiskPipeline;
use phishscore::PipelineConfig;
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    let matches = Command::new("phishscore")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Email phishing risk scoring")
        .long_about(
            "phishscore combines a trained text classifier with heuristic rules to\n\
             score saved emails, and flags emails sent at unusual times across a batch.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(PipelineConfig::default_path()),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging with per-email scoring details")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("score")
                .long("score")
                .value_name("FILE")
                .help("Score a saved-email JSON file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("explain")
                .long("explain")
                .help("Attach a summary of the signals behind the verdict (with --score)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print machine-readable JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("train")
                .long("train")
                .help("Train the classifier from the configured corpus and save it")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("anomalies")
                .long("anomalies")
                .value_name("DIR")
                .help("Run the send-time anomaly detector over a directory of saved emails")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("List every row, not only flagged ones (with --anomalies)")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(PipelineConfig::default_path());
    let (config, config_found) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config
            .logging
            .as_ref()
            .and_then(|l| l.level.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    let json = matches.get_flag("json");

    let result = if matches.get_flag("train") {
        train(&config, json)
    } else if let Some(email_file) = matches.get_one::<String>("score") {
        score_email_file(&config, email_file, matches.get_flag("explain"), json)
    } else if let Some(dir) = matches.get_one::<String>("anomalies") {
        detect_anomalies(&config, dir, matches.get_flag("all"), json)
    } else {
        eprintln!("Nothing to do: use --score FILE, --train or --anomalies DIR (see --help)");
        process::exit(2);
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<(PipelineConfig, bool)> {
    if Path::new(path).exists() {
        Ok((PipelineConfig::load_from_file(path)?, true))
    } else {
        Ok((PipelineConfig::default(), false))
    }
}

fn generate_default_config(path: &str) {
    let config = PipelineConfig::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn train(config: &PipelineConfig, json: bool) -> anyhow::Result<()> {
    let handle = ClassifierHandle::new(config.classifier.clone());
    let report = handle.train_from_corpus()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Classifier trained and saved to {}", config.classifier.model_path);
    println!("  Training rows: {}", report.train_size);
    println!("  Held-out rows: {}", report.test_size);
    println!("  Accuracy:      {:.3}", report.accuracy);
    println!("  Precision:     {:.3}", report.precision);
    println!("  Recall:        {:.3}", report.recall);
    println!("  F1:            {:.3}", report.f1);
    Ok(())
}

fn score_email_file(
    config: &PipelineConfig,
    email_file: &str,
    explain: bool,
    json: bool,
) -> anyhow::Result<()> {
    let raw = RawEmail::from_file(email_file)?;
    let classifier = Arc::new(ClassifierHandle::new(config.classifier.clone()));
    let pipeline = RiskPipeline::new(config, classifier);
    let email = pipeline.parse(&raw);

    let assessment = if explain {
        pipeline.assess_with(&email, &SummaryExplainer)?
    } else {
        pipeline.assess(&email)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("Email:      {email_file}");
    println!("From:       {}", assessment.sender);
    println!("Subject:    {}", truncate_string(&assessment.subject, 70));
    println!();
    println!("ML score:   {:.3}", assessment.fused.ml_score);
    println!(
        "Rule score: {:.3} ({}/{} rules)",
        assessment.fused.rule_score,
        assessment.rules.triggered.len(),
        assessment.rules.total
    );
    for rule in &assessment.rules.triggered {
        println!("  - {rule}");
    }
    println!("Final:      {:.3}", assessment.fused.final_score);
    println!("Verdict:    {}", assessment.fused.verdict);
    if assessment.degraded {
        println!("Note: no classifier model available, ML score is the 0.5 fallback");
        if let Some(reason) = pipeline.classifier().degraded_reason() {
            println!("      ({reason})");
        }
    }
    if let Some(explanation) = &assessment.explanation {
        println!();
        println!("{explanation}");
    }
    Ok(())
}

fn detect_anomalies(config: &PipelineConfig, dir: &str, all: bool, json: bool) -> anyhow::Result<()> {
    let parser = HeaderParser::from_config(&config.domains);
    let detector = AnomalyDetector::new(config.anomaly.clone());
    let (saved, report) = run_anomaly_batch(dir, &parser, &detector)?;

    if let (Some(path), Some(forest)) = (&config.anomaly.model_path, &report.forest) {
        forest.save(path)?;
    }

    let listed: Vec<_> = saved
        .iter()
        .zip(&report.rows)
        .filter(|(_, row)| all || row.result.is_anomaly)
        .collect();

    if json {
        let rows: Vec<_> = listed.iter().map(|(_, row)| row).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{} emails analysed, {} flagged",
        report.rows.len(),
        report.flagged().count()
    );
    for (email, row) in listed {
        let file_name = email
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "{:>3} {:<12} hour={:>2} day={:>2} len={:>6}  {:<30} {}",
            row.result.anomaly_score,
            truncate_string(&file_name, 12),
            row.features.hour,
            row.features.day_of_week,
            row.features.body_length,
            truncate_string(&row.features.sender, 30),
            truncate_string(&row.features.subject, 50)
        );
    }
    Ok(())
}
