use crate::anomaly::SentinelPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PipelineConfig {
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: String,
    pub corpus_path: String,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub max_features: usize,
    pub min_holdout_accuracy: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2_penalty: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: "models/phishing_model.json".to_string(),
            corpus_path: "data/phishing_email_dataset.csv".to_string(),
            test_fraction: 0.2,
            split_seed: 42,
            max_features: 5000,
            min_holdout_accuracy: 0.0,
            learning_rate: 0.5,
            epochs: 300,
            l2_penalty: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RulesConfig {
    pub suspicious_keywords: Vec<String>,
    pub link_threshold: usize,
    /// brand name -> domains that legitimately send for it
    pub brands: BTreeMap<String, Vec<String>>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let mut brands = BTreeMap::new();
        brands.insert(
            "paypal".to_string(),
            vec!["paypal.com".to_string(), "paypal.me".to_string()],
        );
        brands.insert(
            "amazon".to_string(),
            vec![
                "amazon.com".to_string(),
                "amazon.co.uk".to_string(),
                "amazon.de".to_string(),
                "amazonses.com".to_string(),
            ],
        );
        // Generic term, no sender domain can own it
        brands.insert("bank".to_string(), vec![]);

        Self {
            suspicious_keywords: [
                "urgent",
                "verify",
                "password",
                "bank",
                "lottery",
                "click here",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            link_threshold: 3,
            brands,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DomainsConfig {
    pub use_public_suffixes: bool,
    pub public_suffixes: Vec<String>,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            use_public_suffixes: true,
            public_suffixes: [
                "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "ltd.uk", "plc.uk", "net.uk",
                "com.au", "net.au", "org.au", "edu.au", "gov.au", "co.nz", "org.nz", "net.nz",
                "co.jp", "ne.jp", "or.jp", "ac.jp", "co.kr", "or.kr", "co.in", "net.in",
                "org.in", "com.br", "net.br", "org.br", "com.cn", "net.cn", "org.cn", "com.mx",
                "com.ar", "com.tr", "co.za", "com.sg", "com.hk", "com.tw", "co.il", "com.ru",
                "com.ua", "com.pl", "co.id", "com.my", "com.ph", "com.vn", "com.ng", "co.ke",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AnomalyConfig {
    pub contamination: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub max_samples: usize,
    pub date_format: String,
    /// Only this many leading characters of the Date header are parsed
    pub date_prefix_len: usize,
    pub sentinel_policy: SentinelPolicy,
    pub model_path: Option<String>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            seed: 42,
            n_trees: 100,
            max_samples: 256,
            date_format: "%a, %d %b %Y %H:%M:%S".to_string(),
            date_prefix_len: 25,
            sentinel_policy: SentinelPolicy::Include,
            model_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn default_path() -> &'static str {
        "/etc/phishscore.toml"
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let anomaly = &self.anomaly;
        if !(anomaly.contamination > 0.0 && anomaly.contamination <= 0.5) {
            anyhow::bail!(
                "anomaly.contamination must be in (0, 0.5], got {}",
                anomaly.contamination
            );
        }
        if anomaly.n_trees == 0 || anomaly.max_samples < 2 {
            anyhow::bail!("anomaly.n_trees must be > 0 and anomaly.max_samples >= 2");
        }
        let classifier = &self.classifier;
        if !(classifier.test_fraction > 0.0 && classifier.test_fraction < 1.0) {
            anyhow::bail!(
                "classifier.test_fraction must be in (0, 1), got {}",
                classifier.test_fraction
            );
        }
        if classifier.max_features == 0 {
            anyhow::bail!("classifier.max_features must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = PipelineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed.rules.link_threshold, 3);
        assert_eq!(parsed.anomaly.sentinel_policy, SentinelPolicy::Include);
        assert_eq!(parsed.rules.brands.get("paypal").unwrap()[0], "paypal.com");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let text = r#"
[anomaly]
contamination = 0.1
sentinel_policy = "exclude_from_fit"
"#;
        let config: PipelineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.anomaly.contamination, 0.1);
        assert_eq!(config.anomaly.sentinel_policy, SentinelPolicy::ExcludeFromFit);
        assert_eq!(config.anomaly.seed, 42);
        assert_eq!(config.classifier.max_features, 5000);
        assert_eq!(config.rules.suspicious_keywords.len(), 6);
    }

    #[test]
    fn test_invalid_contamination_rejected() {
        let mut config = PipelineConfig::default();
        config.anomaly.contamination = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_and_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phishscore.toml");
        PipelineConfig::default().to_file(&path).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.classifier.split_seed, 42);
    }
}
