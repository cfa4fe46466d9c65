use std::collections::HashSet;

/// Minimal domain hierarchy utilities
pub struct DomainUtils;

impl DomainUtils {
    /// Host part of an email address, lowercased. `None` when there is no `@`
    pub fn extract_domain(email: &str) -> Option<String> {
        let at_pos = email.rfind('@')?;
        let host = email[at_pos + 1..]
            .trim()
            .trim_end_matches('>')
            .trim_end_matches('.')
            .to_lowercase();
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }

    /// Check if domain matches any in list (with hierarchy support)
    pub fn matches_domain_list(domain: &str, domain_list: &[String]) -> bool {
        let domain_lower = domain.to_lowercase();

        for pattern in domain_list {
            let pattern_lower = pattern.to_lowercase();

            if domain_lower == pattern_lower {
                return true;
            }

            if domain_lower.ends_with(&format!(".{}", pattern_lower)) {
                return true;
            }
        }

        false
    }

    /// Canonicalize domain (remove www prefix)
    pub fn canonicalize_domain(domain: &str) -> String {
        let domain_lower = domain.to_lowercase();
        if let Some(stripped) = domain_lower.strip_prefix("www.") {
            stripped.to_string()
        } else {
            domain_lower
        }
    }
}

/// Registrable domain and the labels in front of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSplit {
    pub domain: String,
    pub subdomain: Option<String>,
}

/// Public-suffix lookup. Only multi-label suffixes need listing; any final
/// label is treated as a suffix on its own.
#[derive(Debug, Clone, Default)]
pub struct SuffixTable {
    suffixes: HashSet<String>,
    enabled: bool,
}

impl SuffixTable {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(|s| s.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            enabled: true,
        }
    }

    /// No table: hosts are reported as-is
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reduce a host to its registrable domain (one label plus public suffix)
    pub fn split(&self, host: &str) -> DomainSplit {
        let host = host.trim_end_matches('.').to_lowercase();
        if !self.enabled {
            return DomainSplit {
                domain: host,
                subdomain: None,
            };
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() < 2 {
            return DomainSplit {
                domain: host,
                subdomain: None,
            };
        }

        // Longest listed suffix wins; a bare TLD is always a suffix
        let mut suffix_len = 1;
        for take in (2..labels.len()).rev() {
            let candidate = labels[labels.len() - take..].join(".");
            if self.suffixes.contains(&candidate) {
                suffix_len = take;
                break;
            }
        }

        if labels.len() <= suffix_len {
            return DomainSplit {
                domain: host,
                subdomain: None,
            };
        }

        let registrable_start = labels.len() - suffix_len - 1;
        let domain = labels[registrable_start..].join(".");
        let subdomain = if registrable_start > 0 {
            Some(labels[..registrable_start].join("."))
        } else {
            None
        };

        DomainSplit { domain, subdomain }
    }
}
