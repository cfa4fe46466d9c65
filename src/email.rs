//! Email records consumed by the pipeline
//!
//! `RawEmail` is the saved-email JSON document produced by the mail-fetching
//! side (`{"from": .., "headers": {..}, "body": ..}`). `HeaderParser` turns it
//! into a `ParsedEmail`, the immutable unit every scorer works on. Malformed
//! senders and dates become `None` fields; parsing never fails once the JSON
//! itself is readable.

use crate::domain_utils::{DomainUtils, SuffixTable};
use crate::error::PipelineError;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Header fields in document order. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, compared case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Headers, E> {
                Ok(Headers::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Headers::default();
                while let Some((key, value)) = access.next_entry::<String, Option<String>>()? {
                    headers.insert(key, value.unwrap_or_default());
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_any(HeadersVisitor)
    }
}

/// Saved-email document as stored by the fetcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEmail {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<String>,
}

impl RawEmail {
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::Email(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }
}

/// Structured sender identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// The sender string exactly as received, display name included
    pub raw: String,
    pub name: Option<String>,
    pub address: String,
    /// Registrable domain; `None` when the address has no `@`
    pub domain: Option<String>,
    pub subdomain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMetadata {
    pub subject: Option<String>,
    pub date: Option<String>,
    pub received: Option<String>,
}

/// Immutable input unit for scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub sender: Sender,
    pub subject: String,
    pub body: String,
    pub headers: Headers,
    pub received_at: Option<DateTime<FixedOffset>>,
}

pub struct HeaderParser {
    suffixes: SuffixTable,
    sender_regex: Regex,
}

impl HeaderParser {
    pub fn new(suffixes: SuffixTable) -> Self {
        Self {
            suffixes,
            sender_regex: Regex::new(r"^(.*)<(.*)>").expect("sender pattern is valid"),
        }
    }

    pub fn from_config(config: &crate::config::DomainsConfig) -> Self {
        if config.use_public_suffixes {
            Self::new(SuffixTable::new(&config.public_suffixes))
        } else {
            Self::new(SuffixTable::disabled())
        }
    }

    /// Accepts `Name <addr>` and bare-address forms
    pub fn parse_sender(&self, raw: &str) -> Sender {
        let (name, address) = match self.sender_regex.captures(raw) {
            Some(caps) => {
                let name = caps
                    .get(1)
                    .map(|m| m.as_str().trim().trim_matches('"').trim().to_string())
                    .filter(|n| !n.is_empty());
                let address = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
                (name, address.to_string())
            }
            None => (None, raw.trim().to_string()),
        };

        let (domain, subdomain) = match DomainUtils::extract_domain(&address) {
            Some(host) => {
                let split = self.suffixes.split(&host);
                (Some(split.domain), split.subdomain)
            }
            None => (None, None),
        };

        Sender {
            raw: raw.to_string(),
            name,
            address,
            domain,
            subdomain,
        }
    }

    /// Pure projection of the headers the pipeline cares about
    pub fn parse_headers(&self, headers: &Headers) -> HeaderMetadata {
        HeaderMetadata {
            subject: headers.get("Subject").map(str::to_string),
            date: headers.get("Date").map(str::to_string),
            received: headers.get("Received").map(str::to_string),
        }
    }

    pub fn parse_email(&self, raw: &RawEmail) -> ParsedEmail {
        let metadata = self.parse_headers(&raw.headers);
        let sender_raw = raw
            .from
            .as_deref()
            .or_else(|| raw.headers.get("From"))
            .unwrap_or_default();

        ParsedEmail {
            sender: self.parse_sender(sender_raw),
            subject: metadata.subject.unwrap_or_default().trim().to_string(),
            body: raw.body.clone().unwrap_or_default(),
            headers: raw.headers.clone(),
            received_at: metadata.date.as_deref().and_then(parse_rfc2822_date),
        }
    }

    /// Build a ParsedEmail from loose parts
    pub fn parse_parts(&self, from: &str, subject: &str, body: &str, headers: Headers) -> ParsedEmail {
        let received_at = headers.get("Date").and_then(parse_rfc2822_date);
        ParsedEmail {
            sender: self.parse_sender(from),
            subject: subject.to_string(),
            body: body.to_string(),
            headers,
            received_at,
        }
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::from_config(&crate::config::DomainsConfig::default())
    }
}

/// RFC 2822 Date header, tolerating a trailing `(Zone)` comment
pub fn parse_rfc2822_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    let value = match value.find(" (") {
        Some(pos) => &value[..pos],
        None => value,
    };
    DateTime::parse_from_rfc2822(value).ok()
}
