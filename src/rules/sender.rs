use super::{Rule, RuleContext};
use crate::domain_utils::DomainUtils;
use crate::email::Sender;
use regex::Regex;
use std::collections::BTreeMap;

/// One point when the sender address is malformed OR the display string
/// names a trusted brand whose domains do not include the sender's.
/// Both conditions feed the same predicate; they never add up to two points.
pub struct SenderRule {
    address_regex: Regex,
    brands: BTreeMap<String, Vec<String>>,
}

impl SenderRule {
    pub fn new(brands: &BTreeMap<String, Vec<String>>) -> Self {
        Self {
            address_regex: Regex::new(r"^[^@\s<>]+@[^@\s<>]+\.[^@\s<>]+$")
                .expect("address pattern is valid"),
            brands: brands
                .iter()
                .map(|(brand, domains)| {
                    (
                        brand.to_lowercase(),
                        domains.iter().map(|d| d.to_lowercase()).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn is_well_formed(&self, sender: &Sender) -> bool {
        self.address_regex.is_match(&sender.address)
    }

    /// Brand named in the display string but not owning the sender domain
    pub fn impersonated_brand(&self, sender: &Sender) -> Option<&str> {
        let display = sender.raw.to_lowercase();
        let host = DomainUtils::extract_domain(&sender.address)
            .map(|h| DomainUtils::canonicalize_domain(&h));

        self.brands
            .iter()
            .find(|(brand, domains)| {
                display.contains(brand.as_str())
                    && !host
                        .as_deref()
                        .is_some_and(|h| DomainUtils::matches_domain_list(h, domains))
            })
            .map(|(brand, _)| brand.as_str())
    }
}

impl Rule for SenderRule {
    fn triggered(&self, context: &RuleContext) -> bool {
        let sender = &context.email.sender;
        if !self.is_well_formed(sender) {
            log::debug!("Malformed sender address: {:?}", sender.address);
            return true;
        }
        if let Some(brand) = self.impersonated_brand(sender) {
            log::debug!(
                "Sender {:?} mentions brand {} from an unrelated domain",
                sender.raw,
                brand
            );
            return true;
        }
        false
    }

    fn name(&self) -> &str {
        "sender_identity"
    }
}
