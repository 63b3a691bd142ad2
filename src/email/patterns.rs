// src/email/patterns.rs
use std::collections::HashMap;
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};
use url::Url;

use crate::utils::rate_limit::RateLimiter;
use crate::utils::text::compact_alnum;
use super::verify::MailVerifier;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// Address patterns in generation order with their prior weights
pub const PATTERN_WEIGHTS: &[(&str, f64)] = &[
    ("first.last", 0.4),
    ("flast", 0.3),
    ("firstname", 0.1),
    ("f.last", 0.2),
    ("first_last", 0.1),
];

/// A generated email address with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailCandidate {
    pub email: String,
    pub confidence: f64,
}

impl EmailCandidate {
    pub fn new(email: impl Into<String>, confidence: f64) -> Self {
        Self { email: email.into(), confidence }
    }
}

/// What is known about a person when predicting their address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailLookup {
    pub name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl EmailLookup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Verification {
    mx: bool,
    smtp: bool,
}

impl Verification {
    fn boosted(&self, confidence: f64) -> f64 {
        let mut score = confidence;
        if self.mx {
            score += 0.2;
        }
        if self.smtp {
            score += 0.3;
        }
        if self.mx && self.smtp {
            score += 0.1;
        }
        score.min(1.0)
    }
}

/// Generate and verify possible executive email addresses
pub struct EmailPatternGenerator {
    verifier: Arc<dyn MailVerifier>,
    rate_limiter: RateLimiter,
    verify_cache: Mutex<HashMap<String, Option<Verification>>>,
}

impl EmailPatternGenerator {
    /// `rate_limit` is the minimum number of seconds between SMTP probes
    pub fn new(verifier: Arc<dyn MailVerifier>, rate_limit: f64) -> Self {
        Self {
            verifier,
            rate_limiter: RateLimiter::new(rate_limit),
            verify_cache: Mutex::new(HashMap::new()),
        }
    }

    fn split_name(name: &str) -> (String, String) {
        let lowered = name.trim().to_lowercase();
        let parts: Vec<&str> = lowered.split_whitespace().collect();
        let first = parts.first().map(|s| s.to_string()).unwrap_or_default();
        let last = if parts.len() > 1 {
            parts.last().map(|s| s.to_string()).unwrap_or_default()
        } else {
            String::new()
        };
        (first, last)
    }

    /// Host part of a URL or bare domain, without a leading `www.`
    pub fn extract_domain(value: &str) -> String {
        let value = value.trim();
        let host = if value.contains("://") {
            Url::parse(value)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_string()))
                .unwrap_or_default()
        } else {
            value.split(['/', '?', '#']).next().unwrap_or("").to_string()
        };
        let host = host.to_lowercase();
        host.strip_prefix("www.").map(|h| h.to_string()).unwrap_or(host)
    }

    /// Attempt to determine an organization's mail domain
    pub fn discover_domain(&self, lookup: &EmailLookup) -> Option<String> {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        if let Some(email) = non_empty(&lookup.email) {
            if let Some((_, domain)) = email.rsplit_once('@') {
                return Some(domain.to_lowercase());
            }
        }
        if let Some(website) = non_empty(&lookup.website) {
            let domain = Self::extract_domain(&website);
            if !domain.is_empty() {
                return Some(domain);
            }
        }
        if let Some(domain) = non_empty(&lookup.domain) {
            let domain = Self::extract_domain(&domain);
            if !domain.is_empty() {
                return Some(domain);
            }
        }
        if let Some(org) = non_empty(&lookup.organization) {
            let base = compact_alnum(&org);
            if !base.is_empty() {
                return Some(format!("{}.com", base));
            }
        }
        None
    }

    /// Generate possible email addresses for a contact
    pub fn generate_candidates(&self, lookup: &EmailLookup) -> Vec<EmailCandidate> {
        let Some(domain) = self.discover_domain(lookup) else {
            return Vec::new();
        };
        let (first, last) = Self::split_name(&lookup.name);
        let Some(initial) = first.chars().next() else {
            return Vec::new();
        };

        let mut candidates: Vec<EmailCandidate> = Vec::new();
        for (pattern, weight) in PATTERN_WEIGHTS {
            let local = match (*pattern, last.is_empty()) {
                ("first.last", false) => format!("{}.{}", first, last),
                ("flast", false) => format!("{}{}", initial, last),
                ("f.last", false) => format!("{}.{}", initial, last),
                ("first_last", false) => format!("{}_{}", first, last),
                ("flast", true) | ("f.last", true) => initial.to_string(),
                _ => first.clone(),
            };
            let email = format!("{}@{}", local, domain);

            match candidates.iter_mut().find(|c| c.email == email) {
                Some(existing) => existing.confidence = existing.confidence.max(*weight),
                None => candidates.push(EmailCandidate::new(email, *weight)),
            }
        }

        debug!("Generated {} candidates for {}", candidates.len(), lookup.name);
        candidates
    }

    async fn verify_address(&self, email: &str) -> Option<Verification> {
        if !EMAIL_RE.is_match(email) {
            return None;
        }
        let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();

        let mx = self.verifier.check_mx(domain).await;
        if !mx {
            return None;
        }

        self.rate_limiter.wait().await;
        let smtp = self.verifier.smtp_check(email).await;
        Some(Verification { mx, smtp })
    }

    /// Verify generated emails, keeping MX-valid ones with boosted confidence
    pub async fn verify_emails(&self, candidates: Vec<EmailCandidate>) -> Vec<EmailCandidate> {
        let mut verified = Vec::new();

        for mut candidate in candidates {
            let cached = self.verify_cache.lock().get(&candidate.email).copied();
            let outcome = match cached {
                Some(outcome) => outcome,
                None => {
                    let outcome = self.verify_address(&candidate.email).await;
                    self.verify_cache.lock().insert(candidate.email.clone(), outcome);
                    outcome
                }
            };

            if let Some(verification) = outcome {
                candidate.confidence = verification.boosted(candidate.confidence);
                verified.push(candidate);
            }
        }

        info!("Verified {} email candidates", verified.len());
        verified
    }

    /// Return the highest confidence email, the earliest one on ties
    pub fn get_best_match(candidates: &[EmailCandidate]) -> Option<&EmailCandidate> {
        let mut best: Option<&EmailCandidate> = None;
        for candidate in candidates {
            if best.map_or(true, |b| candidate.confidence > b.confidence) {
                best = Some(candidate);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::verify::MockMailVerifier;

    fn offline_generator() -> EmailPatternGenerator {
        let mut verifier = MockMailVerifier::new();
        verifier.expect_check_mx().returning(|_| false);
        verifier.expect_smtp_check().returning(|_| false);
        EmailPatternGenerator::new(Arc::new(verifier), 0.0)
    }

    fn emails(candidates: &[EmailCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.email.as_str()).collect()
    }

    #[test]
    fn test_generate_candidates() {
        let generator = offline_generator();
        let lookup = EmailLookup::new("Jane Smith").organization("Example Fund");

        let candidates = generator.generate_candidates(&lookup);

        assert_eq!(
            emails(&candidates),
            vec![
                "jane.smith@examplefund.com",
                "jsmith@examplefund.com",
                "jane@examplefund.com",
                "j.smith@examplefund.com",
                "jane_smith@examplefund.com",
            ]
        );
        assert_eq!(candidates[0].confidence, 0.4);
        assert_eq!(candidates[3].confidence, 0.2);
    }

    #[test]
    fn test_domain_discovery_order() {
        let generator = offline_generator();

        let lookup = EmailLookup::new("A B")
            .organization("Org")
            .website("https://www.Trust-A.org/about")
            .email("someone@Mail.Trust-A.org");
        assert_eq!(generator.discover_domain(&lookup).as_deref(), Some("mail.trust-a.org"));

        let lookup = EmailLookup::new("A B").organization("Org").website("https://www.Trust-A.org/about");
        assert_eq!(generator.discover_domain(&lookup).as_deref(), Some("trust-a.org"));

        let lookup = EmailLookup::new("A B").domain("www.fund.net/contact");
        assert_eq!(generator.discover_domain(&lookup).as_deref(), Some("fund.net"));

        assert!(generator.discover_domain(&EmailLookup::new("A B")).is_none());
        assert!(generator.discover_domain(&EmailLookup::new("A B").organization("!!!")).is_none());
    }

    #[test]
    fn test_single_name_collapses_patterns() {
        let generator = offline_generator();
        let candidates = generator.generate_candidates(&EmailLookup::new("Cher").domain("music.com"));

        assert_eq!(emails(&candidates), vec!["cher@music.com", "c@music.com"]);
        assert_eq!(candidates[0].confidence, 0.4);
        assert_eq!(candidates[1].confidence, 0.3);

        assert!(generator.generate_candidates(&EmailLookup::new("  ").domain("music.com")).is_empty());
    }

    #[tokio::test]
    async fn test_verify_cache() {
        let mut verifier = MockMailVerifier::new();
        verifier.expect_check_mx().times(1).returning(|_| true);
        verifier.expect_smtp_check().times(1).returning(|_| true);
        let generator = EmailPatternGenerator::new(Arc::new(verifier), 0.0);

        let candidates = vec![EmailCandidate::new("jane.smith@example.com", 0.5)];
        let first = generator.verify_emails(candidates.clone()).await;
        let second = generator.verify_emails(candidates).await;

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].confidence, 1.0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_verify_scoring_and_filtering() {
        let mut verifier = MockMailVerifier::new();
        verifier.expect_check_mx().returning(|domain| domain == "good.org");
        verifier.expect_smtp_check().returning(|_| false);
        let generator = EmailPatternGenerator::new(Arc::new(verifier), 0.0);

        let verified = generator.verify_emails(vec![
            EmailCandidate::new("a.b@good.org", 0.3),
            EmailCandidate::new("a.b@bad.org", 0.4),
            EmailCandidate::new("not an email", 0.9),
        ]).await;

        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].email, "a.b@good.org");
        assert!((verified[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_get_best_match() {
        let candidates = vec![
            EmailCandidate::new("a@x.com", 0.3),
            EmailCandidate::new("b@x.com", 0.4),
            EmailCandidate::new("c@x.com", 0.4),
        ];
        assert_eq!(EmailPatternGenerator::get_best_match(&candidates).unwrap().email, "b@x.com");
        assert!(EmailPatternGenerator::get_best_match(&[]).is_none());
    }
}
