// src/identifier.rs
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::utils::text::{normalize_title, similarity};

/// Where a contact record was found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactSource {
    Website,
    Filing,
    Linkedin,
    Database,
    #[default]
    #[serde(other)]
    Other,
}

impl ContactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSource::Website => "website",
            ContactSource::Filing => "filing",
            ContactSource::Linkedin => "linkedin",
            ContactSource::Database => "database",
            ContactSource::Other => "other",
        }
    }
}

impl fmt::Display for ContactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw contact information from a single source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: ContactSource,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn new(name: impl Into<String>, title: impl Into<String>, source: ContactSource) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            source,
            ..Default::default()
        }
    }
}

/// Contact matched to a target role with a confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedContact {
    pub name: String,
    pub title: String,
    pub role: String,
    pub source: ContactSource,
    pub score: f64,
    #[serde(skip)]
    raw_score: f64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MatchedContact {
    /// Unnormalized sum of all scoring components
    pub fn raw_score(&self) -> f64 {
        self.raw_score
    }
}

/// Role names with the title patterns that identify them
pub const ROLE_PATTERNS: &[(&str, &[&str])] = &[
    ("General Counsel", &["general counsel", "chief legal officer", "legal counsel"]),
    ("Deputy General Counsel", &["deputy general counsel", "associate counsel", "assistant general counsel"]),
    ("CFO", &["chief financial officer", "finance director", "treasurer"]),
    ("Revenue Officer", &["revenue director", "collections manager"]),
];

const FUZZY_THRESHOLD: f64 = 0.85;

/// Identify executive roles from contact records
#[derive(Debug, Clone)]
pub struct ContactIdentifier {
    patterns: Vec<(String, Vec<String>)>,
}

impl Default for ContactIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactIdentifier {
    pub fn new() -> Self {
        let patterns = ROLE_PATTERNS
            .iter()
            .map(|(role, patterns)| {
                (role.to_string(), patterns.iter().map(|p| normalize_title(p)).collect())
            })
            .collect();
        Self { patterns }
    }

    /// Role names in matching order
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(role, _)| role.as_str())
    }

    fn title_score(&self, title: &str, patterns: &[String]) -> f64 {
        let normalized = normalize_title(title);
        if normalized.is_empty() {
            return 0.0;
        }
        if patterns.iter().any(|p| *p == normalized) {
            return 1.0;
        }
        for p in patterns {
            if p.contains(&normalized) || normalized.contains(p.as_str()) {
                return 0.8;
            }
            if similarity(&normalized, p) > FUZZY_THRESHOLD {
                return 0.6;
            }
        }
        0.0
    }

    fn source_score(contact: &Contact) -> f64 {
        match contact.source {
            ContactSource::Website => 1.0,
            ContactSource::Filing => 0.9,
            ContactSource::Linkedin => 0.8,
            ContactSource::Database | ContactSource::Other => 0.5,
        }
    }

    fn completeness_score(contact: &Contact) -> f64 {
        let mut score = 0.0;
        if !contact.name.is_empty() {
            score += 0.2;
        }
        if !contact.title.is_empty() {
            score += 0.2;
        }
        if contact.email.is_some() || contact.phone.is_some() {
            score += 0.2;
        }
        score
    }

    fn recency_score(contact: &Contact, now: DateTime<Utc>) -> f64 {
        let Some(updated_at) = contact.updated_at else {
            return 0.0;
        };
        let age_days = (now - updated_at).num_days();
        if age_days < 365 {
            0.2
        } else if age_days < 730 {
            0.1
        } else {
            0.0
        }
    }

    /// Match contacts to target roles and return the best candidate per role
    pub fn categorize_contacts(&self, contacts: &[Contact]) -> Vec<MatchedContact> {
        self.categorize_contacts_at(contacts, Utc::now())
    }

    /// Same as `categorize_contacts` with recency measured against `now`
    pub fn categorize_contacts_at(&self, contacts: &[Contact], now: DateTime<Utc>) -> Vec<MatchedContact> {
        let mut results = Vec::new();

        for (role, patterns) in &self.patterns {
            let mut best: Option<MatchedContact> = None;

            for contact in contacts {
                let title_score = self.title_score(&contact.title, patterns);
                if title_score == 0.0 {
                    continue;
                }

                let raw_score = title_score
                    + Self::source_score(contact)
                    + Self::completeness_score(contact)
                    + Self::recency_score(contact, now);
                let score = (raw_score / 2.0).min(1.0);

                let better = match &best {
                    Some(current) => (raw_score, score) > (current.raw_score, current.score),
                    None => true,
                };
                if better {
                    best = Some(MatchedContact {
                        name: contact.name.clone(),
                        title: contact.title.clone(),
                        role: role.clone(),
                        source: contact.source,
                        score,
                        raw_score,
                        email: contact.email.clone(),
                        phone: contact.phone.clone(),
                        updated_at: contact.updated_at,
                    });
                }
            }

            if let Some(matched) = best {
                debug!("Role {} -> {} ({:.2})", role, matched.name, matched.score);
                results.push(matched);
            }
        }

        results
    }
}
