// src/sources/mod.rs
//! Contact sources consumed by the integration and the test harness

pub mod filings;
pub mod linkedin;
pub mod twitter;
pub mod website;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::core::organization::Organization;
use crate::error::FinderResult;

pub use filings::{PublicFilingsFinder, Filing, ContactInfo, FilingQuery};
pub use linkedin::LinkedInFinder;
pub use twitter::{TwitterFinder, TwitterUser};
pub use website::WebsiteScraper;

/// Organization as given to the website scraper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgRecord {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
}

impl OrgRecord {
    pub fn new(name: impl Into<String>, website: Option<String>) -> Self {
        Self { name: name.into(), website }
    }
}

/// Executive found on an organization's website
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executive {
    pub name: String,
    pub title: String,
    pub email: Option<String>,
    pub confidence: f64,
}

/// A profile link returned by a platform search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileHit {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Publicly visible fields of a profile page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileVerification {
    pub profile: ProfileInfo,
    pub confidence: f64,
}

/// Row returned by an industry contact database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_entry_confidence")]
    pub confidence: f64,
}

fn default_entry_confidence() -> f64 {
    0.5
}

/// Executives listed on organization websites
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebsiteSource: Send + Sync {
    async fn find_executives(&self, org: &OrgRecord, roles: &[String]) -> FinderResult<Vec<Executive>>;
}

/// Officer contacts from public filings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FilingsSource: Send + Sync {
    async fn find_contacts(&self, query: &FilingQuery, roles: &[String]) -> FinderResult<Vec<ContactInfo>>;
}

/// Industry contact database lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseSource: Send + Sync {
    async fn search(&self, org: &Organization, roles: &[String]) -> FinderResult<Vec<DatabaseEntry>>;
}

/// Professional network profile search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileFinder: Send + Sync {
    /// Profile links for people matching the query
    async fn search_profiles(&self, query: &str) -> FinderResult<Vec<ProfileHit>>;

    /// Company page links matching the query
    async fn search_companies(&self, query: &str) -> FinderResult<Vec<String>>;

    async fn extract_public_info(&self, profile_url: &str) -> FinderResult<ProfileInfo>;

    /// Start over with a fresh session
    async fn rotate_session(&self) -> FinderResult<()>;

    /// Compare the profile's name against the expected one
    async fn verify_profile(&self, profile_url: &str, expected_name: &str) -> FinderResult<ProfileVerification> {
        let profile = self.extract_public_info(profile_url).await?;
        let matches = profile
            .name
            .as_deref()
            .map(|name| name.to_lowercase().contains(&expected_name.to_lowercase()))
            .unwrap_or(false);

        Ok(ProfileVerification {
            profile,
            confidence: if matches { 0.9 } else { 0.0 },
        })
    }
}
