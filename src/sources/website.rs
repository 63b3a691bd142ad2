// src/sources/website.rs
use std::collections::HashMap;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::StatusCode;
use tracing::{info, debug, warn, error};
use url::Url;

use crate::config::WebsiteConfig;
use crate::error::FinderResult;
use crate::utils::http::HttpClient;
use crate::utils::rate_limit::RateLimiter;
use crate::utils::robots::{RobotsRules, robots_url};
use crate::utils::text::{decode_entities, html_to_lines, html_to_text, role_pattern};
use super::{Executive, OrgRecord, WebsiteSource};

pub const DEFAULT_USER_AGENT: &str = "ContactDiscoveryBot/1.0 (+https://example.com/bot)";

/// Paths tried, in order, when looking for a leadership page
pub const DEFAULT_PATHS: &[&str] = &[
    "about",
    "about/leadership",
    "about-us",
    "leadership",
    "team",
    "management",
];

const LEADERSHIP_KEYWORDS: &[&str] = &["leadership", "team", "executive", "management"];

static RESULT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="result__a"[^>]*href="([^"]+)""#).expect("valid regex"));

/// Scrape organization leadership pages while honoring robots.txt
pub struct WebsiteScraper {
    client: HttpClient,
    user_agent: String,
    rate_limiter: RateLimiter,
    search_url: String,
    robots: Mutex<HashMap<String, RobotsRules>>,
}

impl WebsiteScraper {
    pub fn new(config: &WebsiteConfig) -> FinderResult<Self> {
        let user_agent = if config.user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            config.user_agent.clone()
        };
        let client = HttpClient::new(Some(user_agent.clone()), Some(config.timeout_seconds))?;

        Ok(Self {
            client,
            user_agent,
            rate_limiter: RateLimiter::new(config.rate_limit_seconds),
            search_url: config.search_url.clone(),
            robots: Mutex::new(HashMap::new()),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn robots_for(&self, robots_url: &str) -> RobotsRules {
        if let Some(rules) = self.robots.lock().get(robots_url) {
            return rules.clone();
        }

        let rules = match self.client.get(robots_url).await {
            Ok(response) => match response.status() {
                StatusCode::OK => match response.text().await {
                    Ok(body) => RobotsRules::parse(&body),
                    Err(e) => {
                        info!("robots.txt read failed for {}: {}", robots_url, e);
                        RobotsRules::allow_all()
                    }
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RobotsRules::disallow_all(),
                _ => RobotsRules::allow_all(),
            },
            Err(e) => {
                info!("robots.txt fetch failed for {}: {}", robots_url, e);
                RobotsRules::allow_all()
            }
        };

        self.robots.lock().insert(robots_url.to_string(), rules.clone());
        rules
    }

    async fn allowed(&self, url: &str) -> bool {
        match robots_url(url) {
            Some(robots) => self.robots_for(&robots).await.is_allowed(&self.user_agent, url),
            None => true,
        }
    }

    /// Fetch a page if robots.txt allows it; `None` on any failure
    pub async fn fetch(&self, url: &str) -> Option<String> {
        if !self.allowed(url).await {
            warn!("Blocked by robots.txt: {}", url);
            return None;
        }

        self.rate_limiter.wait().await;

        match self.client.get_text(url).await {
            Ok(Some(body)) if !body.is_empty() => Some(body),
            Ok(_) => None,
            Err(e) => {
                error!("Request error for {}: {}", url, e);
                None
            }
        }
    }

    /// Attempt to discover a website through a search engine
    pub async fn derive_website(&self, org_name: &str) -> Option<String> {
        let query: String = url::form_urlencoded::byte_serialize(org_name.as_bytes()).collect();
        let search_url = format!("{}?q={}", self.search_url, query);

        let html = self.fetch(&search_url).await?;
        let href = RESULT_LINK.captures(&html)?.get(1)?.as_str();
        let href = decode_entities(href);

        if href.contains("uddg=") {
            let query = href.split_once('?').map(|(_, q)| q).unwrap_or(&href);
            if let Some((_, target)) = url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == "uddg") {
                debug!("Derived website {} for {}", target, org_name);
                return Some(target.into_owned());
            }
        }

        debug!("Derived website {} for {}", href, org_name);
        Some(href)
    }

    pub fn contains_leadership_keywords(html: &str) -> bool {
        let text = html_to_text(html);
        LEADERSHIP_KEYWORDS.iter().any(|k| text.contains(k))
    }

    fn base_url(website: &str) -> Option<Url> {
        let website = website.trim();
        if website.contains("://") {
            Url::parse(website).ok()
        } else {
            Url::parse(&format!("https://{}", website)).ok()
        }
    }

    /// Locate a page likely containing leadership information
    pub async fn find_leadership_page(&self, base_url: &str) -> Option<(String, String)> {
        let Some(base) = Self::base_url(base_url) else {
            warn!("Invalid website URL: {}", base_url);
            return None;
        };

        for path in DEFAULT_PATHS {
            let Ok(url) = base.join(path) else { continue };
            if let Some(html) = self.fetch(url.as_str()).await {
                if Self::contains_leadership_keywords(&html) {
                    info!("Leadership page found at {}", url);
                    return Some((url.to_string(), html));
                }
            }
        }

        let html = self.fetch(base.as_str()).await?;
        Some((base.to_string(), html))
    }

    /// Extract executives: a role line, the name above it and an email below it
    pub fn parse_executives<S: AsRef<str>>(html: &str, target_roles: &[S]) -> Vec<Executive> {
        let Some(pattern) = role_pattern(target_roles) else {
            return Vec::new();
        };

        let lines = html_to_lines(html);
        let mut executives = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if !pattern.is_match(&line.to_lowercase()) {
                continue;
            }
            let name = if idx > 0 { lines[idx - 1].clone() } else { String::new() };
            let email = lines.get(idx + 1).filter(|next| next.contains('@')).cloned();

            executives.push(Executive {
                name,
                title: line.clone(),
                email,
                confidence: 0.8,
            });
        }

        executives
    }

    /// Locate executives for an organization, deriving its website when missing
    pub async fn find_executives<S: AsRef<str>>(&self, org: &OrgRecord, target_roles: &[S]) -> Vec<Executive> {
        let website = match org.website.as_deref().filter(|w| !w.trim().is_empty()) {
            Some(website) => website.to_string(),
            None => match self.derive_website(&org.name).await {
                Some(website) => website,
                None => {
                    debug!("No website found for {}", org.name);
                    return Vec::new();
                }
            },
        };

        let Some((_, html)) = self.find_leadership_page(&website).await else {
            return Vec::new();
        };

        let mut executives = Self::parse_executives(&html, target_roles);
        for executive in &mut executives {
            executive.confidence = (executive.confidence + 0.1).min(1.0);
        }

        info!("Found {} executives for {}", executives.len(), org.name);
        executives
    }
}

#[async_trait]
impl WebsiteSource for WebsiteScraper {
    async fn find_executives(&self, org: &OrgRecord, roles: &[String]) -> FinderResult<Vec<Executive>> {
        Ok(WebsiteScraper::find_executives(self, org, roles).await)
    }
}
