// src/sources/filings.rs
use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::{info, debug, warn};
use url::Url;

use crate::config::FilingsConfig;
use crate::error::{FinderResult, FinderError};
use crate::utils::cache::ResultCache;
use crate::utils::http::HttpClient;
use crate::utils::rate_limit::{RateLimiter, retry_with_backoff, secs};
use crate::utils::text::{html_to_lines, role_pattern};
use super::FilingsSource;

static PHONE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3}.*\d{4}").expect("valid regex"));

/// Criteria for a filing search; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilingQuery {
    pub ein: Option<String>,
    pub org_name: Option<String>,
    pub year: Option<i32>,
}

impl FilingQuery {
    pub fn by_ein(ein: impl ToString) -> Self {
        Self { ein: Some(ein.to_string()), ..Default::default() }
    }
}

/// Single filing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub ein: String,
    pub organization_name: String,
    pub year: i32,
    pub form_type: String,
    pub url: Option<String>,
    pub local_path: Option<PathBuf>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

/// Officer contact extracted from a filing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub title: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilingKind {
    Structured,
    Markup,
    Pdf,
}

/// Locate and parse public filings such as Form 5500 documents
pub struct PublicFilingsFinder {
    client: HttpClient,
    rate_limiter: RateLimiter,
    local_dir: Option<PathBuf>,
    search_url: Option<String>,
    cache: ResultCache,
    retries: u32,
    backoff_base: Duration,
}

impl PublicFilingsFinder {
    pub fn new(config: &FilingsConfig, client: HttpClient, cache: ResultCache) -> Self {
        Self {
            client,
            rate_limiter: RateLimiter::new(config.rate_limit_seconds),
            local_dir: config.local_dir.clone(),
            search_url: config.search_url.clone(),
            cache,
            retries: config.retries,
            backoff_base: secs(config.backoff_base_seconds),
        }
    }

    async fn fetch(&self, url: &str) -> FinderResult<Vec<u8>> {
        if let Some(bytes) = self.cache.get_bytes(url).await {
            debug!("Filing cache hit: {}", url);
            return Ok(bytes);
        }

        let client = &self.client;
        let limiter = &self.rate_limiter;
        let bytes = retry_with_backoff(&format!("fetch {}", url), self.retries, self.backoff_base, move || async move {
            limiter.wait().await;
            client.get_bytes(url).await
        })
        .await?;

        self.cache.insert_bytes(url, bytes.clone()).await;
        Ok(bytes)
    }

    async fn load_local(&self, path: &Path) -> FinderResult<Vec<u8>> {
        let key = path.display().to_string();
        if let Some(bytes) = self.cache.get_bytes(&key).await {
            return Ok(bytes);
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| FinderError::file(path, e))?;
        self.cache.insert_bytes(&key, bytes.clone()).await;
        Ok(bytes)
    }

    /// Search for filings matching the query, newest first
    pub async fn find_filings(&self, query: &FilingQuery) -> FinderResult<Vec<Filing>> {
        let mut filings = match (&self.local_dir, &self.search_url) {
            (Some(dir), _) => self.find_local(dir, query).await?,
            (None, Some(search_url)) => self.find_remote(search_url, query).await?,
            (None, None) => {
                debug!("No filing source configured");
                Vec::new()
            }
        };

        filings.sort_by(|a, b| b.year.cmp(&a.year));
        info!("Found {} filings", filings.len());
        Ok(filings)
    }

    async fn find_local(&self, dir: &Path, query: &FilingQuery) -> FinderResult<Vec<Filing>> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| FinderError::file(dir, e))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| FinderError::file(dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut filings = Vec::new();
        for path in paths {
            let data: Value = match tokio::fs::read_to_string(&path)
                .await
                .map_err(FinderError::from)
                .and_then(|text| serde_json::from_str(&text).map_err(FinderError::from))
            {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping unreadable filing {}: {}", path.display(), e);
                    continue;
                }
            };

            let mut filing = filing_from_value(&data);
            if !query_matches(query, &filing) {
                continue;
            }
            filing.local_path = Some(path);
            filings.push(filing);
        }

        Ok(filings)
    }

    async fn find_remote(&self, search_url: &str, query: &FilingQuery) -> FinderResult<Vec<Filing>> {
        let mut url = Url::parse(search_url)
            .map_err(|e| FinderError::ConfigError(format!("Invalid filings search URL {}: {}", search_url, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(ein) = &query.ein {
                pairs.append_pair("ein", ein);
            }
            if let Some(name) = &query.org_name {
                pairs.append_pair("name", name);
            }
            if let Some(year) = query.year {
                pairs.append_pair("year", &year.to_string());
            }
        }

        info!("Querying {}", url);
        let body = self.fetch(url.as_str()).await?;
        let results: Value = match serde_json::from_slice(&body) {
            Ok(results) => results,
            Err(e) => {
                warn!("Filings search returned invalid JSON: {}", e);
                return Ok(Vec::new());
            }
        };

        Ok(results
            .get("filings")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(filing_from_value).collect())
            .unwrap_or_default())
    }

    async fn content_of(&self, filing: &Filing) -> FinderResult<Option<Vec<u8>>> {
        if let Some(content) = &filing.content {
            return Ok(Some(content.clone()));
        }
        if let Some(path) = &filing.local_path {
            return self.load_local(path).await.map(Some);
        }
        if let Some(url) = &filing.url {
            return self.fetch(url).await.map(Some);
        }
        Ok(None)
    }

    /// Extract officer contacts whose titles match one of the roles
    pub async fn extract_contacts<S: AsRef<str>>(&self, filings: &[Filing], target_roles: &[S]) -> Vec<ContactInfo> {
        let Some(pattern) = role_pattern(target_roles) else {
            return Vec::new();
        };
        let current_year = Utc::now().year();
        let mut contacts = Vec::new();

        for filing in filings {
            let content = match self.content_of(filing).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to load filing for EIN {}: {}", filing.ein, e);
                    continue;
                }
            };

            let mut found = match filing_kind(filing, &content) {
                FilingKind::Structured => match serde_json::from_slice::<Value>(&content) {
                    Ok(data) => parse_structured(&data, &pattern),
                    Err(e) => {
                        warn!("Invalid structured filing for EIN {}: {}", filing.ein, e);
                        continue;
                    }
                },
                FilingKind::Markup => parse_text(&String::from_utf8_lossy(&content), &pattern),
                FilingKind::Pdf => match pdf_text(content).await {
                    Ok(text) => parse_text(&text, &pattern),
                    Err(e) => {
                        warn!("Unreadable PDF filing for EIN {}: {}", filing.ein, e);
                        continue;
                    }
                },
            };

            for contact in &mut found {
                contact.confidence = score_contact(filing.year, contact, current_year);
            }
            contacts.extend(found);
        }

        contacts
    }
}

#[async_trait]
impl FilingsSource for PublicFilingsFinder {
    async fn find_contacts(&self, query: &FilingQuery, roles: &[String]) -> FinderResult<Vec<ContactInfo>> {
        let filings = self.find_filings(query).await?;
        Ok(self.extract_contacts(&filings, roles).await)
    }
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn filing_from_value(data: &Value) -> Filing {
    let year = match data.get("year") {
        Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };

    Filing {
        ein: value_to_string(data.get("ein")).unwrap_or_default(),
        organization_name: value_to_string(data.get("organization_name")).unwrap_or_default(),
        year,
        form_type: value_to_string(data.get("form_type")).unwrap_or_default(),
        url: value_to_string(data.get("url")),
        local_path: None,
        content: None,
    }
}

fn query_matches(query: &FilingQuery, filing: &Filing) -> bool {
    if let Some(ein) = query.ein.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if filing.ein.trim() != ein {
            return false;
        }
    }
    if let Some(name) = query.org_name.as_deref().filter(|n| !n.is_empty()) {
        if !filing.organization_name.to_lowercase().contains(&name.to_lowercase()) {
            return false;
        }
    }
    if let Some(year) = query.year {
        if filing.year != year {
            return false;
        }
    }
    true
}

fn filing_kind(filing: &Filing, content: &[u8]) -> FilingKind {
    let extension = filing
        .local_path
        .as_ref()
        .and_then(|p| p.extension().and_then(|e| e.to_str()).map(str::to_lowercase))
        .or_else(|| {
            filing.url.as_deref().and_then(|u| {
                let path = Url::parse(u).ok()?.path().to_string();
                path.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
            })
        });

    match extension.as_deref() {
        Some("json") => return FilingKind::Structured,
        Some("html") | Some("htm") => return FilingKind::Markup,
        Some("pdf") => return FilingKind::Pdf,
        _ => {}
    }

    if content.starts_with(b"%PDF") {
        return FilingKind::Pdf;
    }
    match content.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => FilingKind::Structured,
        _ => FilingKind::Markup,
    }
}

fn parse_structured(data: &Value, pattern: &Regex) -> Vec<ContactInfo> {
    let Some(officers) = data.get("officers").and_then(Value::as_array) else {
        return Vec::new();
    };

    officers
        .iter()
        .filter(|officer| officer.is_object())
        .filter_map(|officer| {
            let title = value_to_string(officer.get("title")).unwrap_or_default();
            if !pattern.is_match(&title.to_lowercase()) {
                return None;
            }
            Some(ContactInfo {
                name: value_to_string(officer.get("name")).unwrap_or_default(),
                title,
                email: value_to_string(officer.get("email")),
                phone: value_to_string(officer.get("phone")),
                confidence: 0.0,
            })
        })
        .collect()
}

/// Extract the text layer of a PDF off the async runtime
async fn pdf_text(content: Vec<u8>) -> FinderResult<String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&content))
        .await
        .map_err(|e| FinderError::UnexpectedError(format!("PDF extraction task failed: {}", e)))?
        .map_err(|e| FinderError::ParseError(format!("PDF: {}", e)))
}

/// Role line with the name above, email below and phone two lines below
fn parse_text(text: &str, pattern: &Regex) -> Vec<ContactInfo> {
    let lines = html_to_lines(text);
    let mut results = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if !pattern.is_match(&line.to_lowercase()) {
            continue;
        }
        let name = if idx > 0 { lines[idx - 1].clone() } else { String::new() };
        let email = lines.get(idx + 1).filter(|l| l.contains('@')).cloned();
        let phone = lines.get(idx + 2).filter(|l| PHONE_LINE.is_match(l)).cloned();

        results.push(ContactInfo {
            name,
            title: line.clone(),
            email,
            phone,
            confidence: 0.0,
        });
    }

    results
}

fn score_contact(year: i32, contact: &ContactInfo, current_year: i32) -> f64 {
    let mut score = 0.5;
    let age = current_year - year;
    if age <= 1 {
        score += 0.3;
    } else if age <= 3 {
        score += 0.1;
    }
    if contact.email.is_some() || contact.phone.is_some() {
        score += 0.1;
    }
    if !contact.title.is_empty() {
        score += 0.1;
    }
    f64::min(score, 1.0)
}
