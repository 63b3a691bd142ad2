// src/discovery.rs
//! Targeted executive discovery through LinkedIn company and profile search
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use chrono::Utc;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::config::DiscoveryConfig;
use crate::error::{FinderResult, FinderError};
use crate::sources::{ProfileFinder, ProfileHit};
use crate::utils::fs::write_atomic;
use crate::utils::rate_limit::{Pacing, SessionRotator};
use crate::utils::text::normalize_title;

pub const TARGET_TITLES: &[&str] = &[
    "General Counsel",
    "Deputy General Counsel",
    "Chief Financial Officer",
    "Head of Revenue Cycle",
    "Executive Director",
];

const OUTPUT_HEADER: [&str; 8] = [
    "org_name",
    "exec_name",
    "title",
    "linkedin_url",
    "emails",
    "confidence",
    "method",
    "timestamp",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveResult {
    pub org_name: String,
    pub exec_name: String,
    pub title: String,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub confidence: u32,
    #[serde(default)]
    pub method: String,
    pub timestamp: String,
}

/// One row of the discovery input file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryTarget {
    pub name: String,
    pub website: Option<String>,
}

/// Profile located for one of the target titles
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutiveLead {
    pub url: String,
    pub name: Option<String>,
    pub title: String,
}

/// Likely addresses: `first.last@` and `flast@` at the website host
pub fn predict_email_format(exec_name: &str, website: Option<&str>) -> Vec<String> {
    let domain = website
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(|w| {
            let without_scheme = w.rsplit("//").next().unwrap_or(w);
            without_scheme.split('/').next().unwrap_or(without_scheme).to_string()
        })
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "example.com".to_string());

    let lowered = exec_name.to_lowercase();
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Vec::new();
    };
    let last = if parts.len() > 1 { parts[parts.len() - 1] } else { "" };

    if last.is_empty() {
        return vec![format!("{}@{}", first, domain)];
    }

    let initial: String = first.chars().take(1).collect();
    vec![
        format!("{}.{}@{}", first, last, domain),
        format!("{}{}@{}", initial, last, domain),
    ]
}

/// 50 base, +20 profile link, +20 predicted emails, +10 targeted title; at most 100
pub fn calculate_confidence_score(result: &ExecutiveResult) -> u32 {
    let mut score = 50;
    if result.linkedin_url.is_some() {
        score += 20;
    }
    if !result.emails.is_empty() {
        score += 20;
    }
    let title = normalize_title(&result.title);
    if !title.is_empty() && TARGET_TITLES.iter().any(|t| title.contains(&normalize_title(t))) {
        score += 10;
    }
    score.min(100)
}

/// What a discovery run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoverySummary {
    pub processed: usize,
    pub skipped: usize,
    pub executives: usize,
}

pub struct DiscoveryRun {
    finder: Arc<dyn ProfileFinder>,
    pacing: Pacing,
    rotate_every: u32,
    limit: usize,
    titles: Vec<String>,
}

impl DiscoveryRun {
    pub fn new(finder: Arc<dyn ProfileFinder>, config: &DiscoveryConfig) -> Self {
        Self {
            finder,
            pacing: Pacing::new(config.min_delay_seconds, config.max_delay_seconds),
            rotate_every: config.rotate_every.max(1),
            limit: config.limit,
            titles: TARGET_TITLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Stop after this many organizations; 0 processes all of them
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Company page for the organization
    pub async fn discover_company(&self, org_name: &str) -> Option<String> {
        info!("Searching LinkedIn for company {}", org_name);
        self.pacing.pause().await;

        match self.finder.search_companies(org_name).await {
            Ok(urls) => {
                if let Some(url) = urls.into_iter().find(|u| u.contains("/company/")) {
                    info!("Found company page: {}", url);
                    return Some(url);
                }
            }
            Err(e) => warn!("Company search failed for {}: {}", org_name, e),
        }

        warn!("No LinkedIn company page found for {}", org_name);
        None
    }

    /// Search people at the organization holding each of the target titles
    pub async fn find_target_executives(&self, company_url: &str, org_name: &str) -> Vec<ExecutiveLead> {
        info!("Finding executives for {}", company_url);
        let mut leads: Vec<ExecutiveLead> = Vec::new();

        for title in &self.titles {
            self.pacing.pause().await;
            let hits = match self.finder.search_profiles(&format!("{} {}", org_name, title)).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("Profile search for {} at {} failed: {}", title, org_name, e);
                    continue;
                }
            };

            for ProfileHit { url, name } in hits {
                if leads.iter().any(|l| l.url == url) {
                    continue;
                }
                leads.push(ExecutiveLead { url, name, title: title.clone() });
            }
        }

        leads
    }

    /// Visible name and headline of a profile
    pub async fn extract_contact_info(&self, profile_url: &str) -> (String, String) {
        info!("Extracting info from {}", profile_url);
        self.pacing.pause().await;

        match self.finder.extract_public_info(profile_url).await {
            Ok(info) => (info.name.unwrap_or_default(), info.headline.unwrap_or_default()),
            Err(e) => {
                warn!("Failed to read profile {}: {}", profile_url, e);
                (String::new(), String::new())
            }
        }
    }

    pub async fn process_organization(&self, target: &DiscoveryTarget) -> Vec<ExecutiveResult> {
        let org_name = if target.name.trim().is_empty() { "Unknown" } else { target.name.as_str() };

        let Some(company_url) = self.discover_company(org_name).await else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for lead in self.find_target_executives(&company_url, org_name).await {
            let (name, title) = self.extract_contact_info(&lead.url).await;
            let exec_name = if name.is_empty() { lead.name.clone().unwrap_or_default() } else { name };
            let title = if title.is_empty() { lead.title.clone() } else { title };

            let mut result = ExecutiveResult {
                org_name: org_name.to_string(),
                emails: predict_email_format(&exec_name, target.website.as_deref()),
                exec_name,
                title,
                linkedin_url: Some(lead.url),
                confidence: 0,
                method: "linkedin".to_string(),
                timestamp: Utc::now().to_rfc3339(),
            };
            result.confidence = calculate_confidence_score(&result);
            results.push(result);
        }

        results
    }

    /// Process the input CSV, appending to `output` and resuming from `checkpoint`
    pub async fn run(&self, input: &Path, output: &Path, checkpoint: &Path) -> FinderResult<DiscoverySummary> {
        let targets = read_targets(input)?;
        let mut done = load_checkpoint(checkpoint)?;
        let mut rotator = SessionRotator::new(self.rotate_every);
        let mut summary = DiscoverySummary::default();

        for target in targets {
            if done.contains_key(&target.name) {
                info!("Skipping {} (already processed)", target.name);
                summary.skipped += 1;
                continue;
            }

            let results = self.process_organization(&target).await;
            append_results(output, &results)?;
            summary.executives += results.len();
            done.insert(target.name.clone(), results);
            save_checkpoint(checkpoint, &done)?;

            summary.processed += 1;
            if rotator.increment() {
                if let Err(e) = self.finder.rotate_session().await {
                    warn!("Session rotation failed: {}", e);
                }
            }
            if self.limit > 0 && summary.processed >= self.limit {
                break;
            }
        }

        info!(
            "Discovery finished: {} processed, {} skipped, {} executives",
            summary.processed, summary.skipped, summary.executives
        );
        Ok(summary)
    }
}

fn read_targets(input: &Path) -> FinderResult<Vec<DiscoveryTarget>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(input)
        .map_err(|e| FinderError::file(input, e))?;

    let mut targets = Vec::new();
    for row in reader.deserialize::<HashMap<String, String>>() {
        let row = row?;
        let field = |name: &str| row.get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        targets.push(DiscoveryTarget {
            name: field("name").unwrap_or_default(),
            website: field("website"),
        });
    }
    Ok(targets)
}

fn load_checkpoint(path: &Path) -> FinderResult<BTreeMap<String, Vec<ExecutiveResult>>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| FinderError::file(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

fn save_checkpoint(path: &Path, done: &BTreeMap<String, Vec<ExecutiveResult>>) -> FinderResult<()> {
    let json = serde_json::to_string_pretty(done)?;
    write_atomic(path, json.as_bytes())
}

/// Append result rows, writing the header only when the file is new
fn append_results(path: &Path, results: &[ExecutiveResult]) -> FinderResult<()> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| FinderError::file(path, e))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_new {
        writer.write_record(OUTPUT_HEADER)?;
    }
    for r in results {
        writer.write_record([
            r.org_name.clone(),
            r.exec_name.clone(),
            r.title.clone(),
            r.linkedin_url.clone().unwrap_or_default(),
            r.emails.join(";"),
            r.confidence.to_string(),
            r.method.clone(),
            r.timestamp.clone(),
        ])?;
    }
    writer.flush().map_err(|e| FinderError::file(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::sources::{MockProfileFinder, ProfileInfo};

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            limit: 20,
            rotate_every: 10,
            min_delay_seconds: 0.0,
            max_delay_seconds: 0.0,
        }
    }

    fn sample_input() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/sample_organizations.csv")
    }

    fn finder_for_trust_a() -> MockProfileFinder {
        let mut finder = MockProfileFinder::new();
        finder.expect_search_companies().returning(|query| {
            if query.starts_with("Trust A") {
                Ok(vec!["https://www.linkedin.com/company/trust-a/".to_string()])
            } else {
                Ok(Vec::new())
            }
        });
        finder.expect_search_profiles().returning(|query| {
            if query == "Trust A Pension Fund General Counsel" {
                Ok(vec![ProfileHit { url: "https://www.linkedin.com/in/jane-doe".to_string(), name: None }])
            } else {
                Ok(Vec::new())
            }
        });
        finder.expect_extract_public_info().returning(|_| {
            Ok(ProfileInfo {
                name: Some("Jane Doe".to_string()),
                headline: Some("General Counsel".to_string()),
                location: None,
            })
        });
        finder.expect_rotate_session().returning(|| Ok(()));
        finder
    }

    #[test]
    fn test_predict_email_format() {
        assert_eq!(
            predict_email_format("Jane Doe", Some("https://www.trusta.org/home")),
            vec!["jane.doe@www.trusta.org", "jdoe@www.trusta.org"]
        );
        assert_eq!(
            predict_email_format("Mary Ann Lee", None),
            vec!["mary.lee@example.com", "mlee@example.com"]
        );
        assert_eq!(predict_email_format("Cher", Some("cher.com")), vec!["cher@cher.com"]);
        assert!(predict_email_format("  ", None).is_empty());
    }

    #[test]
    fn test_confidence_score() {
        let mut result = ExecutiveResult {
            org_name: "Org".to_string(),
            exec_name: "Jane Doe".to_string(),
            title: "Sales".to_string(),
            linkedin_url: None,
            emails: Vec::new(),
            confidence: 0,
            method: "linkedin".to_string(),
            timestamp: String::new(),
        };
        assert_eq!(calculate_confidence_score(&result), 50);

        result.linkedin_url = Some("https://www.linkedin.com/in/jane".to_string());
        result.emails = vec!["jane.doe@example.com".to_string()];
        assert_eq!(calculate_confidence_score(&result), 90);

        result.title = "Deputy General Counsel, Trust A".to_string();
        assert_eq!(calculate_confidence_score(&result), 100);
    }

    #[tokio::test]
    async fn test_process_organization() {
        let run = DiscoveryRun::new(Arc::new(finder_for_trust_a()), &config()).with_pacing(Pacing::disabled());
        let target = DiscoveryTarget {
            name: "Trust A Pension Fund".to_string(),
            website: Some("https://www.trusta.org/home".to_string()),
        };

        let results = run.process_organization(&target).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].exec_name, "Jane Doe");
        assert_eq!(results[0].emails[0], "jane.doe@www.trusta.org");
        assert_eq!(results[0].confidence, 100);
        assert_eq!(results[0].method, "linkedin");
    }

    #[tokio::test]
    async fn test_run_appends_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("executives.csv");
        let checkpoint = dir.path().join("checkpoint.json");

        let run = DiscoveryRun::new(Arc::new(finder_for_trust_a()), &config()).with_pacing(Pacing::disabled());
        let summary = run.run(&sample_input(), &output, &checkpoint).await.unwrap();
        assert_eq!(summary, DiscoverySummary { processed: 2, skipped: 0, executives: 1 });

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], OUTPUT_HEADER.join(","));
        assert!(lines[1].starts_with("Trust A Pension Fund,Jane Doe,General Counsel,https://www.linkedin.com/in/jane-doe,"));

        let saved: BTreeMap<String, Vec<ExecutiveResult>> =
            serde_json::from_str(&std::fs::read_to_string(&checkpoint).unwrap()).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved["Trust B Health Fund"].is_empty());

        let mut idle = MockProfileFinder::new();
        idle.expect_search_companies().never();
        let rerun = DiscoveryRun::new(Arc::new(idle), &config()).with_pacing(Pacing::disabled());
        let summary = rerun.run(&sample_input(), &output, &checkpoint).await.unwrap();
        assert_eq!(summary, DiscoverySummary { processed: 0, skipped: 2, executives: 0 });
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_limit_and_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let mut finder = MockProfileFinder::new();
        finder.expect_search_companies().returning(|_| Ok(Vec::new()));
        finder.expect_rotate_session().times(1).returning(|| Ok(()));

        let mut config = config();
        config.rotate_every = 1;
        let run = DiscoveryRun::new(Arc::new(finder), &config)
            .with_pacing(Pacing::disabled())
            .with_limit(1);
        let summary = run
            .run(&sample_input(), &dir.path().join("out.csv"), &dir.path().join("cp.json"))
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
    }
}
