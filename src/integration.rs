// src/integration.rs
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tokio::sync::Semaphore;
use tracing::{info, debug, warn, error};

use crate::core::organization::{Organization, OrganizationProcessor};
use crate::error::{FinderResult, FinderError};
use crate::identifier::ContactSource;
use crate::sources::{
    DatabaseSource, FilingQuery, FilingsSource, OrgRecord, ProfileFinder, ProfileInfo, WebsiteSource,
};
use crate::utils::fs::write_atomic;
use crate::utils::text::{normalize_person, normalize_title};

const LINKEDIN_CONFIDENCE: f64 = 0.6;

/// Aggregated contact information for an executive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub org_ein: u64,
    pub org_name: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub sources: Vec<ContactSource>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ContactRecord {
    fn from_source(org: &Organization, source: ContactSource, name: String, title: String, confidence: f64) -> Self {
        Self {
            org_ein: org.ein,
            org_name: org.organization_name.clone(),
            name,
            title,
            sources: vec![source],
            confidence: base_score(source, confidence),
            email: None,
            phone: None,
        }
    }

    fn merge_key(&self) -> (u64, String, String) {
        (self.org_ein, normalize_person(&self.name), normalize_title(&self.title))
    }

    pub fn sources_joined(&self) -> String {
        self.sources.iter().map(ContactSource::as_str).collect::<Vec<_>>().join(";")
    }
}

/// Trust placed in each kind of source
pub fn source_weight(source: ContactSource) -> f64 {
    match source {
        ContactSource::Website => 1.0,
        ContactSource::Filing => 0.9,
        ContactSource::Database => 0.8,
        ContactSource::Linkedin => 0.7,
        ContactSource::Other => 0.5,
    }
}

pub fn base_score(source: ContactSource, confidence: f64) -> f64 {
    source_weight(source) * confidence
}

/// Contacts merged by organization, person and title, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    records: Vec<ContactRecord>,
    index: HashMap<(u64, String, String), usize>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ContactRecord>) -> Self {
        let mut book = Self::new();
        for record in records {
            book.merge(record);
        }
        book
    }

    /// Add a record, folding it into an existing one with the same key
    pub fn merge(&mut self, record: ContactRecord) {
        let key = record.merge_key();
        match self.index.get(&key) {
            Some(&idx) => {
                let existing = &mut self.records[idx];
                existing.confidence = (existing.confidence + record.confidence * 0.5).min(1.0);
                if existing.email.is_none() {
                    existing.email = record.email;
                }
                if existing.phone.is_none() {
                    existing.phone = record.phone;
                }
                for source in record.sources {
                    if !existing.sources.contains(&source) {
                        existing.sources.push(source);
                    }
                }
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn records(&self) -> &[ContactRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ContactRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sources queried for every organization
#[derive(Clone)]
pub struct Sources {
    pub website: Arc<dyn WebsiteSource>,
    pub filings: Arc<dyn FilingsSource>,
    pub linkedin: Option<Arc<dyn ProfileFinder>>,
    pub database: Option<Arc<dyn DatabaseSource>>,
}

impl Sources {
    pub fn new(website: Arc<dyn WebsiteSource>, filings: Arc<dyn FilingsSource>) -> Self {
        Self { website, filings, linkedin: None, database: None }
    }

    pub fn with_linkedin(mut self, linkedin: Arc<dyn ProfileFinder>) -> Self {
        self.linkedin = Some(linkedin);
        self
    }

    pub fn with_database(mut self, database: Arc<dyn DatabaseSource>) -> Self {
        self.database = Some(database);
        self
    }

    async fn from_website(&self, org: &Organization, roles: &[String]) -> Vec<ContactRecord> {
        let record = OrgRecord::new(org.organization_name.clone(), None);
        match self.website.find_executives(&record, roles).await {
            Ok(executives) => executives
                .into_iter()
                .map(|ex| {
                    let mut contact = ContactRecord::from_source(org, ContactSource::Website, ex.name, ex.title, ex.confidence);
                    contact.email = ex.email;
                    contact
                })
                .collect(),
            Err(e) => {
                error!("Website search failed for {}: {}", org.organization_name, e);
                Vec::new()
            }
        }
    }

    async fn from_filings(&self, org: &Organization, roles: &[String]) -> Vec<ContactRecord> {
        match self.filings.find_contacts(&FilingQuery::by_ein(org.ein), roles).await {
            Ok(contacts) => contacts
                .into_iter()
                .map(|c| {
                    let mut contact = ContactRecord::from_source(org, ContactSource::Filing, c.name, c.title, c.confidence);
                    contact.email = c.email;
                    contact.phone = c.phone;
                    contact
                })
                .collect(),
            Err(e) => {
                error!("Filings search failed for EIN {}: {}", org.ein, e);
                Vec::new()
            }
        }
    }

    async fn from_database(&self, org: &Organization, roles: &[String]) -> Vec<ContactRecord> {
        let Some(database) = &self.database else {
            return Vec::new();
        };
        match database.search(org, roles).await {
            Ok(entries) => entries
                .into_iter()
                .map(|e| {
                    let mut contact = ContactRecord::from_source(org, ContactSource::Database, e.name, e.title, e.confidence);
                    contact.email = e.email;
                    contact.phone = e.phone;
                    contact
                })
                .collect(),
            Err(e) => {
                error!("Database search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn from_linkedin(&self, org: &Organization, roles: &[String]) -> Vec<ContactRecord> {
        let Some(linkedin) = &self.linkedin else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for role in roles {
            let query = format!("{} {}", org.organization_name, role);
            let hits = match linkedin.search_profiles(&query).await {
                Ok(hits) => hits,
                Err(e) => {
                    error!("LinkedIn search failed: {}", e);
                    continue;
                }
            };

            for hit in hits {
                let info = match linkedin.extract_public_info(&hit.url).await {
                    Ok(info) => info,
                    Err(e) => {
                        warn!("Failed to read profile {}: {}", hit.url, e);
                        ProfileInfo::default()
                    }
                };
                let name = info.name.or(hit.name).unwrap_or_default();
                let title = info.headline.unwrap_or_else(|| role.clone());
                results.push(ContactRecord::from_source(org, ContactSource::Linkedin, name, title, LINKEDIN_CONFIDENCE));
            }
        }
        results
    }

    /// Query every source for one organization, in source order
    pub async fn collect(&self, org: &Organization, roles: &[String]) -> Vec<ContactRecord> {
        let mut contacts = self.from_website(org, roles).await;
        contacts.extend(self.from_filings(org, roles).await);
        contacts.extend(self.from_database(org, roles).await);
        contacts.extend(self.from_linkedin(org, roles).await);
        debug!("Collected {} raw contacts for EIN {}", contacts.len(), org.ein);
        contacts
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Checkpoint {
    #[serde(default)]
    results: Vec<ContactRecord>,
    #[serde(default)]
    processed: BTreeSet<u64>,
}

/// Coordinator for multi-source contact discovery
pub struct ContactIntegration {
    processor: OrganizationProcessor,
    sources: Sources,
    checkpoint_file: Option<PathBuf>,
    book: ContactBook,
    results: Vec<ContactRecord>,
    processed: BTreeSet<u64>,
    max_concurrency: usize,
}

impl ContactIntegration {
    /// Create the coordinator, resuming from the checkpoint file when it exists
    pub fn new(processor: OrganizationProcessor, sources: Sources, checkpoint_file: Option<PathBuf>) -> FinderResult<Self> {
        let mut integration = Self {
            processor,
            sources,
            checkpoint_file,
            book: ContactBook::new(),
            results: Vec::new(),
            processed: BTreeSet::new(),
            max_concurrency: 1,
        };

        if let Some(path) = integration.checkpoint_file.clone() {
            if path.exists() {
                integration.load_checkpoint(&path)?;
            }
        }

        Ok(integration)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    fn load_checkpoint(&mut self, path: &Path) -> FinderResult<()> {
        info!("Loading checkpoint from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| FinderError::file(path, e))?;
        let checkpoint: Checkpoint = serde_json::from_str(&text)?;

        for ein in &checkpoint.processed {
            self.processor.mark_processed(*ein);
        }
        self.book = ContactBook::from_records(checkpoint.results);
        self.results = self.book.records().to_vec();
        self.processed = checkpoint.processed;
        Ok(())
    }

    fn save_checkpoint(&self) -> FinderResult<()> {
        let Some(path) = &self.checkpoint_file else {
            return Ok(());
        };

        #[derive(Serialize)]
        struct CheckpointRef<'a> {
            results: &'a [ContactRecord],
            processed: &'a BTreeSet<u64>,
        }

        let json = serde_json::to_string_pretty(&CheckpointRef { results: self.book.records(), processed: &self.processed })?;
        write_atomic(path, json.as_bytes())?;
        debug!("Checkpoint saved to {}", path.display());
        Ok(())
    }

    /// Contacts that passed the last threshold
    pub fn results(&self) -> &[ContactRecord] {
        &self.results
    }

    /// Every merged contact regardless of confidence
    pub fn all_contacts(&self) -> &[ContactRecord] {
        self.book.records()
    }

    pub fn processed(&self) -> &BTreeSet<u64> {
        &self.processed
    }

    async fn collect_batch(&self, batch: Vec<Organization>, roles: &Arc<Vec<String>>) -> Vec<(Organization, Vec<ContactRecord>)> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::new();

        for org in batch {
            let semaphore = semaphore.clone();
            let sources = self.sources.clone();
            let roles = roles.clone();
            let task_org = org.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                info!("Processing EIN {} - {}", task_org.ein, task_org.organization_name);
                sources.collect(&task_org, &roles).await
            });
            handles.push((org, handle));
        }

        let mut collected = Vec::new();
        for (org, handle) in handles {
            match handle.await {
                Ok(contacts) => collected.push((org, contacts)),
                Err(e) => {
                    error!("Collection task for EIN {} failed: {}", org.ein, e);
                    collected.push((org, Vec::new()));
                }
            }
        }
        collected
    }

    /// Process organizations and return contacts at or above `min_confidence`
    pub async fn discover_contacts(&mut self, target_roles: &[String], batch_size: usize, min_confidence: f64) -> FinderResult<Vec<ContactRecord>> {
        let roles = Arc::new(target_roles.to_vec());

        loop {
            let batch = self.processor.get_next_batch(batch_size.max(1));
            if batch.is_empty() {
                break;
            }

            let pending: Vec<Organization> = batch
                .into_iter()
                .filter(|org| !self.processed.contains(&org.ein))
                .collect();

            for (org, contacts) in self.collect_batch(pending, &roles).await {
                for contact in contacts {
                    self.book.merge(contact);
                }
                self.processor.mark_processed(org.ein);
                self.processed.insert(org.ein);
                self.save_checkpoint()?;
            }
        }

        self.results = self
            .book
            .records()
            .iter()
            .filter(|r| r.confidence >= min_confidence)
            .cloned()
            .collect();

        info!("Discovered {} contacts", self.results.len());
        Ok(self.results.clone())
    }

    /// Write results as JSON or CSV, chosen by the file extension
    pub fn export_results(&self, path: &Path) -> FinderResult<()> {
        export_records(&self.results, path)
    }
}

/// Write contact records as JSON or CSV, chosen by the file extension
pub fn export_records(records: &[ContactRecord], path: &Path) -> FinderResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(records)?;
            std::fs::write(path, json).map_err(|e| FinderError::file(path, e))?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_path(path).map_err(|e| FinderError::file(path, e))?;
            writer.write_record(["org_ein", "org_name", "name", "title", "email", "phone", "confidence", "sources"])?;
            for r in records {
                writer.write_record([
                    r.org_ein.to_string(),
                    r.org_name.clone(),
                    r.name.clone(),
                    r.title.clone(),
                    r.email.clone().unwrap_or_default(),
                    r.phone.clone().unwrap_or_default(),
                    r.confidence.to_string(),
                    r.sources_joined(),
                ])?;
            }
            writer.flush().map_err(|e| FinderError::file(path, e))?;
        }
        "xlsx" | "xls" => {
            return Err(FinderError::Unsupported("Excel export is not available, use .csv or .json".to_string()));
        }
        other => {
            return Err(FinderError::InvalidInput(format!("Unsupported file type: .{}", other)));
        }
    }

    info!("Exported {} contacts to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ContactInfo, Executive, MockFilingsSource, MockProfileFinder, MockWebsiteSource, ProfileHit};

    fn org(ein: u64, name: &str) -> Organization {
        Organization::new(ein, name)
    }

    fn website_with(executives: Vec<Executive>) -> MockWebsiteSource {
        let mut website = MockWebsiteSource::new();
        website.expect_find_executives().returning(move |_, _| Ok(executives.clone()));
        website
    }

    fn filings_with(contacts: Vec<ContactInfo>) -> MockFilingsSource {
        let mut filings = MockFilingsSource::new();
        filings.expect_find_contacts().returning(move |query, _| {
            if query.ein.as_deref() == Some("1") {
                Ok(contacts.clone())
            } else {
                Ok(Vec::new())
            }
        });
        filings
    }

    fn jane_website() -> Executive {
        Executive {
            name: "Jane Doe".to_string(),
            title: "General Counsel".to_string(),
            email: None,
            confidence: 0.9,
        }
    }

    fn jane_filing() -> ContactInfo {
        ContactInfo {
            name: "jane  doe".to_string(),
            title: "General-Counsel".to_string(),
            email: Some("jane@trust.org".to_string()),
            phone: Some("555-0100".to_string()),
            confidence: 0.8,
        }
    }

    fn roles() -> Vec<String> {
        vec!["General Counsel".to_string()]
    }

    #[tokio::test]
    async fn test_merge_across_sources() {
        let sources = Sources::new(
            Arc::new(website_with(vec![jane_website()])),
            Arc::new(filings_with(vec![jane_filing()])),
        );
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);
        let mut integration = ContactIntegration::new(processor, sources, None).unwrap();

        let results = integration.discover_contacts(&roles(), 10, 0.0).await.unwrap();

        assert_eq!(results.len(), 1);
        let jane = &results[0];
        assert_eq!(jane.sources, vec![ContactSource::Website, ContactSource::Filing]);
        assert_eq!(jane.email.as_deref(), Some("jane@trust.org"));
        assert_eq!(jane.phone.as_deref(), Some("555-0100"));
        // 1.0 * 0.9 + 0.5 * (0.9 * 0.8), capped
        assert_eq!(jane.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_same_person_at_two_orgs_stays_separate() {
        let sources = Sources::new(
            Arc::new(website_with(vec![jane_website()])),
            Arc::new(filings_with(Vec::new())),
        );
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One"), org(2, "Trust Two")]);
        let mut integration = ContactIntegration::new(processor, sources, None).unwrap().with_max_concurrency(2);

        let results = integration.discover_contacts(&roles(), 1, 0.5).await.unwrap();

        assert_eq!(results.iter().map(|r| r.org_ein).collect::<Vec<_>>(), vec![1, 2]);
        assert!((results[0].confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_min_confidence_filter_and_linkedin_fallback_title() {
        let mut linkedin = MockProfileFinder::new();
        linkedin.expect_search_profiles().returning(|_| {
            Ok(vec![ProfileHit { url: "https://linkedin.test/in/sam".to_string(), name: Some("Sam Poe".to_string()) }])
        });
        linkedin.expect_extract_public_info().returning(|_| Ok(ProfileInfo::default()));

        let sources = Sources::new(Arc::new(website_with(Vec::new())), Arc::new(filings_with(Vec::new())))
            .with_linkedin(Arc::new(linkedin));
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);

        let mut integration = ContactIntegration::new(processor.clone(), sources.clone(), None).unwrap();
        let all = integration.discover_contacts(&roles(), 10, 0.0).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Sam Poe");
        assert_eq!(all[0].title, "General Counsel");
        assert!((all[0].confidence - 0.42).abs() < 1e-9);

        let mut integration = ContactIntegration::new(processor, sources, None).unwrap();
        assert!(integration.discover_contacts(&roles(), 10, 0.6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_keeps_unfiltered_contacts_for_later_runs() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("checkpoint.json");

        let mut linkedin = MockProfileFinder::new();
        linkedin.expect_search_profiles().returning(|_| {
            Ok(vec![ProfileHit { url: "https://linkedin.test/in/sam".to_string(), name: Some("Sam Poe".to_string()) }])
        });
        linkedin.expect_extract_public_info().returning(|_| Ok(ProfileInfo::default()));
        let sources = Sources::new(Arc::new(website_with(Vec::new())), Arc::new(filings_with(Vec::new())))
            .with_linkedin(Arc::new(linkedin));
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);
        let mut integration = ContactIntegration::new(processor, sources, Some(checkpoint.clone())).unwrap();

        assert!(integration.discover_contacts(&roles(), 10, 0.6).await.unwrap().is_empty());
        assert!(integration.results().is_empty());
        assert_eq!(integration.all_contacts().len(), 1);

        let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&checkpoint).unwrap()).unwrap();
        assert_eq!(saved["results"][0]["name"], "Sam Poe");

        let lowered = integration.discover_contacts(&roles(), 10, 0.4).await.unwrap();
        assert_eq!(lowered.len(), 1);
        assert_eq!(lowered[0].name, "Sam Poe");
    }

    #[tokio::test]
    async fn test_source_failures_do_not_stop_collection() {
        let mut website = MockWebsiteSource::new();
        website
            .expect_find_executives()
            .returning(|_, _| Err(FinderError::NetworkError("down".to_string())));
        let sources = Sources::new(Arc::new(website), Arc::new(filings_with(vec![jane_filing()])));
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);
        let mut integration = ContactIntegration::new(processor, sources, None).unwrap();

        let results = integration.discover_contacts(&roles(), 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sources, vec![ContactSource::Filing]);
    }

    #[tokio::test]
    async fn test_checkpoint_resume_skips_processed() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("checkpoint.json");

        let sources = Sources::new(
            Arc::new(website_with(vec![jane_website()])),
            Arc::new(filings_with(Vec::new())),
        );
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);
        let mut integration = ContactIntegration::new(processor, sources, Some(checkpoint.clone())).unwrap();
        integration.discover_contacts(&roles(), 10, 0.0).await.unwrap();

        let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&checkpoint).unwrap()).unwrap();
        assert_eq!(saved["processed"], serde_json::json!([1]));
        assert_eq!(saved["results"][0]["sources"], serde_json::json!(["website"]));

        // a rerun must not query the sources for EIN 1 again
        let mut website = MockWebsiteSource::new();
        website.expect_find_executives().never();
        let mut filings = MockFilingsSource::new();
        filings.expect_find_contacts().never();
        let sources = Sources::new(Arc::new(website), Arc::new(filings));
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);
        let mut resumed = ContactIntegration::new(processor, sources, Some(checkpoint)).unwrap();

        let results = resumed.discover_contacts(&roles(), 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_export_results() {
        let sources = Sources::new(
            Arc::new(website_with(vec![jane_website()])),
            Arc::new(filings_with(vec![jane_filing()])),
        );
        let processor = OrganizationProcessor::from_organizations(vec![org(1, "Trust One")]);
        let mut integration = ContactIntegration::new(processor, sources, None).unwrap();
        integration.discover_contacts(&roles(), 10, 0.0).await.unwrap();

        let dir = tempfile::tempdir().unwrap();

        let csv_path = dir.path().join("contacts.csv");
        integration.export_results(&csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("org_ein,org_name,name,title,email,phone,confidence,sources"));
        assert_eq!(lines.next(), Some("1,Trust One,Jane Doe,General Counsel,jane@trust.org,555-0100,1,website;filing"));

        let json_path = dir.path().join("contacts.json");
        integration.export_results(&json_path).unwrap();
        let records: Vec<ContactRecord> = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(records, integration.results());

        assert!(matches!(integration.export_results(&dir.path().join("c.xlsx")), Err(FinderError::Unsupported(_))));
        assert!(matches!(integration.export_results(&dir.path().join("c.txt")), Err(FinderError::InvalidInput(_))));
    }
}
