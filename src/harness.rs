// src/harness.rs
//! Sampling and end-to-end exercise of the contact discovery components

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::{info, debug, error};

use crate::core::organization::{Organization, OrganizationProcessor};
use crate::email::{EmailLookup, EmailPatternGenerator};
use crate::error::{FinderResult, FinderError};
use crate::identifier::{Contact, ContactIdentifier, ContactSource};
use crate::integration::{ContactBook, ContactRecord, Sources};
use crate::reporting::{ComponentReport, HarnessReport, ReportFormat, ReportManager};
use crate::sources::{FilingQuery, FilingsSource, OrgRecord, WebsiteSource};
use crate::utils::fs::write_atomic;

/// Role searched for when exercising single components
pub const COMPONENT_ROLE: &str = "General Counsel";

const SAMPLE_WEBSITE: &str = "https://example.com";

/// A named slice of the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub organizations: Vec<Organization>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleConstraints {
    #[serde(default)]
    pub min_plan_count: Option<u32>,
    #[serde(default)]
    pub has_phone_number: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleOptions {
    /// Number of organizations to draw; `None` keeps every match
    pub size: Option<usize>,
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub constraints: SampleConstraints,
    #[serde(default)]
    pub eins: Option<Vec<u64>>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SampleOptions {
    pub fn sized(size: usize) -> Self {
        Self { size: Some(size), ..Default::default() }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    fn file_name(&self, drawn: usize) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let seed = self
            .random_seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "all".to_string());
        format!("sample_{}_{}", self.size.unwrap_or(drawn), seed)
    }
}

/// Components that can be exercised in isolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    CsvProcessor,
    WebsiteScraper,
    FilingsFinder,
    ContactIdentifier,
    EmailGenerator,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::CsvProcessor,
        Component::WebsiteScraper,
        Component::FilingsFinder,
        Component::ContactIdentifier,
        Component::EmailGenerator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::CsvProcessor => "csv_processor",
            Component::WebsiteScraper => "website_scraper",
            Component::FilingsFinder => "filings_finder",
            Component::ContactIdentifier => "contact_identifier",
            Component::EmailGenerator => "email_generator",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| FinderError::InvalidInput(format!("Unknown component: {}", s)))
    }
}

/// A contact confirmed by hand, used to score a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedContact {
    pub name: String,
    pub title: String,
}

/// Agreement between discovered and verified contacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub precision: f64,
    pub recall: f64,
    pub missing: Vec<(String, String)>,
    pub extra: Vec<(String, String)>,
}

/// Harness over a dataset and a set of wired components
pub struct TestFramework {
    processor: OrganizationProcessor,
    sources: Sources,
    identifier: ContactIdentifier,
    email_generator: Arc<EmailPatternGenerator>,
    samples_dir: PathBuf,
}

impl TestFramework {
    pub fn new(
        dataset_path: &Path,
        sources: Sources,
        email_generator: Arc<EmailPatternGenerator>,
        samples_dir: impl Into<PathBuf>,
    ) -> FinderResult<Self> {
        let processor = OrganizationProcessor::from_path(dataset_path)?;
        Self::with_processor(processor, sources, email_generator, samples_dir)
    }

    pub fn with_processor(
        processor: OrganizationProcessor,
        sources: Sources,
        email_generator: Arc<EmailPatternGenerator>,
        samples_dir: impl Into<PathBuf>,
    ) -> FinderResult<Self> {
        let samples_dir = samples_dir.into();
        std::fs::create_dir_all(&samples_dir).map_err(|e| FinderError::file(&samples_dir, e))?;

        Ok(Self {
            processor,
            sources,
            identifier: ContactIdentifier::new(),
            email_generator,
            samples_dir,
        })
    }

    pub fn samples_dir(&self) -> &Path {
        &self.samples_dir
    }

    /// Filter the dataset, draw a sample and save it under the samples directory
    pub fn create_sample(&self, options: &SampleOptions) -> FinderResult<Sample> {
        let mut candidates: Vec<Organization> = self.processor.organizations().into_iter().cloned().collect();

        if let Some(eins) = &options.eins {
            let wanted: BTreeSet<u64> = eins.iter().copied().collect();
            candidates.retain(|org| wanted.contains(&org.ein));
        }
        if let Some(min_plans) = options.constraints.min_plan_count {
            candidates.retain(|org| org.plan_count >= min_plans);
        }
        if options.constraints.has_phone_number {
            candidates.retain(Organization::has_phone_number);
        }

        let organizations = match options.size {
            Some(size) if size < candidates.len() => {
                let mut rng = match options.random_seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, candidates.len(), size).into_vec();
                picked.sort_unstable();
                picked.into_iter().map(|i| candidates[i].clone()).collect()
            }
            _ => candidates,
        };

        let path = self.samples_dir.join(format!("{}.json", options.file_name(organizations.len())));
        write_atomic(&path, serde_json::to_string_pretty(&organizations)?.as_bytes())?;
        info!("Created sample of {} organizations at {}", organizations.len(), path.display());

        Ok(Sample { organizations, path: Some(path) })
    }

    /// Load a sample written by `create_sample`
    pub fn load_sample(&self, path: &Path) -> FinderResult<Sample> {
        let content = std::fs::read_to_string(path).map_err(|e| FinderError::file(path, e))?;
        let organizations: Vec<Organization> = serde_json::from_str(&content)?;
        debug!("Loaded sample of {} organizations from {}", organizations.len(), path.display());
        Ok(Sample { organizations, path: Some(path.to_path_buf()) })
    }

    async fn run_component(&self, component: Component, sample: &Sample) -> FinderResult<Value> {
        let roles = vec![COMPONENT_ROLE.to_string()];

        let output = match component {
            Component::CsvProcessor => {
                let eins: Vec<u64> = sample.organizations.iter().map(|o| o.ein).collect();
                serde_json::to_value(eins)?
            }
            Component::WebsiteScraper => {
                let mut found = Vec::new();
                for org in &sample.organizations {
                    let record = OrgRecord::new(org.organization_name.clone(), None);
                    let executives = self.sources.website.find_executives(&record, &roles).await?;
                    found.push(serde_json::json!({ "ein": org.ein, "executives": executives }));
                }
                Value::Array(found)
            }
            Component::FilingsFinder => {
                let mut found = Vec::new();
                for org in &sample.organizations {
                    let contacts = self.sources.filings.find_contacts(&FilingQuery::by_ein(org.ein), &roles).await?;
                    found.push(serde_json::json!({ "ein": org.ein, "contacts": contacts }));
                }
                Value::Array(found)
            }
            Component::ContactIdentifier => {
                let mut contact = Contact::new("Jane Doe", "Chief Financial Officer", ContactSource::Website);
                contact.email = Some("jane.doe@example.com".to_string());
                serde_json::to_value(self.identifier.categorize_contacts(&[contact]))?
            }
            Component::EmailGenerator => {
                let mut found = Vec::new();
                for org in &sample.organizations {
                    let lookup = EmailLookup::new("Jane Doe")
                        .organization(org.organization_name.clone())
                        .website(SAMPLE_WEBSITE);
                    let candidates = self.email_generator.generate_candidates(&lookup);
                    found.push(serde_json::json!({ "ein": org.ein, "candidates": candidates }));
                }
                Value::Array(found)
            }
        };

        Ok(output)
    }

    /// Run each component over the sample, recording its output and duration
    pub async fn test_components(&self, sample: &Sample, components: &[Component]) -> Vec<ComponentReport> {
        let mut results = Vec::new();

        for &component in components {
            info!("Testing component {}", component);
            let started = Instant::now();
            let output = match self.run_component(component, sample).await {
                Ok(output) => output,
                Err(e) => {
                    error!("Component {} failed: {}", component, e);
                    serde_json::json!({ "error": e.to_string() })
                }
            };
            let elapsed_seconds = started.elapsed().as_secs_f64();
            debug!("Component {} finished in {:.3}s", component, elapsed_seconds);

            results.push(ComponentReport {
                name: component.to_string(),
                elapsed_seconds,
                output,
            });
        }

        results
    }

    /// Collect and merge contacts for every organization in the sample
    pub async fn test_pipeline(&self, sample: &Sample, roles: &[String]) -> Vec<ContactRecord> {
        let mut book = ContactBook::new();
        for org in &sample.organizations {
            for record in self.sources.collect(org, roles).await {
                book.merge(record);
            }
        }
        info!("Pipeline produced {} contacts for {} organizations", book.len(), sample.organizations.len());
        book.into_records()
    }

    /// Write the HTML report at `output_path`, plus any further formats beside it
    pub async fn generate_report(
        &self,
        component_results: &[ComponentReport],
        pipeline_results: &[ContactRecord],
        output_path: &Path,
        extra_formats: &[ReportFormat],
    ) -> FinderResult<Vec<PathBuf>> {
        let report = HarnessReport::new(
            "Contact discovery test results",
            component_results.to_vec(),
            pipeline_results.to_vec(),
        );
        let manager = ReportManager::new();

        manager.generate_report(&report, ReportFormat::HTML, output_path).await?;
        let mut paths = vec![output_path.to_path_buf()];

        let extra: Vec<ReportFormat> = extra_formats
            .iter()
            .copied()
            .filter(|f| *f != ReportFormat::HTML)
            .collect();
        paths.extend(manager.generate_multi_format(&report, output_path, &extra).await?);

        Ok(paths)
    }
}

fn contact_key(name: &str, title: &str) -> (String, String) {
    (name.trim().to_lowercase(), title.trim().to_lowercase())
}

/// Compare discovered contacts with hand-verified ones by `(name, title)`
pub fn verify_results(discovered: &[ContactRecord], verified: &[VerifiedContact]) -> Verification {
    let found: BTreeSet<(String, String)> = discovered.iter().map(|c| contact_key(&c.name, &c.title)).collect();
    let expected: BTreeSet<(String, String)> = verified.iter().map(|c| contact_key(&c.name, &c.title)).collect();

    let hits = found.intersection(&expected).count() as f64;
    let precision = if found.is_empty() { 0.0 } else { hits / found.len() as f64 };
    let recall = if expected.is_empty() { 0.0 } else { hits / expected.len() as f64 };

    Verification {
        precision,
        recall,
        missing: expected.difference(&found).cloned().collect(),
        extra: found.difference(&expected).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MockMailVerifier;
    use crate::sources::{ContactInfo, Executive, MockFilingsSource, MockProfileFinder, MockWebsiteSource, ProfileHit, ProfileInfo};

    const DATASET: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/sample_taft_hartley.csv");

    fn email_generator() -> Arc<EmailPatternGenerator> {
        Arc::new(EmailPatternGenerator::new(Arc::new(MockMailVerifier::new()), 0.0))
    }

    fn alice_sources() -> Sources {
        let mut website = MockWebsiteSource::new();
        website.expect_find_executives().returning(|_, _| {
            Ok(vec![Executive {
                name: "Alice Johnson".to_string(),
                title: "General Counsel".to_string(),
                email: Some("alice@example.com".to_string()),
                confidence: 0.9,
            }])
        });

        let mut filings = MockFilingsSource::new();
        filings.expect_find_contacts().returning(|_, _| {
            Ok(vec![ContactInfo {
                name: "Alice Johnson".to_string(),
                title: "General Counsel".to_string(),
                email: None,
                phone: Some("555-0100".to_string()),
                confidence: 0.8,
            }])
        });

        let mut linkedin = MockProfileFinder::new();
        linkedin.expect_search_profiles().returning(|_| {
            Ok(vec![ProfileHit { url: "https://www.linkedin.com/in/alice".to_string(), name: None }])
        });
        linkedin.expect_extract_public_info().returning(|_| {
            Ok(ProfileInfo {
                name: Some("Alice Johnson".to_string()),
                headline: Some("General Counsel".to_string()),
                location: None,
            })
        });

        Sources::new(Arc::new(website), Arc::new(filings)).with_linkedin(Arc::new(linkedin))
    }

    fn framework(samples_dir: &Path) -> TestFramework {
        TestFramework::new(Path::new(DATASET), alice_sources(), email_generator(), samples_dir).unwrap()
    }

    #[test]
    fn test_component_names() {
        assert_eq!("filings_finder".parse::<Component>().unwrap(), Component::FilingsFinder);
        assert_eq!(Component::EmailGenerator.to_string(), "email_generator");
        assert!("selenium".parse::<Component>().is_err());
    }

    #[test]
    fn test_create_sample_with_constraints() {
        let dir = tempfile::tempdir().unwrap();
        let framework = framework(dir.path());

        let mut options = SampleOptions::default();
        options.constraints.has_phone_number = true;
        let sample = framework.create_sample(&options).unwrap();
        assert_eq!(sample.organizations.len(), 1);
        assert_eq!(sample.organizations[0].ein, 123456789);

        let path = sample.path.clone().unwrap();
        assert_eq!(path, dir.path().join("sample_1_all.json"));
        assert_eq!(framework.load_sample(&path).unwrap().organizations, sample.organizations);

        let options = SampleOptions {
            constraints: SampleConstraints { min_plan_count: Some(5), has_phone_number: false },
            name: Some("empty".to_string()),
            ..Default::default()
        };
        let sample = framework.create_sample(&options).unwrap();
        assert!(sample.organizations.is_empty());
        assert!(dir.path().join("empty.json").exists());
    }

    #[test]
    fn test_seeded_sample_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let framework = framework(dir.path());

        let first = framework.create_sample(&SampleOptions::sized(1).with_seed(7)).unwrap();
        let second = framework.create_sample(&SampleOptions::sized(1).with_seed(7)).unwrap();
        assert_eq!(first.organizations.len(), 1);
        assert_eq!(first.organizations, second.organizations);
        assert_eq!(first.path.unwrap(), dir.path().join("sample_1_7.json"));

        let by_ein = SampleOptions {
            eins: Some(vec![987654321]),
            ..SampleOptions::sized(5)
        };
        let sample = framework.create_sample(&by_ein).unwrap();
        assert_eq!(sample.organizations.len(), 1);
        assert_eq!(sample.organizations[0].organization_name, "Trust B Health Fund");
    }

    #[tokio::test]
    async fn test_components_record_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let framework = framework(dir.path());
        let sample = framework.create_sample(&SampleOptions::default()).unwrap();

        let results = framework.test_components(&sample, &Component::ALL).await;
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["csv_processor", "website_scraper", "filings_finder", "contact_identifier", "email_generator"]
        );
        assert!(results.iter().all(|r| r.elapsed_seconds >= 0.0));

        assert_eq!(results[0].output, serde_json::json!([123456789u64, 987654321u64]));
        assert_eq!(results[1].output[0]["executives"][0]["name"], "Alice Johnson");
        assert_eq!(results[3].output[0]["role"], "CFO");
        assert_eq!(results[4].output[0]["candidates"][0]["email"], "jane.doe@example.com");
    }

    #[tokio::test]
    async fn test_failing_component_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut website = MockWebsiteSource::new();
        website
            .expect_find_executives()
            .returning(|_, _| Err(FinderError::NetworkError("unreachable".to_string())));
        let sources = Sources::new(Arc::new(website), Arc::new(MockFilingsSource::new()));
        let framework = TestFramework::new(Path::new(DATASET), sources, email_generator(), dir.path()).unwrap();
        let sample = framework.create_sample(&SampleOptions::default()).unwrap();

        let results = framework.test_components(&sample, &[Component::WebsiteScraper]).await;
        assert!(results[0].output["error"].as_str().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_pipeline_merges_sources() {
        let dir = tempfile::tempdir().unwrap();
        let framework = framework(dir.path());
        let sample = framework
            .create_sample(&SampleOptions { eins: Some(vec![123456789]), ..Default::default() })
            .unwrap();

        let roles = vec!["General Counsel".to_string()];
        let results = framework.test_pipeline(&sample, &roles).await;

        assert_eq!(results.len(), 1);
        let alice = &results[0];
        assert_eq!(alice.name, "Alice Johnson");
        assert_eq!(alice.sources, vec![ContactSource::Website, ContactSource::Filing, ContactSource::Linkedin]);
        assert_eq!(alice.email.as_deref(), Some("alice@example.com"));
        assert_eq!(alice.phone.as_deref(), Some("555-0100"));
        assert!(alice.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_generate_report() {
        let dir = tempfile::tempdir().unwrap();
        let framework = framework(dir.path());
        let sample = framework.create_sample(&SampleOptions::default()).unwrap();
        let components = framework.test_components(&sample, &[Component::CsvProcessor]).await;
        let contacts = framework.test_pipeline(&sample, &["General Counsel".to_string()]).await;

        let output = dir.path().join("test_results.html");
        let paths = framework
            .generate_report(&components, &contacts, &output, &[ReportFormat::JSON])
            .await
            .unwrap();

        assert_eq!(paths, vec![output.clone(), output.with_extension("json")]);
        let html = std::fs::read_to_string(&output).unwrap();
        assert!(html.contains("Alice Johnson"));
        assert!(html.contains("csv_processor"));
    }

    #[test]
    fn test_verify_results() {
        let discovered = vec![
            ContactRecord {
                org_ein: 1,
                org_name: "Trust".to_string(),
                name: "Alice Johnson".to_string(),
                title: "General Counsel".to_string(),
                sources: vec![ContactSource::Website],
                confidence: 0.9,
                email: None,
                phone: None,
            },
            ContactRecord {
                org_ein: 1,
                org_name: "Trust".to_string(),
                name: "Bob Lee".to_string(),
                title: "Treasurer".to_string(),
                sources: vec![ContactSource::Filing],
                confidence: 0.7,
                email: None,
                phone: None,
            },
        ];
        let verified = vec![
            VerifiedContact { name: "alice johnson".to_string(), title: "GENERAL COUNSEL".to_string() },
            VerifiedContact { name: "Carol King".to_string(), title: "CFO".to_string() },
        ];

        let verification = verify_results(&discovered, &verified);
        assert_eq!(verification.precision, 0.5);
        assert_eq!(verification.recall, 0.5);
        assert_eq!(verification.missing, vec![("carol king".to_string(), "cfo".to_string())]);
        assert_eq!(verification.extra, vec![("bob lee".to_string(), "treasurer".to_string())]);

        let empty = verify_results(&[], &[]);
        assert_eq!((empty.precision, empty.recall), (0.0, 0.0));
    }
}
