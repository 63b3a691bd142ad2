// src/cli/commands.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::organization::OrganizationProcessor;
use crate::discovery::DiscoveryRun;
use crate::domain::DomainGuesser;
use crate::email::{DnsMailVerifier, EmailLookup, EmailPatternGenerator};
use crate::harness::{self, Component, SampleOptions, TestFramework};
use crate::identifier::{Contact, ContactIdentifier};
use crate::integration::{ContactIntegration, Sources};
use crate::reporting::ReportFormat;
use crate::sources::{LinkedInFinder, ProfileFinder, PublicFilingsFinder, TwitterFinder, WebsiteScraper};
use crate::utils::cache::ResultCache;
use crate::utils::http::HttpClient;

#[derive(Parser)]
#[command(name = "social-finder")]
#[command(about = "Find executive contacts and social profiles for organizations")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, short, global = true, help = "Path to a configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the default configuration file
    Init {
        #[arg(short, long, help = "Force overwrite existing configuration")]
        force: bool,
    },

    /// Discover executives on LinkedIn for organizations in a CSV file
    Discover {
        #[arg(short, long, help = "CSV with name and optional website columns")]
        input: PathBuf,

        #[arg(short, long, default_value = "linkedin_contacts.csv", help = "Output CSV, appended to")]
        output: PathBuf,

        #[arg(long, default_value = "discovery_checkpoint.json", help = "Checkpoint file, relative to the data directory")]
        checkpoint: PathBuf,

        #[arg(long, help = "Stop after this many organizations (0 = all)")]
        limit: Option<usize>,
    },

    /// Collect and merge contacts from every source for a dataset
    Integrate {
        #[arg(short, long, help = "Organization dataset CSV")]
        input: PathBuf,

        #[arg(short, long, default_value = "contacts.json", help = "Output file (.json or .csv)")]
        output: PathBuf,

        #[arg(long, help = "Checkpoint file for resuming, relative to the data directory")]
        checkpoint: Option<PathBuf>,

        #[arg(long, help = "Target role (repeatable)")]
        role: Vec<String>,

        #[arg(long, help = "Organizations per batch")]
        batch_size: Option<usize>,

        #[arg(long, help = "Minimum confidence to keep a contact")]
        min_confidence: Option<f64>,
    },

    /// Generate and optionally verify email addresses for a person
    Emails {
        #[arg(help = "Full name")]
        name: String,

        #[arg(long, help = "Organization name")]
        organization: Option<String>,

        #[arg(long, help = "Organization website")]
        website: Option<String>,

        #[arg(long, help = "Mail domain")]
        domain: Option<String>,

        #[arg(long, help = "A known address at the organization")]
        email: Option<String>,

        #[arg(long, help = "Check MX records and probe SMTP")]
        verify: bool,
    },

    /// Match contacts from a JSON file to target roles
    Classify {
        #[arg(help = "JSON array of contacts")]
        input: PathBuf,
    },

    /// Guess an organization's domain
    Domain {
        #[arg(help = "Organization name")]
        name: String,
    },

    /// Search Twitter/X users
    Twitter {
        #[arg(help = "Search query")]
        query: String,
    },

    /// Search LinkedIn profiles or read a public profile
    Linkedin {
        #[arg(help = "Search query, or profile URL with --profile")]
        query: String,

        #[arg(long, help = "Treat the query as a profile URL")]
        profile: bool,

        #[arg(long, help = "Expected name when reading a profile")]
        expect: Option<String>,
    },

    /// Sample a dataset, exercise each component and the pipeline, and write a report
    Harness {
        #[arg(short, long, help = "Organization dataset CSV")]
        dataset: PathBuf,

        #[arg(long, help = "Sample size")]
        size: Option<usize>,

        #[arg(long, help = "Random seed for sampling")]
        seed: Option<u64>,

        #[arg(long, help = "Component to test (repeatable, default all)")]
        component: Vec<String>,

        #[arg(long, help = "Target role (repeatable)")]
        role: Vec<String>,

        #[arg(long, help = "HTML report path")]
        report: Option<PathBuf>,

        #[arg(long, help = "Also write a JSON report")]
        json: bool,
    },
}

pub async fn execute_command(command: &Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Init { force } => handle_init_command(*force),
        Commands::Discover { input, output, checkpoint, limit } => {
            handle_discover_command(config, input, output, checkpoint, *limit).await
        }
        Commands::Integrate { input, output, checkpoint, role, batch_size, min_confidence } => {
            handle_integrate_command(config, input, output, checkpoint.clone(), role, *batch_size, *min_confidence).await
        }
        Commands::Emails { name, organization, website, domain, email, verify } => {
            let mut lookup = EmailLookup::new(name.clone());
            lookup.organization = organization.clone();
            lookup.website = website.clone();
            lookup.domain = domain.clone();
            lookup.email = email.clone();
            handle_emails_command(config, &lookup, *verify).await
        }
        Commands::Classify { input } => handle_classify_command(input),
        Commands::Domain { name } => handle_domain_command(config, name).await,
        Commands::Twitter { query } => handle_twitter_command(config, query).await,
        Commands::Linkedin { query, profile, expect } => {
            handle_linkedin_command(config, query, *profile, expect.as_deref()).await
        }
        Commands::Harness { dataset, size, seed, component, role, report, json } => {
            handle_harness_command(config, dataset, *size, *seed, component, role, report.as_deref(), *json).await
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn roles_or_default(roles: &[String], config: &Config) -> Vec<String> {
    if roles.is_empty() {
        config.integration.target_roles.clone()
    } else {
        roles.to_vec()
    }
}

fn email_generator(config: &Config) -> Result<EmailPatternGenerator> {
    let client = HttpClient::new(None, Some(config.http.timeout_seconds))?;
    let verifier = DnsMailVerifier::from_config(&config.email, client);
    Ok(EmailPatternGenerator::new(Arc::new(verifier), config.email.rate_limit_seconds))
}

fn build_sources(config: &Config, cache: &ResultCache) -> Result<Sources> {
    let website = WebsiteScraper::new(&config.website)?;
    let client = HttpClient::with_user_agents(config.http.user_agents.clone(), Some(config.http.timeout_seconds))?;
    let filings = PublicFilingsFinder::new(&config.filings, client, cache.clone());
    let linkedin = LinkedInFinder::new(&config.linkedin, &config.http, cache.clone())?;

    Ok(Sources::new(Arc::new(website), Arc::new(filings)).with_linkedin(Arc::new(linkedin)))
}

fn handle_init_command(force: bool) -> Result<()> {
    let config_path = Config::init(force)?;
    println!("Configuration initialized at {}", config_path.display());
    Ok(())
}

async fn handle_discover_command(
    config: &Config,
    input: &Path,
    output: &Path,
    checkpoint: &Path,
    limit: Option<usize>,
) -> Result<()> {
    let finder = LinkedInFinder::new(&config.linkedin, &config.http, ResultCache::from_config(&config.cache))?;
    let mut run = DiscoveryRun::new(Arc::new(finder), &config.discovery);
    if let Some(limit) = limit {
        run = run.with_limit(limit);
    }

    let checkpoint = config.global.data_path(checkpoint);
    let summary = run
        .run(input, output, &checkpoint)
        .await
        .with_context(|| format!("Discovery over {} failed", input.display()))?;

    println!(
        "Processed {} organizations ({} skipped), found {} executives",
        summary.processed, summary.skipped, summary.executives
    );
    Ok(())
}

async fn handle_integrate_command(
    config: &Config,
    input: &Path,
    output: &Path,
    checkpoint: Option<PathBuf>,
    roles: &[String],
    batch_size: Option<usize>,
    min_confidence: Option<f64>,
) -> Result<()> {
    let cache = ResultCache::from_config(&config.cache);
    let sources = build_sources(config, &cache)?;
    let processor = OrganizationProcessor::from_path(input)?;

    let checkpoint = checkpoint.map(|path| config.global.data_path(&path));
    let mut integration = ContactIntegration::new(processor, sources, checkpoint)?
        .with_max_concurrency(config.integration.max_concurrency);

    let roles = roles_or_default(roles, config);
    let results = integration
        .discover_contacts(
            &roles,
            batch_size.unwrap_or(config.integration.batch_size),
            min_confidence.unwrap_or(config.integration.min_confidence),
        )
        .await?;

    integration.export_results(output)?;
    println!("Wrote {} contacts to {}", results.len(), output.display());
    Ok(())
}

async fn handle_emails_command(config: &Config, lookup: &EmailLookup, verify: bool) -> Result<()> {
    let generator = email_generator(config)?;
    let mut candidates = generator.generate_candidates(lookup);
    if candidates.is_empty() {
        warn!("No domain could be determined for {}", lookup.name);
    }

    if verify {
        candidates = generator.verify_emails(candidates).await;
    }

    print_json(&candidates)?;
    if let Some(best) = EmailPatternGenerator::get_best_match(&candidates) {
        info!("Best match: {} ({:.2})", best.email, best.confidence);
    }
    Ok(())
}

fn handle_classify_command(input: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let contacts: Vec<Contact> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid contacts in {}", input.display()))?;

    print_json(&ContactIdentifier::new().categorize_contacts(&contacts))
}

async fn handle_domain_command(config: &Config, name: &str) -> Result<()> {
    let guesser = DomainGuesser::from_config(&config.domain);
    match guesser.guess(name).await {
        Some(domain) => println!("{}", domain),
        None => println!("No domain found for {}", name),
    }
    Ok(())
}

async fn handle_twitter_command(config: &Config, query: &str) -> Result<()> {
    let client = HttpClient::new(None, Some(config.http.timeout_seconds))?;
    let finder = TwitterFinder::new(&config.twitter, client, ResultCache::from_config(&config.cache))?;
    print_json(&finder.find_profile(query).await)
}

async fn handle_linkedin_command(config: &Config, query: &str, profile: bool, expect: Option<&str>) -> Result<()> {
    let finder = LinkedInFinder::new(&config.linkedin, &config.http, ResultCache::from_config(&config.cache))?;

    if !profile {
        return print_json(&finder.search_profiles(query).await?);
    }

    match expect {
        Some(expected) => print_json(&finder.verify_profile(query, expected).await?),
        None => print_json(&finder.extract_public_info(query).await?),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_harness_command(
    config: &Config,
    dataset: &Path,
    size: Option<usize>,
    seed: Option<u64>,
    components: &[String],
    roles: &[String],
    report: Option<&Path>,
    json: bool,
) -> Result<()> {
    let cache = ResultCache::from_config(&config.cache);
    let sources = build_sources(config, &cache)?;
    let framework = TestFramework::new(
        dataset,
        sources,
        Arc::new(email_generator(config)?),
        config.harness.samples_dir.clone(),
    )?;

    let options = SampleOptions {
        size,
        random_seed: seed,
        ..Default::default()
    };
    let sample = framework.create_sample(&options)?;

    let components: Vec<Component> = if components.is_empty() {
        Component::ALL.to_vec()
    } else {
        components.iter().map(|c| c.parse::<Component>()).collect::<Result<Vec<_>, _>>()?
    };

    let component_results = framework.test_components(&sample, &components).await;
    let pipeline_results = framework.test_pipeline(&sample, &roles_or_default(roles, config)).await;

    let report_path = report.unwrap_or(config.harness.report_path.as_path());
    let extra = if json { vec![ReportFormat::JSON] } else { Vec::new() };
    let paths = framework
        .generate_report(&component_results, &pipeline_results, report_path, &extra)
        .await?;

    for path in paths {
        println!("Report written to {}", path.display());
    }
    println!(
        "{} organizations sampled, {} contacts found (role {} used for component runs)",
        sample.organizations.len(),
        pipeline_results.len(),
        harness::COMPONENT_ROLE
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_harness_command() {
        let args = Args::parse_from([
            "social-finder", "--verbose", "harness", "--dataset", "orgs.csv",
            "--size", "5", "--seed", "42", "--component", "csv_processor", "--json",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Harness { dataset, size, seed, component, json, .. } => {
                assert_eq!(dataset, PathBuf::from("orgs.csv"));
                assert_eq!(size, Some(5));
                assert_eq!(seed, Some(42));
                assert_eq!(component, vec!["csv_processor".to_string()]);
                assert!(json);
            }
            _ => panic!("expected harness command"),
        }
    }

    #[test]
    fn test_roles_fall_back_to_config() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(roles_or_default(&[], &config), config.integration.target_roles);
        assert_eq!(roles_or_default(&["CFO".to_string()], &config), vec!["CFO".to_string()]);
    }

    #[test]
    fn test_classify_reads_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, r#"[{"name": "Ann Lee", "title": "Treasurer", "source": "filing"}]"#).unwrap();
        assert!(handle_classify_command(&path).is_ok());

        std::fs::write(&path, "not json").unwrap();
        assert!(handle_classify_command(&path).is_err());
    }
}
