pub mod cli;
pub mod config;
pub mod core;
pub mod discovery;
pub mod domain;
pub mod email;
pub mod error;
pub mod harness;
pub mod identifier;
pub mod integration;
pub mod logging;
pub mod reporting;
pub mod sources;
pub mod utils;

// Re-export main types for easier access
pub use crate::config::Config;
pub use crate::core::{Organization, OrganizationProcessor};
pub use error::{FinderError, FinderResult};
pub use identifier::{Contact, ContactIdentifier, ContactSource, MatchedContact};
pub use integration::{ContactIntegration, ContactRecord, Sources};
pub use discovery::DiscoveryRun;
pub use email::EmailPatternGenerator;
pub use domain::DomainGuesser;
pub use harness::TestFramework;
pub use reporting::{ReportManager, ReportFormat, HarnessReport};
