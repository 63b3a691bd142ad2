// src/domain.rs
use std::sync::Arc;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::DomainConfig;
use crate::utils::text::compact_alnum;

pub const COMMON_TLDS: &[&str] = &[".com", ".org", ".net", ".us"];

/// Decides whether a candidate domain exists
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainProbe: Send + Sync {
    async fn exists(&self, domain: &str) -> bool;
}

/// Probe that treats any domain with an address record as existing
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsProbe;

#[async_trait]
impl DomainProbe for DnsProbe {
    async fn exists(&self, domain: &str) -> bool {
        match tokio::net::lookup_host((domain, 80)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!("{} does not resolve: {}", domain, e);
                false
            }
        }
    }
}

/// Guess possible domains for an organization name
pub struct DomainGuesser {
    tlds: Vec<String>,
    probe: Arc<dyn DomainProbe>,
}

impl Default for DomainGuesser {
    fn default() -> Self {
        Self::new(COMMON_TLDS.iter().map(|s| s.to_string()).collect(), Arc::new(DnsProbe))
    }
}

impl DomainGuesser {
    pub fn new(tlds: Vec<String>, probe: Arc<dyn DomainProbe>) -> Self {
        let tlds = if tlds.is_empty() {
            COMMON_TLDS.iter().map(|s| s.to_string()).collect()
        } else {
            tlds.into_iter()
                .map(|t| if t.starts_with('.') { t } else { format!(".{}", t) })
                .collect()
        };
        Self { tlds, probe }
    }

    pub fn from_config(config: &DomainConfig) -> Self {
        Self::new(config.tlds.clone(), Arc::new(DnsProbe))
    }

    pub fn tlds(&self) -> &[String] {
        &self.tlds
    }

    /// Candidate domains in TLD order
    pub fn generate_candidates(&self, name: &str) -> Vec<String> {
        let base = compact_alnum(name);
        if base.is_empty() {
            return Vec::new();
        }
        self.tlds.iter().map(|tld| format!("{}{}", base, tld)).collect()
    }

    /// First candidate that exists
    pub async fn guess(&self, name: &str) -> Option<String> {
        for domain in self.generate_candidates(name) {
            if self.probe.exists(&domain).await {
                info!("Guessed domain {} for {}", domain, name);
                return Some(domain);
            }
        }
        debug!("No domain found for {}", name);
        None
    }
}
