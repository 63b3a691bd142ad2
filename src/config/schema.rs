use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub global: GlobalConfig,
    pub http: HttpConfig,
    pub website: WebsiteConfig,
    pub filings: FilingsConfig,
    pub email: EmailConfig,
    pub domain: DomainConfig,
    pub linkedin: LinkedInConfig,
    pub twitter: TwitterConfig,
    pub cache: CacheConfig,
    pub integration: IntegrationConfig,
    pub discovery: DiscoveryConfig,
    pub harness: HarnessConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteConfig {
    pub user_agent: String,
    pub rate_limit_seconds: f64,
    pub timeout_seconds: u64,
    pub search_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingsConfig {
    pub rate_limit_seconds: f64,
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
    #[serde(default)]
    pub search_url: Option<String>,
    pub retries: u32,
    pub backoff_base_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub rate_limit_seconds: f64,
    pub doh_url: String,
    pub smtp_port: u16,
    pub smtp_timeout_seconds: u64,
    pub helo_domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub tlds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub base_url: String,
    pub min_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub session_rotation: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub api_base: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Result cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub batch_size: usize,
    pub min_confidence: f64,
    pub max_concurrency: usize,
    pub target_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub limit: usize,
    pub rotate_every: u32,
    pub min_delay_seconds: f64,
    pub max_delay_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub samples_dir: PathBuf,
    pub report_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            global: GlobalConfig {
                data_dir: home_dir.join(".social-finder/data"),
                log_level: "info".to_string(),
            },
            http: HttpConfig {
                timeout_seconds: 10,
                user_agents: crate::utils::http::DEFAULT_USER_AGENTS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            website: WebsiteConfig {
                user_agent: crate::sources::website::DEFAULT_USER_AGENT.to_string(),
                rate_limit_seconds: 5.0,
                timeout_seconds: 10,
                search_url: "https://duckduckgo.com/html/".to_string(),
            },
            filings: FilingsConfig {
                rate_limit_seconds: 1.0,
                local_dir: None,
                search_url: None,
                retries: 5,
                backoff_base_seconds: 1.0,
            },
            email: EmailConfig {
                rate_limit_seconds: 1.0,
                doh_url: "https://cloudflare-dns.com/dns-query".to_string(),
                smtp_port: 25,
                smtp_timeout_seconds: 10,
                helo_domain: "localhost".to_string(),
            },
            domain: DomainConfig {
                tlds: crate::domain::COMMON_TLDS.iter().map(|s| s.to_string()).collect(),
            },
            linkedin: LinkedInConfig {
                base_url: "https://www.linkedin.com".to_string(),
                min_delay_seconds: 30.0,
                max_delay_seconds: 90.0,
                session_rotation: 5,
            },
            twitter: TwitterConfig {
                api_base: "https://api.twitter.com".to_string(),
                bearer_token: None,
            },
            cache: CacheConfig {
                max_entries: 10_000,
                ttl_seconds: 3600,
            },
            integration: IntegrationConfig {
                batch_size: 10,
                min_confidence: 0.6,
                max_concurrency: num_cpus::get().min(4),
                target_roles: vec!["General Counsel".to_string(), "CFO".to_string()],
            },
            discovery: DiscoveryConfig {
                limit: 20,
                rotate_every: 10,
                min_delay_seconds: 120.0,
                max_delay_seconds: 180.0,
            },
            harness: HarnessConfig {
                samples_dir: PathBuf::from("samples"),
                report_path: PathBuf::from("test_results.html"),
            },
        }
    }
}
