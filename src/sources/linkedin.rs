// src/sources/linkedin.rs
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::config::{HttpConfig, LinkedInConfig};
use crate::error::{FinderResult, FinderError};
use crate::utils::cache::ResultCache;
use crate::utils::http::HttpClient;
use crate::utils::rate_limit::{Pacing, SessionRotator};
use crate::utils::text::{decode_entities, html_to_lines};
use super::{ProfileFinder, ProfileHit, ProfileInfo};

const MAX_RESULTS: usize = 10;

static HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^"]+)""#).expect("valid regex"));
static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex"));
static HEADLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<div[^>]*class="[^"]*\btext-body-medium\b[^"]*"[^>]*>(.*?)</div>"#).expect("valid regex")
});
static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span[^>]*class="[^"]*\btext-body-small\b[^"]*"[^>]*>(.*?)</span>"#).expect("valid regex")
});

/// LinkedIn public profile finder working over plain HTTP
///
/// Every search and profile read is preceded by a randomized pause, and the
/// session (cookies and user agent) is replaced after a configured number of
/// operations.
pub struct LinkedInFinder {
    client: HttpClient,
    base_url: Url,
    pacing: Pacing,
    rotator: Mutex<SessionRotator>,
    cache: ResultCache,
}

impl LinkedInFinder {
    pub fn new(config: &LinkedInConfig, http: &HttpConfig, cache: ResultCache) -> FinderResult<Self> {
        let client = HttpClient::with_user_agents(http.user_agents.clone(), Some(http.timeout_seconds))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FinderError::ConfigError(format!("Invalid LinkedIn base URL {}: {}", config.base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            pacing: Pacing::new(config.min_delay_seconds, config.max_delay_seconds),
            rotator: Mutex::new(SessionRotator::new(config.session_rotation.max(1))),
            cache,
        })
    }

    /// Replace the pause drawn before each request
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    fn record_operation(&self) -> FinderResult<()> {
        let due = self.rotator.lock().increment();
        if due {
            debug!("Rotating LinkedIn session");
            self.client.rotate_session()?;
        }
        Ok(())
    }

    fn search_url(&self, kind: &str, query: &str) -> FinderResult<Url> {
        let mut url = self
            .base_url
            .join(&format!("search/results/{}/", kind))
            .map_err(|e| FinderError::UnexpectedError(format!("Failed to build search URL: {}", e)))?;
        url.query_pairs_mut().append_pair("keywords", query);
        Ok(url)
    }

    /// Distinct absolute links containing `marker`, in page order
    fn collect_links(&self, html: &str, marker: &str) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        for capture in HREF.captures_iter(html) {
            let href = decode_entities(&capture[1]);
            let Ok(mut url) = self.base_url.join(&href) else { continue };
            if !url.path().contains(marker) {
                continue;
            }
            url.set_query(None);
            url.set_fragment(None);
            let link = url.to_string();
            if !links.contains(&link) {
                links.push(link);
            }
            if links.len() >= MAX_RESULTS {
                break;
            }
        }
        links
    }

    async fn search(&self, kind: &str, marker: &str, query: &str) -> FinderResult<Vec<String>> {
        let cache_key = format!("linkedin:{}:{}", kind, query.to_lowercase());
        if let Some(links) = self.cache.get::<Vec<String>>(&cache_key).await {
            return Ok(links);
        }

        self.pacing.pause().await;
        let url = self.search_url(kind, query)?;
        let links = match self.client.get_text(url.as_str()).await? {
            Some(html) => self.collect_links(&html, marker),
            None => Vec::new(),
        };
        self.record_operation()?;

        info!("LinkedIn {} search for {:?} returned {} links", kind, query, links.len());
        self.cache.insert(&cache_key, &links).await;
        Ok(links)
    }
}

fn element_text(pattern: &Regex, html: &str) -> Option<String> {
    let inner = pattern.captures(html)?.get(1)?.as_str();
    let text = html_to_lines(inner).join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Name, headline and location from a public profile page
pub fn parse_profile(html: &str) -> ProfileInfo {
    ProfileInfo {
        name: element_text(&H1, html),
        headline: element_text(&HEADLINE, html),
        location: element_text(&LOCATION, html),
    }
}

#[async_trait]
impl ProfileFinder for LinkedInFinder {
    async fn search_profiles(&self, query: &str) -> FinderResult<Vec<ProfileHit>> {
        let links = self.search("people", "/in/", query).await?;
        Ok(links.into_iter().map(|url| ProfileHit { url, name: None }).collect())
    }

    async fn search_companies(&self, query: &str) -> FinderResult<Vec<String>> {
        self.search("companies", "/company/", query).await
    }

    async fn extract_public_info(&self, profile_url: &str) -> FinderResult<ProfileInfo> {
        self.pacing.pause().await;
        debug!("Fetching profile {}", profile_url);

        let info = match self.client.get_text(profile_url).await? {
            Some(html) => parse_profile(&html),
            None => ProfileInfo::default(),
        };
        self.record_operation()?;
        Ok(info)
    }

    async fn rotate_session(&self) -> FinderResult<()> {
        self.client.rotate_session()?;
        self.rotator.lock().reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{method, path, query_param};

    const PROFILE_HTML: &str = r#"
        <main>
          <h1 class="top-card">Jane   Smith</h1>
          <div class="text-body-medium break-words">General Counsel at Trust A</div>
          <span class="text-body-small inline">Chicago, Illinois</span>
        </main>
    "#;

    fn finder(base_url: String) -> LinkedInFinder {
        let config = LinkedInConfig {
            base_url,
            min_delay_seconds: 0.0,
            max_delay_seconds: 0.0,
            session_rotation: 2,
        };
        let http = HttpConfig {
            timeout_seconds: 5,
            user_agents: vec!["test-agent".to_string()],
        };
        LinkedInFinder::new(&config, &http, ResultCache::default())
            .unwrap()
            .with_pacing(Pacing::disabled())
    }

    #[test]
    fn test_parse_profile() {
        let info = parse_profile(PROFILE_HTML);
        assert_eq!(info.name.as_deref(), Some("Jane Smith"));
        assert_eq!(info.headline.as_deref(), Some("General Counsel at Trust A"));
        assert_eq!(info.location.as_deref(), Some("Chicago, Illinois"));

        assert_eq!(parse_profile("<p>nothing</p>"), ProfileInfo::default());
    }

    #[tokio::test]
    async fn test_search_profiles_collects_distinct_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/results/people/"))
            .and(query_param("keywords", "Trust A General Counsel"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a class="app-aware-link" href="/in/jane-smith?trk=1">Jane</a>
                   <a class="app-aware-link" href="/in/jane-smith?trk=2">Jane again</a>
                   <a href="/company/trust-a/">Trust A</a>
                   <a href="/in/bob-lee/">Bob</a>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let finder = finder(format!("{}/", server.uri()));
        let hits = finder.search_profiles("Trust A General Counsel").await.unwrap();
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();

        assert_eq!(
            urls,
            vec![
                format!("{}/in/jane-smith", server.uri()),
                format!("{}/in/bob-lee/", server.uri()),
            ]
        );

        // cached
        assert_eq!(finder.search_profiles("Trust A General Counsel").await.unwrap(), hits);
    }

    #[tokio::test]
    async fn test_search_companies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/results/companies/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/in/someone">x</a><a href="/company/trust-a/">Trust A</a>"#,
            ))
            .mount(&server)
            .await;

        let finder = finder(format!("{}/", server.uri()));
        let companies = finder.search_companies("Trust A").await.unwrap();
        assert_eq!(companies, vec![format!("{}/company/trust-a/", server.uri())]);
    }

    #[tokio::test]
    async fn test_verify_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/in/jane-smith"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_HTML))
            .mount(&server)
            .await;

        let finder = finder(format!("{}/", server.uri()));
        let url = format!("{}/in/jane-smith", server.uri());

        let verified = finder.verify_profile(&url, "jane smith").await.unwrap();
        assert_eq!(verified.confidence, 0.9);
        assert_eq!(verified.profile.location.as_deref(), Some("Chicago, Illinois"));

        let other = finder.verify_profile(&url, "John Doe").await.unwrap();
        assert_eq!(other.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_rotation_counter() {
        let server = MockServer::start().await;
        let finder = finder(format!("{}/", server.uri()));

        finder.extract_public_info(&format!("{}/in/a", server.uri())).await.unwrap();
        assert_eq!(finder.rotator.lock().counter(), 1);
        finder.extract_public_info(&format!("{}/in/b", server.uri())).await.unwrap();
        assert_eq!(finder.rotator.lock().counter(), 0);
    }
}
