// src/utils/http.rs
use std::sync::Arc;
use std::time::Duration;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::error::{FinderResult, FinderError};

/// Desktop browser agents used for session rotation
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113 Safari/537.36",
];

struct Session {
    client: Client,
    user_agent: String,
}

/// HTTP client with a rotatable browser-like session
#[derive(Clone)]
pub struct HttpClient {
    session: Arc<RwLock<Session>>,
    user_agents: Arc<Vec<String>>,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client that always identifies with one user agent
    pub fn new(user_agent: Option<String>, timeout_secs: Option<u64>) -> FinderResult<Self> {
        let user_agent = user_agent
            .unwrap_or_else(|| format!("social-finder/{}", env!("CARGO_PKG_VERSION")));
        Self::with_user_agents(vec![user_agent], timeout_secs)
    }

    /// Create a client that picks a random agent from the pool for every session
    pub fn with_user_agents(user_agents: Vec<String>, timeout_secs: Option<u64>) -> FinderResult<Self> {
        if user_agents.is_empty() {
            return Err(FinderError::InvalidInput("User agent pool is empty".to_string()));
        }

        let timeout = Duration::from_secs(timeout_secs.unwrap_or(30));
        let session = Self::build_session(&user_agents, timeout)?;

        Ok(Self {
            session: Arc::new(RwLock::new(session)),
            user_agents: Arc::new(user_agents),
            timeout,
        })
    }

    fn build_session(user_agents: &[String], timeout: Duration) -> FinderResult<Session> {
        let user_agent = user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| FinderError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Started HTTP session with user agent {}", user_agent);
        Ok(Session { client, user_agent })
    }

    /// Replace the session with a fresh cookie store and a newly drawn user agent
    pub fn rotate_session(&self) -> FinderResult<()> {
        let session = Self::build_session(&self.user_agents, self.timeout)?;
        *self.session.write() = session;
        debug!("Rotated HTTP session");
        Ok(())
    }

    fn client(&self) -> Client {
        self.session.read().client.clone()
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> FinderResult<Response> {
        debug!("GET {}", url);

        self.client()
            .get(url)
            .send()
            .await
            .map_err(|e| FinderError::NetworkError(format!("Failed to GET {}: {}", url, e)))
    }

    /// Make a GET request with a bearer token
    pub async fn get_with_bearer(&self, url: &str, token: &str) -> FinderResult<Response> {
        debug!("GET {} (authenticated)", url);

        self.client()
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FinderError::NetworkError(format!("Failed to GET {}: {}", url, e)))
    }

    /// Make a GET request with extra headers
    pub async fn get_with_headers(&self, url: &str, headers: &[(&str, &str)]) -> FinderResult<Response> {
        debug!("GET {}", url);

        let mut request = self.client().get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        request
            .send()
            .await
            .map_err(|e| FinderError::NetworkError(format!("Failed to GET {}: {}", url, e)))
    }

    /// GET a page and return its body on 200, `None` otherwise
    pub async fn get_text(&self, url: &str) -> FinderResult<Option<String>> {
        let response = self.get(url).await?;
        let status = response.status();

        if status != StatusCode::OK {
            warn!("Non-200 status {} for {}", status, url);
            return Ok(None);
        }

        Ok(Some(response.text().await?))
    }

    /// Make a HEAD request
    pub async fn head(&self, url: &str) -> FinderResult<Response> {
        debug!("HEAD {}", url);

        self.client()
            .head(url)
            .send()
            .await
            .map_err(|e| FinderError::NetworkError(format!("Failed to HEAD {}: {}", url, e)))
    }

    /// Check if a URL answers with a success or redirect status
    pub async fn is_url_live(&self, url: &str) -> bool {
        match self.head(url).await {
            Ok(response) => {
                let status = response.status();
                status.is_success() || status.is_redirection()
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Fetch the raw body of a URL, failing on non-success status
    pub async fn get_bytes(&self, url: &str) -> FinderResult<Vec<u8>> {
        debug!("Downloading {}", url);

        let response = self.get(url).await?;
        let response = response
            .error_for_status()
            .map_err(|e| FinderError::NetworkError(format!("Download of {} failed: {}", url, e)))?;
        let bytes = response.bytes().await?;

        Ok(bytes.to_vec())
    }

    /// Get the user agent of the current session
    pub fn user_agent(&self) -> String {
        self.session.read().user_agent.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{method, path, header};

    #[test]
    fn test_rotation_draws_from_pool() {
        let pool = vec!["agent-a".to_string(), "agent-b".to_string()];
        let client = HttpClient::with_user_agents(pool.clone(), Some(5)).unwrap();

        for _ in 0..10 {
            client.rotate_session().unwrap();
            assert!(pool.contains(&client.user_agent()));
        }
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(HttpClient::with_user_agents(Vec::new(), None).is_err());
    }

    #[tokio::test]
    async fn test_get_text_sends_user_agent_and_skips_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .and(header("user-agent", "finder-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(Some("finder-test".to_string()), Some(5)).unwrap();

        let body = client.get_text(&format!("{}/ok", server.uri())).await.unwrap();
        assert_eq!(body.as_deref(), Some("hello"));

        let missing = client.get_text(&format!("{}/missing", server.uri())).await.unwrap();
        assert!(missing.is_none());
        assert!(client.get_bytes(&format!("{}/missing", server.uri())).await.is_err());
    }

    #[tokio::test]
    async fn test_is_url_live() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(None, Some(5)).unwrap();

        assert!(client.is_url_live(&format!("{}/live", server.uri())).await);
        assert!(client.is_url_live(&format!("{}/moved", server.uri())).await);
        assert!(!client.is_url_live(&format!("{}/gone", server.uri())).await);
        assert_eq!(client.head(&format!("{}/gone", server.uri())).await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_bytes_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = HttpClient::new(None, Some(5)).unwrap();
        let bytes = client.get_bytes(&format!("{}/file.bin", server.uri())).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
