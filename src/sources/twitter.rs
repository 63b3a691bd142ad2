// src/sources/twitter.rs
use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::TwitterConfig;
use crate::error::{FinderResult, FinderError};
use crate::utils::cache::ResultCache;
use crate::utils::http::HttpClient;

/// Profile hit from a user search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub username: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    screen_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default)]
    id: Value,
}

impl ApiUser {
    fn into_user(self) -> Option<TwitterUser> {
        let username = self.screen_name.or(self.username)?;
        let id = match (self.id_str, self.id) {
            (Some(id), _) => id,
            (None, Value::String(id)) => id,
            (None, Value::Number(id)) => id.to_string(),
            _ => return None,
        };
        Some(TwitterUser { username, id })
    }
}

/// Either the bare array of the v1.1 API or the `{"data": [...]}` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Users(Vec<ApiUser>),
    Envelope {
        #[serde(default)]
        data: Vec<ApiUser>,
    },
}

/// Twitter/X API wrapper for finding profiles
pub struct TwitterFinder {
    client: HttpClient,
    api_base: String,
    bearer_token: String,
    cache: ResultCache,
}

impl TwitterFinder {
    pub fn new(config: &TwitterConfig, client: HttpClient, cache: ResultCache) -> FinderResult<Self> {
        let bearer_token = config
            .bearer_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| FinderError::ConfigError("Twitter bearer token is not configured".to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bearer_token,
            cache,
        })
    }

    async fn search_users(&self, query: &str) -> FinderResult<Vec<TwitterUser>> {
        let q: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let url = format!("{}/1.1/users/search.json?q={}", self.api_base, q);

        let response = self.client.get_with_bearer(&url, &self.bearer_token).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FinderError::PlatformError {
                platform: "twitter".to_string(),
                message: format!("users search returned {}", status),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FinderError::ParseError(format!("Invalid Twitter response: {}", e)))?;
        let users = match body {
            SearchResponse::Users(users) => users,
            SearchResponse::Envelope { data } => data,
        };

        Ok(users.into_iter().filter_map(ApiUser::into_user).collect())
    }

    /// Search for profiles matching the query; API failures yield no profiles
    pub async fn find_profile(&self, query: &str) -> Vec<TwitterUser> {
        let cache_key = format!("twitter:{}", query.to_lowercase());
        if let Some(users) = self.cache.get::<Vec<TwitterUser>>(&cache_key).await {
            return users;
        }

        debug!("Searching Twitter for {}", query);
        match self.search_users(query).await {
            Ok(users) => {
                self.cache.insert(&cache_key, &users).await;
                users
            }
            Err(e) => {
                error!("Twitter API error: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{header, method, path, query_param};

    fn finder(api_base: String) -> TwitterFinder {
        let config = TwitterConfig {
            api_base,
            bearer_token: Some("secret".to_string()),
        };
        TwitterFinder::new(&config, HttpClient::new(None, Some(5)).unwrap(), ResultCache::default()).unwrap()
    }

    #[test]
    fn test_bearer_token_is_required() {
        let config = TwitterConfig {
            api_base: "https://api.twitter.com".to_string(),
            bearer_token: None,
        };
        let result = TwitterFinder::new(&config, HttpClient::new(None, None).unwrap(), ResultCache::default());
        assert!(matches!(result, Err(FinderError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_find_profile_parses_both_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/search.json"))
            .and(query_param("q", "Trust A"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"screen_name": "trusta", "id": 42, "id_str": "42"},
                {"name": "no handle"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/search.json"))
            .and(query_param("q", "Trust B"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"username": "trustb", "id": "77"}]
            })))
            .mount(&server)
            .await;

        let finder = finder(server.uri());
        let users = finder.find_profile("Trust A").await;
        assert_eq!(users, vec![TwitterUser { username: "trusta".to_string(), id: "42".to_string() }]);
        // cached, the mock expects a single call
        assert_eq!(finder.find_profile("trust a").await, users);

        let users = finder.find_profile("Trust B").await;
        assert_eq!(users[0].username, "trustb");
        assert_eq!(users[0].id, "77");
    }

    #[tokio::test]
    async fn test_api_errors_yield_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        assert!(finder(server.uri()).find_profile("anything").await.is_empty());
    }
}
