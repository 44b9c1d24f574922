use std::time::Duration;
use url::Url;

use crate::errors::Result;

/// Backend endpoint paths, relative to the base URL
pub mod endpoints {
    pub const LOGIN: &str = "/api/auth/login";
    pub const REFRESH: &str = "/api/auth/refresh";
    pub const REGISTER: &str = "/api/auth/register";
}

/// Default backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Time skew applied when judging access token expiry from its claims
pub const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Maximum number of body characters kept in HTTP error messages
pub const BODY_SNIPPET_LEN: usize = 200;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Duration::from_secs(10),
        }
    }
}

/// Paths of the two authentication exchanges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: endpoints::LOGIN.to_string(),
            refresh: endpoints::REFRESH.to_string(),
        }
    }
}

impl Endpoints {
    /// Whether a request path targets the refresh exchange.
    ///
    /// Matches on the path suffix so absolute URLs and prefixed paths route the
    /// same way.
    pub fn is_refresh(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.trim_end_matches('/')
            .ends_with(self.refresh.trim_end_matches('/'))
    }
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL
    pub base_url: Url,

    /// Authentication exchange endpoints
    pub endpoints: Endpoints,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create config for a backend at `base_url`
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            endpoints: Endpoints::default(),
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some("orchid-client".to_string()),
        }
    }

    /// Parse the base URL and build a config from it
    pub fn from_base_url(base_url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    pub fn with_timeouts(mut self, http_timeouts: HttpTimeouts) -> Self {
        self.http_timeouts = http_timeouts;
        self
    }

    /// Resolve a request path against the base URL
    pub fn url_for(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base_path, path.trim_start_matches('/')));
        Ok(url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_base_url(DEFAULT_BASE_URL).expect("valid default base URL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_routing() {
        let endpoints = Endpoints::default();
        assert!(endpoints.is_refresh("/api/auth/refresh"));
        assert!(endpoints.is_refresh("http://host/api/auth/refresh/"));
        assert!(endpoints.is_refresh("/api/auth/refresh?x=1"));
        assert!(!endpoints.is_refresh("/api/auth/login"));
        assert!(!endpoints.is_refresh("/api/data/species"));
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let config = ClientConfig::from_base_url("http://host:8080/backend/").unwrap();
        let url = config.url_for("/api/data/species").unwrap();
        assert_eq!(url.as_str(), "http://host:8080/backend/api/data/species");

        let config = ClientConfig::from_base_url("http://host:8080").unwrap();
        let url = config.url_for("api/auth/login").unwrap();
        assert_eq!(url.as_str(), "http://host:8080/api/auth/login");
    }
}
