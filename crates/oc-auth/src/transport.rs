use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::{BODY_SNIPPET_LEN, ClientConfig};
use crate::errors::{AuthError, Result};
use crate::request::{ApiRequest, ApiResponse};

/// Raw HTTP executor: one request, one answer, no session awareness
#[derive(Debug, Clone)]
pub struct Transport {
    config: ClientConfig,
    http: Client,
}

impl Transport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("orchid-client"))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute `request`, optionally authenticated with `bearer`.
    ///
    /// Non-2xx answers become [`AuthError::Http`]; timeouts and connection
    /// failures become [`AuthError::Network`].
    #[instrument(skip(self, request, bearer), fields(method = %request.method, path = %request.path, retried = request.retried))]
    pub async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let url = self.config.url_for(&request.path)?;
        let mut builder = self.http.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(%status, "Received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http {
                status,
                body_snippet: body.chars().take(BODY_SNIPPET_LEN).collect(),
            });
        }

        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse { status, body })
    }
}
