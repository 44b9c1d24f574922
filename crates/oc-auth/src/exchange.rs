use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::config::Endpoints;
use crate::errors::{AuthError, Result};
use crate::models::{ErrorBody, LoginRequest, TokenPair};
use crate::request::ApiRequest;
use crate::transport::Transport;

/// The two credential exchanges offered by the backend
#[async_trait::async_trait]
pub trait AuthExchange: Send + Sync {
    /// Trade a username and password for a token pair
    async fn login(&self, request: &LoginRequest) -> Result<TokenPair>;

    /// Trade a refresh credential for a new token pair
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;
}

/// [`AuthExchange`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthExchange {
    transport: Transport,
    endpoints: Endpoints,
}

impl HttpAuthExchange {
    pub fn new(transport: Transport) -> Self {
        let endpoints = transport.config().endpoints.clone();
        Self {
            transport,
            endpoints,
        }
    }
}

#[async_trait::async_trait]
impl AuthExchange for HttpAuthExchange {
    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn login(&self, request: &LoginRequest) -> Result<TokenPair> {
        debug!("Exchanging username and password for tokens");
        let call = ApiRequest::post(&self.endpoints.login).json(request)?;

        let response = match self.transport.execute(&call, None).await {
            Ok(response) => response,
            Err(AuthError::Http {
                status,
                body_snippet,
            }) if matches!(
                status,
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
            {
                return Err(AuthError::AuthenticationFailed {
                    status,
                    message: ErrorBody::message_from(&body_snippet),
                });
            }
            Err(e) => return Err(e),
        };

        response.json()
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        debug!("Exchanging refresh token for a new token pair");
        let call = ApiRequest::post(&self.endpoints.refresh);
        let response = self.transport.execute(&call, Some(refresh_token)).await?;
        response.json()
    }
}
