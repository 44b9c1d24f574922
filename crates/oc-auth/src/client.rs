use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::claims::Claims;
use crate::config::ClientConfig;
use crate::errors::{AuthError, Result};
use crate::exchange::HttpAuthExchange;
use crate::models::LoginRequest;
use crate::refresh::RefreshCoordinator;
use crate::request::{ApiRequest, ApiResponse};
use crate::session::SessionStore;
use crate::store::KeyValueStore;
use crate::transport::Transport;

/// Authenticated request pipeline
///
/// Every backend call of the application goes through [`ApiClient::send`],
/// which attaches the session's credential and recovers from one expired
/// access credential per request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Transport,
    session: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Build a client talking HTTP to `config.base_url`, rehydrating the
    /// session from `store`
    pub async fn connect(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let transport = Transport::new(config)?;
        let exchange = Arc::new(HttpAuthExchange::new(transport.clone()));
        let session = Arc::new(SessionStore::restore(exchange, store).await?);
        Ok(Self::from_parts(transport, session))
    }

    /// Build a client over an existing session store, e.g. one using a
    /// custom [`AuthExchange`](crate::exchange::AuthExchange)
    pub fn from_parts(transport: Transport, session: Arc<SessionStore>) -> Self {
        let coordinator = Arc::new(RefreshCoordinator::new(session.clone()));
        Self {
            transport,
            session,
            coordinator,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<Claims> {
        self.session.login(request).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await
    }

    fn targets_refresh(&self, request: &ApiRequest) -> bool {
        self.config().endpoints.is_refresh(&request.path)
    }

    /// Credential for `request`: the refresh exchange authenticates with the
    /// refresh credential, everything else with the access credential
    fn credential_for(&self, request: &ApiRequest) -> Option<String> {
        if self.targets_refresh(request) {
            self.session.refresh_token()
        } else {
            self.session.access_token()
        }
    }

    /// Send `request`, refreshing the access credential and replaying the
    /// request once if the backend answers 401
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let sent_with = self.credential_for(&request);

        match self.transport.execute(&request, sent_with.as_deref()).await {
            Err(e) if e.is_unauthorized() && !request.retried && !self.targets_refresh(&request) => {
                request.retried = true;

                let fresh = match self.session.access_token() {
                    Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                        debug!("Access token changed while request was in flight, replaying with it");
                        current
                    }
                    None if sent_with.is_some() => {
                        warn!("Session ended while request was in flight");
                        return Err(AuthError::RefreshFailed {
                            reason: "session ended while the request was in flight".to_string(),
                        });
                    }
                    _ => self.coordinator.coordinate_refresh().await.inspect_err(|e| {
                        warn!("Cannot recover from 401: {}", e);
                    })?,
                };

                debug!("Replaying request with refreshed access token");
                self.transport.execute(&request, Some(&fresh)).await
            }
            other => other,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }
}
