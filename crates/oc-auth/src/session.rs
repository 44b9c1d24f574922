use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, instrument, warn};

use crate::claims::{self, Claims, Role};
use crate::errors::{AuthError, Result};
use crate::exchange::AuthExchange;
use crate::models::{LoginRequest, TokenPair};
use crate::store::KeyValueStore;

/// Storage key of the persisted session record
pub const SESSION_KEY: &str = "session";

const EVENT_CAPACITY: usize = 16;

/// Identity derived from the access credential's claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.id,
            username: claims.name.clone(),
            role: claims.role,
        }
    }
}

/// Credential state of the client
///
/// Either fully anonymous or holding an access credential together with the
/// identity decoded from it. The persisted record uses the same shape.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "access_token")]
    access: Option<String>,
    #[serde(rename = "refresh_token")]
    refresh: Option<String>,
    #[serde(rename = "user_info")]
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(tokens: TokenPair, identity: Identity) -> Self {
        Self {
            access: Some(tokens.access_token),
            refresh: Some(tokens.refresh_token),
            identity: Some(identity),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.role == Role::Admin)
    }

    pub fn is_anonymous(&self) -> bool {
        self.access.is_none() && self.refresh.is_none() && self.identity.is_none()
    }

    /// Access credential and identity must be present together
    fn is_consistent(&self) -> bool {
        self.access.is_some() == self.identity.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Session")
            .field("access", &redact(&self.access))
            .field("refresh", &redact(&self.refresh))
            .field("identity", &self.identity)
            .finish()
    }
}

/// Session transitions published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(Identity),
    Refreshed,
    LoggedOut,
}

/// Owner of the process-wide session
///
/// The only component allowed to mutate the session. Every mutation is written
/// through to the [`KeyValueStore`] before the operation returns.
pub struct SessionStore {
    exchange: Arc<dyn AuthExchange>,
    store: Arc<dyn KeyValueStore>,
    state: RwLock<Session>,
    /// Serializes mutations together with their persistence writes
    commit: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Create a store starting from an anonymous session
    pub fn new(exchange: Arc<dyn AuthExchange>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_session(exchange, store, Session::anonymous())
    }

    fn with_session(
        exchange: Arc<dyn AuthExchange>,
        store: Arc<dyn KeyValueStore>,
        session: Session,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            exchange,
            store,
            state: RwLock::new(session),
            commit: Mutex::new(()),
            events,
        }
    }

    /// Create a store rehydrated from the persisted record.
    ///
    /// The stored credentials are taken as-is; their freshness is only
    /// discovered by the backend answering 401.
    #[instrument(skip_all)]
    pub async fn restore(
        exchange: Arc<dyn AuthExchange>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let session = match store.get(SESSION_KEY).await? {
            None => Session::anonymous(),
            Some(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) if session.is_consistent() => session,
                Ok(_) => {
                    warn!("Persisted session is inconsistent, starting anonymous");
                    Session::anonymous()
                }
                Err(e) => {
                    warn!("Persisted session is unreadable ({}), starting anonymous", e);
                    Session::anonymous()
                }
            },
        };

        match session.identity() {
            Some(identity) => info!(user = %identity.username, role = %identity.role, "Restored session"),
            None => debug!("No persisted session"),
        }

        Ok(Self::with_session(exchange, store, session))
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.read().is_admin()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.read().identity.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh.clone()
    }

    /// Subscribe to session transitions
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        if session.is_anonymous() {
            self.store.remove(SESSION_KEY).await
        } else {
            let record = serde_json::to_string(session)?;
            self.store.set(SESSION_KEY, &record).await
        }
    }

    /// Log in with a username and password
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: &LoginRequest) -> Result<Claims> {
        let tokens = self.exchange.login(request).await?;
        let claims = claims::decode(&tokens.access_token)?;
        let identity = Identity::from(&claims);
        let session = Session::authenticated(tokens, identity.clone());

        let _commit = self.commit.lock().await;
        *self.write() = session.clone();
        self.persist(&session).await?;

        info!(user_id = identity.user_id, role = %identity.role, "Logged in");
        self.publish(SessionEvent::LoggedIn(identity));
        Ok(claims)
    }

    /// Trade the refresh credential for a new token pair.
    ///
    /// Any failure of the exchange is reported as [`AuthError::RefreshFailed`]
    /// and clears the whole session, unless a newer login replaced it while
    /// the exchange was in flight.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<String> {
        let refresh_token = self.refresh_token().ok_or(AuthError::NoSession)?;

        let tokens = match self.exchange.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Token refresh rejected: {}", e);
                let _commit = self.commit.lock().await;
                if self.read().refresh.as_deref() == Some(refresh_token.as_str()) {
                    self.clear_logged().await;
                } else {
                    debug!("Session changed during refresh, keeping it");
                }
                return Err(AuthError::RefreshFailed {
                    reason: e.to_string(),
                });
            }
        };

        let _commit = self.commit.lock().await;

        let current = self.snapshot();
        if current.refresh.as_deref() != Some(refresh_token.as_str()) {
            // A logout or a new login landed while the exchange was in flight
            debug!("Session changed during refresh, discarding refreshed tokens");
            return current.access.ok_or(AuthError::NoSession);
        }

        let identity = match claims::decode(&tokens.access_token) {
            Ok(claims) => Identity::from(&claims),
            Err(e) => match current.identity {
                Some(identity) => {
                    warn!("Refreshed access token does not decode ({}), keeping identity", e);
                    identity
                }
                None => {
                    self.clear_logged().await;
                    return Err(AuthError::RefreshFailed {
                        reason: e.to_string(),
                    });
                }
            },
        };

        let access_token = tokens.access_token.clone();
        let session = Session::authenticated(tokens, identity);
        *self.write() = session.clone();

        // The backend has already rotated the pair; losing the write only
        // costs a re-login after restart
        if let Err(e) = self.persist(&session).await {
            error!("Failed to persist refreshed session: {}", e);
        }

        info!("Refreshed access token");
        self.publish(SessionEvent::Refreshed);
        Ok(access_token)
    }

    /// Clear the session in memory and in storage. Idempotent.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let _commit = self.commit.lock().await;
        self.clear().await
    }

    /// Caller holds the commit lock
    async fn clear(&self) -> Result<()> {
        let previous = std::mem::take(&mut *self.write());
        let persisted = self.persist(&Session::anonymous()).await;

        if !previous.is_anonymous() {
            info!("Logged out");
            self.publish(SessionEvent::LoggedOut);
        }
        persisted
    }

    /// [`Self::clear`] for refresh failures, where the refresh error wins
    async fn clear_logged(&self) {
        if let Err(e) = self.clear().await {
            error!("Failed to clear persisted session: {}", e);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::MemoryStore;
    use crate::test_support::{ScriptedExchange, token_for};

    fn alice_tokens() -> TokenPair {
        TokenPair::new(
            "h.eyJpZCI6MSwibmFtZSI6ImFsaWNlIiwicm9sZSI6InVzZXIifQ.s",
            "r1",
        )
    }

    fn store_with(exchange: ScriptedExchange) -> (SessionStore, MemoryStore) {
        let kv = MemoryStore::new();
        let store = SessionStore::new(Arc::new(exchange), Arc::new(kv.clone()));
        (store, kv)
    }

    #[tokio::test]
    async fn test_login_decodes_identity() {
        let (store, _kv) = store_with(ScriptedExchange::new().login_ok(alice_tokens()));

        let claims = store
            .login(&LoginRequest::new("alice", "x"))
            .await
            .unwrap();

        assert_eq!(claims, Claims::new(1, "alice", Role::User));
        assert!(store.is_authenticated());
        assert!(!store.is_admin());
        assert_eq!(
            store.current_identity(),
            Some(Identity {
                user_id: 1,
                username: "alice".to_string(),
                role: Role::User,
            })
        );
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_login_snapshot_round_trip() {
        let exchange = ScriptedExchange::new().login_ok(TokenPair::new(
            token_for(9, "root", Role::Admin),
            "r9",
        ));
        let (store, kv) = store_with(exchange);
        store.login(&LoginRequest::new("root", "pw")).await.unwrap();
        assert!(store.is_admin());

        let restored = SessionStore::restore(Arc::new(ScriptedExchange::new()), Arc::new(kv))
            .await
            .unwrap();
        assert_eq!(restored.snapshot(), store.snapshot());
        assert!(restored.is_admin());
    }

    #[tokio::test]
    async fn test_login_failure_propagates_unchanged() {
        let (store, kv) = store_with(ScriptedExchange::new().login_rejected());

        let err = store
            .login(&LoginRequest::new("alice", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::AuthenticationFailed { .. }));
        assert!(!store.is_authenticated());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_login_with_malformed_token_keeps_session() {
        let (store, kv) =
            store_with(ScriptedExchange::new().login_ok(TokenPair::new("not-a-token", "r")));

        let err = store.login(&LoginRequest::new("a", "b")).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredential(_)));
        assert!(store.snapshot().is_anonymous());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_persisted_record() {
        let (store, kv) = store_with(ScriptedExchange::new().login_ok(alice_tokens()));
        store.login(&LoginRequest::new("alice", "x")).await.unwrap();
        assert!(!kv.is_empty());

        store.logout().await.unwrap();
        store.logout().await.unwrap();
        assert!(kv.is_empty());

        let restored = SessionStore::restore(Arc::new(ScriptedExchange::new()), Arc::new(kv))
            .await
            .unwrap();
        assert!(restored.snapshot().is_anonymous());
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let exchange = ScriptedExchange::new();
        let calls = exchange.refresh_calls();
        let (store, _kv) = store_with(exchange);

        assert!(matches!(store.refresh().await, Err(AuthError::NoSession)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_and_persists() {
        let new_access = token_for(1, "alice", Role::Admin);
        let exchange = ScriptedExchange::new()
            .login_ok(alice_tokens())
            .refresh_ok(TokenPair::new(new_access.clone(), "r2"));
        let (store, kv) = store_with(exchange);
        store.login(&LoginRequest::new("alice", "x")).await.unwrap();
        let mut events = store.subscribe();

        let access = store.refresh().await.unwrap();

        assert_eq!(access, new_access);
        assert_eq!(store.access_token(), Some(new_access));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
        assert!(store.is_admin());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);

        let persisted: Session =
            serde_json::from_str(&kv.get(SESSION_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted, store.snapshot());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_everything() {
        let exchange = ScriptedExchange::new()
            .login_ok(alice_tokens())
            .refresh_rejected();
        let (store, kv) = store_with(exchange);
        store.login(&LoginRequest::new("alice", "x")).await.unwrap();
        let mut events = store.subscribe();

        let err = store.refresh().await.unwrap_err();

        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert!(store.snapshot().is_anonymous());
        assert!(kv.is_empty());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    }

    #[tokio::test]
    async fn test_failed_refresh_spares_newer_login() {
        let exchange = ScriptedExchange::new()
            .login_ok(alice_tokens())
            .login_ok(TokenPair::new(token_for(1, "alice", Role::User), "r-new"))
            .refresh_rejected()
            .refresh_delay(Duration::from_millis(200));
        let kv = MemoryStore::new();
        let store = Arc::new(SessionStore::new(Arc::new(exchange), Arc::new(kv.clone())));
        store.login(&LoginRequest::new("alice", "x")).await.unwrap();

        let refreshing = tokio::spawn({
            let store = store.clone();
            async move { store.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.login(&LoginRequest::new("alice", "x")).await.unwrap();

        let err = refreshing.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert!(store.is_authenticated());
        assert_eq!(store.refresh_token().as_deref(), Some("r-new"));

        let persisted: Session =
            serde_json::from_str(&kv.get(SESSION_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.refresh_token(), Some("r-new"));
    }

    /// Store whose removals always fail
    struct StickyStore(MemoryStore);

    #[async_trait::async_trait]
    impl KeyValueStore for StickyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.set(key, value).await
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(AuthError::Storage("disk unplugged".to_string()))
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_reported_even_if_clearing_storage_fails() {
        let exchange = ScriptedExchange::new()
            .login_ok(alice_tokens())
            .refresh_rejected();
        let store = SessionStore::new(
            Arc::new(exchange),
            Arc::new(StickyStore(MemoryStore::new())),
        );
        store.login(&LoginRequest::new("alice", "x")).await.unwrap();

        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert!(store.snapshot().is_anonymous());
    }

    #[tokio::test]
    async fn test_undecodable_refresh_without_identity_logs_out() {
        let kv = MemoryStore::new();
        kv.set(
            SESSION_KEY,
            r#"{"access_token":null,"refresh_token":"r1","user_info":null}"#,
        )
        .await
        .unwrap();
        let exchange = ScriptedExchange::new().refresh_ok(TokenPair::new("garbage", "r2"));
        let store = SessionStore::restore(Arc::new(exchange), Arc::new(kv.clone()))
            .await
            .unwrap();
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));

        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert!(store.snapshot().is_anonymous());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_restore_ignores_corrupt_records() {
        let kv = MemoryStore::new();
        kv.set(SESSION_KEY, "{not json").await.unwrap();
        let store = SessionStore::restore(Arc::new(ScriptedExchange::new()), Arc::new(kv.clone()))
            .await
            .unwrap();
        assert!(store.snapshot().is_anonymous());

        // access token without identity
        kv.set(SESSION_KEY, r#"{"access_token":"a","refresh_token":"r","user_info":null}"#)
            .await
            .unwrap();
        let store = SessionStore::restore(Arc::new(ScriptedExchange::new()), Arc::new(kv))
            .await
            .unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_session_debug_is_redacted() {
        let session = Session::authenticated(
            TokenPair::new("secret-access", "secret-refresh"),
            Identity {
                user_id: 1,
                username: "alice".to_string(),
                role: Role::User,
            },
        );
        let printed = format!("{:?}", session);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("alice"));
    }
}
