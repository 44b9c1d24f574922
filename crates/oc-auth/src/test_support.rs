use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::StatusCode;

use crate::claims::{Claims, Role};
use crate::errors::{AuthError, Result};
use crate::exchange::AuthExchange;
use crate::models::{LoginRequest, TokenPair};

pub fn token_for(id: i64, name: &str, role: Role) -> String {
    Claims::new(id, name, role).to_unsigned_token()
}

/// In-process exchange with canned answers
#[derive(Default)]
pub struct ScriptedExchange {
    /// Successive login answers; the last one repeats
    logins: Vec<TokenPair>,
    login_calls: AtomicUsize,
    refresh: Option<TokenPair>,
    refresh_delay: Duration,
    refresh_calls: Arc<AtomicUsize>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_ok(mut self, tokens: TokenPair) -> Self {
        self.logins.push(tokens);
        self
    }

    pub fn login_rejected(mut self) -> Self {
        self.logins.clear();
        self
    }

    pub fn refresh_ok(mut self, tokens: TokenPair) -> Self {
        self.refresh = Some(tokens);
        self
    }

    pub fn refresh_rejected(mut self) -> Self {
        self.refresh = None;
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn refresh_calls(&self) -> Arc<AtomicUsize> {
        self.refresh_calls.clone()
    }
}

#[async_trait::async_trait]
impl AuthExchange for ScriptedExchange {
    async fn login(&self, _request: &LoginRequest) -> Result<TokenPair> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.logins.get(n).or(self.logins.last());
        answer.cloned().ok_or(AuthError::AuthenticationFailed {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid username or password".to_string(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        self.refresh.clone().ok_or(AuthError::Http {
            status: StatusCode::UNAUTHORIZED,
            body_snippet: "refresh token expired".to_string(),
        })
    }
}
