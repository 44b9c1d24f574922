//! Structural decoding of access credentials.
//!
//! Access credentials are compact three-segment tokens whose middle segment is
//! base64url-encoded JSON. The signature is never checked here: the backend is
//! the only party that enforces the claims, the client reads them to pick a
//! landing page and to show who is logged in.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TOKEN_EXPIRY_SKEW;
use crate::errors::{AuthError, Result};

/// Account role as issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(AuthError::InvalidResponse(format!("Unknown role: {}", other))),
        }
    }
}

/// Claims carried in the payload segment of an access credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub name: String,
    pub role: Role,
    /// Expiry as seconds since the Unix epoch, when the backend sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn new(id: i64, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            exp: None,
        }
    }

    pub fn with_exp(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Display hint only; requests are never refused on this basis
    pub fn is_expired(&self) -> bool {
        let skew = chrono::Duration::from_std(TOKEN_EXPIRY_SKEW)
            .unwrap_or(chrono::Duration::seconds(30));
        self.expires_at()
            .is_some_and(|expires_at| Utc::now() + skew >= expires_at)
    }

    /// Encode these claims as an unsigned token (`header.payload.sig` with
    /// placeholder header and signature). Used by mock backends and fixtures.
    pub fn to_unsigned_token(&self) -> String {
        let payload = serde_json::to_vec(self).unwrap_or_default();
        format!(
            "{}.{}.unsigned",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }
}

/// Decode the claims of an access credential without verifying it
pub fn decode(token: &str) -> Result<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::MalformedCredential(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let payload = segments[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(AuthError::MalformedCredential(
            "empty payload segment".to_string(),
        ));
    }

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::MalformedCredential(format!("invalid base64url payload: {}", e)))?;

    serde_json::from_slice(&raw)
        .map_err(|e| AuthError::MalformedCredential(format!("invalid claims payload: {}", e)))
}
