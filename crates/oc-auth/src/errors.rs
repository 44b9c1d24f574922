use thiserror::Error;

/// Errors raised by the authenticated request pipeline
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Authentication failed ({status}): {message}")]
    AuthenticationFailed {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Token refresh failed - please log in again: {reason}")]
    RefreshFailed { reason: String },

    #[error("No session - nothing to refresh")]
    NoSession,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Timed out waiting for the storage lock")]
    LockTimeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// HTTP status carried by the error, if the backend answered at all
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Http { status, .. } | Self::AuthenticationFailed { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// True for a 401 answer from the backend
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
    }

    /// True when the session is gone and the user has to log in again
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. } | Self::NoSession)
    }

    /// Rebuild a refresh outcome for a follower of a refresh flight.
    ///
    /// Only `NoSession` keeps its identity; everything else is reported as
    /// `RefreshFailed` carrying the leader's message.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            Self::NoSession => Self::NoSession,
            Self::RefreshFailed { reason } => Self::RefreshFailed {
                reason: reason.clone(),
            },
            other => Self::RefreshFailed {
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_unauthorized_detection() {
        let err = AuthError::Http {
            status: StatusCode::UNAUTHORIZED,
            body_snippet: String::new(),
        };
        assert!(err.is_unauthorized());

        let err = AuthError::Http {
            status: StatusCode::FORBIDDEN,
            body_snippet: String::new(),
        };
        assert!(!err.is_unauthorized());
        assert!(!AuthError::NoSession.is_unauthorized());
    }

    #[test]
    fn test_replicate_keeps_refresh_semantics() {
        let err = AuthError::RefreshFailed {
            reason: "expired".to_string(),
        };
        assert!(matches!(
            err.replicate(),
            AuthError::RefreshFailed { reason } if reason == "expired"
        ));
        assert!(matches!(AuthError::NoSession.replicate(), AuthError::NoSession));
        assert!(matches!(
            AuthError::LockTimeout.replicate(),
            AuthError::RefreshFailed { .. }
        ));
        assert!(AuthError::NoSession.requires_login());
    }
}
