use oc_auth::AuthError;
use thiserror::Error;

/// Errors of the data access layer
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Response is missing the '{field}' field")]
    MissingId { field: &'static str },
}

impl DataError {
    /// True when the caller has to send the user back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Auth(e) if e.requires_login())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
