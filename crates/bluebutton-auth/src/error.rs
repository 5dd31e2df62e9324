//! Error types for OAuth authentication operations

/// Errors from the authorization flow and the token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-side logic error (missing code/state, state mismatch, no
    /// refresh token). Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// Network failure talking to the token endpoint.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Token payload or transport form could not be interpreted.
    #[error("invalid token data: {0}")]
    Decode(String),
}

impl Error {
    /// HTTP status for token endpoint rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenExchange { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
