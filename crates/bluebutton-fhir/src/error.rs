//! Error types for resource requests and page walks

use bluebutton_auth::Token;

/// Errors from authenticated resource requests.
///
/// A non-2xx resource response is not an error: the executor hands it back
/// as data. Only the page walker, which must parse each page, turns a failed
/// continuation fetch into `Error::Page`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    /// Token refresh (or code exchange via the facade) failed.
    #[error(transparent)]
    Auth(#[from] bluebutton_auth::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Network failure or forcelisted status that outlived the retry policy.
    #[error("request to {url} failed after {attempts} attempt(s): {reason}")]
    Transport {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        reason: String,
    },

    #[error("invalid response body: {0}")]
    Decode(String),

    /// A continuation page came back non-2xx; earlier pages are discarded.
    #[error("page {url} returned {status}")]
    Page { url: String, status: u16, body: String },

    #[error("page limit of {limit} reached before the bundle chain ended")]
    PageLimit { limit: usize },

    /// The access token was refreshed before `source` occurred. The provider
    /// may have rotated the refresh token, so `token` replaces the caller's.
    #[error("{source} (after token refresh)")]
    Refreshed {
        token: Box<Token>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach a token obtained by refresh earlier in the same call.
    ///
    /// An error that already carries a refreshed token keeps it; that token
    /// is the more recent one.
    pub(crate) fn after_refresh(self, token: Token) -> Self {
        match self {
            Error::Refreshed { .. } => self,
            other => Error::Refreshed {
                token: Box::new(token),
                source: Box::new(other),
            },
        }
    }

    /// Token to keep using after this error, if a refresh happened.
    pub fn refreshed_token(&self) -> Option<&Token> {
        match self {
            Error::Refreshed { token, .. } => Some(token.as_ref()),
            _ => None,
        }
    }

    /// The failure itself, with any refresh wrapper removed.
    pub fn cause(&self) -> &Error {
        match self {
            Error::Refreshed { source, .. } => source.cause(),
            other => other,
        }
    }
}

/// Result alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;
