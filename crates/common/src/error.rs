//! Common error types

use thiserror::Error;

/// Configuration error raised while building a `ClientConfig`.
///
/// Always fatal: a client is never constructed from partially valid settings.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
