//! Shared types for the Blue Button client crates
//!
//! Holds the validated client configuration every component is constructed
//! from, the `Secret` wrapper used for the client secret, and the
//! configuration error type.

mod config;
mod error;
mod secret;

pub use config::{ClientConfig, ClientSettings, Environment, RetryPolicy, VersionSetting};
pub use error::{Error, Result};
pub use secret::Secret;
