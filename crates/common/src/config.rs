//! Client configuration types and validation
//!
//! `ClientSettings` is the loose shape a caller's loader produces (any serde
//! front end works). `ClientConfig::from_settings` validates it once and
//! yields the immutable configuration every component is built from.
//! Invalid settings fail here, never later at request time.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::secret::Secret;

/// Default Blue Button API version when the settings omit one.
const DEFAULT_VERSION: u32 = 2;

/// Named provider deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Test,
    Sandbox,
    Production,
}

impl Environment {
    /// Provider origin for this deployment (no trailing slash).
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:8000",
            Environment::Test => "https://test.bluebutton.cms.gov",
            Environment::Sandbox => "https://sandbox.bluebutton.cms.gov",
            Environment::Production => "https://api.bluebutton.cms.gov",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Local => "LOCAL",
            Environment::Test => "TEST",
            Environment::Sandbox => "SANDBOX",
            Environment::Production => "PRODUCTION",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LOCAL" => Ok(Environment::Local),
            "TEST" => Ok(Environment::Test),
            "SANDBOX" => Ok(Environment::Sandbox),
            "PRODUCTION" => Ok(Environment::Production),
            other => Err(Error::Config(format!(
                "environment must be set to LOCAL or TEST or SANDBOX or PRODUCTION, got: {other}"
            ))),
        }
    }
}

/// Retry policy for resource fetches.
///
/// `total` counts retries, so a request is attempted at most `total + 1`
/// times. `total == 0` means a single attempt with no retry handling at all.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub total: u32,
    /// Seconds; the delay before retry `n` (n >= 2) is `backoff_factor * 2^(n-1)`.
    pub backoff_factor: f64,
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total: 3,
            backoff_factor: 5.0,
            status_forcelist: vec![500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Upper bound on a single backoff sleep.
    pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

    /// Policy that performs exactly one attempt.
    pub fn disabled() -> Self {
        Self {
            total: 0,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.total > 0
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.total.saturating_add(1)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Sleep before the `retry`-th retry (1-based).
    ///
    /// The first retry goes out immediately; later ones back off
    /// exponentially, capped at two minutes.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(31) as i32;
        let secs = self.backoff_factor * 2f64.powi(exponent);
        if !secs.is_finite() || secs >= Self::MAX_BACKOFF.as_secs_f64() {
            return Self::MAX_BACKOFF;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(Error::Config(format!(
                "retry_settings.backoff_factor must be a non-negative number, got: {}",
                self.backoff_factor
            )));
        }
        if self.status_forcelist.iter().any(|s| !(100..=599).contains(s)) {
            return Err(Error::Config(format!(
                "retry_settings.status_forcelist must contain HTTP status codes, got: {:?}",
                self.status_forcelist
            )));
        }
        Ok(())
    }
}

/// API version as it appears in settings: `2` or `"2"`.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum VersionSetting {
    Number(u32),
    Text(String),
}

/// Unvalidated client settings.
///
/// Only `environment`, `client_id`, `client_secret` and `callback_url` are
/// required; everything else has a default.
#[derive(Clone, Default, Deserialize)]
pub struct ClientSettings {
    pub environment: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    pub callback_url: Option<String>,
    pub version: Option<VersionSetting>,
    /// Overrides the environment's origin (self-hosted providers, tests).
    pub base_url: Option<String>,
    #[serde(default)]
    pub retry_settings: RetryPolicy,
    pub token_refresh_on_expire: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub max_pages: Option<usize>,
}

impl ClientSettings {
    /// Settings with the four required values filled in.
    pub fn new(
        environment: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            environment: Some(environment.to_string()),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            callback_url: Some(callback_url.into()),
            ..Self::default()
        }
    }
}

/// Validated, immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    environment: Environment,
    base_url: String,
    version: u32,
    client_id: String,
    client_secret: Secret<String>,
    callback_url: String,
    retry: RetryPolicy,
    token_refresh_on_expire: bool,
    timeout: Duration,
    max_pages: Option<usize>,
}

impl ClientConfig {
    /// Validate settings and build the configuration.
    pub fn from_settings(settings: ClientSettings) -> Result<Self> {
        let environment: Environment = settings
            .environment
            .as_deref()
            .ok_or_else(|| {
                Error::Config(
                    "environment must be set to LOCAL or TEST or SANDBOX or PRODUCTION".into(),
                )
            })?
            .parse()?;

        let client_id = required("client_id", settings.client_id)?;
        let client_secret = settings
            .client_secret
            .filter(|s| !s.is_blank())
            .ok_or_else(|| missing("client_secret"))?;
        let callback_url = required("callback_url", settings.callback_url)?;

        let version = match settings.version {
            None => DEFAULT_VERSION,
            Some(VersionSetting::Number(v)) => v,
            Some(VersionSetting::Text(s)) => s.trim().parse::<u32>().map_err(|_| {
                Error::Config(format!("version must be a positive integer, got: {s}"))
            })?,
        };
        if version == 0 {
            return Err(Error::Config("version must be a positive integer, got: 0".into()));
        }

        let base_url = match settings.base_url {
            Some(url) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(Error::Config(format!(
                        "base_url must start with http:// or https://, got: {url}"
                    )));
                }
                url.trim_end_matches('/').to_string()
            }
            None => environment.base_url().to_string(),
        };

        let timeout_secs = settings.timeout_secs.unwrap_or(30);
        if timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }

        if settings.max_pages == Some(0) {
            return Err(Error::Config("max_pages must be greater than 0".into()));
        }

        settings.retry_settings.validate()?;

        Ok(Self {
            environment,
            base_url,
            version,
            client_id,
            client_secret,
            callback_url,
            retry: settings.retry_settings,
            token_refresh_on_expire: settings.token_refresh_on_expire.unwrap_or(true),
            timeout: Duration::from_secs(timeout_secs),
            max_pages: settings.max_pages,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Provider origin, no trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &Secret<String> {
        &self.client_secret
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Whether an expired token is refreshed before a resource request.
    pub fn token_refresh_on_expire(&self) -> bool {
        self.token_refresh_on_expire
    }

    /// Per-request timeout for every outbound HTTP call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Optional ceiling on the number of pages a walk may collect.
    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// `{base}/v{version}/o/authorize`
    pub fn authorize_url(&self) -> String {
        format!("{}/v{}/o/authorize", self.base_url, self.version)
    }

    /// `{base}/v{version}/o/token/`
    pub fn token_url(&self) -> String {
        format!("{}/v{}/o/token/", self.base_url, self.version)
    }

    /// `{base}/v{version}/{path}`
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}/v{}/{}",
            self.base_url,
            self.version,
            path.trim_start_matches('/')
        )
    }
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing(name))
}

fn missing(name: &str) -> Error {
    Error::Config(format!("configuration setting \"{name}\" is missing"))
}
