//! Authenticated resource requests
//!
//! `execute` resolves the target URL, refreshes an expired token when the
//! configuration asks for it, attaches the bearer and SDK headers and sends
//! a GET under the retry policy. The response comes back untouched: a 404
//! or a 500 outside the forcelist is data for the caller, not an error.

use bluebutton_auth::{Token, sdk_headers};
use common::ClientConfig;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::metrics;
use crate::resource::FhirResource;
use crate::retry::get_with_retry;

/// Per-call request description: target, query and the token to use.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    url: String,
    params: Vec<(String, String)>,
    token: Token,
}

impl RequestConfig {
    /// Request with no target yet; the resource helpers fill it in.
    pub fn new(token: Token) -> Self {
        Self {
            url: String::new(),
            params: Vec::new(),
            token,
        }
    }

    /// Relative resource path or absolute continuation URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_resource(self, resource: FhirResource) -> Self {
        self.with_url(resource.path())
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn clear_params(&mut self) {
        self.params.clear();
    }

    /// Track a refreshed token for subsequent calls.
    pub fn set_token(&mut self, token: Token) {
        self.token = token;
    }
}

/// Raw HTTP response of a resource request.
#[derive(Debug, Clone)]
pub struct FhirResponse {
    status: u16,
    url: String,
    headers: HeaderMap,
    body: String,
}

impl FhirResponse {
    pub(crate) async fn read(response: reqwest::Response) -> reqwest::Result<Self> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await?;
        metrics::record_request(status);
        Ok(Self {
            status,
            url,
            headers,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// URL the request was finally sent to, query included.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::Decode(format!("response from {} is not valid JSON: {e}", self.url)))
    }
}

/// Result of `execute`: the token actually used plus the raw response.
///
/// `refreshed` tells the caller `token` replaced the one it passed in and
/// should be carried forward.
#[derive(Debug, Clone)]
pub struct FhirOutcome {
    pub token: Token,
    pub refreshed: bool,
    pub response: FhirResponse,
}

/// Build the absolute URL for a request target.
///
/// Absolute URLs under the configured base pass through unchanged; any
/// other absolute URL is refused so the bearer token never leaves the
/// provider. Relative paths become `{base}/v{version}/{path}`.
pub fn resolve_url(config: &ClientConfig, url: &str) -> Result<String> {
    let is_absolute = url.starts_with("http://") || url.starts_with("https://");
    if !is_absolute {
        return Ok(config.resource_url(url));
    }

    let base = config.base_url();
    let under_base = url
        .strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']));
    if under_base {
        Ok(url.to_string())
    } else {
        Err(Error::Validation(format!(
            "refusing to send credentials to {url}: not under {base}"
        )))
    }
}

/// Send one authenticated GET.
///
/// When the token was refreshed and the GET then fails, the error is
/// `Error::Refreshed` carrying the new token.
#[instrument(skip_all, fields(url = %request.url()))]
pub async fn execute(
    client: &reqwest::Client,
    config: &ClientConfig,
    request: &RequestConfig,
) -> Result<FhirOutcome> {
    let url = resolve_url(config, request.url())?;

    let mut token = request.token().clone();
    let mut refreshed = false;
    if config.token_refresh_on_expire() && token.is_expired_now() {
        debug!(expires_at = %token.expires_at(), "access token expired, refreshing before request");
        token = bluebutton_auth::refresh(client, config, &token).await?;
        metrics::record_token_refresh("expired");
        refreshed = true;
    }

    match send(client, config, &url, request.params(), &token).await {
        Ok(response) => {
            debug!(status = response.status(), "resource request completed");
            Ok(FhirOutcome {
                token,
                refreshed,
                response,
            })
        }
        Err(e) if refreshed => Err(e.after_refresh(token)),
        Err(e) => Err(e),
    }
}

async fn send(
    client: &reqwest::Client,
    config: &ClientConfig,
    url: &str,
    params: &[(String, String)],
    token: &Token,
) -> Result<FhirResponse> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token()))
        .map_err(|e| Error::Validation(format!("access token is not a valid header value: {e}")))?;
    bearer.set_sensitive(true);
    let mut headers = sdk_headers();
    headers.insert(AUTHORIZATION, bearer);

    get_with_retry(client, config, url, params, headers).await
}
