//! Blue Button provider constants
//!
//! Header values identifying this client library to the provider. They are
//! not secrets; the provider uses them for SDK usage tracking only.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// SDK identification header name
pub const SDK_HEADER_KEY: &str = "X-BLUEBUTTON-SDK";

/// SDK identification header value (implementation language)
pub const SDK_HEADER: &str = "rust";

/// SDK version header name
pub const SDK_VERSION_HEADER_KEY: &str = "X-BLUEBUTTON-SDK-VERSION";

/// Version reported in `SDK_VERSION_HEADER_KEY`
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of the random strings behind `state` and the PKCE verifier,
/// before base64url encoding.
pub const RANDOM_STRING_LENGTH: usize = 32;

/// Identification headers attached to every outbound call.
pub fn sdk_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-bluebutton-sdk"),
        HeaderValue::from_static(SDK_HEADER),
    );
    headers.insert(
        HeaderName::from_static("x-bluebutton-sdk-version"),
        HeaderValue::from_static(SDK_VERSION),
    );
    headers
}
