//! PKCE (Proof Key for Code Exchange) and CSRF state generation per RFC 7636
//!
//! One `AuthRequestContext` is generated per login attempt. Its `state` is
//! echoed back by the provider on the callback and must match exactly; the
//! verifier is sent during code exchange, the challenge goes into the
//! authorization URL.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::ClientConfig;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::constants::RANDOM_STRING_LENGTH;

/// ASCII letters, digits and punctuation.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Single-use authorization request material.
///
/// Consumed by value in `exchange_code`, so a context cannot back a second
/// token request.
pub struct AuthRequestContext {
    state: String,
    code_verifier: String,
    code_challenge: String,
}

impl AuthRequestContext {
    /// Generate fresh state and verifier/challenge pair.
    pub fn generate() -> Self {
        let state = generate_random_state(RANDOM_STRING_LENGTH);
        let code_verifier = generate_random_state(RANDOM_STRING_LENGTH);
        let code_challenge = compute_challenge(&code_verifier);
        Self {
            state,
            code_verifier,
            code_challenge,
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }
}

impl fmt::Debug for AuthRequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequestContext")
            .field("state", &self.state)
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// Shorthand for `AuthRequestContext::generate()`.
pub fn generate_auth_context() -> AuthRequestContext {
    AuthRequestContext::generate()
}

/// Random string of `length` characters from `CHARSET`.
fn random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Random opaque value, base64url encoded without padding.
///
/// A 32-character input encodes to 43 characters, the RFC 7636 minimum
/// verifier length, using only unreserved URL characters.
pub fn generate_random_state(length: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_string(length))
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the provider authorization URL the user is redirected to.
pub fn build_authorize_url(config: &ClientConfig, context: &AuthRequestContext) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", config.client_id())
        .append_pair("redirect_uri", config.callback_url())
        .append_pair("state", context.state())
        .append_pair("response_type", "code")
        .append_pair("code_challenge_method", "S256")
        .append_pair("code_challenge", context.code_challenge())
        .finish();
    format!("{}?{}", config.authorize_url(), query)
}
