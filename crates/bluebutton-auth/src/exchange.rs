//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completes the login callback)
//! 2. Token refresh (caller-initiated or refresh-on-expiry)
//!
//! Both POST to `{base}/v{version}/o/token/` with different grant types.
//! Neither is retried here: a rejected grant is surfaced to the caller as
//! `Error::TokenExchange` with the provider's status and body.

use chrono::Utc;
use common::ClientConfig;
use tracing::{debug, info, warn};

use crate::constants::sdk_headers;
use crate::error::{Error, Result};
use crate::pkce::AuthRequestContext;
use crate::token::{Token, TokenResponse};

/// Exchange the callback's authorization code for a token.
///
/// `context` is the one generated for this login attempt; it is consumed.
/// `code` and `returned_state` are the raw callback query values. The state
/// must equal `context.state()` byte for byte.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ClientConfig,
    context: AuthRequestContext,
    code: Option<&str>,
    returned_state: Option<&str>,
) -> Result<Token> {
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Validation("authorization code missing".into()))?;
    let returned_state = returned_state
        .ok_or_else(|| Error::Validation("callback parameter 'state' missing".into()))?;
    if returned_state != context.state() {
        warn!("callback state does not match the login request");
        return Err(Error::Validation(
            "provided callback state does not match".into(),
        ));
    }

    let request = client
        .post(config.token_url())
        .headers(sdk_headers())
        .timeout(config.timeout())
        .form(&[
            ("client_id", config.client_id()),
            ("client_secret", config.client_secret().expose().as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", config.callback_url()),
            ("code_verifier", context.code_verifier()),
            ("code_challenge", context.code_challenge()),
        ]);

    let token = send_token_request(request, "authorization_code").await?;
    info!(expires_at = %token.expires_at(), "authorization code exchanged");
    Ok(token)
}

/// Obtain a new token with `token`'s refresh token.
///
/// Authenticates with HTTP Basic (client id / secret). The input token is
/// left untouched; if the provider omits `refresh_token` or `patient` from
/// the response, the previous values carry over to the new token.
pub async fn refresh(
    client: &reqwest::Client,
    config: &ClientConfig,
    token: &Token,
) -> Result<Token> {
    let refresh_token = token
        .refresh_token()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Validation("refresh token missing".into()))?;

    let request = client
        .post(config.token_url())
        .headers(sdk_headers())
        .timeout(config.timeout())
        .basic_auth(config.client_id(), Some(config.client_secret().expose()))
        .form(&[
            ("client_id", config.client_id()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

    let refreshed = send_token_request(request, "refresh_token")
        .await?
        .inherit_from(token);
    info!(expires_at = %refreshed.expires_at(), "access token refreshed");
    Ok(refreshed)
}

/// Send a token endpoint request and parse the granted token.
///
/// Expiry is anchored at the moment the response headers arrive.
async fn send_token_request(request: reqwest::RequestBuilder, grant_type: &str) -> Result<Token> {
    debug!(grant_type, "requesting token");
    let response = request.send().await?;
    let received_at = Utc::now();

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!(grant_type, status = status.as_u16(), "token endpoint rejected request");
        return Err(Error::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::Decode(format!("invalid token response: {e}")))?;
    Token::from_response(parsed, received_at)
}
