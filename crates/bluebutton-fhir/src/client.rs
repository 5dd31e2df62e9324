//! Blue Button client
//!
//! Bundles a validated `ClientConfig` with a shared `reqwest::Client` and
//! exposes the login flow and resource calls as methods. The client itself
//! holds no session state; tokens and auth contexts belong to the caller.

use std::sync::Arc;

use bluebutton_auth::{AuthRequestContext, Token};
use common::{ClientConfig, ClientSettings};
use tracing::info;

use crate::bundle::Bundle;
use crate::error::Result;
use crate::metrics;
use crate::pages::{PageSet, collect_pages};
use crate::request::{FhirOutcome, RequestConfig, execute};
use crate::resource::FhirResource;

/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BlueButton {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
}

impl BlueButton {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Validate `settings` and build a client.
    pub fn from_settings(settings: ClientSettings) -> Result<Self> {
        Ok(Self::new(ClientConfig::from_settings(settings)?))
    }

    /// Use a preconfigured HTTP client (proxies, custom TLS roots).
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        info!(
            environment = %config.environment(),
            base_url = config.base_url(),
            version = config.version(),
            "Blue Button client configured"
        );
        Self {
            config: Arc::new(config),
            http,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fresh state and PKCE material for one login attempt.
    pub fn generate_auth_context(&self) -> AuthRequestContext {
        bluebutton_auth::generate_auth_context()
    }

    /// Provider login URL to redirect the user to.
    pub fn authorize_url(&self, context: &AuthRequestContext) -> String {
        bluebutton_auth::build_authorize_url(&self.config, context)
    }

    /// Complete the login callback: check `state` and exchange `code`.
    pub async fn authorize(
        &self,
        context: AuthRequestContext,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Token> {
        Ok(bluebutton_auth::exchange_code(&self.http, &self.config, context, code, state).await?)
    }

    /// Refresh `token` now, regardless of its expiry.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refreshed = bluebutton_auth::refresh(&self.http, &self.config, token).await?;
        metrics::record_token_refresh("caller");
        Ok(refreshed)
    }

    /// GET a named resource. Any URL already in `request` is replaced.
    pub async fn get_resource(
        &self,
        resource: FhirResource,
        request: RequestConfig,
    ) -> Result<FhirOutcome> {
        self.get_custom_data(&request.with_resource(resource)).await
    }

    pub async fn get_patient_data(&self, request: RequestConfig) -> Result<FhirOutcome> {
        self.get_resource(FhirResource::Patient, request).await
    }

    pub async fn get_coverage_data(&self, request: RequestConfig) -> Result<FhirOutcome> {
        self.get_resource(FhirResource::Coverage, request).await
    }

    pub async fn get_explanation_of_benefit_data(
        &self,
        request: RequestConfig,
    ) -> Result<FhirOutcome> {
        self.get_resource(FhirResource::ExplanationOfBenefit, request)
            .await
    }

    pub async fn get_profile_data(&self, request: RequestConfig) -> Result<FhirOutcome> {
        self.get_resource(FhirResource::Profile, request).await
    }

    /// GET whatever `request.url()` names, relative or absolute.
    pub async fn get_custom_data(&self, request: &RequestConfig) -> Result<FhirOutcome> {
        execute(&self.http, &self.config, request).await
    }

    /// Fetch the remaining pages of a search set whose first page is `first`.
    pub async fn get_pages(&self, first: Bundle, request: &RequestConfig) -> Result<PageSet> {
        collect_pages(&self.http, &self.config, first, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use common::RetryPolicy;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BlueButton {
        let mut settings = ClientSettings::new(
            "SANDBOX",
            "fake_client_id",
            "fake_client_secret",
            "https://www.fake-sandbox.com/your/callback/here",
        );
        settings.base_url = Some(server.uri());
        settings.retry_settings = RetryPolicy {
            backoff_factor: 0.0,
            ..RetryPolicy::default()
        };
        BlueButton::from_settings(settings).unwrap()
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = ClientSettings::new("STAGING", "id", "secret", "https://cb");
        let err = BlueButton::from_settings(settings).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn authorize_url_targets_configured_provider() {
        let settings = ClientSettings::new("SANDBOX", "id", "secret", "https://cb");
        let bb = BlueButton::from_settings(settings).unwrap();
        let ctx = bb.generate_auth_context();
        let url = bb.authorize_url(&ctx);
        assert!(url.starts_with("https://sandbox.bluebutton.cms.gov/v2/o/authorize?"));
        assert!(url.contains(&format!("state={}", ctx.state())));
    }

    #[tokio::test]
    async fn login_then_fetch_then_paginate() {
        let server = MockServer::start().await;
        let bb = client(&server);

        Mock::given(method("POST"))
            .and(path("/v2/o/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at_login",
                "refresh_token": "rt_login",
                "expires_in": 36000,
                "token_type": "Bearer",
                "patient": "-20140000008325"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/connect/userinfo"))
            .and(header("authorization", "Bearer at_login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "fake_user",
                "patient": "-20140000008325"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/fhir/ExplanationOfBenefit/"))
            .and(query_param("startIndex", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Bundle",
                "id": "eob-2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/fhir/ExplanationOfBenefit/"))
            .and(query_param("_count", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Bundle",
                "id": "eob-1",
                "link": [{
                    "relation": "next",
                    "url": format!("{}/v2/fhir/ExplanationOfBenefit/?startIndex=10", server.uri())
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = bb.generate_auth_context();
        let state = ctx.state().to_string();
        let token = bb
            .authorize(ctx, Some("code-xxx"), Some(&state))
            .await
            .unwrap();

        let profile = bb
            .get_profile_data(RequestConfig::new(token.clone()))
            .await
            .unwrap();
        let body: serde_json::Value = profile.response.json().unwrap();
        assert_eq!(body["sub"], "fake_user");

        let request = RequestConfig::new(token).with_param("_count", "10");
        let first = bb
            .get_explanation_of_benefit_data(request.clone())
            .await
            .unwrap();
        let first: Bundle = first.response.json().unwrap();
        let result = bb.get_pages(first, &request).await.unwrap();

        let ids: Vec<_> = result.pages.iter().map(|p| p.id().unwrap()).collect();
        assert_eq!(ids, ["eob-1", "eob-2"]);
        assert_eq!(result.token.access_token(), "at_login");
    }

    #[tokio::test]
    async fn caller_refresh_returns_new_token() {
        let server = MockServer::start().await;
        let bb = client(&server);

        Mock::given(method("POST"))
            .and(path("/v2/o/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at_new",
                "expires_in": 36000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let old = Token::new("at_old", chrono::Utc::now()).with_refresh_token("rt_old");
        let new = bb.refresh_token(&old).await.unwrap();
        assert_eq!(new.access_token(), "at_new");
        assert_eq!(new.refresh_token(), Some("rt_old"));
    }
}
