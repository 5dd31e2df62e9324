//! Bearer token value object
//!
//! A `Token` always carries an absolute expiry. When the provider only sends
//! `expires_in`, the instant is fixed once at receipt time and never
//! recomputed. Tokens are immutable: exchange and refresh return new values.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Token payload as sent by the token endpoint, or as produced by
/// `Token::to_transport_form`.
///
/// `expires_at` (absolute) takes precedence over `expires_in` (seconds
/// relative to receipt).
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<ScopeField>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    patient: Option<String>,
}

/// Providers send scope either space-delimited or as a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeField {
    Text(String),
    List(Vec<String>),
}

impl ScopeField {
    fn into_string(self) -> String {
        match self {
            ScopeField::Text(s) => s,
            ScopeField::List(items) => items.join(" "),
        }
    }
}

/// OAuth2 bearer credential with an absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    scope: String,
    expires_in: Option<u64>,
    expires_at: DateTime<Utc>,
    patient: Option<String>,
}

impl Token {
    /// Token with the given access token and expiry; other fields default.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: "Bearer".into(),
            scope: String::new(),
            expires_in: None,
            expires_at,
            patient: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_patient(mut self, patient: impl Into<String>) -> Self {
        self.patient = Some(patient.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub(crate) fn from_response(response: TokenResponse, received_at: DateTime<Utc>) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(Error::Decode("access_token is empty".into()));
        }

        let expires_at = match (response.expires_at, response.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => i64::try_from(secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| received_at.checked_add_signed(delta))
                .ok_or_else(|| Error::Decode(format!("expires_in out of range: {secs}")))?,
            (None, None) => {
                return Err(Error::Decode(
                    "token carries neither expires_at nor expires_in".into(),
                ));
            }
        };

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            token_type: response.token_type.unwrap_or_else(|| "Bearer".into()),
            scope: response.scope.map(ScopeField::into_string).unwrap_or_default(),
            expires_in: response.expires_in,
            expires_at,
            patient: response.patient,
        })
    }

    /// Fill fields a refresh response may omit from the token it replaces.
    pub(crate) fn inherit_from(mut self, previous: &Token) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        if self.patient.is_none() {
            self.patient = previous.patient.clone();
        }
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Lifetime in seconds as originally granted, if known.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Beneficiary identifier the grant was issued for.
    pub fn patient(&self) -> Option<&str> {
        self.patient.as_deref()
    }

    /// `now >= expires_at`, no grace window.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(Utc::now())
    }

    /// Plain key/value form for handing the token across a process boundary.
    ///
    /// `expires_at` is written as RFC 3339 in UTC; absent optional fields
    /// are omitted.
    pub fn to_transport_form(&self) -> Value {
        let mut form = Map::new();
        form.insert("access_token".into(), self.access_token.clone().into());
        if let Some(refresh_token) = &self.refresh_token {
            form.insert("refresh_token".into(), refresh_token.clone().into());
        }
        form.insert("token_type".into(), self.token_type.clone().into());
        form.insert("scope".into(), self.scope.clone().into());
        if let Some(expires_in) = self.expires_in {
            form.insert("expires_in".into(), expires_in.into());
        }
        form.insert(
            "expires_at".into(),
            self.expires_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                .into(),
        );
        if let Some(patient) = &self.patient {
            form.insert("patient".into(), patient.clone().into());
        }
        Value::Object(form)
    }

    /// Inverse of `to_transport_form`; also accepts a raw token endpoint
    /// payload, in which case `expires_in` is anchored to the current time.
    pub fn from_transport_form(value: Value) -> Result<Self> {
        let response: TokenResponse = serde_json::from_value(value)
            .map_err(|e| Error::Decode(format!("invalid token transport form: {e}")))?;
        Self::from_response(response, Utc::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field("patient", &self.patient)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value, received_at: DateTime<Utc>) -> Result<Token> {
        let response: TokenResponse = serde_json::from_value(value).unwrap();
        Token::from_response(response, received_at)
    }

    #[test]
    fn expires_in_anchored_at_receipt() {
        let received_at = Utc::now();
        let token = parse(
            json!({
                "access_token": "at_abc",
                "refresh_token": "rt_def",
                "expires_in": 36000,
                "token_type": "Bearer",
                "scope": "patient/Patient.read profile",
                "patient": "-20140000008325"
            }),
            received_at,
        )
        .unwrap();

        assert_eq!(token.expires_at(), received_at + TimeDelta::seconds(36000));
        assert_eq!(token.expires_in(), Some(36000));
        assert_eq!(token.refresh_token(), Some("rt_def"));
        assert_eq!(token.patient(), Some("-20140000008325"));
        assert_eq!(token.scope(), "patient/Patient.read profile");
        assert!(!token.is_expired(received_at));
    }

    #[test]
    fn absolute_expiry_takes_precedence() {
        let token = parse(
            json!({
                "access_token": "at",
                "expires_in": 36000,
                "expires_at": "2030-01-01T00:00:00Z"
            }),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(token.expires_at().to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn missing_expiry_rejected() {
        let err = parse(json!({"access_token": "at"}), Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn huge_expires_in_rejected() {
        let err = parse(json!({"access_token": "at", "expires_in": u64::MAX}), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn scope_list_joined() {
        let token = parse(
            json!({"access_token": "at", "expires_in": 10, "scope": ["openid", "profile"]}),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(token.scope(), "openid profile");
        assert_eq!(token.token_type(), "Bearer");
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let at = Utc::now();
        let token = Token::new("at", at);
        assert!(token.is_expired(at));
        assert!(token.is_expired(at + TimeDelta::milliseconds(1)));
        assert!(!token.is_expired(at - TimeDelta::milliseconds(1)));
    }

    #[test]
    fn transport_form_round_trip_preserves_expiry() {
        let expires_at = Utc::now() + TimeDelta::seconds(3600) + TimeDelta::nanoseconds(123_456_789);
        let token = Token::new("at_abc", expires_at)
            .with_refresh_token("rt_def")
            .with_patient("-20140000008325")
            .with_scope("profile");

        let form = token.to_transport_form();
        assert!(form["expires_at"].is_string());

        let restored = Token::from_transport_form(form).unwrap();
        assert_eq!(restored, token);
        for offset in [-7200, -1, 0, 1, 3599, 3600, 3601, 7200] {
            let now = expires_at + TimeDelta::seconds(offset);
            assert_eq!(restored.is_expired(now), token.is_expired(now), "offset {offset}");
        }
    }

    #[test]
    fn transport_form_expiry_is_timezone_aware() {
        let token = Token::new("at", "2031-05-06T07:08:09Z".parse().unwrap());
        let form = token.to_transport_form();
        assert_eq!(form["expires_at"], "2031-05-06T07:08:09Z");
    }

    #[test]
    fn transport_form_omits_absent_fields() {
        let form = Token::new("at", "2031-05-06T07:08:09Z".parse().unwrap()).to_transport_form();
        let object = form.as_object().unwrap();
        assert!(!object.contains_key("refresh_token"));
        assert!(!object.contains_key("expires_in"));
        assert!(!object.contains_key("patient"));
        assert_eq!(form["token_type"], "Bearer");

        let granted = parse(
            json!({"access_token": "at", "expires_in": 600, "patient": "-1"}),
            Utc::now(),
        )
        .unwrap();
        let form = granted.to_transport_form();
        assert_eq!(form["expires_in"], 600);
        assert_eq!(form["patient"], "-1");
    }

    #[test]
    fn transport_form_with_offset_parses_to_same_instant() {
        let restored = Token::from_transport_form(json!({
            "access_token": "at",
            "expires_at": "2031-05-06T09:08:09+02:00"
        }))
        .unwrap();
        assert_eq!(restored.expires_at(), "2031-05-06T07:08:09Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn transport_form_rejects_garbage() {
        assert!(Token::from_transport_form(json!({"expires_at": "soon"})).is_err());
        assert!(Token::from_transport_form(json!("token")).is_err());
    }

    #[test]
    fn inherit_keeps_previous_refresh_token_and_patient() {
        let previous = Token::new("old", Utc::now())
            .with_refresh_token("rt_old")
            .with_patient("-1");
        let fresh = Token::new("new", Utc::now()).inherit_from(&previous);
        assert_eq!(fresh.access_token(), "new");
        assert_eq!(fresh.refresh_token(), Some("rt_old"));
        assert_eq!(fresh.patient(), Some("-1"));

        let rotated = Token::new("new", Utc::now())
            .with_refresh_token("rt_new")
            .inherit_from(&previous);
        assert_eq!(rotated.refresh_token(), Some("rt_new"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let token = Token::new("at_secret", Utc::now()).with_refresh_token("rt_secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("at_secret"));
        assert!(!debug.contains("rt_secret"));
    }
}
