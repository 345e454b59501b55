// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Continuation decisions
//!
//! [`ModificationSet`] is the loose, serde-friendly payload a control plane
//! sends (field names follow the CDP `Network.continueInterceptedRequest`
//! shape). [`ModificationSet::validate`] turns it into [`Modifications`],
//! which can only hold one decision kind.

use std::collections::HashMap;

use base64::Engine;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::http::Request;

/// Network error a request can be finished with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    Failed,
    Aborted,
    TimedOut,
    AccessDenied,
    ConnectionClosed,
    ConnectionReset,
    ConnectionRefused,
    ConnectionAborted,
    ConnectionFailed,
    NameNotResolved,
    InternetDisconnected,
    AddressUnreachable,
    BlockedByClient,
    BlockedByResponse,
}

impl ErrorReason {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorReason::TimedOut
                | ErrorReason::ConnectionClosed
                | ErrorReason::ConnectionReset
                | ErrorReason::ConnectionAborted
                | ErrorReason::ConnectionFailed
                | ErrorReason::InternetDisconnected
        )
    }
}

/// Answer to an authentication challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallengeResponse {
    /// Let the transport handle the challenge as it normally would
    Default,
    /// Give up and surface the challenge response as-is
    CancelAuth,
    /// Retry with these credentials
    ProvideCredentials { username: String, password: String },
}

/// Wire shape of [`AuthChallengeResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallengeResponseSpec {
    pub response: AuthResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthResponseKind {
    Default,
    CancelAuth,
    ProvideCredentials,
}

impl AuthChallengeResponseSpec {
    fn validate(self) -> Result<AuthChallengeResponse> {
        match self.response {
            AuthResponseKind::Default => Ok(AuthChallengeResponse::Default),
            AuthResponseKind::CancelAuth => Ok(AuthChallengeResponse::CancelAuth),
            AuthResponseKind::ProvideCredentials => match (self.username, self.password) {
                (Some(username), Some(password)) => {
                    Ok(AuthChallengeResponse::ProvideCredentials { username, password })
                }
                _ => Err(Error::malformed(
                    "ProvideCredentials requires both username and password",
                )),
            },
        }
    }
}

impl From<AuthChallengeResponse> for AuthChallengeResponseSpec {
    fn from(response: AuthChallengeResponse) -> Self {
        match response {
            AuthChallengeResponse::Default => Self {
                response: AuthResponseKind::Default,
                username: None,
                password: None,
            },
            AuthChallengeResponse::CancelAuth => Self {
                response: AuthResponseKind::CancelAuth,
                username: None,
                password: None,
            },
            AuthChallengeResponse::ProvideCredentials { username, password } => Self {
                response: AuthResponseKind::ProvideCredentials,
                username: Some(username),
                password: Some(password),
            },
        }
    }
}

/// Overrides applied before a request goes to the network.
/// All `None` means the request proceeds exactly as issued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub url: Option<Url>,
    pub method: Option<Method>,
    pub post_data: Option<Bytes>,
    /// Replaces the whole header set when present
    pub headers: Option<HeaderMap>,
}

impl RequestOverrides {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.post_data.is_none()
            && self.headers.is_none()
    }

    /// Rewrite `request` in place
    pub fn apply(&self, request: &mut Request) {
        if let Some(ref url) = self.url {
            request.url = url.clone();
        }
        if let Some(ref method) = self.method {
            request.method = method.clone();
        }
        if let Some(ref body) = self.post_data {
            request.body = Some(body.clone());
        }
        if let Some(ref headers) = self.headers {
            request.headers = headers.clone();
        }
    }
}

/// A validated decision: exactly one kind
#[derive(Debug, Clone, PartialEq)]
pub enum Modifications {
    /// Finish with a network error
    Fail(ErrorReason),
    /// Finish with this raw HTTP response
    Mock(Bytes),
    /// Send, optionally rewritten
    Continue(RequestOverrides),
    /// Answer the pending auth challenge
    AuthResponse(AuthChallengeResponse),
}

impl Modifications {
    pub fn unchanged() -> Self {
        Modifications::Continue(RequestOverrides::default())
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Modifications::Continue(o) if o.is_empty())
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Modifications::Fail(_) => "fail",
            Modifications::Mock(_) => "mock",
            Modifications::Continue(o) if o.is_empty() => "continue",
            Modifications::Continue(_) => "override",
            Modifications::AuthResponse(_) => "auth",
        }
    }
}

/// Unvalidated decision payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationSet {
    /// Finish with error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,
    /// Finish with mock response, base64 of the raw HTTP response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Mutually exclusive with everything above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_challenge_response: Option<AuthChallengeResponseSpec>,
}

impl ModificationSet {
    /// Continue unchanged
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn fail(reason: ErrorReason) -> Self {
        Self {
            error_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn mock(raw: impl AsRef<[u8]>) -> Self {
        Self {
            raw_response: Some(base64::engine::general_purpose::STANDARD.encode(raw)),
            ..Default::default()
        }
    }

    pub fn auth(response: AuthChallengeResponse) -> Self {
        Self {
            auth_challenge_response: Some(response.into()),
            ..Default::default()
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn post_data(mut self, body: impl Into<String>) -> Self {
        self.post_data = Some(body.into());
        self
    }

    /// Add one header to the replacement header set
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn has_overrides(&self) -> bool {
        self.url.is_some()
            || self.method.is_some()
            || self.post_data.is_some()
            || self.headers.is_some()
    }

    pub fn is_unchanged(&self) -> bool {
        self.error_reason.is_none()
            && self.raw_response.is_none()
            && self.auth_challenge_response.is_none()
            && !self.has_overrides()
    }

    /// Whether this decision ends the request (fail, mock, or auth answer)
    pub fn is_terminal(&self) -> bool {
        self.error_reason.is_some()
            || self.raw_response.is_some()
            || self.auth_challenge_response.is_some()
    }

    fn kinds_set(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.error_reason.is_some() {
            kinds.push("errorReason");
        }
        if self.raw_response.is_some() {
            kinds.push("rawResponse");
        }
        if self.has_overrides() {
            kinds.push("request overrides");
        }
        if self.auth_challenge_response.is_some() {
            kinds.push("authChallengeResponse");
        }
        kinds
    }

    /// Check that exactly one decision kind is present and parse its fields
    pub fn validate(self) -> Result<Modifications> {
        let kinds = self.kinds_set();
        if kinds.len() > 1 {
            return Err(Error::malformed(format!(
                "mutually exclusive fields set: {}",
                kinds.join(", ")
            )));
        }

        if let Some(reason) = self.error_reason {
            return Ok(Modifications::Fail(reason));
        }

        if let Some(raw) = self.raw_response {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw.as_bytes())
                .map_err(|e| Error::malformed(format!("rawResponse is not base64: {}", e)))?;
            return Ok(Modifications::Mock(Bytes::from(bytes)));
        }

        if let Some(auth) = self.auth_challenge_response {
            return auth.validate().map(Modifications::AuthResponse);
        }

        let url = self
            .url
            .map(|u| Url::parse(&u).map_err(|e| Error::malformed(format!("url '{}': {}", u, e))))
            .transpose()?;

        let method = self
            .method
            .map(|m| {
                Method::from_bytes(m.as_bytes())
                    .map_err(|_| Error::malformed(format!("invalid method '{}'", m)))
            })
            .transpose()?;

        let headers = self.headers.map(parse_headers).transpose()?;

        Ok(Modifications::Continue(RequestOverrides {
            url,
            method,
            post_data: self.post_data.map(Bytes::from),
            headers,
        }))
    }
}

fn parse_headers(headers: HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|_| Error::malformed(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::try_from(value.as_str())
            .map_err(|_| Error::malformed(format!("invalid value for header '{}'", name)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_continues_unchanged() {
        let m = ModificationSet::unchanged().validate().unwrap();
        assert!(m.is_unchanged());
        assert_eq!(m.kind(), "continue");
    }

    #[test]
    fn test_error_with_overrides_rejected() {
        let err = ModificationSet::fail(ErrorReason::Aborted)
            .url("https://example.com/other")
            .validate()
            .unwrap_err();

        assert!(matches!(err, Error::MalformedModification(_)));
        assert!(err.to_string().contains("errorReason"));
        assert!(err.to_string().contains("request overrides"));
    }

    #[test]
    fn test_mock_with_auth_rejected() {
        let mut set = ModificationSet::mock("HTTP/1.1 200 OK\r\n\r\n");
        set.auth_challenge_response = Some(AuthChallengeResponse::CancelAuth.into());
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_mock_decodes_base64() {
        let raw = "HTTP/1.1 204 No Content\r\n\r\n";
        match ModificationSet::mock(raw).validate().unwrap() {
            Modifications::Mock(bytes) => assert_eq!(&bytes[..], raw.as_bytes()),
            other => panic!("expected mock, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_base64_rejected() {
        let set = ModificationSet {
            raw_response: Some("not base64!!".into()),
            ..Default::default()
        };
        assert!(matches!(
            set.validate(),
            Err(Error::MalformedModification(_))
        ));
    }

    #[test]
    fn test_overrides_parsed() {
        let m = ModificationSet::unchanged()
            .url("https://example.com/rewritten")
            .method("PUT")
            .post_data("a=1")
            .header("x-test", "yes")
            .validate()
            .unwrap();

        let Modifications::Continue(o) = m else {
            panic!("expected continue");
        };
        assert_eq!(o.url.unwrap().path(), "/rewritten");
        assert_eq!(o.method, Some(Method::PUT));
        assert_eq!(o.post_data.as_deref(), Some(&b"a=1"[..]));
        assert_eq!(o.headers.unwrap().get("x-test").unwrap(), "yes");
    }

    #[test]
    fn test_invalid_override_fields_rejected() {
        assert!(ModificationSet::unchanged().url("not a url").validate().is_err());
        assert!(ModificationSet::unchanged().method("GE T").validate().is_err());
        assert!(ModificationSet::unchanged()
            .header("bad header", "v")
            .validate()
            .is_err());
    }

    #[test]
    fn test_credentials_require_username_and_password() {
        let set = ModificationSet {
            auth_challenge_response: Some(AuthChallengeResponseSpec {
                response: AuthResponseKind::ProvideCredentials,
                username: Some("admin".into()),
                password: None,
            }),
            ..Default::default()
        };
        assert!(set.validate().is_err());

        let ok = ModificationSet::auth(AuthChallengeResponse::ProvideCredentials {
            username: "admin".into(),
            password: "hunter2".into(),
        })
        .validate()
        .unwrap();
        assert_eq!(ok.kind(), "auth");
    }

    #[test]
    fn test_wire_shape() {
        let set: ModificationSet = serde_json::from_str(
            r#"{"errorReason":"BlockedByClient"}"#,
        )
        .unwrap();
        assert_eq!(
            set.validate().unwrap(),
            Modifications::Fail(ErrorReason::BlockedByClient)
        );

        let json = serde_json::to_string(&ModificationSet::unchanged().method("POST")).unwrap();
        assert_eq!(json, r#"{"method":"POST"}"#);
    }

    #[test]
    fn test_overrides_apply() {
        let mut request = Request::get("https://example.com/a")
            .unwrap()
            .header("x-old", "1");
        let Modifications::Continue(o) = ModificationSet::unchanged()
            .url("https://example.com/b")
            .header("x-new", "2")
            .validate()
            .unwrap()
        else {
            panic!("expected continue");
        };

        o.apply(&mut request);
        assert_eq!(request.url.path(), "/b");
        assert!(request.headers.get("x-old").is_none());
        assert_eq!(request.headers.get("x-new").unwrap(), "2");
    }
}
