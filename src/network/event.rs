// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Notification payloads delivered to policy handlers

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::id::InterceptionId;
use super::scope::SessionId;
use crate::http::Request;

/// Resource type of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Direct navigation
    Document,
    /// XMLHttpRequest
    XHR,
    /// Fetch API
    Fetch,
    /// Script tag
    Script,
    /// Link stylesheet
    Stylesheet,
    /// Image
    Image,
    /// Font
    Font,
    /// Media (audio/video)
    Media,
    /// WebSocket handshake
    WebSocket,
    /// Unknown
    Other,
}

/// Request information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (lossy UTF-8, may be truncated)
    pub post_data: Option<String>,
}

impl RequestInfo {
    /// Describe `request`, keeping at most `max_body` bytes of its body
    pub fn from_request(request: &Request, max_body: usize) -> Self {
        Self {
            url: request.url.to_string(),
            method: request.method.to_string(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
            post_data: request.body.as_ref().map(|b| {
                String::from_utf8_lossy(&b[..b.len().min(max_body)]).to_string()
            }),
        }
    }
}

/// Who is asking for credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthChallengeSource {
    Server,
    Proxy,
}

/// Authentication challenge seen in a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
    pub source: AuthChallengeSource,
    /// Origin of the challenger
    pub origin: String,
    /// Scheme, e.g. "basic" or "digest"
    pub scheme: String,
    /// Realm, empty when the challenge names none
    pub realm: String,
}

impl AuthChallenge {
    /// Parse a `WWW-Authenticate` (or `Proxy-Authenticate`) header value
    pub fn parse(source: AuthChallengeSource, origin: impl Into<String>, header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = match header.split_once(char::is_whitespace) {
            Some((scheme, params)) => (scheme, params),
            None => (header, ""),
        };
        if scheme.is_empty() {
            return None;
        }

        let realm = params
            .split(',')
            .filter_map(|p| p.trim().split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("realm"))
            .map(|(_, v)| v.trim().trim_matches('"').to_string())
            .unwrap_or_default();

        Some(Self {
            source,
            origin: origin.into(),
            scheme: scheme.to_lowercase(),
            realm,
        })
    }
}

/// Notification sent to the policy handler of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedRequest {
    /// Id to pass back with the decision
    pub interception_id: InterceptionId,
    /// Session the request belongs to
    pub session: SessionId,
    /// Request as it will be sent
    pub request: RequestInfo,
    /// Resource type
    pub resource_type: RequestType,
    /// Whether this is a navigation
    pub is_navigation_request: bool,
    /// Whether this leg follows a redirect under the same id
    pub is_redirect: bool,
    /// Set when the job is asking for an auth decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_challenge: Option<AuthChallenge>,
    /// When the notification was produced
    pub timestamp: SystemTime,
}

impl InterceptedRequest {
    /// Whether the handler is being asked to answer an auth challenge
    pub fn is_auth_challenge(&self) -> bool {
        self.auth_challenge.is_some()
    }

    /// Host of the request URL
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.request.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
    }
}
