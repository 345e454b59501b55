// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Async decision policies
//!
//! A [`DecisionPolicy`] turns an interception notification into a
//! [`ModificationSet`]. [`PolicyHandler`] adapts any policy into an
//! [`InterceptionHandler`](super::InterceptionHandler) that answers through
//! the registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use netsnare::network::{
//!     AuthHeaderInjector, ErrorReason, InterceptionRegistry, PolicyChain, PolicyHandler,
//!     RulePolicy,
//! };
//!
//! # async fn run() -> netsnare::Result<()> {
//! let registry = InterceptionRegistry::launch();
//!
//! let mut chain = PolicyChain::new();
//! chain.add(AuthHeaderInjector::new().bearer_token("token"));
//! chain.add(RulePolicy::new().block(r"\.doubleclick\.net/", ErrorReason::BlockedByClient)?);
//!
//! let handler = PolicyHandler::new(chain, registry.clone());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;

use super::event::InterceptedRequest;
use super::handler::InterceptionHandler;
use super::modifications::{AuthChallengeResponse, ErrorReason, ModificationSet};
use super::registry::InterceptionRegistry;
use crate::error::{Error, Result};

/// Decides what happens to an intercepted request
#[async_trait]
pub trait DecisionPolicy: Send + Sync {
    /// Decision for `request`. Defaults to continuing unchanged.
    async fn decide(&self, request: &InterceptedRequest) -> ModificationSet {
        let _ = request;
        ModificationSet::unchanged()
    }

    /// Filter - return true if this policy should see the request
    fn should_intercept(&self, request: &InterceptedRequest) -> bool {
        let _ = request;
        true
    }

    /// Priority - higher priority policies run first
    fn priority(&self) -> i32 {
        0
    }
}

/// Priority-ordered list of policies.
///
/// Request overrides from every policy are merged, higher priority winning
/// per field. The first terminal decision (fail, mock, auth answer) ends the
/// walk and is returned alone.
#[derive(Default)]
pub struct PolicyChain {
    policies: Vec<Arc<dyn DecisionPolicy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy
    pub fn add<P: DecisionPolicy + 'static>(&mut self, policy: P) {
        self.policies.push(Arc::new(policy));
        // Highest priority first
        self.policies.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn with<P: DecisionPolicy + 'static>(mut self, policy: P) -> Self {
        self.add(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

fn merge_overrides(into: &mut ModificationSet, from: ModificationSet) {
    if into.url.is_none() {
        into.url = from.url;
    }
    if into.method.is_none() {
        into.method = from.method;
    }
    if into.post_data.is_none() {
        into.post_data = from.post_data;
    }
    if let Some(headers) = from.headers {
        let merged = into.headers.get_or_insert_with(HashMap::new);
        for (name, value) in headers {
            merged.entry(name.to_ascii_lowercase()).or_insert(value);
        }
    }
}

#[async_trait]
impl DecisionPolicy for PolicyChain {
    async fn decide(&self, request: &InterceptedRequest) -> ModificationSet {
        let mut merged = ModificationSet::unchanged();

        for policy in &self.policies {
            if !policy.should_intercept(request) {
                continue;
            }

            let decision = policy.decide(request).await;
            if decision.is_terminal() {
                if merged.has_overrides() {
                    tracing::debug!(
                        interception_id = %request.interception_id,
                        "Terminal decision discards merged overrides"
                    );
                }
                return decision;
            }
            merge_overrides(&mut merged, decision);
        }

        merged
    }
}

/// Runs a policy for every notification and answers through the registry
pub struct PolicyHandler<P> {
    policy: Arc<P>,
    registry: Arc<InterceptionRegistry>,
}

impl<P: DecisionPolicy + 'static> PolicyHandler<P> {
    pub fn new(policy: P, registry: Arc<InterceptionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            policy: Arc::new(policy),
            registry,
        })
    }
}

impl<P: DecisionPolicy + 'static> InterceptionHandler for PolicyHandler<P> {
    fn request_intercepted(&self, request: InterceptedRequest) {
        let policy = self.policy.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let decision = if policy.should_intercept(&request) {
                policy.decide(&request).await
            } else {
                ModificationSet::unchanged()
            };

            if let Err(e) = registry
                .continue_intercepted_request(&request.interception_id, decision)
                .await
            {
                tracing::debug!(
                    interception_id = %request.interception_id,
                    error = %e,
                    "Policy decision not applied"
                );
            }
        });
    }
}

/// Auth header injector - adds headers to every matching request
pub struct AuthHeaderInjector {
    /// Headers to inject
    headers: Vec<(String, String)>,
    /// Domains to inject into (empty = all)
    domains: Vec<String>,
}

impl AuthHeaderInjector {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
            domains: Vec::new(),
        }
    }

    /// Add a bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.headers
            .push(("authorization".into(), format!("Bearer {}", token.into())));
        self
    }

    /// Add basic auth
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", username, password),
        );
        self.headers
            .push(("authorization".into(), format!("Basic {}", encoded)));
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    /// Restrict to specific domains
    pub fn for_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }
}

impl Default for AuthHeaderInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionPolicy for AuthHeaderInjector {
    fn should_intercept(&self, request: &InterceptedRequest) -> bool {
        if request.is_auth_challenge() || self.headers.is_empty() {
            return false;
        }
        if self.domains.is_empty() {
            return true;
        }

        request
            .host()
            .map(|host| self.domains.iter().any(|d| host.contains(d.as_str())))
            .unwrap_or(false)
    }

    async fn decide(&self, request: &InterceptedRequest) -> ModificationSet {
        // Overrides replace the whole header set, so start from what is there
        let mut headers: HashMap<String, String> = request
            .request
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        ModificationSet {
            headers: Some(headers),
            ..Default::default()
        }
    }

    fn priority(&self) -> i32 {
        100 // Run early so its headers win the merge
    }
}

/// Logs every intercepted request
#[derive(Default)]
pub struct RequestLogger {
    /// Log request bodies
    pub log_bodies: bool,
    /// Filter by URL substring
    pub url_filter: Option<String>,
}

#[async_trait]
impl DecisionPolicy for RequestLogger {
    fn should_intercept(&self, request: &InterceptedRequest) -> bool {
        match self.url_filter {
            Some(ref filter) => request.request.url.contains(filter.as_str()),
            None => true,
        }
    }

    async fn decide(&self, request: &InterceptedRequest) -> ModificationSet {
        match request.auth_challenge {
            Some(ref challenge) => tracing::info!(
                interception_id = %request.interception_id,
                url = %request.request.url,
                scheme = %challenge.scheme,
                realm = %challenge.realm,
                "Auth challenge"
            ),
            None => tracing::info!(
                interception_id = %request.interception_id,
                session = %request.session,
                method = %request.request.method,
                url = %request.request.url,
                resource_type = ?request.resource_type,
                redirect = request.is_redirect,
                "Request"
            ),
        }

        if self.log_bodies {
            if let Some(ref body) = request.request.post_data {
                tracing::debug!(body = %body, "Request body");
            }
        }

        ModificationSet::unchanged()
    }

    fn priority(&self) -> i32 {
        -100 // Low priority - run logging last
    }
}

/// Answers auth challenges with fixed credentials
pub struct CredentialsProvider {
    /// `None` cancels every challenge
    credentials: Option<(String, String)>,
    /// Origins to answer for (empty = all)
    origins: Vec<String>,
}

impl CredentialsProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some((username.into(), password.into())),
            origins: Vec::new(),
        }
    }

    /// Refuse every challenge
    pub fn cancel_all() -> Self {
        Self {
            credentials: None,
            origins: Vec::new(),
        }
    }

    pub fn for_origins(mut self, origins: Vec<String>) -> Self {
        self.origins = origins;
        self
    }
}

#[async_trait]
impl DecisionPolicy for CredentialsProvider {
    fn should_intercept(&self, request: &InterceptedRequest) -> bool {
        match request.auth_challenge {
            Some(ref challenge) => {
                self.origins.is_empty() || self.origins.iter().any(|o| o == &challenge.origin)
            }
            None => false,
        }
    }

    async fn decide(&self, _request: &InterceptedRequest) -> ModificationSet {
        let response = match self.credentials {
            Some((ref username, ref password)) => AuthChallengeResponse::ProvideCredentials {
                username: username.clone(),
                password: password.clone(),
            },
            None => AuthChallengeResponse::CancelAuth,
        };
        ModificationSet::auth(response)
    }

    fn priority(&self) -> i32 {
        50
    }
}

/// What a matching rule does
#[derive(Debug, Clone)]
pub enum RuleAction {
    Block(ErrorReason),
    /// Raw HTTP response bytes
    Mock(Bytes),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    action: RuleAction,
}

/// URL rules: the first pattern that matches decides
#[derive(Debug, Clone, Default)]
pub struct RulePolicy {
    rules: Vec<Rule>,
}

impl RulePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(mut self, pattern: &str, action: RuleAction) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid rule pattern '{}': {}", pattern, e)))?;
        self.rules.push(Rule { pattern, action });
        Ok(self)
    }

    /// Fail requests whose URL matches `pattern`
    pub fn block(self, pattern: &str, reason: ErrorReason) -> Result<Self> {
        self.rule(pattern, RuleAction::Block(reason))
    }

    /// Answer requests whose URL matches `pattern` with `raw`
    pub fn mock(self, pattern: &str, raw: impl Into<Bytes>) -> Result<Self> {
        self.rule(pattern, RuleAction::Mock(raw.into()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn matching(&self, url: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.pattern.is_match(url))
    }
}

#[async_trait]
impl DecisionPolicy for RulePolicy {
    fn should_intercept(&self, request: &InterceptedRequest) -> bool {
        !request.is_auth_challenge()
    }

    async fn decide(&self, request: &InterceptedRequest) -> ModificationSet {
        let Some(rule) = self.matching(&request.request.url) else {
            return ModificationSet::unchanged();
        };

        tracing::debug!(
            interception_id = %request.interception_id,
            url = %request.request.url,
            pattern = %rule.pattern,
            "Rule matched"
        );
        match rule.action {
            RuleAction::Block(reason) => ModificationSet::fail(reason),
            RuleAction::Mock(ref raw) => ModificationSet::mock(raw),
        }
    }

    fn priority(&self) -> i32 {
        10
    }
}
