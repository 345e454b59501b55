// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercepting HTTP transport
//!
//! [`InterceptingClient`] sends every hop of a request through the registry
//! first; admitted hops wait for their decision before anything goes on the
//! wire. Redirects are followed here, one hop at a time, so each hop is seen
//! under the same interception id.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use url::Url;

use super::config::TransportConfig;
use super::event::{AuthChallenge, AuthChallengeSource, RequestInfo, RequestType};
use super::id::RequestKey;
use super::job::{InterceptedJob, RequestLifetime};
use super::modifications::{AuthChallengeResponse, Modifications};
use super::registry::{Admission, InterceptionRegistry};
use super::scope::RequestScope;
use super::state::AdmissionRequest;
use crate::error::{Error, Result};
use crate::http::{headers, HttpClient, Request, Response};

/// A request plus the context admission needs
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub request: Request,
    pub scope: RequestScope,
    pub resource_type: RequestType,
    pub is_navigation: bool,
}

impl NetworkRequest {
    pub fn new(request: Request, scope: RequestScope) -> Self {
        Self {
            request,
            scope,
            resource_type: RequestType::Other,
            is_navigation: false,
        }
    }

    /// Top-level navigation of a frame tree node
    pub fn navigation(request: Request, frame_tree_node_id: i32) -> Self {
        Self {
            request,
            scope: RequestScope::navigation(frame_tree_node_id),
            resource_type: RequestType::Document,
            is_navigation: true,
        }
    }

    pub fn resource_type(mut self, resource_type: RequestType) -> Self {
        self.resource_type = resource_type;
        self
    }
}

/// HTTP client whose requests pass through an [`InterceptionRegistry`]
#[derive(Clone)]
pub struct InterceptingClient {
    client: HttpClient,
    registry: Arc<InterceptionRegistry>,
    config: TransportConfig,
}

impl InterceptingClient {
    pub fn new(client: HttpClient, registry: Arc<InterceptionRegistry>, config: TransportConfig) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<InterceptionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn admit(&self, key: RequestKey, request: &Request, context: &NetworkRequestContext) -> Option<InterceptedJob> {
        let admission = self
            .registry
            .admit(AdmissionRequest {
                key,
                scope: context.scope,
                request: RequestInfo::from_request(request, self.config.max_body_size),
                resource_type: context.resource_type,
                is_navigation: context.is_navigation,
            })
            .await;

        match admission {
            Admission::Intercepted(job) => Some(job),
            Admission::NotIntercepted(reason) => {
                tracing::trace!(url = %request.url, reason = ?reason, "Sending without interception");
                None
            }
        }
    }

    /// Send `request`, following redirects, and return the final response
    pub async fn execute(&self, request: NetworkRequest) -> Result<Response> {
        let lifetime = RequestLifetime::new(self.registry.clone());
        let key = lifetime.key();
        let NetworkRequest {
            mut request,
            scope,
            resource_type,
            is_navigation,
        } = request;
        let context = NetworkRequestContext {
            scope,
            resource_type,
            is_navigation,
        };
        let mut redirects = 0u32;

        loop {
            let mut job = self.admit(key, &request, &context).await;

            let decision = match job {
                Some(ref mut job) => job.decision(self.config.decision_timeout).await,
                None => None,
            };

            let mut response = match decision {
                Some(Modifications::Fail(reason)) => {
                    let id = job.as_ref().map(|j| j.id().to_string()).unwrap_or_default();
                    tracing::debug!(interception_id = %id, url = %request.url, reason = ?reason, "Request failed by policy");
                    return Err(Error::Intercepted { id, reason });
                }
                Some(Modifications::Mock(raw)) => Response::from_raw(&raw, request.url.clone())?,
                Some(Modifications::Continue(overrides)) => {
                    overrides.apply(&mut request);
                    self.client.execute(request.clone()).await?
                }
                Some(Modifications::AuthResponse(_)) => {
                    tracing::warn!(url = %request.url, "Auth response before any challenge, continuing unchanged");
                    self.client.execute(request.clone()).await?
                }
                None => self.client.execute(request.clone()).await?,
            };

            if !response.mocked && self.config.intercept_auth_challenges {
                if let Some(ref mut job) = job {
                    response = self
                        .answer_auth_challenge(job, &request, response, &context)
                        .await?;
                }
            }

            let location = match response.location() {
                Some(location) if response.is_redirect() => location,
                _ => {
                    response.redirected = redirects > 0;
                    return Ok(response);
                }
            };

            redirects += 1;
            if redirects > self.config.max_redirects {
                return Err(Error::TooManyRedirects {
                    url: location.to_string(),
                    count: redirects,
                });
            }

            if let Some(job) = job.take() {
                job.expect_redirect();
                job.finish();
            }
            tracing::debug!(status = response.status_code(), from = %request.url, to = %location, "Following redirect");
            request = follow_redirect(request, response.status, location);
        }
    }

    /// Send several requests concurrently
    pub async fn execute_all(&self, requests: Vec<NetworkRequest>) -> Vec<Result<Response>> {
        let futures: Vec<_> = requests.into_iter().map(|r| self.execute(r)).collect();
        futures::future::join_all(futures).await
    }

    async fn answer_auth_challenge(
        &self,
        job: &mut InterceptedJob,
        request: &Request,
        response: Response,
        context: &NetworkRequestContext,
    ) -> Result<Response> {
        let (source, challenge_header, credentials_header) = match response.status {
            StatusCode::UNAUTHORIZED => (
                AuthChallengeSource::Server,
                headers::WWW_AUTHENTICATE,
                headers::AUTHORIZATION,
            ),
            StatusCode::PROXY_AUTHENTICATION_REQUIRED => (
                AuthChallengeSource::Proxy,
                headers::PROXY_AUTHENTICATE,
                headers::PROXY_AUTHORIZATION,
            ),
            _ => return Ok(response),
        };

        let Some(challenge) = response
            .header(challenge_header)
            .and_then(|h| AuthChallenge::parse(source, request.origin(), h))
        else {
            return Ok(response);
        };

        match job.auth_challenge(challenge, self.config.decision_timeout).await {
            Some(Modifications::AuthResponse(AuthChallengeResponse::ProvideCredentials {
                username,
                password,
            })) => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", username, password),
                );
                let retry = request
                    .clone()
                    .header(credentials_header, format!("Basic {}", encoded));
                tracing::debug!(interception_id = %job.id(), url = %request.url, "Retrying with credentials");
                self.sub_request(retry, context).await
            }
            Some(Modifications::Fail(reason)) => Err(Error::Intercepted {
                id: job.id().to_string(),
                reason,
            }),
            Some(Modifications::Mock(raw)) => Response::from_raw(&raw, request.url.clone()),
            // Default, CancelAuth, plain continue or no answer: surface the challenge
            _ => Ok(response),
        }
    }

    /// Internal request that must never be intercepted itself
    async fn sub_request(&self, request: Request, context: &NetworkRequestContext) -> Result<Response> {
        let key = RequestKey::next();
        let _guard = self.registry.register_sub_request(key);

        if let Some(job) = self.admit(key, &request, context).await {
            tracing::warn!(interception_id = %job.id(), "Sub-request was admitted, ignoring");
        }
        self.client.execute(request).await
    }
}

struct NetworkRequestContext {
    scope: RequestScope,
    resource_type: RequestType,
    is_navigation: bool,
}

fn follow_redirect(mut request: Request, status: StatusCode, location: Url) -> Request {
    let to_get = match status {
        StatusCode::SEE_OTHER => request.method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => request.method == Method::POST,
        _ => false,
    };
    if to_get {
        request.method = Method::GET;
        request.body = None;
        request.headers.remove(headers::CONTENT_TYPE);
        request.headers.remove(headers::CONTENT_LENGTH);
    }

    if location.origin() != request.url.origin() {
        request.headers.remove(headers::AUTHORIZATION);
    }

    request.url = location;
    request
}
