// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Transport-side handles that retire registry state when dropped

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::event::AuthChallenge;
use super::id::{InterceptionId, RequestKey};
use super::modifications::Modifications;
use super::registry::InterceptionRegistry;
use super::state::Decision;

/// An admitted request waiting on its policy decision.
///
/// Dropping the job finishes it, so its leg leaves the pending table exactly
/// once whether the request completed or was abandoned. A later leg
/// admitted under the same id is left alone.
#[derive(Debug)]
pub struct InterceptedJob {
    id: InterceptionId,
    admission: u64,
    key: RequestKey,
    is_redirect: bool,
    /// Notification round whose answer the job is waiting for
    round: u64,
    decisions: mpsc::UnboundedReceiver<Decision>,
    registry: Arc<InterceptionRegistry>,
}

impl InterceptedJob {
    pub(crate) fn new(
        id: InterceptionId,
        admission: u64,
        key: RequestKey,
        is_redirect: bool,
        decisions: mpsc::UnboundedReceiver<Decision>,
        registry: Arc<InterceptionRegistry>,
    ) -> Self {
        Self {
            id,
            admission,
            key,
            is_redirect,
            round: 0,
            decisions,
            registry,
        }
    }

    pub fn id(&self) -> &InterceptionId {
        &self.id
    }

    pub fn request_key(&self) -> RequestKey {
        self.key
    }

    /// Whether this job continues an earlier leg under the same id
    pub fn is_redirect(&self) -> bool {
        self.is_redirect
    }

    /// Wait up to `timeout` for the next decision.
    ///
    /// `None` means nobody answered in time; callers continue the request
    /// unchanged, and decisions arriving later are refused.
    pub async fn decision(&mut self, timeout: Duration) -> Option<Modifications> {
        let round = self.round;
        let id = &self.id;
        let decisions = &mut self.decisions;
        let current = async move {
            while let Some(decision) = decisions.recv().await {
                if decision.round >= round {
                    return Some(decision.modifications);
                }
                tracing::debug!(interception_id = %id, round = decision.round, "Skipping decision from an earlier round");
            }
            None
        };

        match tokio::time::timeout(timeout, current).await {
            Ok(Some(modifications)) => Some(modifications),
            Ok(None) => {
                tracing::debug!(interception_id = %self.id, "Decision channel closed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    interception_id = %self.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "No decision in time, continuing unchanged"
                );
                self.registry.decision_expired(&self.id, self.admission);
                None
            }
        }
    }

    /// Decision already delivered for the current round, if any
    pub fn try_decision(&mut self) -> Option<Modifications> {
        while let Ok(decision) = self.decisions.try_recv() {
            if decision.round >= self.round {
                return Some(decision.modifications);
            }
        }
        None
    }

    /// Ask the handler again, this time about `challenge`, and wait for the
    /// answer. `None` if the handler could not be asked or did not answer.
    ///
    /// Only an answer to this challenge counts; anything still queued from
    /// the admission notification is skipped.
    pub async fn auth_challenge(
        &mut self,
        challenge: AuthChallenge,
        timeout: Duration,
    ) -> Option<Modifications> {
        self.round = self
            .registry
            .notify_auth_challenge(&self.id, challenge)
            .await?;
        self.decision(timeout).await
    }

    /// Reuse this id for the next leg of the same request
    pub fn expect_redirect(&self) {
        self.registry
            .expect_request_after_redirect(self.key, self.id.clone());
    }

    /// Retire the id now
    pub fn finish(self) {}
}

impl Drop for InterceptedJob {
    fn drop(&mut self) {
        self.registry.admission_finished(&self.id, self.admission);
    }
}

/// Keeps a request out of interception while alive
#[derive(Debug)]
pub struct SubRequestGuard {
    key: RequestKey,
    registry: Arc<InterceptionRegistry>,
}

impl SubRequestGuard {
    pub(crate) fn new(key: RequestKey, registry: Arc<InterceptionRegistry>) -> Self {
        Self { key, registry }
    }

    pub fn key(&self) -> RequestKey {
        self.key
    }
}

impl Drop for SubRequestGuard {
    fn drop(&mut self) {
        self.registry.unregister_sub_request(self.key);
    }
}

/// Tells the registry a request object is gone for good
#[derive(Debug)]
pub struct RequestLifetime {
    key: RequestKey,
    registry: Arc<InterceptionRegistry>,
}

impl RequestLifetime {
    pub fn new(registry: Arc<InterceptionRegistry>) -> Self {
        Self {
            key: RequestKey::next(),
            registry,
        }
    }

    pub fn key(&self) -> RequestKey {
        self.key
    }
}

impl Drop for RequestLifetime {
    fn drop(&mut self) {
        self.registry.request_destroyed(self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::network::event::{RequestInfo, RequestType};
    use crate::network::handler::ChannelHandler;
    use crate::network::modifications::ModificationSet;
    use crate::network::registry::Admission;
    use crate::network::scope::{FrameScope, RequestScope};
    use crate::network::state::{AdmissionRequest, JobState};

    fn admission(key: RequestKey) -> AdmissionRequest {
        AdmissionRequest {
            key,
            scope: RequestScope::frame(1, 1),
            request: RequestInfo {
                url: "https://example.com/".into(),
                method: "GET".into(),
                headers: HashMap::new(),
                post_data: None,
            },
            resource_type: RequestType::Fetch,
            is_navigation: false,
        }
    }

    #[tokio::test]
    async fn test_drop_finishes_job() {
        let registry = InterceptionRegistry::launch();
        let (handler, _rx) = ChannelHandler::new();
        registry
            .start_intercepting_requests("s".into(), vec![FrameScope::new(1, 1, 1)], &handler)
            .await
            .unwrap();

        let Admission::Intercepted(job) = registry.admit(admission(RequestKey::next())).await else {
            panic!("expected interception");
        };
        let id = job.id().clone();
        assert!(registry.interception_state(&id).await.is_some());

        drop(job);
        assert_eq!(registry.interception_state(&id).await, None::<JobState>);
        assert_eq!(registry.stats().jobs_finished, 1);
    }

    #[tokio::test]
    async fn test_decision_times_out() {
        let registry = InterceptionRegistry::launch();
        let (handler, _rx) = ChannelHandler::new();
        registry
            .start_intercepting_requests("s".into(), vec![FrameScope::new(1, 1, 1)], &handler)
            .await
            .unwrap();

        let Admission::Intercepted(mut job) = registry.admit(admission(RequestKey::next())).await
        else {
            panic!("expected interception");
        };
        assert!(job.decision(Duration::from_millis(50)).await.is_none());
        assert_eq!(registry.interception_state(job.id()).await, Some(JobState::Expired));

        let err = registry
            .continue_intercepted_request(job.id(), ModificationSet::unchanged())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::DecisionExpired(_)));
        assert!(job.try_decision().is_none());
    }

    #[tokio::test]
    async fn test_request_lifetime_drops_expectation() {
        let registry = InterceptionRegistry::launch();
        let (handler, _rx) = ChannelHandler::new();
        registry
            .start_intercepting_requests("s".into(), vec![FrameScope::new(1, 1, 1)], &handler)
            .await
            .unwrap();

        let lifetime = RequestLifetime::new(registry.clone());
        let key = lifetime.key();
        let Admission::Intercepted(job) = registry.admit(admission(key)).await else {
            panic!("expected interception");
        };
        let first = job.id().clone();
        job.expect_redirect();
        drop(job);
        drop(lifetime);

        let Admission::Intercepted(next) = registry.admit(admission(key)).await else {
            panic!("expected interception");
        };
        assert_ne!(next.id(), &first);
        assert!(!next.is_redirect());
    }
}
