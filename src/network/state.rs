// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Network-context partition of the registry
//!
//! [`NetworkState`] is owned outright by the network actor. Nothing here is
//! shared or locked; every method runs to completion inside one message.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::event::{AuthChallenge, InterceptedRequest, RequestInfo, RequestType};
use super::handler::HandlerRef;
use super::id::{IdGenerator, InterceptionId, RequestKey};
use super::modifications::Modifications;
use super::scope::{RequestScope, ScopeKey, SessionId};
use crate::error::{Error, Result};

/// Session binding value
#[derive(Debug, Clone)]
pub struct InterceptedPage {
    pub session: SessionId,
    pub handler: HandlerRef,
}

impl InterceptedPage {
    pub fn new(session: SessionId, handler: HandlerRef) -> Self {
        Self { session, handler }
    }
}

/// What the transport tells the registry about a request before sending it
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub key: RequestKey,
    pub scope: RequestScope,
    pub request: RequestInfo,
    pub resource_type: RequestType,
    pub is_navigation: bool,
}

/// Why a request was not intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BypassReason {
    /// Internally generated sub-request
    SubRequest,
    /// No binding matched the request's scope
    NoBinding,
    /// A binding matched but its handler is gone
    HandlerExpired,
    /// The registry has shut down
    RegistryClosed,
}

/// Lifecycle of a pending interception id. Finished ids have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Admitted,
    AwaitingDecision,
    Decided,
    /// The job stopped waiting and went on with its own default
    Expired,
}

/// A decision tagged with the notification round it answers.
///
/// Round 0 is the admission notification; every auth challenge starts a new
/// round. A job ignores decisions from rounds before the one it asked about.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub round: u64,
    pub modifications: Modifications,
}

/// Handler call to marshal to the control context
#[derive(Debug)]
pub struct Notification {
    pub handler: HandlerRef,
    pub request: InterceptedRequest,
}

/// Result of a successful admission
#[derive(Debug)]
pub struct Admitted {
    pub id: InterceptionId,
    /// Identifies this leg among admissions sharing `id`
    pub admission: u64,
    pub is_redirect: bool,
    /// Receiving half of the job's decision channel
    pub decisions: mpsc::UnboundedReceiver<Decision>,
    pub notification: Notification,
}

struct PendingJob {
    admission: u64,
    round: u64,
    decisions: mpsc::UnboundedSender<Decision>,
    page: InterceptedPage,
    request: InterceptedRequest,
    state: JobState,
}

struct RedirectExpectation {
    id: InterceptionId,
    page: Option<InterceptedPage>,
}

/// Bindings, pending jobs, redirect expectations and sub-requests
#[derive(Default)]
pub struct NetworkState {
    render_frames: HashMap<(i32, i32), InterceptedPage>,
    frame_tree_nodes: HashMap<i32, InterceptedPage>,
    pending_jobs: HashMap<InterceptionId, PendingJob>,
    expected_redirects: HashMap<RequestKey, RedirectExpectation>,
    sub_requests: HashSet<RequestKey>,
    ids: IdGenerator,
    admissions: u64,
}

impl NetworkState {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            ids: IdGenerator::new(id_prefix),
            ..Default::default()
        }
    }

    /// Bind every key to `page`, replacing older bindings
    pub fn bind(&mut self, keys: &[ScopeKey], page: &InterceptedPage) {
        for key in keys {
            match *key {
                ScopeKey::RenderFrame {
                    process_id,
                    render_frame_id,
                } => {
                    self.render_frames
                        .insert((process_id, render_frame_id), page.clone());
                }
                ScopeKey::FrameTreeNode(id) => {
                    self.frame_tree_nodes.insert(id, page.clone());
                }
            }
        }
    }

    /// Remove the keys still bound to `session`
    pub fn unbind(&mut self, session: &SessionId, keys: &[ScopeKey]) {
        for key in keys {
            match *key {
                ScopeKey::RenderFrame {
                    process_id,
                    render_frame_id,
                } => {
                    let k = (process_id, render_frame_id);
                    if self.render_frames.get(&k).is_some_and(|p| &p.session == session) {
                        self.render_frames.remove(&k);
                    }
                }
                ScopeKey::FrameTreeNode(id) => {
                    if self.frame_tree_nodes.get(&id).is_some_and(|p| &p.session == session) {
                        self.frame_tree_nodes.remove(&id);
                    }
                }
            }
        }
    }

    fn lookup(&self, scope: &RequestScope) -> Option<&InterceptedPage> {
        scope.lookup_keys().find_map(|key| match key {
            ScopeKey::RenderFrame {
                process_id,
                render_frame_id,
            } => self.render_frames.get(&(process_id, render_frame_id)),
            ScopeKey::FrameTreeNode(id) => self.frame_tree_nodes.get(&id),
        })
    }

    /// Decide whether `request` is intercepted and, if so, register its job
    pub fn admit(&mut self, request: AdmissionRequest) -> std::result::Result<Admitted, BypassReason> {
        if self.sub_requests.contains(&request.key) {
            return Err(BypassReason::SubRequest);
        }

        let redirect = self.expected_redirects.remove(&request.key);

        let page = match self.lookup(&request.scope) {
            Some(page) => page.clone(),
            None => match redirect.as_ref().and_then(|r| r.page.clone()) {
                Some(page) => page,
                None => return Err(BypassReason::NoBinding),
            },
        };

        if !page.handler.is_alive() {
            return Err(BypassReason::HandlerExpired);
        }

        let is_redirect = redirect.is_some();
        let id = match redirect {
            Some(r) => r.id,
            None => self.ids.mint(),
        };

        let notification = InterceptedRequest {
            interception_id: id.clone(),
            session: page.session.clone(),
            request: request.request,
            resource_type: request.resource_type,
            is_navigation_request: request.is_navigation,
            is_redirect,
            auth_challenge: None,
            timestamp: SystemTime::now(),
        };

        self.admissions += 1;
        let admission = self.admissions;
        let (tx, rx) = mpsc::unbounded_channel();
        let job = PendingJob {
            admission,
            round: 0,
            decisions: tx,
            page: page.clone(),
            request: notification.clone(),
            state: JobState::Admitted,
        };
        if let Some(previous) = self.pending_jobs.insert(id.clone(), job) {
            tracing::warn!(
                interception_id = %id,
                superseded = previous.admission,
                "Previous leg still pending, superseded by new admission"
            );
        }

        Ok(Admitted {
            id,
            admission,
            is_redirect,
            decisions: rx,
            notification: Notification {
                handler: page.handler,
                request: notification,
            },
        })
    }

    /// Record that the admission notification left for the control context
    pub fn notification_dispatched(&mut self, id: &InterceptionId) {
        if let Some(job) = self.pending_jobs.get_mut(id) {
            job.state = JobState::AwaitingDecision;
        }
    }

    /// Hand a validated decision to the job of `id`.
    ///
    /// Each notification gets one answer; a second decision is refused until
    /// an auth challenge asks again, and so is a decision the job stopped
    /// waiting for.
    pub fn continue_request(&mut self, id: &InterceptionId, modifications: Modifications) -> Result<()> {
        let job = self
            .pending_jobs
            .get_mut(id)
            .ok_or_else(|| Error::unknown_id(id.as_str()))?;
        match job.state {
            JobState::Decided => return Err(Error::AlreadyDecided(id.to_string())),
            JobState::Expired => return Err(Error::DecisionExpired(id.to_string())),
            JobState::Admitted | JobState::AwaitingDecision => {}
        }

        job.decisions
            .send(Decision {
                round: job.round,
                modifications,
            })
            .map_err(|_| Error::unknown_id(id.as_str()))?;
        job.state = JobState::Decided;
        Ok(())
    }

    /// The leg `admission` of `id` gave up waiting for its decision
    pub fn decision_expired(&mut self, id: &InterceptionId, admission: u64) -> bool {
        match self.pending_jobs.get_mut(id) {
            Some(job)
                if job.admission == admission
                    && matches!(job.state, JobState::Admitted | JobState::AwaitingDecision) =>
            {
                job.state = JobState::Expired;
                true
            }
            _ => false,
        }
    }

    /// Start a new notification round for `id` carrying an auth challenge.
    /// Returns the round number with the notification to deliver.
    pub fn auth_challenge(&mut self, id: &InterceptionId, challenge: AuthChallenge) -> Option<(u64, Notification)> {
        let job = self.pending_jobs.get_mut(id)?;
        job.round += 1;
        job.state = JobState::AwaitingDecision;

        let mut request = job.request.clone();
        request.auth_challenge = Some(challenge);
        request.timestamp = SystemTime::now();

        Some((
            job.round,
            Notification {
                handler: job.page.handler.clone(),
                request,
            },
        ))
    }

    /// Remember to reuse `id` when `key` comes back after a redirect
    pub fn expect_request_after_redirect(&mut self, key: RequestKey, id: InterceptionId) {
        let page = self.pending_jobs.get(&id).map(|job| job.page.clone());
        self.expected_redirects
            .insert(key, RedirectExpectation { id, page });
    }

    pub fn register_sub_request(&mut self, key: RequestKey) {
        self.sub_requests.insert(key);
    }

    pub fn unregister_sub_request(&mut self, key: RequestKey) {
        self.sub_requests.remove(&key);
    }

    /// Drop anything still keyed by an abandoned request object
    pub fn request_destroyed(&mut self, key: RequestKey) {
        self.expected_redirects.remove(&key);
    }

    /// Retire `id`. Returns false if it was not pending.
    pub fn job_finished(&mut self, id: &InterceptionId) -> bool {
        self.pending_jobs.remove(id).is_some()
    }

    /// Retire `id` only if its pending entry is still the leg `admission`.
    /// A leg superseded by a later admission under the same id finishes as
    /// a no-op.
    pub fn admission_finished(&mut self, id: &InterceptionId, admission: u64) -> bool {
        match self.pending_jobs.get(id) {
            Some(job) if job.admission == admission => self.pending_jobs.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn state_of(&self, id: &InterceptionId) -> Option<JobState> {
        self.pending_jobs.get(id).map(|job| job.state)
    }

    pub fn pending_count(&self) -> usize {
        self.pending_jobs.len()
    }

    pub fn binding_count(&self) -> usize {
        self.render_frames.len() + self.frame_tree_nodes.len()
    }

    pub fn expected_redirect_count(&self) -> usize {
        self.expected_redirects.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::network::handler::ChannelHandler;
    use crate::network::modifications::ErrorReason;
    use crate::network::scope::FrameScope;

    const FRAME: FrameScope = FrameScope {
        process_id: 1,
        render_frame_id: 10,
        frame_tree_node_id: 100,
    };

    fn request(key: RequestKey, scope: RequestScope) -> AdmissionRequest {
        AdmissionRequest {
            key,
            scope,
            request: RequestInfo {
                url: "https://example.com/".into(),
                method: "GET".into(),
                headers: HashMap::new(),
                post_data: None,
            },
            resource_type: RequestType::Document,
            is_navigation: true,
        }
    }

    fn bound_state(handler: &Arc<ChannelHandler>) -> NetworkState {
        let mut state = NetworkState::default();
        let page = InterceptedPage::new(SessionId::from("s"), HandlerRef::new(handler));
        state.bind(&FRAME.keys(), &page);
        state
    }

    #[test]
    fn test_admit_mints_id_for_bound_frame() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();

        assert_eq!(admitted.id.as_str(), "1");
        assert!(!admitted.is_redirect);
        assert_eq!(admitted.notification.request.session.as_str(), "s");
        assert_eq!(state.state_of(&admitted.id), Some(JobState::Admitted));
    }

    #[test]
    fn test_admit_falls_back_to_frame_tree_node() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let scope = RequestScope {
            render_frame: Some((9, 9)),
            frame_tree_node_id: Some(FRAME.frame_tree_node_id),
        };
        assert!(state.admit(request(RequestKey::next(), scope)).is_ok());
        assert!(state
            .admit(request(RequestKey::next(), RequestScope::navigation(100)))
            .is_ok());
    }

    #[test]
    fn test_render_frame_binding_wins_over_frame_tree_node() {
        let (first, _rx1) = ChannelHandler::new();
        let (second, _rx2) = ChannelHandler::new();
        let mut state = NetworkState::default();
        state.bind(
            &[ScopeKey::FrameTreeNode(100)],
            &InterceptedPage::new("tree".into(), HandlerRef::new(&first)),
        );
        state.bind(
            &[ScopeKey::RenderFrame {
                process_id: 1,
                render_frame_id: 10,
            }],
            &InterceptedPage::new("frame".into(), HandlerRef::new(&second)),
        );

        let admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        assert_eq!(admitted.notification.request.session.as_str(), "frame");
    }

    #[test]
    fn test_unbound_request_bypasses() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let result = state.admit(request(RequestKey::next(), RequestScope::frame(2, 2)));
        assert_eq!(result.unwrap_err(), BypassReason::NoBinding);
        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn test_expired_handler_bypasses_and_keeps_binding() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);
        drop(handler);

        let result = state.admit(request(RequestKey::next(), RequestScope::of(&FRAME)));
        assert_eq!(result.unwrap_err(), BypassReason::HandlerExpired);
        assert_eq!(state.binding_count(), 2);
    }

    #[test]
    fn test_sub_request_never_admitted() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);
        let key = RequestKey::next();

        state.register_sub_request(key);
        assert_eq!(
            state.admit(request(key, RequestScope::of(&FRAME))).unwrap_err(),
            BypassReason::SubRequest
        );

        state.unregister_sub_request(key);
        assert!(state.admit(request(key, RequestScope::of(&FRAME))).is_ok());
    }

    #[test]
    fn test_redirect_reuses_id() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let first = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        assert_eq!(first.id.as_str(), "1");

        let key = RequestKey::next();
        let second = state.admit(request(key, RequestScope::of(&FRAME))).unwrap();
        assert_eq!(second.id.as_str(), "2");

        state.expect_request_after_redirect(key, second.id.clone());
        assert!(state.job_finished(&second.id));

        let followup = state.admit(request(key, RequestScope::of(&FRAME))).unwrap();
        assert_eq!(followup.id.as_str(), "2");
        assert!(followup.is_redirect);
        assert!(followup.notification.request.is_redirect);
        assert_eq!(state.expected_redirect_count(), 0);

        let fresh = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        assert_eq!(fresh.id.as_str(), "3");
    }

    #[test]
    fn test_redirect_honored_without_binding() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);
        let key = RequestKey::next();

        let first = state.admit(request(key, RequestScope::of(&FRAME))).unwrap();
        state.expect_request_after_redirect(key, first.id.clone());
        state.job_finished(&first.id);

        // The follow-up leg lost its scoping context
        let followup = state.admit(request(key, RequestScope::default())).unwrap();
        assert_eq!(followup.id, first.id);
    }

    #[test]
    fn test_destroyed_request_drops_expectation() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);
        let key = RequestKey::next();

        let first = state.admit(request(key, RequestScope::of(&FRAME))).unwrap();
        state.expect_request_after_redirect(key, first.id.clone());
        state.request_destroyed(key);
        assert_eq!(state.expected_redirect_count(), 0);
    }

    #[test]
    fn test_continue_and_finish() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let mut admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        state.notification_dispatched(&admitted.id);
        assert_eq!(state.state_of(&admitted.id), Some(JobState::AwaitingDecision));

        state
            .continue_request(&admitted.id, Modifications::unchanged())
            .unwrap();
        assert_eq!(state.state_of(&admitted.id), Some(JobState::Decided));
        assert!(admitted.decisions.try_recv().unwrap().modifications.is_unchanged());

        assert!(state.job_finished(&admitted.id));
        assert!(!state.job_finished(&admitted.id));
        assert!(state.state_of(&admitted.id).is_none());

        let err = state
            .continue_request(&admitted.id, Modifications::Fail(ErrorReason::Aborted))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownInterceptionId(_)));
    }

    #[test]
    fn test_second_decision_refused() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let mut admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        state
            .continue_request(&admitted.id, Modifications::unchanged())
            .unwrap();

        let err = state
            .continue_request(&admitted.id, Modifications::Fail(ErrorReason::Aborted))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyDecided(ref id) if id == "1"));

        assert!(admitted.decisions.try_recv().unwrap().modifications.is_unchanged());
        assert!(admitted.decisions.try_recv().is_err());
    }

    #[test]
    fn test_superseded_leg_finish_is_noop() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);
        let key = RequestKey::next();

        let first = state.admit(request(key, RequestScope::of(&FRAME))).unwrap();
        state.expect_request_after_redirect(key, first.id.clone());
        let second = state.admit(request(key, RequestScope::of(&FRAME))).unwrap();
        assert_eq!(second.id, first.id);
        assert_ne!(second.admission, first.admission);

        assert!(!state.admission_finished(&first.id, first.admission));
        assert_eq!(state.state_of(&second.id), Some(JobState::Admitted));

        assert!(state.admission_finished(&second.id, second.admission));
        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn test_continue_unknown_id() {
        let mut state = NetworkState::default();
        let err = state
            .continue_request(&InterceptionId::from("999"), Modifications::unchanged())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown interception id: 999");
    }

    #[test]
    fn test_continue_after_job_dropped_receiver() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        let id = admitted.id.clone();
        drop(admitted);

        assert!(state.continue_request(&id, Modifications::unchanged()).is_err());
    }

    #[test]
    fn test_unbind_skips_keys_rebound_elsewhere() {
        let (a, _rx1) = ChannelHandler::new();
        let (b, _rx2) = ChannelHandler::new();
        let mut state = NetworkState::default();
        state.bind(&FRAME.keys(), &InterceptedPage::new("a".into(), HandlerRef::new(&a)));
        state.bind(
            &[ScopeKey::FrameTreeNode(100)],
            &InterceptedPage::new("b".into(), HandlerRef::new(&b)),
        );

        state.unbind(&SessionId::from("a"), &FRAME.keys());
        assert_eq!(state.binding_count(), 1);

        let admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        assert_eq!(admitted.notification.request.session.as_str(), "b");
    }

    #[test]
    fn test_auth_challenge_renotifies_same_id() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        state
            .continue_request(&admitted.id, Modifications::unchanged())
            .unwrap();

        let challenge = AuthChallenge::parse(
            crate::network::event::AuthChallengeSource::Server,
            "https://example.com",
            "Basic realm=\"x\"",
        )
        .unwrap();
        let (round, notification) = state.auth_challenge(&admitted.id, challenge).unwrap();

        assert_eq!(round, 1);
        assert_eq!(notification.request.interception_id, admitted.id);
        assert!(notification.request.is_auth_challenge());
        assert_eq!(state.state_of(&admitted.id), Some(JobState::AwaitingDecision));
    }

    #[test]
    fn test_ids_never_reused_after_finish() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);
        let mut seen = HashSet::new();

        for _ in 0..50 {
            let admitted = state
                .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
                .unwrap();
            assert!(seen.insert(admitted.id.clone()));
            state.job_finished(&admitted.id);
        }
    }

    #[test]
    fn test_expired_job_refuses_late_decision() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let mut admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        assert!(!state.decision_expired(&admitted.id, admitted.admission + 1));
        assert!(state.decision_expired(&admitted.id, admitted.admission));
        assert_eq!(state.state_of(&admitted.id), Some(JobState::Expired));

        let err = state
            .continue_request(&admitted.id, Modifications::unchanged())
            .unwrap_err();
        assert!(matches!(err, Error::DecisionExpired(ref id) if id == "1"));
        assert!(admitted.decisions.try_recv().is_err());
    }

    #[test]
    fn test_auth_round_tags_decisions() {
        let (handler, _rx) = ChannelHandler::new();
        let mut state = bound_state(&handler);

        let mut admitted = state
            .admit(request(RequestKey::next(), RequestScope::of(&FRAME)))
            .unwrap();
        state
            .continue_request(&admitted.id, Modifications::unchanged())
            .unwrap();

        let challenge = AuthChallenge::parse(
            crate::network::event::AuthChallengeSource::Server,
            "https://example.com",
            "Basic",
        )
        .unwrap();
        let (round, _) = state.auth_challenge(&admitted.id, challenge).unwrap();
        state
            .continue_request(&admitted.id, Modifications::Fail(ErrorReason::AccessDenied))
            .unwrap();

        assert_eq!(admitted.decisions.try_recv().unwrap().round, 0);
        let answer = admitted.decisions.try_recv().unwrap();
        assert_eq!(answer.round, round);
        assert_eq!(answer.modifications, Modifications::Fail(ErrorReason::AccessDenied));
    }
}
