// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Interception registry
//!
//! The registry is two single-threaded actors joined by one-way queues:
//!
//! - the **control** actor owns which sessions are intercepted and calls
//!   policy handlers;
//! - the **network** actor owns bindings, pending jobs, redirect
//!   expectations and the sub-request set ([`NetworkState`]).
//!
//! [`InterceptionRegistry`] is the shared, reference-counted handle to both.
//! Callers that need an answer get it over a oneshot channel; neither actor
//! ever waits on the other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::config::RegistryConfig;
use super::event::AuthChallenge;
use super::handler::{HandlerRef, InterceptionHandler};
use super::id::{InterceptionId, RequestKey};
use super::job::{InterceptedJob, SubRequestGuard};
use super::modifications::{ModificationSet, Modifications};
use super::scope::{FrameScope, ScopeKey, SessionId};
use super::state::{
    AdmissionRequest, Admitted, BypassReason, Decision, InterceptedPage, JobState, NetworkState,
    Notification,
};
use super::stats::{RegistryStats, StatsReport};
use crate::error::{Error, Result};

/// Outcome of [`InterceptionRegistry::admit`]
#[derive(Debug)]
pub enum Admission {
    /// The job replaces normal dispatch; wait for its decision
    Intercepted(InterceptedJob),
    /// Send the request as usual
    NotIntercepted(BypassReason),
}

impl Admission {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Admission::Intercepted(_))
    }
}

enum ControlMessage {
    Start {
        session: SessionId,
        frames: Vec<FrameScope>,
        handler: HandlerRef,
        done: oneshot::Sender<()>,
    },
    Stop {
        session: SessionId,
        done: oneshot::Sender<()>,
    },
    FrameAttached {
        session: SessionId,
        frame: FrameScope,
        done: oneshot::Sender<()>,
    },
    FrameDetached {
        session: SessionId,
        frame: FrameScope,
        done: oneshot::Sender<()>,
    },
    Notify(Notification),
    Shutdown,
}

struct AdmittedJob {
    id: InterceptionId,
    admission: u64,
    is_redirect: bool,
    decisions: mpsc::UnboundedReceiver<Decision>,
}

enum NetworkMessage {
    Bind {
        keys: Vec<ScopeKey>,
        page: InterceptedPage,
        done: oneshot::Sender<()>,
    },
    Unbind {
        session: SessionId,
        keys: Vec<ScopeKey>,
        done: oneshot::Sender<()>,
    },
    Admit {
        request: AdmissionRequest,
        reply: oneshot::Sender<std::result::Result<AdmittedJob, BypassReason>>,
    },
    Continue {
        id: InterceptionId,
        modifications: Modifications,
        ack: oneshot::Sender<Result<()>>,
    },
    AuthChallenge {
        id: InterceptionId,
        challenge: AuthChallenge,
        reply: oneshot::Sender<Option<u64>>,
    },
    DecisionExpired {
        id: InterceptionId,
        admission: u64,
    },
    ExpectRedirect {
        key: RequestKey,
        id: InterceptionId,
    },
    RegisterSubRequest(RequestKey),
    UnregisterSubRequest(RequestKey),
    RequestDestroyed(RequestKey),
    JobFinished {
        id: InterceptionId,
        /// Only retire this leg; `None` retires whatever is pending
        admission: Option<u64>,
    },
    State {
        id: InterceptionId,
        reply: oneshot::Sender<Option<JobState>>,
    },
    Shutdown,
}

struct InterceptedSession {
    handler: HandlerRef,
    keys: Vec<ScopeKey>,
}

struct ControlActor {
    sessions: HashMap<SessionId, InterceptedSession>,
    network: mpsc::UnboundedSender<NetworkMessage>,
}

impl ControlActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControlMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                ControlMessage::Start {
                    session,
                    frames,
                    handler,
                    done,
                } => self.start(session, frames, handler, done),
                ControlMessage::Stop { session, done } => self.stop(session, done),
                ControlMessage::FrameAttached {
                    session,
                    frame,
                    done,
                } => self.frame_attached(session, frame, done),
                ControlMessage::FrameDetached {
                    session,
                    frame,
                    done,
                } => self.frame_detached(session, frame, done),
                ControlMessage::Notify(notification) => Self::notify(notification),
                ControlMessage::Shutdown => break,
            }
        }
        tracing::debug!("Control context stopped");
    }

    fn dispatch(&self, message: NetworkMessage) {
        if self.network.send(message).is_err() {
            tracing::debug!("Network context gone, dropping message");
        }
    }

    fn start(
        &mut self,
        session: SessionId,
        frames: Vec<FrameScope>,
        handler: HandlerRef,
        done: oneshot::Sender<()>,
    ) {
        let entry = self
            .sessions
            .entry(session.clone())
            .or_insert_with(|| InterceptedSession {
                handler: handler.clone(),
                keys: Vec::new(),
            });
        entry.handler = handler.clone();
        for key in frames.iter().flat_map(|f| f.keys()) {
            if !entry.keys.contains(&key) {
                entry.keys.push(key);
            }
        }

        // The handler is per session: frames bound earlier move to it too
        let keys = entry.keys.clone();

        tracing::info!(session = %session, frames = frames.len(), "Intercepting requests");
        self.dispatch(NetworkMessage::Bind {
            keys,
            page: InterceptedPage::new(session, handler),
            done,
        });
    }

    fn stop(&mut self, session: SessionId, done: oneshot::Sender<()>) {
        let Some(intercepted) = self.sessions.remove(&session) else {
            let _ = done.send(());
            return;
        };

        tracing::info!(session = %session, "Stopped intercepting requests");
        self.dispatch(NetworkMessage::Unbind {
            session,
            keys: intercepted.keys,
            done,
        });
    }

    fn frame_attached(&mut self, session: SessionId, frame: FrameScope, done: oneshot::Sender<()>) {
        let Some(intercepted) = self.sessions.get_mut(&session) else {
            let _ = done.send(());
            return;
        };

        let keys = frame.keys().to_vec();
        for key in &keys {
            if !intercepted.keys.contains(key) {
                intercepted.keys.push(*key);
            }
        }

        let page = InterceptedPage::new(session, intercepted.handler.clone());
        self.dispatch(NetworkMessage::Bind { keys, page, done });
    }

    fn frame_detached(&mut self, session: SessionId, frame: FrameScope, done: oneshot::Sender<()>) {
        let Some(intercepted) = self.sessions.get_mut(&session) else {
            let _ = done.send(());
            return;
        };

        let keys = frame.keys().to_vec();
        intercepted.keys.retain(|k| !keys.contains(k));
        self.dispatch(NetworkMessage::Unbind {
            session,
            keys,
            done,
        });
    }

    fn notify(notification: Notification) {
        match notification.handler.upgrade() {
            Some(handler) => handler.request_intercepted(notification.request),
            None => tracing::debug!(
                interception_id = %notification.request.interception_id,
                "Handler gone before notification was delivered"
            ),
        }
    }
}

struct NetworkActor {
    state: NetworkState,
    control: mpsc::UnboundedSender<ControlMessage>,
    stats: Arc<RegistryStats>,
}

impl NetworkActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<NetworkMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                NetworkMessage::Bind { keys, page, done } => {
                    self.state.bind(&keys, &page);
                    let _ = done.send(());
                }
                NetworkMessage::Unbind {
                    session,
                    keys,
                    done,
                } => {
                    self.state.unbind(&session, &keys);
                    let _ = done.send(());
                }
                NetworkMessage::Admit { request, reply } => self.admit(request, reply),
                NetworkMessage::Continue {
                    id,
                    modifications,
                    ack,
                } => {
                    let kind = modifications.kind();
                    let result = self.state.continue_request(&id, modifications);
                    self.stats.record_decision(result.is_ok());
                    match &result {
                        Ok(()) => tracing::debug!(interception_id = %id, decision = kind, "Decision delivered"),
                        Err(e) => tracing::debug!(interception_id = %id, error = %e, "Decision dropped"),
                    }
                    let _ = ack.send(result);
                }
                NetworkMessage::AuthChallenge {
                    id,
                    challenge,
                    reply,
                } => {
                    let round = match self.state.auth_challenge(&id, challenge) {
                        Some((round, notification)) => self.notify(notification).then_some(round),
                        None => None,
                    };
                    let _ = reply.send(round);
                }
                NetworkMessage::DecisionExpired { id, admission } => {
                    if self.state.decision_expired(&id, admission) {
                        tracing::debug!(interception_id = %id, "Job stopped waiting for a decision");
                    }
                }
                NetworkMessage::ExpectRedirect { key, id } => {
                    tracing::debug!(interception_id = %id, request = %key, "Expecting request after redirect");
                    self.state.expect_request_after_redirect(key, id);
                }
                NetworkMessage::RegisterSubRequest(key) => self.state.register_sub_request(key),
                NetworkMessage::UnregisterSubRequest(key) => self.state.unregister_sub_request(key),
                NetworkMessage::RequestDestroyed(key) => self.state.request_destroyed(key),
                NetworkMessage::JobFinished { id, admission } => {
                    let finished = match admission {
                        Some(admission) => self.state.admission_finished(&id, admission),
                        None => self.state.job_finished(&id),
                    };
                    if finished {
                        self.stats.record_job_finished();
                        tracing::debug!(interception_id = %id, "Job finished");
                    }
                }
                NetworkMessage::State { id, reply } => {
                    let _ = reply.send(self.state.state_of(&id));
                }
                NetworkMessage::Shutdown => break,
            }
        }
        tracing::debug!(pending = self.state.pending_count(), "Network context stopped");
    }

    fn notify(&self, notification: Notification) -> bool {
        self.control.send(ControlMessage::Notify(notification)).is_ok()
    }

    fn admit(
        &mut self,
        request: AdmissionRequest,
        reply: oneshot::Sender<std::result::Result<AdmittedJob, BypassReason>>,
    ) {
        let url = request.request.url.clone();
        let Admitted {
            id,
            admission,
            is_redirect,
            decisions,
            notification,
        } = match self.state.admit(request) {
            Ok(admitted) => admitted,
            Err(reason) => {
                self.stats.record_bypassed();
                tracing::trace!(url = %url, reason = ?reason, "Request not intercepted");
                let _ = reply.send(Err(reason));
                return;
            }
        };

        self.stats.record_admitted(is_redirect);
        tracing::debug!(
            interception_id = %id,
            session = %notification.request.session,
            url = %url,
            redirect = is_redirect,
            "Request intercepted"
        );

        if self.notify(notification) {
            self.state.notification_dispatched(&id);
        }

        let job = AdmittedJob {
            id: id.clone(),
            admission,
            is_redirect,
            decisions,
        };
        if reply.send(Ok(job)).is_err() && self.state.admission_finished(&id, admission) {
            // Transport went away before taking the job
            self.stats.record_job_finished();
        }
    }
}

/// Shared interception registry.
///
/// Create one per browsing context with [`InterceptionRegistry::new`] and
/// pass the `Arc` to whoever needs it; there is no global lookup.
pub struct InterceptionRegistry {
    control: mpsc::UnboundedSender<ControlMessage>,
    network: mpsc::UnboundedSender<NetworkMessage>,
    stats: Arc<RegistryStats>,
}

impl std::fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionRegistry")
            .field("stats", &self.stats.report())
            .finish()
    }
}

impl InterceptionRegistry {
    /// Spawn both contexts on the current Tokio runtime
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (network_tx, network_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RegistryStats::new());

        let control = ControlActor {
            sessions: HashMap::new(),
            network: network_tx.clone(),
        };
        let network = NetworkActor {
            state: NetworkState::new(config.id_prefix),
            control: control_tx.clone(),
            stats: stats.clone(),
        };
        tokio::spawn(control.run(control_rx));
        tokio::spawn(network.run(network_rx));

        Arc::new(Self {
            control: control_tx,
            network: network_tx,
            stats,
        })
    }

    /// Registry with default config
    pub fn launch() -> Arc<Self> {
        Self::new(RegistryConfig::default())
    }

    async fn control_call<F>(&self, message: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<()>) -> ControlMessage,
    {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(message(tx))
            .map_err(|_| Error::RegistryClosed)?;
        rx.await.map_err(|_| Error::RegistryClosed)
    }

    async fn network_call<T, F>(&self, message: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> NetworkMessage,
    {
        let (tx, rx) = oneshot::channel();
        self.network
            .send(message(tx))
            .map_err(|_| Error::RegistryClosed)?;
        rx.await.map_err(|_| Error::RegistryClosed)
    }

    fn post(&self, message: NetworkMessage) {
        if self.network.send(message).is_err() {
            tracing::debug!("Network context gone, dropping message");
        }
    }

    /// Route requests from `frames` of `session` to `handler`.
    ///
    /// Calling again for a running session adds `frames` and moves every
    /// frame of the session to the new handler. Resolves once the bindings
    /// are visible to admission.
    pub async fn start_intercepting_requests<H: InterceptionHandler + 'static>(
        &self,
        session: SessionId,
        frames: Vec<FrameScope>,
        handler: &Arc<H>,
    ) -> Result<()> {
        let handler = HandlerRef::new(handler);
        self.control_call(|done| ControlMessage::Start {
            session,
            frames,
            handler,
            done,
        })
        .await
    }

    /// Remove every binding of `session`. In-flight jobs are left alone.
    pub async fn stop_intercepting_requests(&self, session: &SessionId) -> Result<()> {
        let session = session.clone();
        self.control_call(|done| ControlMessage::Stop { session, done })
            .await
    }

    /// Bind a frame created in an intercepted session
    pub async fn frame_attached(&self, session: &SessionId, frame: FrameScope) -> Result<()> {
        let session = session.clone();
        self.control_call(|done| ControlMessage::FrameAttached {
            session,
            frame,
            done,
        })
        .await
    }

    /// Unbind a frame removed from an intercepted session
    pub async fn frame_detached(&self, session: &SessionId, frame: FrameScope) -> Result<()> {
        let session = session.clone();
        self.control_call(|done| ControlMessage::FrameDetached {
            session,
            frame,
            done,
        })
        .await
    }

    /// Decide whether a request about to be sent is intercepted.
    ///
    /// Never fails: a closed registry means "not intercepted".
    pub async fn admit(self: &Arc<Self>, request: AdmissionRequest) -> Admission {
        let key = request.key;
        let result = self
            .network_call(|reply| NetworkMessage::Admit { request, reply })
            .await;

        match result {
            Ok(Ok(job)) => Admission::Intercepted(InterceptedJob::new(
                job.id,
                job.admission,
                key,
                job.is_redirect,
                job.decisions,
                self.clone(),
            )),
            Ok(Err(reason)) => Admission::NotIntercepted(reason),
            Err(_) => Admission::NotIntercepted(BypassReason::RegistryClosed),
        }
    }

    /// Deliver a decision for `id`.
    ///
    /// Malformed input is rejected here without touching the network
    /// context. Resolves once the job has the decision, not once the request
    /// completes.
    pub async fn continue_intercepted_request(
        &self,
        id: &InterceptionId,
        modifications: ModificationSet,
    ) -> Result<()> {
        let modifications = match modifications.validate() {
            Ok(m) => m,
            Err(e) => {
                self.stats.record_decision(false);
                tracing::debug!(interception_id = %id, error = %e, "Rejected decision");
                return Err(e);
            }
        };

        let id = id.clone();
        self.network_call(|ack| NetworkMessage::Continue {
            id,
            modifications,
            ack,
        })
        .await?
    }

    /// Re-notify the handler of `id` with an auth challenge.
    ///
    /// Returns the notification round the answer will be tagged with, or
    /// `None` if `id` is no longer pending.
    pub async fn notify_auth_challenge(&self, id: &InterceptionId, challenge: AuthChallenge) -> Option<u64> {
        let id = id.clone();
        self.network_call(|reply| NetworkMessage::AuthChallenge {
            id,
            challenge,
            reply,
        })
        .await
        .ok()
        .flatten()
    }

    /// Reuse `id` for the next admission of `key`
    pub fn expect_request_after_redirect(&self, key: RequestKey, id: InterceptionId) {
        self.post(NetworkMessage::ExpectRedirect { key, id });
    }

    /// Exclude `key` from interception until the guard drops
    pub fn register_sub_request(self: &Arc<Self>, key: RequestKey) -> SubRequestGuard {
        self.post(NetworkMessage::RegisterSubRequest(key));
        SubRequestGuard::new(key, self.clone())
    }

    pub fn unregister_sub_request(&self, key: RequestKey) {
        self.post(NetworkMessage::UnregisterSubRequest(key));
    }

    /// Forget state keyed by an abandoned request object
    pub fn request_destroyed(&self, key: RequestKey) {
        self.post(NetworkMessage::RequestDestroyed(key));
    }

    /// Retire `id`. Repeated calls are no-ops.
    pub fn job_finished(&self, id: &InterceptionId) {
        self.post(NetworkMessage::JobFinished {
            id: id.clone(),
            admission: None,
        });
    }

    /// Retire the leg `admission` of `id`, leaving any later leg pending
    pub(crate) fn admission_finished(&self, id: &InterceptionId, admission: u64) {
        self.post(NetworkMessage::JobFinished {
            id: id.clone(),
            admission: Some(admission),
        });
    }

    /// The leg `admission` of `id` went on without a decision; later
    /// decisions for it are refused
    pub(crate) fn decision_expired(&self, id: &InterceptionId, admission: u64) {
        self.post(NetworkMessage::DecisionExpired {
            id: id.clone(),
            admission,
        });
    }

    /// Current state of `id`; `None` once finished or never admitted
    pub async fn interception_state(&self, id: &InterceptionId) -> Option<JobState> {
        let id = id.clone();
        self.network_call(|reply| NetworkMessage::State { id, reply })
            .await
            .ok()
            .flatten()
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsReport {
        self.stats.report()
    }
}

impl Drop for InterceptionRegistry {
    fn drop(&mut self) {
        let _ = self.control.send(ControlMessage::Shutdown);
        let _ = self.network.send(NetworkMessage::Shutdown);
    }
}
