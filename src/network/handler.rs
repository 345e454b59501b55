// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Policy handler seam

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use super::event::InterceptedRequest;

/// Receives interception notifications on the control context.
///
/// The call is fire-and-forget: answer later through
/// [`InterceptionRegistry::continue_intercepted_request`](super::InterceptionRegistry::continue_intercepted_request).
/// Implementations must not block; spawn if the decision needs async work.
pub trait InterceptionHandler: Send + Sync {
    fn request_intercepted(&self, request: InterceptedRequest);
}

/// Non-owning reference to a policy handler.
///
/// The registry never keeps a handler alive. Once the owner drops it, every
/// admission check sees it as expired.
#[derive(Clone)]
pub struct HandlerRef(Weak<dyn InterceptionHandler>);

impl HandlerRef {
    pub fn new<H: InterceptionHandler + 'static>(handler: &Arc<H>) -> Self {
        let weak: Weak<H> = Arc::downgrade(handler);
        Self(weak)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<Arc<dyn InterceptionHandler>> {
        self.0.upgrade()
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Forwards every notification into a channel.
///
/// Suits a control plane that runs its own loop (a DevTools-style server, a
/// test) and answers with `continue_intercepted_request` from there.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<InterceptedRequest>,
}

impl ChannelHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<InterceptedRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl InterceptionHandler for ChannelHandler {
    fn request_intercepted(&self, request: InterceptedRequest) {
        if self.tx.send(request).is_err() {
            tracing::debug!("Interception channel receiver dropped");
        }
    }
}
