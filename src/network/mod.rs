// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request interception
//!
//! Sessions bind frames to a policy handler; the transport asks the registry
//! about every request before sending it, and admitted requests wait for the
//! handler's decision.

mod config;
mod event;
mod handler;
mod id;
mod job;
mod modifications;
mod policy;
mod registry;
mod scope;
mod state;
mod stats;
mod transport;

pub use config::{RegistryConfig, TransportConfig};
pub use event::{AuthChallenge, AuthChallengeSource, InterceptedRequest, RequestInfo, RequestType};
pub use handler::{ChannelHandler, HandlerRef, InterceptionHandler};
pub use id::{IdGenerator, InterceptionId, RequestKey};
pub use job::{InterceptedJob, RequestLifetime, SubRequestGuard};
pub use modifications::{
    AuthChallengeResponse, AuthChallengeResponseSpec, AuthResponseKind, ErrorReason,
    ModificationSet, Modifications, RequestOverrides,
};
pub use policy::{
    AuthHeaderInjector, CredentialsProvider, DecisionPolicy, PolicyChain, PolicyHandler,
    RequestLogger, RuleAction, RulePolicy,
};
pub use registry::{Admission, InterceptionRegistry};
pub use scope::{FrameScope, RequestScope, ScopeKey, SessionId};
pub use state::{AdmissionRequest, BypassReason, InterceptedPage, JobState, NetworkState};
pub use stats::{RegistryStats, StatsReport};
pub use transport::{InterceptingClient, NetworkRequest};
