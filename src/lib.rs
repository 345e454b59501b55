// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Netsnare - Request Interception Registry
//!
//! Observe, modify, mock or fail outgoing requests of a browsing context
//! before they reach the network, with DevTools-style interception ids.
//!
//! ## Features
//!
//! - Per-frame interception routing with newest-registration-wins
//! - One decision per id: continue, rewrite, mock from raw HTTP, or fail
//! - Redirect legs keep their interception id
//! - Auth challenges go back to the same handler under the same id
//! - Internal sub-requests are never intercepted
//! - Default-open: expired handlers and silent policies never block traffic
//!
//! ## Example
//!
//! ```rust,no_run
//! use netsnare::network::{
//!     ErrorReason, FrameScope, InterceptingClient, InterceptionRegistry, NetworkRequest,
//!     PolicyHandler, RulePolicy, TransportConfig,
//! };
//! use netsnare::{HttpClient, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = InterceptionRegistry::launch();
//!     let policy = RulePolicy::new().block(r"/analytics/", ErrorReason::BlockedByClient)?;
//!     let handler = PolicyHandler::new(policy, registry.clone());
//!
//!     let frame = FrameScope::new(1, 1, 1);
//!     registry
//!         .start_intercepting_requests("tab-1".into(), vec![frame], &handler)
//!         .await?;
//!
//!     let client = InterceptingClient::new(HttpClient::new()?, registry, TransportConfig::default());
//!     let response = client
//!         .execute(NetworkRequest::navigation(Request::get("https://example.com")?, 1))
//!         .await?;
//!     println!("{}", response.status);
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod network;

// Errors
pub use error::{Error, Result};

// HTTP
pub use http::{HttpClient, HttpClientConfig, Request, Response};

// Registry
pub use network::{
    Admission, BypassReason, FrameScope, InterceptedJob, InterceptedRequest, InterceptionHandler,
    InterceptionId, InterceptionRegistry, JobState, ModificationSet, Modifications, RegistryConfig,
    RequestKey, RequestScope, SessionId, StatsReport,
};

// Transport and policies
pub use network::{
    AuthHeaderInjector, CredentialsProvider, DecisionPolicy, ErrorReason, InterceptingClient,
    NetworkRequest, PolicyChain, PolicyHandler, RequestLogger, RulePolicy, TransportConfig,
};

/// Netsnare version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
