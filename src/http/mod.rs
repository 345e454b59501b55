// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP client layer
//!
//! Single-hop request/response types over `reqwest`. Redirects and auth
//! retries are driven by [`crate::network::InterceptingClient`].

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientConfig};
pub use request::Request;
pub use response::Response;

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("netsnare/", env!("CARGO_PKG_VERSION"));

/// Common HTTP headers
pub mod headers {
    pub const AUTHORIZATION: &str = "authorization";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const LOCATION: &str = "location";
    pub const PROXY_AUTHENTICATE: &str = "proxy-authenticate";
    pub const PROXY_AUTHORIZATION: &str = "proxy-authorization";
    pub const WWW_AUTHENTICATE: &str = "www-authenticate";
}
