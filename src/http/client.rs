// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP client implementation

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Client;

use super::request::Request;
use super::response::Response;
use super::DEFAULT_USER_AGENT;
use crate::error::{Error, Result};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Default timeout
    pub timeout: Duration,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
    /// Default headers
    pub default_headers: HeaderMap,
    /// Proxy URL
    pub proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("accept", HeaderValue::from_static("*/*"));
        default_headers.insert(
            "accept-language",
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            default_headers,
            proxy: None,
        }
    }
}

/// Single-hop HTTP client.
///
/// Redirects are never followed here; each hop is a separate request so the
/// interception layer can see it.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .default_headers(config.default_headers.clone());

        if let Some(ref proxy_url) = config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// Execute a GET request
    pub async fn get(&self, url: impl AsRef<str>) -> Result<Response> {
        self.execute(Request::get(url)?).await
    }

    /// Send one hop
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let start = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout_with_url(
                    "request",
                    request.timeout.unwrap_or(self.config.timeout).as_millis() as u64,
                    request.url.as_str(),
                )
            } else {
                Error::Http(e)
            }
        })?;
        let final_url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response::new(
            status,
            headers,
            body,
            final_url,
            false,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Get client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.config().user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let config = HttpClientConfig {
            proxy: Some("::not a proxy::".into()),
            ..Default::default()
        };
        assert!(matches!(
            HttpClient::with_config(config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_redirects_not_followed() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client.get(format!("{}/old", server.uri())).await.unwrap();
        assert_eq!(response.status_code(), 302);
        assert!(response.location().unwrap().path().ends_with("/new"));
    }
}
