// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP response types

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};

/// HTTP response representation
#[derive(Debug, Clone)]
pub struct Response {
    /// Response status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
    /// Final URL (after redirects)
    pub url: Url,
    /// Whether this was a redirect
    pub redirected: bool,
    /// Whether the body came from a mock decision instead of the network
    pub mocked: bool,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

impl Response {
    /// Create a new response
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        url: Url,
        redirected: bool,
        response_time_ms: u64,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            url,
            redirected,
            mocked: false,
            response_time_ms,
        }
    }

    /// Parse a raw HTTP/1.x response: status line, headers, blank line, body.
    ///
    /// A response with no blank line is all head and no body.
    pub fn from_raw(raw: &[u8], url: Url) -> Result<Self> {
        let (head, body) = match find(raw, b"\r\n\r\n") {
            Some(i) => (&raw[..i], &raw[i + 4..]),
            None => match find(raw, b"\n\n") {
                Some(i) => (&raw[..i], &raw[i + 2..]),
                None => (raw, &[][..]),
            },
        };

        let head = std::str::from_utf8(head)
            .map_err(|_| Error::mock_response("headers are not valid UTF-8"))?;
        let mut lines = head.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::mock_response("empty response"))?;
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(Error::mock_response(format!(
                "bad status line '{}'",
                status_line
            )));
        }
        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| Error::mock_response(format!("bad status code in '{}'", status_line)))?;

        let mut headers = HeaderMap::new();
        for line in lines.filter(|l| !l.trim().is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::mock_response(format!("bad header line '{}'", line)))?;
            let name = HeaderName::try_from(name.trim())
                .map_err(|_| Error::mock_response(format!("bad header name '{}'", name)))?;
            let value = HeaderValue::try_from(value.trim())
                .map_err(|_| Error::mock_response(format!("bad value for header '{}'", name)))?;
            headers.append(name, value);
        }

        Ok(Self {
            status,
            headers,
            body: Bytes::copy_from_slice(body),
            url,
            redirected: false,
            mocked: true,
            response_time_ms: 0,
        })
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if status is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// Get status code as u16
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get body as text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| Error::Other(e.to_string()))
    }

    /// Get body as text, lossy conversion
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Redirect target, resolved against the response URL
    pub fn location(&self) -> Option<Url> {
        self.header("location").and_then(|l| self.url.join(l).ok())
    }

    /// Get body length
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/app").unwrap()
    }

    #[test]
    fn test_response_status() {
        let resp = Response::new(StatusCode::OK, HeaderMap::new(), Bytes::new(), url(), false, 100);
        assert!(resp.is_success());
        assert!(!resp.mocked);
        assert_eq!(resp.status_code(), 200);
    }

    #[test]
    fn test_from_raw() {
        let raw = b"HTTP/1.1 418 I'm a teapot\r\nContent-Type: text/plain\r\nX-A: 1\r\nX-A: 2\r\n\r\nshort and stout";
        let resp = Response::from_raw(raw, url()).unwrap();

        assert_eq!(resp.status_code(), 418);
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(resp.headers.get_all("x-a").iter().count(), 2);
        assert_eq!(resp.text().unwrap(), "short and stout");
        assert!(resp.mocked);
    }

    #[test]
    fn test_from_raw_without_body() {
        let resp = Response::from_raw(b"HTTP/1.0 204 No Content\n", url()).unwrap();
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert_eq!(resp.body_len(), 0);
    }

    #[test]
    fn test_from_raw_rejects_garbage() {
        assert!(matches!(
            Response::from_raw(b"hello world", url()),
            Err(Error::MockResponse(_))
        ));
        assert!(Response::from_raw(b"HTTP/1.1 abc OK\r\n\r\n", url()).is_err());
        assert!(Response::from_raw(b"HTTP/1.1 200 OK\r\nnocolon\r\n\r\n", url()).is_err());
    }

    #[test]
    fn test_location_resolves_relative() {
        let raw = b"HTTP/1.1 302 Found\r\nLocation: /login?next=%2F\r\n\r\n";
        let resp = Response::from_raw(raw, url()).unwrap();
        assert_eq!(
            resp.location().unwrap().as_str(),
            "https://example.com/login?next=%2F"
        );
    }
}
