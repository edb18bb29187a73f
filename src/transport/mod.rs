//! HTTP transport abstraction used by the session initiator and chunk PUTs.
//!
//! Kept as a trait object (rather than a concrete `reqwest::Client` field)
//! so tests can substitute a mock server-in-a-box without spinning up a real
//! listener. Credential acquisition is out of scope here: whatever
//! `HttpTransport` implementation the caller supplies is assumed to already
//! carry a valid `Authorization` header.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Client, Method};
use std::time::Duration;
use url::Url;

use crate::errors::UploadError;

/// HTTP transport abstraction for testability.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends an HTTP request and receives a response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, UploadError>;
}

/// HTTP request representation.
#[derive(Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Builds a request with an empty body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// POST method: issues a new resumable-upload session, and also every
    /// chunk transfer against an open session URI (the wire protocol PUTs
    /// bytes over a POST request).
    Post,
    /// PATCH method: issues a resumable-upload session against an existing file.
    Patch,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

/// HTTP response representation.
#[derive(Debug)]
pub struct HttpResponse {
    /// Response status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

/// `reqwest`-based HTTP transport implementation.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a new transport wrapping an existing client (so callers can
    /// attach whatever auth/connection-pool middleware they need before
    /// handing it to this crate).
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new transport with a freshly built default client.
    pub fn default_client() -> Result<Self, UploadError> {
        let client = Client::builder()
            .build()
            .map_err(|e| UploadError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, UploadError> {
        let method: Method = request.method.into();
        let mut req = self.client.request(method, request.url.clone());

        for (key, value) in request.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        if !request.body.is_empty() {
            req = req.body(request.body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_method_conversion() {
        assert_eq!(Method::from(HttpMethod::Post), Method::POST);
        assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
    }

    #[test]
    fn new_request_has_empty_body() {
        let req = HttpRequest::new(
            HttpMethod::Post,
            Url::parse("https://example.com/upload").unwrap(),
        );
        assert!(req.body.is_empty());
        assert!(req.timeout.is_none());
    }
}
