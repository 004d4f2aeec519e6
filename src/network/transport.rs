//! HTTP transport seam.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Vec<u8>,
    /// `Content-Type` of the body
    pub content_type: Option<String>,
    /// `Accept` header
    pub accept: Option<String>,
    /// Bound on the whole exchange
    pub timeout: Duration,
}

impl HttpRequest {
    /// GET `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: Vec::new(),
            content_type: None,
            accept: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// POST `body` to `url`.
    pub fn post(url: impl Into<String>, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body,
            content_type: Some(content_type.into()),
            accept: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the `Accept` header.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response status, content type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 200 with `body`.
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends HTTP requests.
///
/// Implementations report transport failures (DNS, connect, timeout) as
/// [`Error::Network`]; any HTTP status is a successful exchange.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with the crate user agent.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pades-timestamp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::unknown("failed to build HTTP client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).body(request.body.clone()),
        }
        .timeout(request.timeout);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }

        let response = builder.send().await.map_err(|e| network_error(&request.url, e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| network_error(&request.url, e))?;

        Ok(HttpResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

fn network_error(url: &str, e: reqwest::Error) -> Error {
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    };
    Error::Network {
        url: url.to_string(),
        message,
        cause: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = HttpRequest::post("http://tsa.example", vec![1, 2], "application/timestamp-query")
            .with_accept("application/timestamp-reply")
            .with_timeout(Duration::from_secs(30));
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.content_type.as_deref(), Some("application/timestamp-query"));
        assert_eq!(req.timeout, Duration::from_secs(30));

        let get = HttpRequest::get("http://crl.example/ca.crl");
        assert_eq!(get.method, HttpMethod::Get);
        assert!(get.body.is_empty());
    }

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::ok(vec![]).is_success());
        let mut resp = HttpResponse::ok(vec![]);
        resp.status = 503;
        assert!(!resp.is_success());
    }
}
