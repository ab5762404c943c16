//! REST transport.
//!
//! A [`RestExecutor`] turns an [`HttpRequest`] into an [`Exchange`]: the raw
//! triple of body, response metadata, and transport error. Interpreting the
//! exchange (status codes, error envelopes, JSON) is the caller's job.
//!
//! [`ResilientRestExecutor`] is the production implementation on top of
//! `reqwest`. It retries every exchange that is not *complete* (see
//! [`Exchange::is_complete`]) according to the request's [`RetryPolicy`].

use crate::retry::{RetryPolicy, retry_with_policy};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A single HTTP request description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute request URL
    pub url: Url,
    /// Header name/value pairs, sent in order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Bytes>,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl HttpRequest {
    /// Create a request without headers or body and the default timeout
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First value of the header named `name`, compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// Response with a status and no headers
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }
}

impl From<&reqwest::Response> for HttpResponse {
    fn from(response: &reqwest::Response) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect(),
        }
    }
}

/// Failure below HTTP: connection refused, DNS, TLS, timeouts, broken bodies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable description
    pub message: String,
}

impl TransportError {
    /// Create a transport error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What came back from one request
///
/// Any combination of the three parts can be present; a *complete* exchange
/// has a body and a response and no error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    /// Raw response body
    pub body: Option<Bytes>,
    /// Response metadata
    pub response: Option<HttpResponse>,
    /// Transport-level failure
    pub error: Option<TransportError>,
}

impl Exchange {
    /// An exchange that received a response and a body
    #[must_use]
    pub fn completed(response: HttpResponse, body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            response: Some(response),
            error: None,
        }
    }

    /// An exchange that failed in transport
    #[must_use]
    pub const fn failed(error: TransportError) -> Self {
        Self {
            body: None,
            response: None,
            error: Some(error),
        }
    }

    /// Body and response present, no error
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.body.is_some() && self.response.is_some() && self.error.is_none()
    }
}

/// Executes REST requests
///
/// Implementations never fail: every outcome is described by the returned
/// [`Exchange`]. Retrying is the executor's concern, driven by the policy.
#[async_trait]
pub trait RestExecutor: Send + Sync {
    /// Execute `request`, retrying incomplete exchanges per `retry_policy`
    async fn execute(&self, request: HttpRequest, retry_policy: Option<RetryPolicy>) -> Exchange;
}

/// `reqwest`-backed executor with exponential backoff
#[derive(Debug, Clone, Default)]
pub struct ResilientRestExecutor {
    client: reqwest::Client,
}

impl ResilientRestExecutor {
    /// Executor with a default `reqwest` client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor using a preconfigured client
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn perform(&self, request: &HttpRequest) -> Exchange {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "Request failed in transport");
                metrics::counter!("paykit.http.transport_errors").increment(1);
                return Exchange::failed(TransportError::new(error.to_string()));
            },
        };

        let metadata = HttpResponse::from(&response);
        tracing::debug!(status = metadata.status, "Received response");

        match response.bytes().await {
            Ok(body) => Exchange::completed(metadata, body),
            Err(error) => {
                tracing::warn!(%error, "Failed to read response body");
                Exchange {
                    body: None,
                    response: Some(metadata),
                    error: Some(TransportError::new(error.to_string())),
                }
            },
        }
    }
}

#[async_trait]
impl RestExecutor for ResilientRestExecutor {
    async fn execute(&self, request: HttpRequest, retry_policy: Option<RetryPolicy>) -> Exchange {
        metrics::counter!("paykit.http.requests").increment(1);
        retry_with_policy(
            retry_policy,
            || self.perform(&request),
            |exchange: &Exchange| !exchange.is_complete(),
        )
        .await
    }
}
