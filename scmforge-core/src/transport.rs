//! Single authenticated HTTP call.
//!
//! [`Transport::call`] makes exactly one attempt. Retry policy belongs to the
//! caller. A request that never completed (connect failure, timeout, body read
//! error) surfaces as [`TransportError`], distinct from any status code the
//! server returned.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::store::Secret;

/// Per-request timeout used unless the caller overrides it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP methods used against the configuration API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Error for requests that never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("{method} {url} timed out after {timeout:?}")]
    Timeout {
        method: Method,
        url: String,
        timeout: Duration,
    },

    /// The connection could not be established.
    #[error("{method} {url} failed to connect: {message}")]
    Connect {
        method: Method,
        url: String,
        message: String,
    },

    /// Any other failure while sending the request or reading the response.
    #[error("{method} {url} failed: {message}")]
    Request {
        method: Method,
        url: String,
        message: String,
    },
}

/// Response body, parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The body was valid JSON.
    Json(Value),
    /// The body was empty or not JSON.
    Text(String),
}

impl ResponseBody {
    fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// The JSON value, if the body parsed.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

impl std::fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Json(value) => write!(f, "{}", value),
            ResponseBody::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Normalized result of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Create a response from a status and an already parsed body.
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self { status, body }
    }

    /// Create a response with a JSON body.
    pub fn json(status: u16, value: Value) -> Self {
        Self::new(status, ResponseBody::Json(value))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP request against the configuration API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<Secret>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl ApiRequest {
    /// Create a request with the default timeout and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            bearer: None,
            body: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Attach an `Authorization: Bearer` header.
    pub fn bearer(mut self, token: Secret) -> Self {
        self.bearer = Some(token);
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Performs a single HTTP call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn classify_error(request: &ApiRequest, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                method: request.method,
                url: request.url.clone(),
                timeout: request.timeout,
            }
        } else if err.is_connect() {
            TransportError::Connect {
                method: request.method,
                url: request.url.clone(),
                message: err.to_string(),
            }
        } else {
            TransportError::Request {
                method: request.method,
                url: request.url.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout)
        .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify_error(&request, e))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::classify_error(&request, e))?;

        tracing::trace!("{} {} -> {}", request.method, request.url, status);

        Ok(ApiResponse::new(status, ResponseBody::from_bytes(&bytes)))
    }
}
