//! Authenticated HTTP transport.
//!
//! ARCHITECTURE
//! ============
//! `HttpSend` is the base request function. `ReqwestSender` implements it
//! against one backend base URL. `AuthenticatedTransport` decorates any
//! sender with the two cross-cutting rules every admin call obeys:
//!
//! - attach `Authorization: Bearer <token>` whenever a token is known
//! - on HTTP 401, clear the persisted token and the session, navigate to the
//!   login surface, and still fail the call with the original error
//!
//! Nothing here retries, caches or rate-limits.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{GuardConfig, HttpTimeouts};
use crate::navigate::Navigator;
use crate::session::SessionHandle;

pub const UNAUTHORIZED: u16 = 401;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The server rejected or did not receive a credential.
    #[error("not authorized (status 401){}", display_reason(.reason.as_deref()))]
    Unauthorized { reason: Option<String>, body: String },

    /// Any other non-success status.
    #[error("request failed with status {status}{}", display_reason(.reason.as_deref()))]
    Status { status: u16, reason: Option<String>, body: String },

    /// The envelope reported `success: false`.
    #[error("{0}")]
    Api(String),

    /// The body could not be decoded into the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// A successful envelope carried no `data`.
    #[error("response did not include data")]
    MissingData,

    /// The session was cleared while the request was in flight, so its
    /// result was not applied.
    #[error("session was cleared while the request was in flight")]
    SessionCleared,
}

impl TransportError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

fn display_reason(reason: Option<&str>) -> String {
    reason.map(|r| format!(": {r}")).unwrap_or_default()
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the backend base URL, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, bearer: None }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A response of any status. Status interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Keep 2xx responses; map everything else to a typed error whose reason
    /// is lifted from the envelope's `error`/`message` when present.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unauthorized`] for 401 and
    /// [`TransportError::Status`] for other non-2xx statuses.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        let reason = envelope_reason(&self.body);
        if self.status == UNAUTHORIZED {
            return Err(TransportError::Unauthorized { reason, body: self.body });
        }
        Err(TransportError::Status { status: self.status, reason, body: self.body })
    }
}

fn envelope_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_owned)
}

// =============================================================================
// BASE SENDER
// =============================================================================

/// The base request function every backend call goes through.
#[async_trait]
pub trait HttpSend: Send + Sync {
    /// Dispatch `request`. Non-2xx statuses are returned as responses, not
    /// errors, so decorators can inspect them.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed sender bound to one backend base URL.
pub struct ReqwestSender {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestSender {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| TransportError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, %url, "dispatch");
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network { url: url.clone(), message: e.to_string() })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network { url: url.clone(), message: e.to_string() })?;
        Ok(RawResponse { status, body })
    }
}

// =============================================================================
// AUTHENTICATED DECORATOR
// =============================================================================

/// Wraps a sender with bearer attachment and 401 session expiry.
pub struct AuthenticatedTransport<S> {
    inner: S,
    session: SessionHandle,
    guard: GuardConfig,
    navigator: Arc<dyn Navigator>,
}

impl<S: HttpSend> AuthenticatedTransport<S> {
    #[must_use]
    pub fn new(inner: S, session: SessionHandle, guard: GuardConfig, navigator: Arc<dyn Navigator>) -> Self {
        Self { inner, session, guard, navigator }
    }

    fn on_unauthorized(&self, request: &ApiRequest) {
        warn!(method = %request.method, path = %request.path, "credential rejected; clearing session");
        self.session.expire("Session expired. Please sign in again.");
        let login = self.guard.login_url(&self.navigator.current_url());
        self.navigator.navigate(&login);
    }
}

#[async_trait]
impl<S: HttpSend> HttpSend for AuthenticatedTransport<S> {
    async fn send(&self, mut request: ApiRequest) -> Result<RawResponse, TransportError> {
        if request.bearer.is_none() {
            request.bearer = self.session.token();
        }

        match self.inner.send(request.clone()).await {
            Ok(response) if response.status == UNAUTHORIZED => {
                self.on_unauthorized(&request);
                let reason = envelope_reason(&response.body);
                Err(TransportError::Unauthorized { reason, body: response.body })
            }
            Err(e) if e.is_unauthorized() => {
                self.on_unauthorized(&request);
                Err(e)
            }
            other => other,
        }
    }
}

#[async_trait]
impl<T: HttpSend + ?Sized> HttpSend for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
