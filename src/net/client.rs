//! Admin client: one authenticated transport per backend.
//!
//! The auth server and the pick (content) server are symmetric: different
//! base URLs, identical token attachment and 401 handling.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::api::{ApiResponse, decode_envelope};
use super::transport::{ApiRequest, AuthenticatedTransport, HttpSend, ReqwestSender, TransportError};
use crate::config::AdminConfig;
use crate::navigate::Navigator;
use crate::session::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Auth,
    Pick,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => f.write_str("auth"),
            Self::Pick => f.write_str("pick"),
        }
    }
}

#[derive(Clone)]
pub struct AdminClient {
    auth: Arc<dyn HttpSend>,
    pick: Arc<dyn HttpSend>,
}

impl AdminClient {
    /// Client over two already-composed senders.
    #[must_use]
    pub fn new(auth: Arc<dyn HttpSend>, pick: Arc<dyn HttpSend>) -> Self {
        Self { auth, pick }
    }

    /// Build both backends from config, each wrapped in the authenticated
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client fails to build.
    pub fn from_config(
        config: &AdminConfig,
        session: &SessionHandle,
        navigator: &Arc<dyn Navigator>,
    ) -> Result<Self, TransportError> {
        let wrap = |base_url: &str| -> Result<Arc<dyn HttpSend>, TransportError> {
            let sender = ReqwestSender::new(base_url, config.timeouts)?;
            Ok(Arc::new(AuthenticatedTransport::new(
                sender,
                session.clone(),
                config.guard.clone(),
                navigator.clone(),
            )))
        };
        Ok(Self::new(wrap(&config.auth_server_url)?, wrap(&config.pick_server_url)?))
    }

    #[must_use]
    pub fn backend(&self, backend: Backend) -> &Arc<dyn HttpSend> {
        match backend {
            Backend::Auth => &self.auth,
            Backend::Pick => &self.pick,
        }
    }

    /// Send `request` to `backend` and decode the JSON envelope.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode failures unchanged.
    pub async fn request<T: DeserializeOwned>(
        &self,
        backend: Backend,
        request: ApiRequest,
    ) -> Result<ApiResponse<T>, TransportError> {
        let raw = self.backend(backend).send(request).await?;
        decode_envelope(raw)
    }

    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        backend: Backend,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, TransportError> {
        let request = query
            .iter()
            .fold(ApiRequest::get(path), |req, (k, v)| req.with_query(*k, *v));
        self.request(backend, request).await
    }

    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn post<T: DeserializeOwned>(
        &self,
        backend: Backend,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse<T>, TransportError> {
        self.request(backend, with_body(ApiRequest::post(path), body)).await
    }

    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn patch<T: DeserializeOwned>(
        &self,
        backend: Backend,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse<T>, TransportError> {
        self.request(backend, with_body(ApiRequest::patch(path), body)).await
    }

    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn delete<T: DeserializeOwned>(&self, backend: Backend, path: &str) -> Result<ApiResponse<T>, TransportError> {
        self.request(backend, ApiRequest::delete(path)).await
    }
}

fn with_body(request: ApiRequest, body: Option<Value>) -> ApiRequest {
    match body {
        Some(body) => request.with_json(body),
        None => request,
    }
}
