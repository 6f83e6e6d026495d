//! JSON envelope shared by both backends.
//!
//! Every body looks like `{ success, data, message?, error? }`. `data` may be
//! missing or null for commands that return nothing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::transport::{RawResponse, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Human-readable reason carried by the envelope, preferring `error`.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }

    /// Turn an unsuccessful envelope into an error, keeping optional data.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Api`] when `success` is false.
    pub fn into_result(self) -> Result<Option<T>, TransportError> {
        if !self.success {
            let reason = self.reason().unwrap_or("request was not successful").to_owned();
            return Err(TransportError::Api(reason));
        }
        Ok(self.data)
    }

    /// Unwrap a successful envelope's `data`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Api`] for an unsuccessful envelope and
    /// [`TransportError::MissingData`] when `data` is absent.
    pub fn into_data(self) -> Result<T, TransportError> {
        self.into_result()?.ok_or(TransportError::MissingData)
    }
}

/// Decode a successful raw response into an envelope.
///
/// # Errors
///
/// Returns a status error for non-2xx responses and a decode error for
/// bodies that are not a valid envelope.
pub fn decode_envelope<T: DeserializeOwned>(raw: RawResponse) -> Result<ApiResponse<T>, TransportError> {
    let raw = raw.error_for_status()?;
    serde_json::from_str(&raw.body).map_err(|e| TransportError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
