//! Auth server API and session lifecycle flows.
//!
//! Every call goes through the auth backend's authenticated transport.
//! Flows that write the session (`bootstrap`, `login`, `logout`,
//! `refresh_user`, `refresh_token`) hold the session's lifecycle lock for
//! their whole duration. A refresh whose session was expired by a 401
//! elsewhere while it was in flight discards its result.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::{AdminClient, Backend};
use super::transport::TransportError;
use crate::session::{LoginRequired, SessionHandle, User};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Partial profile update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    client: AdminClient,
    session: SessionHandle,
}

impl AuthService {
    #[must_use]
    pub fn new(client: AdminClient, session: SessionHandle) -> Self {
        Self { client, session }
    }

    /// Restore a persisted session at startup.
    ///
    /// A valid persisted token is kept only if the auth server still
    /// recognises it; otherwise the session is cleared. Never fails.
    /// Returns whether a signed-in session resulted.
    pub async fn bootstrap(&self) -> bool {
        let _lifecycle = self.session.lock_lifecycle().await;
        if !self.session.restore() {
            return false;
        }

        match self.current_user().await {
            Ok(user) => {
                let Some(token) = self.session.snapshot().token else {
                    // Cleared while the user record was in flight.
                    return false;
                };
                self.session.login(user, token);
                true
            }
            Err(e) => {
                warn!(error = %e, "session restore failed");
                self.session.expire(e.to_string());
                false
            }
        }
    }

    /// `POST /api/auth/login` and establish the session.
    ///
    /// # Errors
    ///
    /// Returns the transport error; its text is also stored as the session
    /// error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, TransportError> {
        let _lifecycle = self.session.lock_lifecycle().await;
        self.session.begin_loading();

        let body = serde_json::json!({ "email": email, "password": password });
        let result = self
            .client
            .post::<AuthResponse>(Backend::Auth, "/api/auth/login", Some(body))
            .await
            .and_then(super::api::ApiResponse::into_data);

        match result {
            Ok(AuthResponse { user, token }) => {
                self.session.login(user.clone(), token);
                Ok(user)
            }
            Err(e) => {
                self.session.fail_loading(e.to_string());
                Err(e)
            }
        }
    }

    /// `POST /api/auth/logout`, then clear the session regardless of the
    /// server's answer.
    pub async fn logout(&self) -> LoginRequired {
        let _lifecycle = self.session.lock_lifecycle().await;
        if let Err(e) = self
            .client
            .post::<serde_json::Value>(Backend::Auth, "/api/auth/logout", None)
            .await
        {
            warn!(error = %e, "server-side logout failed; clearing local session anyway");
        }
        self.session.logout()
    }

    /// `GET /api/auth/me`.
    ///
    /// # Errors
    ///
    /// Returns the transport or envelope error.
    pub async fn current_user(&self) -> Result<User, TransportError> {
        self.client
            .get::<User>(Backend::Auth, "/api/auth/me", &[])
            .await?
            .into_data()
    }

    /// Re-fetch the current user and replace it in the session.
    ///
    /// # Errors
    ///
    /// Returns the transport or envelope error; the session is left as is
    /// unless the transport expired it. Returns
    /// [`TransportError::SessionCleared`] if the session lost its token while
    /// the request was in flight.
    pub async fn refresh_user(&self) -> Result<User, TransportError> {
        let _lifecycle = self.session.lock_lifecycle().await;
        let user = self.current_user().await?;
        self.ensure_signed_in()?;
        self.session.refresh_user(user.clone());
        Ok(user)
    }

    /// `POST /api/auth/refresh` and store the new token.
    ///
    /// # Errors
    ///
    /// Returns the transport or envelope error, or
    /// [`TransportError::SessionCleared`] if the session lost its token while
    /// the request was in flight.
    pub async fn refresh_token(&self) -> Result<String, TransportError> {
        let _lifecycle = self.session.lock_lifecycle().await;
        let TokenResponse { token } = self
            .client
            .post::<TokenResponse>(Backend::Auth, "/api/auth/refresh", None)
            .await?
            .into_data()?;
        self.ensure_signed_in()?;
        self.session.replace_token(token.clone());
        info!("token refreshed");
        Ok(token)
    }

    /// `PATCH /api/auth/change-password`.
    ///
    /// # Errors
    ///
    /// Returns the transport or envelope error.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "currentPassword": current_password, "newPassword": new_password });
        self.client
            .patch::<serde_json::Value>(Backend::Auth, "/api/auth/change-password", Some(body))
            .await?
            .into_result()?;
        Ok(())
    }

    /// `PATCH /api/auth/profile`.
    ///
    /// # Errors
    ///
    /// Returns the transport or envelope error, or a decode error if the
    /// update cannot be serialized.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), TransportError> {
        let body = serde_json::to_value(update).map_err(|e| TransportError::Decode(e.to_string()))?;
        self.client
            .patch::<serde_json::Value>(Backend::Auth, "/api/auth/profile", Some(body))
            .await?
            .into_result()?;
        Ok(())
    }

    fn ensure_signed_in(&self) -> Result<(), TransportError> {
        if self.session.snapshot().token.is_none() {
            warn!("session cleared during refresh; discarding result");
            return Err(TransportError::SessionCleared);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
