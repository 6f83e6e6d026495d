//! Session state: the authoritative record of the current principal.
//!
//! DESIGN
//! ======
//! `Session` is plain data; `SessionHandle` owns one behind a `watch`
//! channel so the access guard can observe every change. The handle is
//! injected into the guard and the transports instead of living in a global.
//!
//! CONCURRENCY
//! ===========
//! Each mutation is a single `send_modify`, so observers never see a
//! half-applied login or logout. Multi-step flows that await the network
//! (bootstrap, login, logout) additionally hold the lifecycle lock, a FIFO
//! `tokio::sync::Mutex`, so a logout issued while a login is in flight runs
//! after it instead of being overwritten by it.

pub mod store;
pub mod token;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use store::TokenStore;

// =============================================================================
// USER
// =============================================================================

/// A named role assigned to a user. A null or missing name decodes as
/// empty, which never matches an admin role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

/// The authenticated principal as reported by the auth server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// `None` when the server omitted the field entirely, which is distinct
    /// from an explicit empty list.
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
    #[serde(default)]
    pub is_active: bool,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Session {
    fn clear_auth(&mut self) {
        self.is_authenticated = false;
        self.user = None;
        self.token = None;
        self.loading = false;
    }
}

/// Returned by [`SessionHandle::logout`]: the caller must send the user to
/// the external login surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "logout requires navigating to the login surface"]
pub struct LoginRequired;

/// Holds the lifecycle lock for the duration of a multi-step session flow.
pub type LifecycleGuard<'a> = MutexGuard<'a, ()>;

// =============================================================================
// HANDLE
// =============================================================================

/// Shared, cloneable owner of one [`Session`] and its durable token.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: watch::Sender<Session>,
    store: Arc<dyn TokenStore>,
    lifecycle: Mutex<()>,
    /// Set once the in-memory session owns the token: after any restore,
    /// login, token replacement, logout or expiry. From then on the store is
    /// never consulted for the bearer, so a failed removal cannot revive a
    /// cleared token.
    hydrated: AtomicBool,
}

impl SessionHandle {
    /// Empty session backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: watch::Sender::new(Session::default()),
                store,
                lifecycle: Mutex::new(()),
                hydrated: AtomicBool::new(false),
            }),
        }
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Wait for exclusive use of the session lifecycle. Waiters are served in
    /// arrival order.
    pub async fn lock_lifecycle(&self) -> LifecycleGuard<'_> {
        self.inner.lifecycle.lock().await
    }

    /// Current bearer token, falling back to durable storage only while the
    /// in-memory session has never been hydrated or cleared.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        if let Some(token) = self.inner.state.borrow().token.clone() {
            return Some(token);
        }
        if self.inner.hydrated.load(Ordering::Acquire) {
            return None;
        }
        match self.inner.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token store read failed");
                None
            }
        }
    }

    /// Load and validate the persisted token.
    ///
    /// On success the token is installed and `loading` stays set until the
    /// owning user record arrives via [`Self::login`] or the flow is aborted
    /// via [`Self::expire`]. A missing, expired or malformed token leaves the
    /// session unauthenticated. Returns whether a token was restored.
    pub fn restore(&self) -> bool {
        self.mark_hydrated();
        let stored = match self.inner.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "token store unreadable; treating as signed out");
                None
            }
        };

        let Some(token) = stored else {
            debug!("no persisted token");
            return false;
        };

        if !token::is_token_valid(&token) {
            info!("persisted token expired or malformed; discarding");
            self.remove_persisted();
            return false;
        }

        self.inner.state.send_modify(|s| {
            s.token = Some(token);
            s.loading = true;
            s.is_authenticated = s.user.is_some();
        });
        true
    }

    /// Mark an authentication attempt as in flight.
    pub fn begin_loading(&self) {
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// Install an authenticated principal and persist its token.
    pub fn login(&self, user: User, token: String) {
        self.mark_hydrated();
        if let Err(e) = self.inner.store.save(&token) {
            warn!(error = %e, "failed to persist token; session will not survive restart");
        }
        info!(user_id = %user.id, "session established");
        self.inner.state.send_modify(|s| {
            s.user = Some(user);
            s.token = Some(token);
            s.is_authenticated = true;
            s.loading = false;
            s.error = None;
        });
    }

    /// Replace the user record wholesale, keeping the current token.
    pub fn refresh_user(&self, user: User) {
        self.inner.state.send_modify(|s| {
            s.user = Some(user);
            s.is_authenticated = s.token.is_some();
            s.loading = false;
        });
    }

    /// Store a refreshed token in memory and durably.
    pub fn replace_token(&self, token: String) {
        self.mark_hydrated();
        if let Err(e) = self.inner.store.save(&token) {
            warn!(error = %e, "failed to persist refreshed token");
        }
        self.inner.state.send_modify(|s| {
            s.token = Some(token);
            s.is_authenticated = s.user.is_some();
        });
    }

    /// Clear the principal and the persisted token. Idempotent.
    pub fn logout(&self) -> LoginRequired {
        self.mark_hydrated();
        self.remove_persisted();
        self.inner.state.send_modify(|s| {
            s.clear_auth();
            s.error = None;
        });
        info!("session cleared");
        LoginRequired
    }

    /// Forced expiry: clear like [`Self::logout`] and record why.
    pub fn expire(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.mark_hydrated();
        self.remove_persisted();
        warn!(%reason, "session expired");
        self.inner.state.send_modify(|s| {
            s.clear_auth();
            s.error = Some(reason);
        });
    }

    /// End an in-flight attempt started by [`Self::begin_loading`] with a
    /// user-visible reason. Authentication fields are left untouched.
    pub fn fail_loading(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner.state.send_modify(|s| {
            s.loading = false;
            s.error = Some(message);
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner.state.send_modify(|s| s.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.inner.state.send_modify(|s| s.error = None);
    }

    fn mark_hydrated(&self) {
        self.inner.hydrated.store(true, Ordering::Release);
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.inner.store.remove() {
            warn!(error = %e, "failed to remove persisted token");
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.state.borrow();
        f.debug_struct("SessionHandle")
            .field("is_authenticated", &session.is_authenticated)
            .field("loading", &session.loading)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
