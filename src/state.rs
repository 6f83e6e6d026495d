//! Shared application state.
//!
//! DESIGN
//! ======
//! `AdminState` wires one session, one navigator and the two backend
//! transports together so the guard and every service observe the same
//! principal. All fields are cheap to clone.

use std::sync::Arc;

use crate::config::{AdminConfig, GuardConfig};
use crate::guard::AccessGuard;
use crate::navigate::Navigator;
use crate::net::auth::AuthService;
use crate::net::client::AdminClient;
use crate::net::transport::TransportError;
use crate::session::SessionHandle;
use crate::session::store::TokenStore;

#[derive(Clone)]
pub struct AdminState {
    pub session: SessionHandle,
    pub navigator: Arc<dyn Navigator>,
    pub client: AdminClient,
    pub auth: AuthService,
    pub guard_config: GuardConfig,
}

impl AdminState {
    /// Assemble state over an existing client.
    #[must_use]
    pub fn new(
        session: SessionHandle,
        navigator: Arc<dyn Navigator>,
        client: AdminClient,
        guard_config: GuardConfig,
    ) -> Self {
        let auth = AuthService::new(client.clone(), session.clone());
        Self { session, navigator, client, auth, guard_config }
    }

    /// Assemble state with `reqwest` transports for both backends.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn from_config(
        config: &AdminConfig,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, TransportError> {
        let session = SessionHandle::new(store);
        let client = AdminClient::from_config(config, &session, &navigator)?;
        Ok(Self::new(session, navigator, client, config.guard.clone()))
    }

    /// A guard observing this state's session.
    #[must_use]
    pub fn guard(&self) -> AccessGuard {
        AccessGuard::new(&self.session, self.guard_config.clone(), self.navigator.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
