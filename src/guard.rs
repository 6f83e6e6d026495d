//! Access guard: the single authorization checkpoint for the admin UI.
//!
//! DESIGN
//! ======
//! `evaluate` is a pure function from a session snapshot to a decision:
//! which state the guard is in, what to show, and an optional redirect
//! command. `AccessGuard` observes the session, re-evaluates on every change
//! and executes each distinct redirect once, so repeated evaluations of the
//! same settled state never navigate twice.
//!
//! Precedence: loading, then unauthenticated, then missing admin role, then
//! authorized.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::navigate::Navigator;
use crate::session::{Session, SessionHandle, User};

/// Role names granting admin access, compared case-insensitively.
pub const ADMIN_ROLE_NAMES: [&str; 4] = ["super-admin", "system-admin", "portal-admin", "admin"];

pub const LOADER_MESSAGE: &str = "Verifying administrator access...";

// =============================================================================
// DECISION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Unauthenticated,
    Unauthorized,
    Authorized,
}

/// What the wrapped UI tree should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    Loader { message: &'static str },
    Protected,
}

/// Side effect requested by a decision, executed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardCommand {
    Navigate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecision {
    pub state: GuardState,
    pub view: GuardView,
    pub command: Option<GuardCommand>,
}

impl GuardDecision {
    fn loader(state: GuardState, command: Option<GuardCommand>) -> Self {
        Self { state, view: GuardView::Loader { message: LOADER_MESSAGE }, command }
    }

    fn authorized() -> Self {
        Self { state: GuardState::Authorized, view: GuardView::Protected, command: None }
    }

    #[must_use]
    pub fn renders_protected(&self) -> bool {
        self.view == GuardView::Protected
    }
}

/// Whether `user` may use the admin surface.
///
/// A user whose `roles` field is absent altogether only passes when the
/// development bypass is enabled and the user has an identifier.
#[must_use]
pub fn has_admin_role(user: &User, config: &GuardConfig) -> bool {
    match &user.roles {
        Some(roles) => roles.iter().any(|role| {
            let name = role.name.to_lowercase();
            ADMIN_ROLE_NAMES.contains(&name.as_str())
        }),
        None => config.dev_role_bypass() && !user.id.is_empty(),
    }
}

/// Decide what the guard shows for `session` while at `current_url`.
#[must_use]
pub fn evaluate(session: &Session, config: &GuardConfig, current_url: &str) -> GuardDecision {
    if session.loading {
        return GuardDecision::loader(GuardState::Checking, None);
    }

    if !session.is_authenticated {
        let login = config.login_url(current_url);
        return GuardDecision::loader(GuardState::Unauthenticated, Some(GuardCommand::Navigate(login)));
    }

    let Some(user) = &session.user else {
        // Authenticated without a user record; wait for the next refresh.
        return GuardDecision::loader(GuardState::Checking, None);
    };

    if !has_admin_role(user, config) {
        let portal = config.portal_url.clone();
        return GuardDecision::loader(GuardState::Unauthorized, Some(GuardCommand::Navigate(portal)));
    }

    GuardDecision::authorized()
}

// =============================================================================
// RUNNER
// =============================================================================

/// Observes a session and applies guard decisions through a navigator.
pub struct AccessGuard {
    rx: watch::Receiver<Session>,
    config: GuardConfig,
    navigator: Arc<dyn Navigator>,
    last_redirect: Option<String>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(session: &SessionHandle, config: GuardConfig, navigator: Arc<dyn Navigator>) -> Self {
        Self { rx: session.subscribe(), config, navigator, last_redirect: None }
    }

    /// Evaluate the latest session and execute its redirect if it is new.
    pub fn check(&mut self) -> GuardDecision {
        let session = self.rx.borrow_and_update().clone();
        let decision = evaluate(&session, &self.config, &self.navigator.current_url());
        debug!(state = ?decision.state, "guard evaluated");

        match &decision.command {
            Some(GuardCommand::Navigate(url)) => {
                if self.last_redirect.as_deref() != Some(url.as_str()) {
                    if decision.state == GuardState::Unauthorized {
                        warn!("signed-in user lacks an admin role; sending to portal");
                    }
                    self.navigator.navigate(url);
                    self.last_redirect = Some(url.clone());
                }
            }
            None => self.last_redirect = None,
        }

        decision
    }

    /// Wait for the next session change, then [`Self::check`]. Returns
    /// `None` once the session has been dropped.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        Some(self.check())
    }

    /// Evaluate now and after every session change, reporting each decision.
    pub async fn run(mut self, mut on_decision: impl FnMut(&GuardDecision) + Send) {
        on_decision(&self.check());
        while let Some(decision) = self.changed().await {
            on_decision(&decision);
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
