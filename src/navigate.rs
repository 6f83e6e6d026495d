//! Navigation seam. Stands in for the browser's `window.location`.

use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Owner of the current location and performer of full-page redirects.
pub trait Navigator: Send + Sync {
    /// Absolute URL of the page currently shown.
    fn current_url(&self) -> String;

    /// Replace the current page with `url`.
    fn navigate(&self, url: &str);
}

/// Navigator for terminals and tests: logs each redirect and keeps a record
/// instead of leaving the page. The current location never changes.
#[derive(Debug)]
pub struct HeadlessNavigator {
    current_url: String,
    visits: Mutex<Vec<String>>,
}

impl HeadlessNavigator {
    #[must_use]
    pub fn new(current_url: impl Into<String>) -> Self {
        Self { current_url: current_url.into(), visits: Mutex::new(Vec::new()) }
    }

    /// Every URL navigated to so far, oldest first.
    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn last_visit(&self) -> Option<String> {
        self.visits.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl Navigator for HeadlessNavigator {
    fn current_url(&self) -> String {
        self.current_url.clone()
    }

    fn navigate(&self, url: &str) {
        info!(%url, "navigate");
        self.visits.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_owned());
    }
}
