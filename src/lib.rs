//! Admin access control for the myPick back office.
//!
//! DESIGN
//! ======
//! One injectable [`session::SessionHandle`] is shared by the access guard
//! and by an authenticated transport per backend. The guard decides what may
//! be shown and where to redirect; the transport attaches the bearer token
//! and turns a 401 into a cleared session plus a login redirect. Redirects go
//! through a [`navigate::Navigator`] so the library runs headless.

pub mod config;
pub mod guard;
pub mod navigate;
pub mod net;
pub mod session;
pub mod state;
