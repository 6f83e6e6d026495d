//! Network layer for the auth and pick backends.
//!
//! DESIGN
//! ======
//! `transport` owns the request seam and the authenticated decorator, `api`
//! the JSON envelope, `client` the per-backend pair, and `auth` the typed
//! auth-server calls that drive the session lifecycle.

pub mod api;
pub mod auth;
pub mod client;
pub mod transport;
