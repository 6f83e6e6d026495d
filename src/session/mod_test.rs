use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::store::{MemoryTokenStore, TokenStore};
use super::*;

fn token_expiring_at(exp: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("aGVhZGVy.{payload}.c2ln")
}

fn live_token() -> String {
    token_expiring_at(4_102_444_800)
}

fn admin_user() -> User {
    User {
        id: "u-1".into(),
        email: "admin@example.com".into(),
        name: "Admin".into(),
        roles: Some(vec![Role { id: "r-1".into(), name: "admin".into() }]),
        is_active: true,
    }
}

fn handle_with(store: MemoryTokenStore) -> (Arc<MemoryTokenStore>, SessionHandle) {
    let store = Arc::new(store);
    let handle = SessionHandle::new(store.clone());
    (store, handle)
}

// =============================================================================
// User serde
// =============================================================================

#[test]
fn user_deserializes_camel_case() {
    let user: User = serde_json::from_value(serde_json::json!({
        "id": "u-1",
        "email": "a@b.c",
        "name": "A",
        "roles": [{ "id": "r", "name": "Admin" }],
        "isActive": true
    }))
    .unwrap();
    assert!(user.is_active);
    assert_eq!(user.roles.unwrap()[0].name, "Admin");
}

#[test]
fn user_absent_roles_is_none() {
    let user: User = serde_json::from_value(serde_json::json!({ "id": "u-1" })).unwrap();
    assert_eq!(user.roles, None);
}

#[test]
fn user_null_strings_decode_as_empty() {
    let user: User = serde_json::from_value(serde_json::json!({
        "id": "u-1",
        "email": null,
        "name": null,
        "roles": [{ "id": null, "name": null }, { "id": "r-2", "name": "viewer" }]
    }))
    .unwrap();
    assert_eq!(user.email, "");
    assert_eq!(user.name, "");
    let roles = user.roles.unwrap();
    assert_eq!(roles[0], Role { id: String::new(), name: String::new() });
    assert_eq!(roles[1].name, "viewer");
}

#[test]
fn user_empty_roles_is_some_empty() {
    let user: User = serde_json::from_value(serde_json::json!({ "id": "u-1", "roles": [] })).unwrap();
    assert_eq!(user.roles, Some(vec![]));
}

// =============================================================================
// Initial state
// =============================================================================

#[test]
fn new_session_is_empty() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    assert_eq!(handle.snapshot(), Session::default());
    assert!(!handle.snapshot().is_authenticated);
}

// =============================================================================
// login / logout
// =============================================================================

#[test]
fn login_sets_all_fields_and_persists() {
    let (store, handle) = handle_with(MemoryTokenStore::new());
    handle.set_error("stale");

    handle.login(admin_user(), "tok".into());

    let s = handle.snapshot();
    assert!(s.is_authenticated);
    assert_eq!(s.user, Some(admin_user()));
    assert_eq!(s.token.as_deref(), Some("tok"));
    assert!(!s.loading);
    assert_eq!(s.error, None);
    assert_eq!(store.load().unwrap().as_deref(), Some("tok"));
}

#[test]
fn logout_clears_everything() {
    let (store, handle) = handle_with(MemoryTokenStore::new());
    handle.login(admin_user(), "tok".into());

    let signal = handle.logout();

    assert_eq!(signal, LoginRequired);
    assert_eq!(handle.snapshot(), Session::default());
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn logout_twice_matches_logout_once() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    handle.login(admin_user(), "tok".into());

    let _ = handle.logout();
    let once = handle.snapshot();
    let _ = handle.logout();
    let twice = handle.snapshot();

    assert_eq!(once, twice);
    assert_eq!(twice, Session::default());
}

#[test]
fn logout_on_empty_session_is_harmless() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    let _ = handle.logout();
    assert_eq!(handle.snapshot(), Session::default());
}

// =============================================================================
// restore
// =============================================================================

#[test]
fn restore_without_token_stays_signed_out() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    assert!(!handle.restore());
    assert_eq!(handle.snapshot(), Session::default());
}

#[test]
fn restore_valid_token_marks_loading() {
    let token = live_token();
    let (_, handle) = handle_with(MemoryTokenStore::with_token(token.clone()));

    assert!(handle.restore());

    let s = handle.snapshot();
    assert_eq!(s.token, Some(token));
    assert!(s.loading);
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
}

#[test]
fn restore_expired_token_discards_it() {
    let (store, handle) = handle_with(MemoryTokenStore::with_token(token_expiring_at(1)));

    assert!(!handle.restore());

    assert_eq!(handle.snapshot(), Session::default());
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn restore_malformed_token_does_not_error() {
    let (store, handle) = handle_with(MemoryTokenStore::with_token("garbage"));
    assert!(!handle.restore());
    assert!(!handle.snapshot().loading);
    assert_eq!(store.load().unwrap(), None);
}

// =============================================================================
// refresh / expire / errors
// =============================================================================

#[test]
fn refresh_user_replaces_user_and_reconciles_flag() {
    let (_, handle) = handle_with(MemoryTokenStore::with_token(live_token()));
    handle.restore();

    let mut user = admin_user();
    user.name = "Renamed".into();
    handle.refresh_user(user);

    let s = handle.snapshot();
    assert!(s.is_authenticated);
    assert!(!s.loading);
    assert_eq!(s.user.unwrap().name, "Renamed");
}

#[test]
fn refresh_user_without_token_is_not_authenticated() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    handle.refresh_user(admin_user());
    assert!(!handle.snapshot().is_authenticated);
}

#[test]
fn replace_token_persists() {
    let (store, handle) = handle_with(MemoryTokenStore::new());
    handle.login(admin_user(), "old".into());

    handle.replace_token("new".into());

    assert_eq!(handle.snapshot().token.as_deref(), Some("new"));
    assert!(handle.snapshot().is_authenticated);
    assert_eq!(store.load().unwrap().as_deref(), Some("new"));
}

#[test]
fn expire_clears_auth_and_records_reason() {
    let (store, handle) = handle_with(MemoryTokenStore::new());
    handle.login(admin_user(), "tok".into());

    handle.expire("credential rejected");

    let s = handle.snapshot();
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
    assert_eq!(s.token, None);
    assert_eq!(s.error.as_deref(), Some("credential rejected"));
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn set_and_clear_error_leave_auth_alone() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    handle.login(admin_user(), "tok".into());

    handle.set_error("boom");
    assert_eq!(handle.snapshot().error.as_deref(), Some("boom"));
    assert!(handle.snapshot().is_authenticated);

    handle.clear_error();
    assert_eq!(handle.snapshot().error, None);
    assert!(handle.snapshot().is_authenticated);
}

#[test]
fn begin_then_fail_loading() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    handle.begin_loading();
    assert!(handle.snapshot().loading);

    handle.fail_loading("bad credentials");

    let s = handle.snapshot();
    assert!(!s.loading);
    assert_eq!(s.error.as_deref(), Some("bad credentials"));
}

// =============================================================================
// token lookup
// =============================================================================

#[test]
fn token_prefers_memory() {
    let (store, handle) = handle_with(MemoryTokenStore::new());
    handle.login(admin_user(), "mem".into());
    store.save("disk").unwrap();
    assert_eq!(handle.token().as_deref(), Some("mem"));
}

#[test]
fn token_falls_back_to_store_before_hydration() {
    let (_, handle) = handle_with(MemoryTokenStore::with_token("disk"));
    assert_eq!(handle.token().as_deref(), Some("disk"));
}

#[test]
fn token_none_after_logout() {
    let (_, handle) = handle_with(MemoryTokenStore::with_token("disk"));
    let _ = handle.logout();
    assert_eq!(handle.token(), None);
}

/// Store whose removals always fail, leaving the token on disk.
struct StickyStore(MemoryTokenStore);

impl TokenStore for StickyStore {
    fn load(&self) -> Result<Option<String>, store::StoreError> {
        self.0.load()
    }

    fn save(&self, token: &str) -> Result<(), store::StoreError> {
        self.0.save(token)
    }

    fn remove(&self) -> Result<(), store::StoreError> {
        Err(store::StoreError::Poisoned)
    }
}

fn sticky_handle(token: &str) -> (Arc<StickyStore>, SessionHandle) {
    let store = Arc::new(StickyStore(MemoryTokenStore::with_token(token)));
    let handle = SessionHandle::new(store.clone());
    (store, handle)
}

#[test]
fn failed_removal_on_logout_does_not_revive_token() {
    let (store, handle) = sticky_handle("disk");
    assert_eq!(handle.token().as_deref(), Some("disk"));

    let _ = handle.logout();

    assert_eq!(store.load().unwrap().as_deref(), Some("disk"));
    assert_eq!(handle.token(), None);
}

#[test]
fn failed_removal_on_expire_does_not_revive_token() {
    let (_, handle) = sticky_handle(&live_token());
    assert!(handle.restore());

    handle.expire("rejected");

    assert_eq!(handle.token(), None);
}

#[test]
fn failed_removal_of_expired_token_is_not_sent() {
    let (_, handle) = sticky_handle(&token_expiring_at(1));

    assert!(!handle.restore());

    assert_eq!(handle.token(), None);
}

#[test]
fn login_after_logout_uses_new_token() {
    let (_, handle) = sticky_handle("old");
    let _ = handle.logout();

    handle.login(admin_user(), "new".into());

    assert_eq!(handle.token().as_deref(), Some("new"));
}

// =============================================================================
// Observation
// =============================================================================

#[tokio::test]
async fn subscribers_observe_mutations() {
    let (_, handle) = handle_with(MemoryTokenStore::new());
    let mut rx = handle.subscribe();

    handle.login(admin_user(), "tok".into());

    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_authenticated);
}
