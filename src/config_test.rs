use std::sync::{Mutex, MutexGuard};

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Env vars are process-global; serialize the tests that touch them.
fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`env_lock`].
unsafe fn clear_admin_env() {
    unsafe {
        std::env::remove_var("APP_ENV");
        std::env::remove_var("AUTH_SERVER_URL");
        std::env::remove_var("PICK_SERVER_URL");
        std::env::remove_var("PORTAL_CLIENT_URL");
        std::env::remove_var("ADMIN_APP_URL");
        std::env::remove_var("ADMIN_TOKEN_PATH");
        std::env::remove_var("ADMIN_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("ADMIN_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("ADMIN_DEV_ROLE_BYPASS");
    }
}

// =============================================================================
// from_env
// =============================================================================

#[test]
fn from_env_defaults() {
    let _env = env_lock();
    unsafe { clear_admin_env() };

    let cfg = AdminConfig::from_env().unwrap();
    assert_eq!(cfg.environment, AppEnvironment::Production);
    assert_eq!(cfg.auth_server_url, DEFAULT_AUTH_SERVER_URL);
    assert_eq!(cfg.pick_server_url, DEFAULT_PICK_SERVER_URL);
    assert_eq!(cfg.guard.portal_url, DEFAULT_PORTAL_CLIENT_URL);
    assert_eq!(cfg.app_url, DEFAULT_ADMIN_APP_URL);
    assert_eq!(cfg.timeouts, HttpTimeouts::default());
    assert!(!cfg.guard.dev_role_bypass());
    assert!(cfg.token_path.ends_with(".mypick-admin/token.json"));
}

#[test]
fn from_env_parses_overrides() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("APP_ENV", "development");
        std::env::set_var("AUTH_SERVER_URL", "https://auth.example/");
        std::env::set_var("PICK_SERVER_URL", "https://pick.example//");
        std::env::set_var("PORTAL_CLIENT_URL", "https://portal.example");
        std::env::set_var("ADMIN_TOKEN_PATH", "/tmp/admin-token.json");
        std::env::set_var("ADMIN_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("ADMIN_CONNECT_TIMEOUT_SECS", "7");
        std::env::set_var("ADMIN_DEV_ROLE_BYPASS", "true");
    }

    let cfg = AdminConfig::from_env().unwrap();
    assert_eq!(cfg.environment, AppEnvironment::Development);
    assert_eq!(cfg.auth_server_url, "https://auth.example");
    assert_eq!(cfg.guard.auth_server_url, "https://auth.example");
    assert_eq!(cfg.pick_server_url, "https://pick.example");
    assert_eq!(cfg.guard.portal_url, "https://portal.example");
    assert_eq!(cfg.token_path, PathBuf::from("/tmp/admin-token.json"));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 42, connect_secs: 7 });
    assert!(cfg.guard.dev_role_bypass());

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_rejects_malformed_timeout() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("ADMIN_REQUEST_TIMEOUT_SECS", "soon");
    }

    let err = AdminConfig::from_env().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidNumber { var: "ADMIN_REQUEST_TIMEOUT_SECS", ref value } if value == "soon"
    ));
    assert_eq!(err.to_string(), "invalid number for ADMIN_REQUEST_TIMEOUT_SECS: soon");

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_rejects_negative_connect_timeout() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("ADMIN_CONNECT_TIMEOUT_SECS", "-5");
    }

    let err = AdminConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidNumber { var: "ADMIN_CONNECT_TIMEOUT_SECS", .. }));

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_blank_timeout_uses_default() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("ADMIN_REQUEST_TIMEOUT_SECS", "  ");
    }

    let cfg = AdminConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_rejects_bypass_in_production() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("ADMIN_DEV_ROLE_BYPASS", "1");
    }

    let err = AdminConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::BypassInProduction));

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_rejects_bypass_when_env_unset() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("ADMIN_DEV_ROLE_BYPASS", "yes");
    }

    assert!(AdminConfig::from_env().is_err());

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_unknown_environment_errors() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("APP_ENV", "staging");
    }

    let err = AdminConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("unknown APP_ENV"));

    unsafe { clear_admin_env() };
}

#[test]
fn from_env_invalid_bool_errors() {
    let _env = env_lock();
    unsafe {
        clear_admin_env();
        std::env::set_var("APP_ENV", "test");
        std::env::set_var("ADMIN_DEV_ROLE_BYPASS", "maybe");
    }

    let err = AdminConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBool { var: "ADMIN_DEV_ROLE_BYPASS", .. }));

    unsafe { clear_admin_env() };
}

// =============================================================================
// GuardConfig
// =============================================================================

#[test]
fn guard_config_bypass_off_by_default() {
    let guard = GuardConfig::new("https://auth.example", "https://portal.example");
    assert!(!guard.dev_role_bypass());
}

#[test]
fn guard_config_bypass_allowed_outside_production() {
    let guard = GuardConfig::new("https://auth.example", "https://portal.example")
        .with_dev_role_bypass(AppEnvironment::Test)
        .unwrap();
    assert!(guard.dev_role_bypass());
}

#[test]
fn guard_config_bypass_refused_in_production() {
    let result = GuardConfig::new("https://auth.example", "https://portal.example")
        .with_dev_role_bypass(AppEnvironment::Production);
    assert!(matches!(result, Err(ConfigError::BypassInProduction)));
}

#[test]
fn login_url_percent_encodes_current_location() {
    let guard = GuardConfig::new("https://auth.example/", "https://portal.example");
    let url = guard.login_url("https://admin.example/users?page=2&q=a b");
    assert_eq!(
        url,
        "https://auth.example/api/auth/login?redirect_uri=https%3A%2F%2Fadmin.example%2Fusers%3Fpage%3D2%26q%3Da%20b"
    );
}
