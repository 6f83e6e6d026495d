//! Admin configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Every knob has a default so a bare environment yields a working local
//! setup. The only hard failure is an explicit development role bypass in a
//! production-labelled environment, which is refused rather than ignored.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTH_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_PICK_SERVER_URL: &str = "http://localhost:4000";
pub const DEFAULT_PORTAL_CLIENT_URL: &str = "http://localhost:3200";
pub const DEFAULT_ADMIN_APP_URL: &str = "http://localhost:3310";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const TOKEN_DIR: &str = ".mypick-admin";
const TOKEN_FILE: &str = "token.json";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown APP_ENV: {0} (expected production, development or test)")]
    UnknownEnvironment(String),
    #[error("invalid boolean for {var}: {value}")]
    InvalidBool { var: &'static str, value: String },
    #[error("invalid number for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("ADMIN_DEV_ROLE_BYPASS cannot be enabled when APP_ENV=production")]
    BypassInProduction,
}

// =============================================================================
// TYPES
// =============================================================================

/// Deployment label. Only `Development` and `Test` may enable the role bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    #[default]
    Production,
    Development,
    Test,
}

impl AppEnvironment {
    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            None | Some("" | "production" | "prod") => Ok(Self::Production),
            Some("development" | "dev") => Ok(Self::Development),
            Some("test") => Ok(Self::Test),
            Some(other) => Err(ConfigError::UnknownEnvironment(other.to_owned())),
        }
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Settings that drive the access guard's redirect targets and role policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub auth_server_url: String,
    pub portal_url: String,
    dev_role_bypass: bool,
}

impl GuardConfig {
    /// Guard settings with the development bypass disabled.
    #[must_use]
    pub fn new(auth_server_url: impl Into<String>, portal_url: impl Into<String>) -> Self {
        Self {
            auth_server_url: trim_base(auth_server_url.into()),
            portal_url: portal_url.into(),
            dev_role_bypass: false,
        }
    }

    /// Enable the roles-absent development bypass.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BypassInProduction`] for a production environment.
    pub fn with_dev_role_bypass(mut self, env: AppEnvironment) -> Result<Self, ConfigError> {
        if env.is_production() {
            return Err(ConfigError::BypassInProduction);
        }
        self.dev_role_bypass = true;
        Ok(self)
    }

    #[must_use]
    pub fn dev_role_bypass(&self) -> bool {
        self.dev_role_bypass
    }

    /// External login page URL carrying `current_url` as `redirect_uri`.
    #[must_use]
    pub fn login_url(&self, current_url: &str) -> String {
        format!("{}/api/auth/login?redirect_uri={}", self.auth_server_url, urlencoding::encode(current_url))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub environment: AppEnvironment,
    pub auth_server_url: String,
    pub pick_server_url: String,
    pub app_url: String,
    pub token_path: PathBuf,
    pub timeouts: HttpTimeouts,
    pub guard: GuardConfig,
}

impl AdminConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `APP_ENV`: `production` (default), `development` or `test`
    /// - `AUTH_SERVER_URL`: default `http://localhost:8000`
    /// - `PICK_SERVER_URL`: default `http://localhost:4000`
    /// - `PORTAL_CLIENT_URL`: non-admin redirect target, default `http://localhost:3200`
    /// - `ADMIN_APP_URL`: location reported to the guard, default `http://localhost:3310`
    /// - `ADMIN_TOKEN_PATH`: default `$HOME/.mypick-admin/token.json`
    /// - `ADMIN_REQUEST_TIMEOUT_SECS` / `ADMIN_CONNECT_TIMEOUT_SECS`: default 10
    /// - `ADMIN_DEV_ROLE_BYPASS`: default false, refused in production
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown environment label, an unparseable
    /// boolean or number, or a bypass request in production.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = AppEnvironment::parse(env_var("APP_ENV").as_deref())?;

        let auth_server_url = trim_base(env_var("AUTH_SERVER_URL").unwrap_or_else(|| DEFAULT_AUTH_SERVER_URL.into()));
        let pick_server_url = trim_base(env_var("PICK_SERVER_URL").unwrap_or_else(|| DEFAULT_PICK_SERVER_URL.into()));
        let portal_url = env_var("PORTAL_CLIENT_URL").unwrap_or_else(|| DEFAULT_PORTAL_CLIENT_URL.into());
        let app_url = env_var("ADMIN_APP_URL").unwrap_or_else(|| DEFAULT_ADMIN_APP_URL.into());
        let token_path = env_var("ADMIN_TOKEN_PATH").map_or_else(default_token_path, PathBuf::from);
        let timeouts = HttpTimeouts {
            request_secs: env_u64("ADMIN_REQUEST_TIMEOUT_SECS")?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_u64("ADMIN_CONNECT_TIMEOUT_SECS")?.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        let mut guard = GuardConfig::new(auth_server_url.clone(), portal_url);
        if env_bool("ADMIN_DEV_ROLE_BYPASS")?.unwrap_or(false) {
            guard = guard.with_dev_role_bypass(environment)?;
        }

        Ok(Self { environment, auth_server_url, pick_server_url, app_url, token_path, timeouts, guard })
    }
}

fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = env_var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { var: key, value: raw })
}

fn env_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = env_var(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { var: key, value: raw }),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

fn default_token_path() -> PathBuf {
    let home = env_var("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(TOKEN_DIR).join(TOKEN_FILE)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
