//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use vetcare_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS};

use crate::login_guard::MAX_LOCKOUT;

/// Credentials for the admin account created at first start.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./vetcare.db`
    pub database_path: PathBuf,

    /// Ed25519 secret used to sign session tokens (hex-encoded, 64 chars).
    /// Env: `SESSION_SIGNING_KEY`
    /// Default: none, a random key is generated per process.
    pub session_signing_key: Option<String>,

    /// Env: `SESSION_TTL_HOURS`
    /// Default: `168`, at most one year
    pub session_ttl_hours: i64,

    /// Whether `/api/auth/register` accepts new client accounts.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Env: `BOOTSTRAP_ADMIN_EMAIL` and `BOOTSTRAP_ADMIN_PASSWORD`, both
    /// required.
    pub bootstrap_admin: Option<BootstrapAdmin>,

    /// Consecutive failed logins for one email before it is locked.
    /// Env: `LOGIN_MAX_FAILURES`
    /// Default: `5`
    pub login_max_failures: u32,

    /// Env: `LOGIN_LOCKOUT_SECS`
    /// Default: `900`, at most one week
    pub login_lockout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./vetcare.db"),
            session_signing_key: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            registration_open: true,
            bootstrap_admin: None,
            login_max_failures: 5,
            login_lockout: Duration::from_secs(900),
        }
    }
}

// Secrets are redacted so the config can be logged with `?config`.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("session_signing_key", &self.session_signing_key.as_ref().map(|_| "<redacted>"))
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("registration_open", &self.registration_open)
            .field(
                "bootstrap_admin",
                &self.bootstrap_admin.as_ref().map(|admin| admin.email.as_str()),
            )
            .field("login_max_failures", &self.login_max_failures)
            .field("login_lockout", &self.login_lockout)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(key) = var("SESSION_SIGNING_KEY").filter(|k| !k.is_empty()) {
            config.session_signing_key = Some(key);
        }

        if let Some(val) = var("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(hours) if hours > MAX_SESSION_TTL_HOURS => {
                    tracing::warn!(value = %val, max = MAX_SESSION_TTL_HOURS, "SESSION_TTL_HOURS too large, clamping");
                    config.session_ttl_hours = MAX_SESSION_TTL_HOURS;
                }
                Ok(hours) if hours > 0 => config.session_ttl_hours = hours,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_HOURS, using default"),
            }
        }

        if let Some(val) = var("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let (Some(email), Some(password)) =
            (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD"))
        {
            config.bootstrap_admin = Some(BootstrapAdmin { email, password });
        }

        if let Some(val) = var("LOGIN_MAX_FAILURES") {
            if let Ok(n) = val.parse::<u32>() {
                config.login_max_failures = n.max(1);
            }
        }

        if let Some(val) = var("LOGIN_LOCKOUT_SECS") {
            match val.parse::<u64>().map(Duration::from_secs) {
                Ok(lockout) if lockout > MAX_LOCKOUT => {
                    tracing::warn!(value = %val, "LOGIN_LOCKOUT_SECS too large, clamping");
                    config.login_lockout = MAX_LOCKOUT;
                }
                Ok(lockout) => config.login_lockout = lockout,
                Err(_) => tracing::warn!(value = %val, "Invalid LOGIN_LOCKOUT_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = from_pairs(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.database_path, PathBuf::from("./vetcare.db"));
        assert_eq!(config.session_ttl(), chrono::Duration::days(7));
        assert!(config.registration_open);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "127.0.0.1:3000"),
            ("DATABASE_PATH", "/var/lib/vetcare/clinic.db"),
            ("SESSION_TTL_HOURS", "12"),
            ("REGISTRATION_OPEN", "false"),
            ("LOGIN_MAX_FAILURES", "3"),
            ("LOGIN_LOCKOUT_SECS", "60"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 3000).into());
        assert_eq!(config.database_path, PathBuf::from("/var/lib/vetcare/clinic.db"));
        assert_eq!(config.session_ttl_hours, 12);
        assert!(!config.registration_open);
        assert_eq!(config.login_max_failures, 3);
        assert_eq!(config.login_lockout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[("HTTP_ADDR", "not-an-addr"), ("SESSION_TTL_HOURS", "-4")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.session_ttl_hours, 168);
    }

    #[test]
    fn test_huge_durations_are_clamped() {
        let config = from_pairs(&[
            ("SESSION_TTL_HOURS", "9223372036854775807"),
            ("LOGIN_LOCKOUT_SECS", "18446744073709551615"),
        ]);
        assert_eq!(config.session_ttl_hours, MAX_SESSION_TTL_HOURS);
        assert_eq!(config.session_ttl(), chrono::Duration::days(365));
        assert_eq!(config.login_lockout, MAX_LOCKOUT);

        let mut direct = ServerConfig::default();
        direct.session_ttl_hours = i64::MAX;
        assert_eq!(direct.session_ttl(), chrono::Duration::days(365));
    }

    #[test]
    fn test_bootstrap_admin_needs_both_vars() {
        assert!(from_pairs(&[("BOOTSTRAP_ADMIN_EMAIL", "root@clinic.com")])
            .bootstrap_admin
            .is_none());

        let config = from_pairs(&[
            ("BOOTSTRAP_ADMIN_EMAIL", "root@clinic.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "hunter22"),
        ]);
        assert_eq!(config.bootstrap_admin.unwrap().email, "root@clinic.com");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let key = "ab".repeat(32);
        let config = from_pairs(&[
            ("SESSION_SIGNING_KEY", key.as_str()),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@clinic.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "hunter22"),
        ]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("abab"));
        assert!(!printed.contains("hunter22"));
        assert!(printed.contains("root@clinic.com"));
    }
}
