//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts for local development
//! with nothing but a catalog file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::Accounts;

#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `QUIZ_LISTEN_ADDR`
    /// Default: `0.0.0.0:8080`
    pub listen_addr: SocketAddr,

    /// JSON catalog source.
    /// Env: `QUIZ_CATALOG_PATH`
    /// Default: `catalog.json`
    pub catalog_path: PathBuf,

    /// Per-category mirror written after every successful load.
    /// Env: `QUIZ_EXPORT_DIR`
    /// Default: unset (no export)
    pub export_dir: Option<PathBuf>,

    /// Guards catalog reload and the chat bridge.
    /// Env: `QUIZ_ADMIN_PASSWORD`
    /// Default: unset (both disabled)
    pub admin_password: Option<String>,

    /// Env: `QUIZ_ACCOUNTS` (`username:sha256hex:channel,...`)
    pub accounts: Accounts,

    /// Env: `QUIZ_IDLE_TIMEOUT_SECS`
    /// Default: 600
    pub idle_timeout: Duration,

    /// Env: `QUIZ_PING_INTERVAL_SECS`
    /// Default: 20
    pub ping_interval: Duration,

    /// List development-only category groups.
    /// Env: `QUIZ_SHOW_DEV_GROUPS` (true/false)
    /// Default: `false`
    pub show_dev_groups: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 8080).into(),
            catalog_path: PathBuf::from("catalog.json"),
            export_dir: None,
            admin_password: None,
            accounts: Accounts::default(),
            idle_timeout: Duration::from_secs(600),
            ping_interval: Duration::from_secs(20),
            show_dev_groups: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse("QUIZ_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(path) = env_string("QUIZ_CATALOG_PATH") {
            config.catalog_path = PathBuf::from(path);
        }

        config.export_dir = env_string("QUIZ_EXPORT_DIR").map(PathBuf::from);
        config.admin_password = env_string("QUIZ_ADMIN_PASSWORD");
        if config.admin_password.is_none() {
            tracing::warn!("QUIZ_ADMIN_PASSWORD not set, catalog reload and chat bridge disabled");
        }

        if let Some(raw) = env_string("QUIZ_ACCOUNTS") {
            config.accounts = Accounts::parse(&raw);
        }
        if config.accounts.is_empty() {
            tracing::warn!("No accounts configured, nobody can log in");
        }

        if let Some(secs) = env_parse::<u64>("QUIZ_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = env_parse::<u64>("QUIZ_PING_INTERVAL_SECS").filter(|s| *s > 0) {
            config.ping_interval = Duration::from_secs(secs);
        }

        if let Some(show) = env_parse("QUIZ_SHOW_DEV_GROUPS") {
            config.show_dev_groups = show;
        }

        config
    }
}

/// Trimmed, non-empty variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parsed variable; invalid values are logged and ignored
fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Invalid {} '{}': {}, using default", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "QUIZ_LISTEN_ADDR",
        "QUIZ_CATALOG_PATH",
        "QUIZ_EXPORT_DIR",
        "QUIZ_ADMIN_PASSWORD",
        "QUIZ_ACCOUNTS",
        "QUIZ_IDLE_TIMEOUT_SECS",
        "QUIZ_PING_INTERVAL_SECS",
        "QUIZ_SHOW_DEV_GROUPS",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.catalog_path, PathBuf::from("catalog.json"));
        assert!(config.export_dir.is_none());
        assert!(config.admin_password.is_none());
        assert!(config.accounts.is_empty());
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.ping_interval, Duration::from_secs(20));
        assert!(!config.show_dev_groups);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var("QUIZ_LISTEN_ADDR", "127.0.0.1:9000");
        std::env::set_var("QUIZ_EXPORT_DIR", "sheets");
        std::env::set_var("QUIZ_ADMIN_PASSWORD", " admin ");
        std::env::set_var(
            "QUIZ_ACCOUNTS",
            format!("alice:{}:alice", crate::auth::hash_password("pw")),
        );
        std::env::set_var("QUIZ_IDLE_TIMEOUT_SECS", "60");
        std::env::set_var("QUIZ_SHOW_DEV_GROUPS", "true");

        let config = Config::from_env();
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.export_dir, Some(PathBuf::from("sheets")));
        assert_eq!(config.admin_password.as_deref(), Some("admin"));
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert!(config.show_dev_groups);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("QUIZ_LISTEN_ADDR", "not an address");
        std::env::set_var("QUIZ_IDLE_TIMEOUT_SECS", "-1");
        std::env::set_var("QUIZ_PING_INTERVAL_SECS", "0");

        let config = Config::from_env();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.ping_interval, Duration::from_secs(20));

        clear_env();
    }
}
