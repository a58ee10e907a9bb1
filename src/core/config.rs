//! Environment-driven configuration for the reminder daemon
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

/// Default bound on the "answered today" lookup performed when a reminder fires
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Default sqlite file for local settings
pub const DEFAULT_DATABASE_PATH: &str = "qotd.db";

#[derive(Debug, Clone)]
pub struct Config {
    /// Signed-in user whose daily status is checked at fire time.
    /// Only needed by commands that read the user's record.
    pub user_id: Option<String>,
    pub database_path: String,
    /// Base URL of the remote record store (in-memory store when unset)
    pub records_url: Option<String>,
    pub records_token: Option<String>,
    /// Webhook receiving notifications (log-only when unset)
    pub notify_url: Option<String>,
    pub remote_timeout: Duration,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let remote_timeout = match non_empty("QOTD_REMOTE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    anyhow!("QOTD_REMOTE_TIMEOUT_SECS is not a number ({raw}): {e}")
                })?;
                if secs == 0 {
                    return Err(anyhow!("QOTD_REMOTE_TIMEOUT_SECS must be greater than zero"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        };

        let log_level = non_empty("RUST_LOG")
            .or_else(|| non_empty("LOG_LEVEL"))
            .unwrap_or_else(|| "info".to_string());

        Ok(Config {
            user_id: non_empty("QOTD_USER_ID"),
            database_path: non_empty("QOTD_DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            records_url: non_empty("QOTD_RECORDS_URL"),
            records_token: non_empty("QOTD_RECORDS_TOKEN"),
            notify_url: non_empty("QOTD_NOTIFY_URL"),
            remote_timeout,
            log_level,
        })
    }

    /// The configured user, or an error naming the missing variable
    pub fn require_user_id(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| anyhow!("QOTD_USER_ID must be set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[("QOTD_USER_ID", "u1")])).unwrap();
        assert_eq!(config.require_user_id().unwrap(), "u1");
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.remote_timeout, Duration::from_secs(10));
        assert!(config.records_url.is_none());
        assert!(config.notify_url.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_user_id_only_fails_when_required() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.user_id.is_none());
        assert!(config.require_user_id().is_err());

        let config = Config::from_lookup(lookup_from(&[("QOTD_USER_ID", "  ")])).unwrap();
        assert!(config.require_user_id().is_err());
    }

    #[test]
    fn test_timeout_parsing() {
        let config = Config::from_lookup(lookup_from(&[
            ("QOTD_USER_ID", "u1"),
            ("QOTD_REMOTE_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.remote_timeout, Duration::from_secs(3));

        let bad = Config::from_lookup(lookup_from(&[
            ("QOTD_USER_ID", "u1"),
            ("QOTD_REMOTE_TIMEOUT_SECS", "soon"),
        ]));
        assert!(bad.is_err());

        let zero = Config::from_lookup(lookup_from(&[
            ("QOTD_USER_ID", "u1"),
            ("QOTD_REMOTE_TIMEOUT_SECS", "0"),
        ]));
        assert!(zero.is_err());
    }

    #[test]
    fn test_log_level_prefers_rust_log() {
        let config = Config::from_lookup(lookup_from(&[
            ("QOTD_USER_ID", "u1"),
            ("RUST_LOG", "debug"),
            ("LOG_LEVEL", "warn"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "debug");
    }
}
