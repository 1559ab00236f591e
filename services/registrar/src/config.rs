//! Registrar configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_PROMOTION_MESSAGE: &str = "The wait paid off - you are now registered.";

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset.
    pub log_level: String,

    /// How often a promotion decision is re-run after a stale write.
    pub max_conflict_retries: u32,

    /// Upper bound for a single notification delivery.
    pub notify_timeout: Duration,

    /// Text sent to a participant promoted from the waiting list.
    pub promotion_message: String,

    /// SQLite database file; the in-memory store is used when unset.
    pub database_path: Option<PathBuf>,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_conflict_retries: 3,
            notify_timeout: Duration::from_secs(5),
            promotion_message: DEFAULT_PROMOTION_MESSAGE.to_string(),
            database_path: None,
        }
    }
}

impl RegistrarConfig {
    /// Load configuration from `MEETUP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level = lookup("MEETUP_LOG_LEVEL").unwrap_or(defaults.log_level);

        let max_conflict_retries = match lookup("MEETUP_MAX_CONFLICT_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MEETUP_MAX_CONFLICT_RETRIES is not a number: {raw:?}"))?,
            None => defaults.max_conflict_retries,
        };

        let notify_timeout = match lookup("MEETUP_NOTIFY_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("MEETUP_NOTIFY_TIMEOUT_MS is not a number: {raw:?}"))?,
            ),
            None => defaults.notify_timeout,
        };

        let promotion_message = lookup("MEETUP_PROMOTION_MESSAGE")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.promotion_message);

        let database_path = lookup("MEETUP_DATABASE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            log_level,
            max_conflict_retries,
            notify_timeout,
            promotion_message,
            database_path,
        })
    }
}
