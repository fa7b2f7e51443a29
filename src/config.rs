//! Runtime tuning for the session machinery, read from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

use humantime_serde::re::humantime;

const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Upper bound on connect + attach + start for one track.
    #[serde(with = "humantime_serde")]
    pub start_timeout: Duration,
    /// Tracks allowed to fail to start back to back before the rest of the
    /// queue is dropped. Zero disables the limit.
    pub max_consecutive_failures: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_timeout: DEFAULT_START_TIMEOUT,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl PlayerConfig {
    /// Reads `PLAYER_START_TIMEOUT` (e.g. "15s", "500ms") and
    /// `PLAYER_MAX_CONSECUTIVE_FAILURES`. Unset or malformed values fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let start_timeout = match lookup("PLAYER_START_TIMEOUT") {
            Some(raw) => humantime::parse_duration(raw.trim()).unwrap_or_else(|e| {
                warn!("Invalid PLAYER_START_TIMEOUT {:?}: {}", raw, e);
                defaults.start_timeout
            }),
            None => defaults.start_timeout,
        };

        let max_consecutive_failures = match lookup("PLAYER_MAX_CONSECUTIVE_FAILURES") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
                warn!("Invalid PLAYER_MAX_CONSECUTIVE_FAILURES {:?}: {}", raw, e);
                defaults.max_consecutive_failures
            }),
            None => defaults.max_consecutive_failures,
        };

        Self {
            start_timeout,
            max_consecutive_failures,
        }
    }
}
