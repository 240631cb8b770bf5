//! Layered configuration.
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - `fsrelay.toml` in the working directory, if present
//! - environment variables prefixed `FSRELAY_`, with `__` separating
//!   nested levels: `FSRELAY_STORAGE_TOKEN=...` sets `storage_token`,
//!   `FSRELAY_WATCH__POLL_INTERVAL_MS=250` sets `watch.poll_interval_ms`.
//!
//! The watch root is always the process working directory; there is no
//! configuration knob for an alternate root.

use std::collections::HashMap;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::watcher::WatchError;

pub const CONFIG_FILE: &str = "fsrelay.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Opaque credential stamped into every message. Required, non-blank.
    #[serde(default)]
    pub storage_token: String,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Cadence of the polling scan, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the raw-event queue between the polling thread and the
    /// dispatch loop. A stalled dispatch loop blocks the scanner once this
    /// fills, coalescing further changes into later scans.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default tracing level (`error`..`trace`).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `fsrelay = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_queue_capacity() -> usize {
    64
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_token: String::new(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(CONFIG_FILE)).extract().map_err(Box::new)
    }

    /// Load from a specific TOML file (tests, embedders).
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path.as_ref())).extract().map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(file)
            .merge(Env::prefixed("FSRELAY_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// The single startup validation rule: the token must not be blank.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.storage_token.trim().is_empty() {
            return Err(WatchError::BlankToken);
        }
        Ok(())
    }
}
