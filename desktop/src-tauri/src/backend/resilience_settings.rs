use crate::backend::config::{
    default_restart_backoff, default_shutdown_timeout, default_stable_uptime,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Fixed delay before relaunching a crashed backend (milliseconds)
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_ms: u64,

    /// Maximum consecutive relaunches; unlimited when absent.
    /// A relaunch that stays up for `stable_uptime_secs` resets the count.
    #[serde(default)]
    pub max_restarts: Option<u32>,

    /// Grace period before the process tree is force-killed (seconds)
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Uptime after which a crash no longer counts as consecutive (seconds)
    #[serde(default = "default_stable_uptime")]
    pub stable_uptime_secs: u64,
}

impl ResilienceSettings {
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn stable_uptime(&self) -> Duration {
        Duration::from_secs(self.stable_uptime_secs)
    }
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            restart_backoff_ms: default_restart_backoff(),
            max_restarts: None,
            shutdown_timeout_secs: default_shutdown_timeout(),
            stable_uptime_secs: default_stable_uptime(),
        }
    }
}
