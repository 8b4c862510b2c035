use crate::backend::config::{
    default_poll_interval, default_probe_timeout, default_startup_timeout,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    /// Delay between readiness probes (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up waiting for readiness after this long (seconds)
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Per-request HTTP timeout (milliseconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl ReadinessSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            startup_timeout_secs: default_startup_timeout(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}
