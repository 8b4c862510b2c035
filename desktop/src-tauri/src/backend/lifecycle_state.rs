use std::fmt;

use serde::Serialize;

/// Where the shell is in its start-to-exit sequence.
///
/// Only the coordinator changes it; everyone else reads a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    AllocatingPort,
    Launching,
    WaitingReady,
    Ready,
    Restarting,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AllocatingPort => "allocating_port",
            Self::Launching => "launching",
            Self::WaitingReady => "waiting_ready",
            Self::Ready => "ready",
            Self::Restarting => "restarting",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }

    /// Shutdown has begun or finished; no further transitions except to `Stopped`.
    pub fn is_terminating(&self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Stopped)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
