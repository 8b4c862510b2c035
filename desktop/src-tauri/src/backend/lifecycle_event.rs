use crate::backend::BackendError;

/// Inputs to the lifecycle coordinator.
///
/// The supervisor, the readiness task and the Tauri event loop all feed
/// the same channel, so the state machine has a single entry point.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// Backend exited without a shutdown request; a relaunch follows after backoff.
    BackendExited { pid: u32, code: Option<i32> },
    /// The crash relaunch succeeded.
    BackendRelaunched { pid: u32, attempt: u32 },
    /// Supervision ended with an unrecoverable error.
    SupervisionFailed { error: BackendError },
    /// A readiness wait finished. `generation` identifies which wait.
    ReadinessResolved { generation: u64, ready: bool },
    /// The app was re-activated with no window open (macOS dock click).
    WindowReopened,
    /// The user or the OS asked the application to quit.
    ShutdownRequested,
}
