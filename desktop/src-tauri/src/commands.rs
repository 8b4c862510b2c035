//! Tauri IPC commands exposed to the page.

use crate::backend::{CoordinatorHandle, LifecycleState};
use crate::shell_status::ShellStatus;
use crate::window::accept_inbound;

use serde_json::Value;
use tauri::{State, Url};
use tracing::{debug, info};

/// Current lifecycle state and backend address.
#[tauri::command]
pub fn get_shell_status(handle: State<'_, CoordinatorHandle>) -> ShellStatus {
    build_shell_status(handle.state(), handle.backend_url().as_ref())
}

/// Inbound half of the page bridge. Only `toHost` messages are accepted.
#[tauri::command]
pub fn bridge_send(channel: String, payload: Value) {
    if !accept_inbound(&channel) {
        debug!("Dropped bridge message on channel {channel:?}");
        return;
    }

    info!(target: "bridge", "Message from page: {payload}");
}

pub fn build_shell_status(state: LifecycleState, backend_url: Option<&Url>) -> ShellStatus {
    ShellStatus {
        state: state.to_string(),
        port: backend_url.and_then(Url::port),
        backend_url: backend_url.map(Url::to_string),
        is_ready: state == LifecycleState::Ready,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
