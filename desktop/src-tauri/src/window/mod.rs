mod bridge;
mod navigation;
mod placeholder;
mod tauri_window;

pub use bridge::{BRIDGE_SCRIPT, BridgeChannel, accept_inbound, dispatch_script};
pub use navigation::{NavigationDecision, decide_navigation};
pub use placeholder::placeholder_url;
pub use tauri_window::{MAIN_WINDOW_LABEL, TauriWindow, build_main_window};

use crate::backend::BackendResult;

use async_trait::async_trait;
use tauri::Url;

/// What the coordinator needs from the main window.
#[async_trait]
pub trait WindowController: Send {
    /// Show the local loading page, recreating the window if it was closed.
    fn show_placeholder(&mut self) -> BackendResult<()>;

    /// Point the window at the backend. A no-op while already showing it.
    fn show_live_app(&mut self, url: &Url) -> BackendResult<()>;

    /// Blocking error dialog; resolves once the user dismisses it.
    async fn show_fatal_error(&mut self, message: &str);
}
