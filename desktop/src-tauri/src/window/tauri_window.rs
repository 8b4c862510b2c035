use crate::backend::{BackendResult, CoordinatorHandle, WindowSettings};
use crate::window::{
    BRIDGE_SCRIPT, NavigationDecision, WindowController, decide_navigation, placeholder_url,
};

use async_trait::async_trait;
use tauri::{AppHandle, Manager, Runtime, Url, WebviewUrl, WebviewWindow, WebviewWindowBuilder};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub const MAIN_WINDOW_LABEL: &str = "main";

const FATAL_DIALOG_TITLE: &str = "Backend error";

/// Create the main window on the placeholder page.
pub fn build_main_window<R: Runtime, M: Manager<R>>(
    manager: &M,
    settings: &WindowSettings,
) -> BackendResult<WebviewWindow<R>> {
    let app = manager.app_handle().clone();

    let window = WebviewWindowBuilder::new(
        manager,
        MAIN_WINDOW_LABEL,
        WebviewUrl::External(placeholder_url()?),
    )
    .title(&settings.title)
    .inner_size(settings.width, settings.height)
    .initialization_script(BRIDGE_SCRIPT)
    .on_navigation(move |url| {
        let backend = app
            .try_state::<CoordinatorHandle>()
            .and_then(|handle| handle.backend_url());
        navigation_outcome(&app, url, decide_navigation(url, backend.as_ref()))
    })
    .build()?;

    Ok(window)
}

fn navigation_outcome<R: Runtime>(
    app: &AppHandle<R>,
    url: &Url,
    decision: NavigationDecision,
) -> bool {
    match decision {
        NavigationDecision::Allow => true,
        NavigationDecision::OpenExternal => {
            info!("Opening {url} in the system browser");
            if let Err(e) = app.opener().open_url(url.as_str(), None::<&str>) {
                warn!("Failed to open {url}: {e}");
            }
            false
        }
        NavigationDecision::Block => {
            warn!("Blocked navigation to {url}");
            false
        }
    }
}

/// [`WindowController`] backed by the Tauri main window.
pub struct TauriWindow<R: Runtime> {
    app: AppHandle<R>,
    settings: WindowSettings,
    live: bool,
}

impl<R: Runtime> TauriWindow<R> {
    pub fn new(app: AppHandle<R>, settings: WindowSettings) -> Self {
        Self {
            app,
            settings,
            live: false,
        }
    }

    fn ensure_window(&mut self) -> BackendResult<WebviewWindow<R>> {
        if let Some(window) = self.app.get_webview_window(MAIN_WINDOW_LABEL) {
            return Ok(window);
        }

        debug!("Main window missing, recreating");
        // A fresh window starts on the placeholder
        self.live = false;
        build_main_window(&self.app, &self.settings)
    }
}

#[async_trait]
impl<R: Runtime> WindowController for TauriWindow<R> {
    fn show_placeholder(&mut self) -> BackendResult<()> {
        let window = self.ensure_window()?;
        if self.live {
            window.navigate(placeholder_url()?)?;
            self.live = false;
        }
        window.show()?;
        window.set_focus().ok();
        Ok(())
    }

    fn show_live_app(&mut self, url: &Url) -> BackendResult<()> {
        let window = self.ensure_window()?;
        if self.live {
            return Ok(());
        }

        info!("Switching window to {url}");
        window.navigate(url.clone())?;
        self.live = true;
        Ok(())
    }

    async fn show_fatal_error(&mut self, message: &str) {
        let (tx, rx) = oneshot::channel();
        self.app
            .dialog()
            .message(message)
            .title(FATAL_DIALOG_TITLE)
            .kind(MessageDialogKind::Error)
            .show(move |_| {
                let _ = tx.send(());
            });
        let _ = rx.await;
    }
}
