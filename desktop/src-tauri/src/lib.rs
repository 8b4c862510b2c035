mod backend;
mod commands;
mod logging;
mod shell_status;
mod window;

use backend::{
    CoordinatorHandle, HttpProbe, LaunchPlan, LifecycleCoordinator, LifecycleState,
    LoggingSettings, PlanFactory, ProcessSupervisor, ShellConfig, platform_terminator,
    prepare_app_root, resolve_app_root,
};
use logging::{current_log_path, setup_logging};
use window::{MAIN_WINDOW_LABEL, TauriWindow, build_main_window, dispatch_script};

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tauri::{App, AppHandle, Manager, RunEvent, WindowEvent};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tracing::{error, info, warn};

/// Upper bound on the last-chance teardown in `RunEvent::Exit`.
const EXIT_TEARDOWN_LIMIT: Duration = Duration::from_secs(10);

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            // Focus existing window on second instance attempt
            if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
                window.unminimize().ok();
                window.show().ok();
                window.set_focus().ok();
            }
        }))
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let config_dir = app.path().app_config_dir()?;
            let data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&data_dir)?;

            let config = match ShellConfig::load_or_create(&config_dir) {
                Ok(config) => config,
                Err(e) => {
                    setup_logging(&data_dir, &LoggingSettings::default()).ok();
                    error!("Config error: {e}");
                    report_startup_failure(app.handle(), &e.dialog_message());
                    return Ok(());
                }
            };

            let logs_dir = setup_logging(&data_dir, &config.logging)?;

            info!("Starting Parameter Extractor v{}", env!("CARGO_PKG_VERSION"));
            info!("Config directory: {}", config_dir.display());
            info!("Data directory: {}", data_dir.display());
            info!("Logging to {}", current_log_path(&logs_dir).display());

            if let Err(e) = start_shell(app, config) {
                error!("Startup failed: {e}");
                report_startup_failure(app.handle(), &e.dialog_message());
            }

            Ok(())
        })
        .on_window_event(|window, event| {
            if window.label() != MAIN_WINDOW_LABEL {
                return;
            }

            if let WindowEvent::CloseRequested { api, .. } = event {
                // macOS keeps the app resident without a window
                if cfg!(target_os = "macos") {
                    info!("Main window closed, staying resident");
                    return;
                }

                api.prevent_close();
                window.hide().ok();
                if let Some(handle) = window.try_state::<CoordinatorHandle>() {
                    handle.request_shutdown();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_shell_status,
            commands::bridge_send,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| match event {
            RunEvent::ExitRequested { api, code, .. } => {
                let Some(handle) = app_handle.try_state::<CoordinatorHandle>() else {
                    return;
                };

                if handle.state() == LifecycleState::Stopped {
                    info!("Exit requested (code: {code:?}), backend already stopped");
                    return;
                }

                api.prevent_exit();

                if code.is_none() && cfg!(target_os = "macos") {
                    info!("Last window closed, staying resident");
                    return;
                }

                info!("Exit requested (code: {code:?}), stopping backend first");
                handle.request_shutdown();
            }
            RunEvent::Exit => {
                let Some(handle) = app_handle.try_state::<CoordinatorHandle>() else {
                    return;
                };

                if handle.state() != LifecycleState::Stopped {
                    warn!("Exiting before shutdown finished, stopping backend");
                    handle.request_shutdown();
                    let handle = handle.inner().clone();
                    tauri::async_runtime::block_on(async move {
                        if tokio::time::timeout(EXIT_TEARDOWN_LIMIT, handle.wait_until_stopped())
                            .await
                            .is_err()
                        {
                            error!("Backend shutdown did not finish before exit");
                        }
                    });
                }
            }
            #[cfg(target_os = "macos")]
            RunEvent::Reopen {
                has_visible_windows,
                ..
            } => {
                if !has_visible_windows
                    && let Some(handle) = app_handle.try_state::<CoordinatorHandle>()
                {
                    handle.send(backend::LifecycleEvent::WindowReopened);
                }
            }
            _ => {}
        });
}

/// Wire the supervisor, window and coordinator together and start them.
fn start_shell(app: &mut App, config: ShellConfig) -> backend::BackendResult<()> {
    let app_root = resolve_app_root(&config.backend);
    prepare_app_root(&app_root)?;
    info!("Backend root: {}", app_root.display());

    let backend_settings = config.backend.clone();
    let plan_factory: PlanFactory =
        Box::new(move |port| LaunchPlan::streamlit(&backend_settings, &app_root, port));

    let supervisor = ProcessSupervisor::new(
        plan_factory,
        platform_terminator(),
        config.resilience.clone(),
    );
    let probe = Arc::new(HttpProbe::new(config.readiness.probe_timeout())?);

    build_main_window(app.handle(), &config.window)?;
    let window = TauriWindow::new(app.handle().clone(), config.window.clone());

    let coordinator = LifecycleCoordinator::new(&config, supervisor, window, probe);
    let handle = coordinator.handle();
    app.manage(handle.clone());

    #[cfg(unix)]
    spawn_signal_listener(handle.clone());

    spawn_status_forwarder(app.handle().clone(), handle);

    let app_handle = app.handle().clone();
    tauri::async_runtime::spawn(async move {
        let code = coordinator.run().await;
        info!("Shell stopped, exiting with code {code}");
        app_handle.exit(code);
    });

    Ok(())
}

/// SIGINT/SIGTERM take the same path as quitting from the UI.
#[cfg(unix)]
fn spawn_signal_listener(handle: CoordinatorHandle) {
    std::thread::spawn(move || {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register signal handlers: {e}");
                return;
            }
        };

        if let Some(sig) = signals.forever().next() {
            info!("Received signal {sig}, shutting down...");
            handle.request_shutdown();
        }
    });
}

/// Push every state change to the page on the `fromHost` channel.
fn spawn_status_forwarder(app: AppHandle, handle: CoordinatorHandle) {
    let mut state_rx = handle.subscribe();
    tauri::async_runtime::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            let status = commands::build_shell_status(state, handle.backend_url().as_ref());

            let payload = match serde_json::to_value(&status) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to serialize shell status: {e}");
                    continue;
                }
            };

            if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
                window.eval(&dispatch_script(&payload)).ok();
            }
        }
    });
}

/// Show a fatal startup error, then exit once it is dismissed.
fn report_startup_failure(app: &AppHandle, message: &str) {
    let app_handle = app.clone();
    app.dialog()
        .message(message)
        .title("Startup failed")
        .kind(MessageDialogKind::Error)
        .show(move |_| app_handle.exit(1));
}
