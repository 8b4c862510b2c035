//! Top-level lifecycle state machine.
//!
//! `Idle -> AllocatingPort -> Launching -> WaitingReady -> Ready`, with
//! `Ready -> Restarting -> WaitingReady` on a crash and
//! `any -> ShuttingDown -> Stopped` on quit. All inputs arrive as
//! [`LifecycleEvent`]s on one channel, so the machine runs on a single task
//! and can be driven by fake producers in tests.

use crate::backend::{
    BackendError, BackendResult, BackendSupervisor, LifecycleEvent, LifecycleState, PortManager,
    ReadinessPoller, ReadinessProbe, ShellConfig,
};
use crate::window::WindowController;

use std::panic::Location;
use std::sync::Arc;

use error_location::ErrorLocation;
use tauri::Url;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EXIT_OK: i32 = 0;
const EXIT_FATAL: i32 = 1;

/// Cloneable, read-mostly view of a running coordinator.
///
/// Held by the Tauri app to forward window and OS events and to read the
/// current state; it never mutates coordinator-owned data directly.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<LifecycleEvent>,
    state: watch::Receiver<LifecycleState>,
    endpoint: watch::Receiver<Option<Url>>,
}

impl CoordinatorHandle {
    /// Returns `false` once the coordinator has finished.
    pub fn send(&self, event: LifecycleEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn request_shutdown(&self) {
        if !self.send(LifecycleEvent::ShutdownRequested) {
            debug!("Shutdown requested after coordinator finished");
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Backend origin once a port has been allocated.
    pub fn backend_url(&self) -> Option<Url> {
        self.endpoint.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.clone()
    }

    /// Resolves once the coordinator reaches `Stopped`.
    pub async fn wait_until_stopped(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|state| *state == LifecycleState::Stopped)
            .await;
    }
}

pub struct LifecycleCoordinator<S, W> {
    host: String,
    base_port: u16,
    port_attempts: u16,
    startup_timeout_secs: u64,
    supervisor: S,
    window: W,
    poller: ReadinessPoller,
    state: LifecycleState,
    state_tx: watch::Sender<LifecycleState>,
    endpoint_tx: watch::Sender<Option<Url>>,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    events_rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    backend_url: Option<Url>,
    readiness: Option<JoinHandle<()>>,
    readiness_generation: u64,
    exit_code: i32,
}

impl<S, W> LifecycleCoordinator<S, W>
where
    S: BackendSupervisor,
    W: WindowController,
{
    pub fn new(
        config: &ShellConfig,
        supervisor: S,
        window: W,
        probe: Arc<dyn ReadinessProbe>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Idle);
        let (endpoint_tx, _) = watch::channel(None);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            host: config.backend.host.clone(),
            base_port: config.backend.base_port,
            port_attempts: config.backend.port_attempts,
            startup_timeout_secs: config.readiness.startup_timeout_secs,
            supervisor,
            window,
            poller: ReadinessPoller::new(
                probe,
                config.readiness.poll_interval(),
                config.readiness.startup_timeout(),
            ),
            state: LifecycleState::Idle,
            state_tx,
            endpoint_tx,
            events_tx,
            events_rx,
            backend_url: None,
            readiness: None,
            readiness_generation: 0,
            exit_code: EXIT_OK,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            events: self.events_tx.clone(),
            state: self.state_tx.subscribe(),
            endpoint: self.endpoint_tx.subscribe(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Drive the machine until `Stopped`. Returns the process exit code.
    pub async fn run(mut self) -> i32 {
        self.start().await;

        while self.state != LifecycleState::Stopped {
            let Some(event) = self.next_event().await else {
                break;
            };
            self.handle_event(event).await;
        }

        self.exit_code
    }

    pub async fn next_event(&mut self) -> Option<LifecycleEvent> {
        self.events_rx.recv().await
    }

    /// Allocate the port, launch the backend and begin waiting for it.
    pub async fn start(&mut self) {
        if self.state != LifecycleState::Idle {
            warn!("Start ignored in state {}", self.state);
            return;
        }

        self.set_state(LifecycleState::AllocatingPort);
        let port = PortManager::allocate(self.base_port, self.port_attempts);
        info!("Using port {port}");

        let url = match backend_url(&self.host, port) {
            Ok(url) => url,
            Err(e) => return self.fail(e).await,
        };
        self.backend_url = Some(url.clone());
        self.endpoint_tx.send_replace(Some(url));

        self.set_state(LifecycleState::Launching);
        match self.supervisor.start(port, self.events_tx.clone()).await {
            Ok(pid) => {
                info!("Backend launched with PID {pid}");
                self.enter_waiting_ready();
            }
            Err(e) => self.fail(e).await,
        }
    }

    pub async fn handle_event(&mut self, event: LifecycleEvent) {
        debug!("Lifecycle event in {}: {event:?}", self.state);

        match event {
            LifecycleEvent::ShutdownRequested => self.shutdown(None).await,
            _ if self.state.is_terminating() => {
                debug!("Ignoring event during shutdown");
            }
            LifecycleEvent::ReadinessResolved { generation, ready } => {
                self.on_readiness_resolved(generation, ready);
            }
            LifecycleEvent::BackendExited { pid, code } => match self.state {
                LifecycleState::Ready | LifecycleState::WaitingReady => {
                    warn!("Backend PID {pid} crashed (code {code:?})");
                    self.cancel_readiness_wait();
                    self.set_state(LifecycleState::Restarting);
                }
                state => debug!("Exit of PID {pid} ignored in state {state}"),
            },
            LifecycleEvent::BackendRelaunched { pid, attempt } => {
                if self.state == LifecycleState::Restarting {
                    info!("Backend back as PID {pid} (restart {attempt})");
                    self.enter_waiting_ready();
                } else {
                    debug!("Relaunch of PID {pid} ignored in state {}", self.state);
                }
            }
            LifecycleEvent::SupervisionFailed { error } => self.fail(error).await,
            LifecycleEvent::WindowReopened => match self.state {
                LifecycleState::Ready | LifecycleState::WaitingReady => {
                    self.enter_waiting_ready();
                }
                LifecycleState::Restarting => {
                    if let Err(e) = self.window.show_placeholder() {
                        warn!("Failed to show placeholder: {e}");
                    }
                }
                state => debug!("Reopen ignored in state {state}"),
            },
        }
    }

    fn on_readiness_resolved(&mut self, generation: u64, ready: bool) {
        if generation != self.readiness_generation || self.state != LifecycleState::WaitingReady {
            debug!("Stale readiness result (generation {generation}) ignored");
            return;
        }
        self.readiness = None;

        if !ready {
            // Not fatal: a later crash-restart cycle gets another wait
            warn!(
                "Backend not ready after {}s, keeping placeholder",
                self.startup_timeout_secs
            );
            return;
        }

        self.set_state(LifecycleState::Ready);
        if let Some(url) = self.backend_url.clone()
            && let Err(e) = self.window.show_live_app(&url)
        {
            error!("Failed to show backend UI: {e}");
        }
    }

    fn enter_waiting_ready(&mut self) {
        self.set_state(LifecycleState::WaitingReady);
        if let Err(e) = self.window.show_placeholder() {
            warn!("Failed to show placeholder: {e}");
        }
        self.spawn_readiness_wait();
    }

    fn spawn_readiness_wait(&mut self) {
        self.cancel_readiness_wait();

        let Some(url) = self.backend_url.clone() else {
            return;
        };

        self.readiness_generation += 1;
        let generation = self.readiness_generation;
        let poller = self.poller.clone();
        let events = self.events_tx.clone();

        self.readiness = Some(tokio::spawn(async move {
            let ready = poller.wait_until_ready(url.as_str()).await;
            let _ = events.send(LifecycleEvent::ReadinessResolved { generation, ready });
        }));
    }

    fn cancel_readiness_wait(&mut self) {
        if let Some(task) = self.readiness.take() {
            task.abort();
        }
    }

    async fn fail(&mut self, error: BackendError) {
        error!("Fatal backend error: {error}");
        self.exit_code = EXIT_FATAL;
        self.shutdown(Some(error)).await;
    }

    /// Stop the backend before the host is allowed to exit. Idempotent.
    async fn shutdown(&mut self, fatal: Option<BackendError>) {
        if self.state == LifecycleState::Stopped {
            return;
        }

        self.set_state(LifecycleState::ShuttingDown);
        self.cancel_readiness_wait();
        // Invalidate any result that was already queued
        self.readiness_generation += 1;

        if let Err(e) = self.supervisor.stop().await {
            error!("Failed to stop backend: {e}");
        }

        if let Some(error) = fatal {
            self.window.show_fatal_error(&error.dialog_message()).await;
        }

        self.set_state(LifecycleState::Stopped);
    }

    fn set_state(&mut self, next: LifecycleState) {
        if self.state == next {
            return;
        }
        info!("Lifecycle: {} -> {next}", self.state);
        self.state = next;
        self.state_tx.send_replace(next);
    }
}

/// Root URL of the backend, which doubles as its health endpoint.
pub fn backend_url(host: &str, port: u16) -> BackendResult<Url> {
    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };

    Url::parse(&format!("http://{host}:{port}/")).map_err(|e| BackendError::ConfigInvalid {
        message: format!("Invalid backend address {host}:{port}: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
