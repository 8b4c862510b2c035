//! Backend process supervision with crash restart.

use crate::backend::{
    BackendError, BackendProcess, BackendResult, LaunchPlan, LifecycleEvent, PlanFactory,
    ProcessTreeTerminator, ResilienceSettings,
};

use std::panic::Location;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type StopReply = oneshot::Sender<BackendResult<()>>;

/// What the coordinator needs from a supervisor.
#[async_trait]
pub trait BackendSupervisor: Send {
    /// Launch the backend on `port`. Exits and relaunches are reported on
    /// `events`. Fails if a backend is already live.
    async fn start(
        &mut self,
        port: u16,
        events: mpsc::UnboundedSender<LifecycleEvent>,
    ) -> BackendResult<u32>;

    /// Stop the backend tree and disable restarts. No-op when nothing runs.
    async fn stop(&mut self) -> BackendResult<()>;
}

/// Supervises one backend process at a time.
///
/// The live [`BackendProcess`] is owned by a background task; this handle
/// only talks to it over a channel.
pub struct ProcessSupervisor {
    plan_factory: PlanFactory,
    terminator: Arc<dyn ProcessTreeTerminator>,
    resilience: ResilienceSettings,
    shutdown_requested: Arc<Mutex<bool>>,
    current_pid: Arc<AtomicU32>,
    running: Option<RunningSupervision>,
}

struct RunningSupervision {
    stop_tx: mpsc::Sender<StopReply>,
    task: JoinHandle<()>,
}

impl ProcessSupervisor {
    pub fn new(
        plan_factory: PlanFactory,
        terminator: Arc<dyn ProcessTreeTerminator>,
        resilience: ResilienceSettings,
    ) -> Self {
        Self {
            plan_factory,
            terminator,
            resilience,
            shutdown_requested: Arc::new(Mutex::new(false)),
            current_pid: Arc::new(AtomicU32::new(0)),
            running: None,
        }
    }

    /// PID of the live backend, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.current_pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    fn set_shutdown_requested(&self, value: bool) {
        *self
            .shutdown_requested
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = value;
    }
}

#[async_trait]
impl BackendSupervisor for ProcessSupervisor {
    async fn start(
        &mut self,
        port: u16,
        events: mpsc::UnboundedSender<LifecycleEvent>,
    ) -> BackendResult<u32> {
        if self.is_running() {
            return Err(BackendError::AlreadyRunning {
                pid: self.pid().unwrap_or_default(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.set_shutdown_requested(false);

        let plan = (self.plan_factory)(port);
        let process = BackendProcess::spawn(&plan)?;
        let pid = process.pid();
        self.current_pid.store(pid, Ordering::SeqCst);

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let supervision = Supervision {
            process,
            plan,
            terminator: self.terminator.clone(),
            resilience: self.resilience.clone(),
            shutdown_requested: self.shutdown_requested.clone(),
            current_pid: self.current_pid.clone(),
            events,
            stop_rx,
        };
        let task = tokio::spawn(supervision.run());

        self.running = Some(RunningSupervision { stop_tx, task });
        Ok(pid)
    }

    async fn stop(&mut self) -> BackendResult<()> {
        // Set before anything else: a relaunch racing with this call checks
        // the flag under the same lock.
        self.set_shutdown_requested(true);

        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let result = if running.stop_tx.send(reply_tx).await.is_ok() {
            reply_rx.await.unwrap_or(Ok(()))
        } else {
            // Supervision already ended; its process is gone
            Ok(())
        };

        if let Err(e) = running.task.await {
            warn!("Supervisor task ended abnormally: {e}");
        }

        self.current_pid.store(0, Ordering::SeqCst);
        info!("Backend stopped");
        result
    }
}

enum Wake {
    Stop(Option<StopReply>),
    Exited(std::io::Result<ExitStatus>),
}

/// State owned by the background supervision task.
struct Supervision {
    process: BackendProcess,
    plan: LaunchPlan,
    terminator: Arc<dyn ProcessTreeTerminator>,
    resilience: ResilienceSettings,
    shutdown_requested: Arc<Mutex<bool>>,
    current_pid: Arc<AtomicU32>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    stop_rx: mpsc::Receiver<StopReply>,
}

impl Supervision {
    async fn run(mut self) {
        let mut restarts: u32 = 0;

        loop {
            let wake = tokio::select! {
                biased;
                reply = self.stop_rx.recv() => Wake::Stop(reply),
                status = self.process.wait() => Wake::Exited(status),
            };

            match wake {
                Wake::Stop(reply) => {
                    // A dropped handle (None) also means stop
                    let result = self
                        .process
                        .terminate(self.terminator.as_ref(), self.resilience.shutdown_timeout())
                        .await;
                    self.current_pid.store(0, Ordering::SeqCst);
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                    return;
                }
                Wake::Exited(status) => {
                    let pid = self.process.pid();
                    self.current_pid.store(0, Ordering::SeqCst);

                    // Orphans of the crashed root must not survive into the next generation
                    if let Err(e) = self.terminator.kill_tree(pid) {
                        warn!("Failed to sweep process tree of PID {pid}: {e}");
                    }

                    if self.is_shutdown_requested() {
                        return;
                    }

                    let code = match status {
                        Ok(status) => status.code(),
                        Err(e) => {
                            warn!("Failed to read exit status of PID {pid}: {e}");
                            None
                        }
                    };
                    let uptime = (Utc::now() - self.process.started_at())
                        .to_std()
                        .unwrap_or_default();
                    warn!(
                        "Backend PID {pid} exited unexpectedly after {}s (code {code:?}), \
                         restarting in {}ms",
                        uptime.as_secs(),
                        self.resilience.restart_backoff_ms
                    );
                    if restarts > 0 && uptime >= self.resilience.stable_uptime() {
                        debug!("Backend was stable for {uptime:?}, resetting restart count");
                        restarts = 0;
                    }
                    let _ = self.events.send(LifecycleEvent::BackendExited { pid, code });

                    if let Some(max) = self.resilience.max_restarts
                        && restarts >= max
                    {
                        error!("Backend crashed {} times, giving up", restarts + 1);
                        let _ = self.events.send(LifecycleEvent::SupervisionFailed {
                            error: BackendError::MaxRestartsExceeded {
                                count: restarts + 1,
                                location: ErrorLocation::from(Location::caller()),
                            },
                        });
                        return;
                    }

                    tokio::select! {
                        biased;
                        reply = self.stop_rx.recv() => {
                            if let Some(reply) = reply {
                                let _ = reply.send(Ok(()));
                            }
                            return;
                        }
                        _ = tokio::time::sleep(self.resilience.restart_backoff()) => {}
                    }

                    let relaunched = {
                        let shutdown = self
                            .shutdown_requested
                            .lock()
                            .unwrap_or_else(|e| e.into_inner());
                        if *shutdown {
                            return;
                        }
                        BackendProcess::spawn(&self.plan)
                    };

                    match relaunched {
                        Ok(process) => {
                            restarts += 1;
                            let pid = process.pid();
                            self.current_pid.store(pid, Ordering::SeqCst);
                            self.process = process;
                            info!("Backend relaunched as PID {pid} (restart {restarts})");
                            let _ = self.events.send(LifecycleEvent::BackendRelaunched {
                                pid,
                                attempt: restarts,
                            });
                        }
                        Err(e) => {
                            // Repeating an unlaunchable command cannot succeed
                            error!("Backend relaunch failed: {e}");
                            let _ = self
                                .events
                                .send(LifecycleEvent::SupervisionFailed { error: e });
                            return;
                        }
                    }
                }
            }
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        *self
            .shutdown_requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
