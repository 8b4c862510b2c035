//! Lifecycle state machine tests with scripted collaborators.

use crate::backend::{
    BackendError, BackendResult, BackendSupervisor, HealthCheckResult, LifecycleCoordinator,
    LifecycleEvent, LifecycleState, ReadinessProbe, ShellConfig, backend_url,
};
use crate::tests::unused_port;
use crate::window::WindowController;

use std::io;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use error_location::ErrorLocation;
use googletest::prelude::*;
use tauri::Url;
use tokio::sync::mpsc;

const FAKE_PID: u32 = 4242;

/// Shared, ordered record of calls made on a fake.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.all()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

struct FakeSupervisor {
    calls: Calls,
    fail_start: bool,
}

#[async_trait]
impl BackendSupervisor for FakeSupervisor {
    async fn start(
        &mut self,
        port: u16,
        _events: mpsc::UnboundedSender<LifecycleEvent>,
    ) -> BackendResult<u32> {
        self.calls.push(format!("start:{port}"));
        if self.fail_start {
            return Err(BackendError::LaunchFailed {
                command: "python3 -m streamlit run main.py".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(FAKE_PID)
    }

    async fn stop(&mut self) -> BackendResult<()> {
        self.calls.push("stop");
        Ok(())
    }
}

struct FakeWindow {
    calls: Calls,
}

#[async_trait]
impl WindowController for FakeWindow {
    fn show_placeholder(&mut self) -> BackendResult<()> {
        self.calls.push("placeholder");
        Ok(())
    }

    fn show_live_app(&mut self, url: &Url) -> BackendResult<()> {
        self.calls.push(format!("live:{url}"));
        Ok(())
    }

    async fn show_fatal_error(&mut self, message: &str) {
        self.calls.push(format!("fatal:{message}"));
    }
}

/// Reports ready once `ready` is set.
#[derive(Default)]
struct SwitchProbe {
    ready: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl ReadinessProbe for SwitchProbe {
    async fn check(&self, _url: &str) -> HealthCheckResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.ready.load(Ordering::SeqCst) {
            HealthCheckResult::responded(200)
        } else {
            HealthCheckResult::unreachable()
        }
    }
}

struct Harness {
    coordinator: LifecycleCoordinator<FakeSupervisor, FakeWindow>,
    supervisor: Calls,
    window: Calls,
    probe: Arc<SwitchProbe>,
    port: u16,
}

fn harness(ready: bool, fail_start: bool) -> Harness {
    let port = unused_port();
    let mut config = ShellConfig::default();
    config.backend.base_port = port;

    let supervisor = Calls::default();
    let window = Calls::default();
    let probe = Arc::new(SwitchProbe::default());
    probe.ready.store(ready, Ordering::SeqCst);

    let coordinator = LifecycleCoordinator::new(
        &config,
        FakeSupervisor {
            calls: supervisor.clone(),
            fail_start,
        },
        FakeWindow {
            calls: window.clone(),
        },
        probe.clone(),
    );

    Harness {
        coordinator,
        supervisor,
        window,
        probe,
        port,
    }
}

impl Harness {
    /// Pull the next queued event and feed it back into the machine.
    async fn step(&mut self) {
        let event = self.coordinator.next_event().await.unwrap();
        self.coordinator.handle_event(event).await;
    }

    fn live_url(&self) -> String {
        format!("live:http://localhost:{}/", self.port)
    }
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test(start_paused = true)]
async fn given_healthy_backend_when_started_then_placeholder_before_live_app() {
    // Given
    let mut h = harness(true, false);

    // When
    h.coordinator.start().await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::WaitingReady));
    assert_that!(h.supervisor.all(), elements_are![eq(&format!("start:{}", h.port))]);
    assert_that!(h.window.all(), elements_are![eq("placeholder")]);

    h.step().await;

    assert_that!(h.coordinator.state(), eq(LifecycleState::Ready));
    assert_that!(h.window.all(), elements_are![eq("placeholder"), eq(&h.live_url())]);
}

#[tokio::test(start_paused = true)]
async fn given_started_coordinator_then_handle_reports_state_and_backend_url() {
    let mut h = harness(true, false);
    let handle = h.coordinator.handle();
    assert_that!(handle.state(), eq(LifecycleState::Idle));
    assert_that!(handle.backend_url(), none());

    h.coordinator.start().await;

    assert_that!(handle.state(), eq(LifecycleState::WaitingReady));
    assert_that!(handle.backend_url().and_then(|url| url.port()), some(eq(h.port)));
}

#[tokio::test(start_paused = true)]
async fn given_backend_never_ready_when_waiting_then_keeps_placeholder() {
    // Given
    let mut h = harness(false, false);
    h.coordinator.start().await;

    // When
    h.step().await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::WaitingReady));
    assert_that!(h.window.count("live:"), eq(0));
    assert_that!(h.probe.calls.load(Ordering::SeqCst), le(61));
}

#[tokio::test(start_paused = true)]
async fn given_launch_failure_when_started_then_fatal_dialog_and_stopped() {
    // Given
    let mut h = harness(true, true);

    // When
    h.coordinator.start().await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::Stopped));
    assert_that!(h.supervisor.count("stop"), eq(1));
    assert_that!(h.window.count("placeholder"), eq(0));
    let fatal = h.window.all().pop().unwrap();
    assert_that!(fatal, starts_with("fatal:Failed to launch backend"));
    assert_that!(fatal, contains_substring("Python interpreter could not be found"));
}

#[tokio::test(start_paused = true)]
async fn given_launch_failure_when_run_then_exit_code_is_nonzero() {
    let h = harness(true, true);

    let code = h.coordinator.run().await;

    assert_that!(code, eq(1));
}

// =========================================================================
// Crash Restart
// =========================================================================

#[tokio::test(start_paused = true)]
async fn given_ready_backend_when_it_crashes_and_relaunches_then_waits_again_before_live() {
    // Given
    let mut h = harness(true, false);
    h.coordinator.start().await;
    h.step().await;
    assert_that!(h.coordinator.state(), eq(LifecycleState::Ready));

    // When
    h.coordinator
        .handle_event(LifecycleEvent::BackendExited {
            pid: FAKE_PID,
            code: Some(1),
        })
        .await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::Restarting));

    h.coordinator
        .handle_event(LifecycleEvent::BackendRelaunched {
            pid: FAKE_PID + 1,
            attempt: 1,
        })
        .await;
    assert_that!(h.coordinator.state(), eq(LifecycleState::WaitingReady));
    assert_that!(h.window.count("placeholder"), eq(2));

    h.step().await;
    assert_that!(h.coordinator.state(), eq(LifecycleState::Ready));
    assert_that!(h.window.count("live:"), eq(2));
    assert_that!(h.supervisor.count("start"), eq(1));
}

#[tokio::test(start_paused = true)]
async fn given_crash_while_waiting_ready_then_pending_wait_is_discarded() {
    // Given
    let mut h = harness(false, false);
    h.coordinator.start().await;

    // When
    h.coordinator
        .handle_event(LifecycleEvent::BackendExited {
            pid: FAKE_PID,
            code: None,
        })
        .await;
    h.probe.ready.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::Restarting));
    assert_that!(h.window.count("live:"), eq(0));
}

#[tokio::test(start_paused = true)]
async fn given_supervision_failure_when_ready_then_fatal_dialog_and_stopped() {
    // Given
    let mut h = harness(true, false);
    h.coordinator.start().await;
    h.step().await;

    // When
    h.coordinator
        .handle_event(LifecycleEvent::SupervisionFailed {
            error: BackendError::MaxRestartsExceeded {
                count: 6,
                location: ErrorLocation::from(Location::caller()),
            },
        })
        .await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::Stopped));
    assert_that!(h.supervisor.count("stop"), eq(1));
    assert_that!(h.window.count("fatal:Backend crashed 6 times"), eq(1));
}

// =========================================================================
// Readiness Ordering
// =========================================================================

#[tokio::test(start_paused = true)]
async fn given_stale_readiness_result_when_handled_then_ignored() {
    // Given
    let mut h = harness(false, false);
    h.coordinator.start().await;
    // Reopening restarts the wait, so generation 1 is now stale
    h.coordinator.handle_event(LifecycleEvent::WindowReopened).await;

    // When
    h.coordinator
        .handle_event(LifecycleEvent::ReadinessResolved {
            generation: 1,
            ready: true,
        })
        .await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::WaitingReady));
    assert_that!(h.window.count("live:"), eq(0));
}

#[tokio::test(start_paused = true)]
async fn given_window_reopened_when_ready_then_reloads_without_relaunching() {
    // Given
    let mut h = harness(true, false);
    h.coordinator.start().await;
    h.step().await;

    // When
    h.coordinator.handle_event(LifecycleEvent::WindowReopened).await;
    h.step().await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::Ready));
    assert_that!(h.supervisor.count("start"), eq(1));
    assert_that!(h.window.count("placeholder"), eq(2));
    assert_that!(h.window.count("live:"), eq(2));
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn given_pending_readiness_when_shutdown_requested_then_never_goes_live() {
    // Given
    let mut h = harness(false, false);
    h.coordinator.start().await;

    // When
    h.coordinator.handle_event(LifecycleEvent::ShutdownRequested).await;
    h.probe.ready.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    h.coordinator
        .handle_event(LifecycleEvent::ReadinessResolved {
            generation: 1,
            ready: true,
        })
        .await;

    // Then
    assert_that!(h.coordinator.state(), eq(LifecycleState::Stopped));
    assert_that!(h.supervisor.count("stop"), eq(1));
    assert_that!(h.window.count("live:"), eq(0));
}

#[tokio::test(start_paused = true)]
async fn given_stopped_coordinator_when_shutdown_requested_again_then_no_second_stop() {
    let mut h = harness(true, false);
    h.coordinator.start().await;

    h.coordinator.handle_event(LifecycleEvent::ShutdownRequested).await;
    h.coordinator.handle_event(LifecycleEvent::ShutdownRequested).await;

    assert_that!(h.coordinator.state(), eq(LifecycleState::Stopped));
    assert_that!(h.supervisor.count("stop"), eq(1));
}

#[tokio::test(start_paused = true)]
async fn given_crash_after_shutdown_when_handled_then_ignored() {
    let mut h = harness(true, false);
    h.coordinator.start().await;
    h.coordinator.handle_event(LifecycleEvent::ShutdownRequested).await;

    h.coordinator
        .handle_event(LifecycleEvent::BackendExited {
            pid: FAKE_PID,
            code: Some(-1),
        })
        .await;

    assert_that!(h.coordinator.state(), eq(LifecycleState::Stopped));
}

#[tokio::test(start_paused = true)]
async fn given_running_coordinator_when_quit_via_handle_then_run_returns_zero() {
    // Given
    let h = harness(true, false);
    let handle = h.coordinator.handle();
    let mut state = handle.subscribe();
    let run = tokio::spawn(h.coordinator.run());
    state
        .wait_for(|state| *state == LifecycleState::Ready)
        .await
        .unwrap();

    // When
    handle.request_shutdown();
    handle.wait_until_stopped().await;

    // Then
    assert_that!(run.await.unwrap(), eq(0));
    assert_that!(h.supervisor.count("stop"), eq(1));
    assert_that!(handle.state(), eq(LifecycleState::Stopped));
}

// =========================================================================
// Backend URL
// =========================================================================

#[test]
fn given_hosts_when_backend_url_then_root_of_origin() {
    assert_that!(
        backend_url("localhost", 8501).unwrap().as_str(),
        eq("http://localhost:8501/")
    );
    assert_that!(
        backend_url("127.0.0.1", 8600).unwrap().as_str(),
        eq("http://127.0.0.1:8600/")
    );
    assert_that!(
        backend_url("::1", 8501).unwrap().as_str(),
        eq("http://[::1]:8501/")
    );
}
