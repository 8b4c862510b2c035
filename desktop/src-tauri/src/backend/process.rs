//! A single running backend process and its captured output.

use crate::backend::{BackendError, BackendResult, LaunchPlan, ProcessTreeTerminator};

use std::panic::Location;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use error_location::ErrorLocation;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// The live backend child. Owned by the supervisor; dropped only after
/// termination has been confirmed (`kill_on_drop` is a last resort).
pub struct BackendProcess {
    pid: u32,
    child: Child,
    started_at: DateTime<Utc>,
    exit_status: Option<ExitStatus>,
    output_tasks: Vec<JoinHandle<()>>,
}

impl BackendProcess {
    /// Spawn the process described by `plan` and start forwarding its
    /// stdout and stderr to the diagnostic log.
    pub fn spawn(plan: &LaunchPlan) -> BackendResult<Self> {
        let mut cmd = Command::new(&plan.command);
        cmd.args(&plan.args)
            .current_dir(&plan.workdir)
            .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New session so the whole tree can be signalled through one group id
        #[cfg(unix)]
        {
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            cmd.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = cmd.spawn().map_err(|e| launch_failed(plan, e))?;

        let pid = child.id().ok_or_else(|| {
            launch_failed(
                plan,
                std::io::Error::other("process exited before its pid could be read"),
            )
        })?;

        let mut output_tasks = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            output_tasks.push(capture_output(stdout, pid, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            output_tasks.push(capture_output(stderr, pid, OutputStream::Stderr));
        }

        info!("Spawned backend PID {pid}: {}", plan.display_command());

        Ok(Self {
            pid,
            child,
            started_at: Utc::now(),
            exit_status: None,
            output_tasks,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.exit_status = Some(status);
        Ok(status)
    }

    /// Stop the process tree: polite request first, forced tree kill after
    /// `grace`. Returns once the root has been reaped.
    pub async fn terminate(
        &mut self,
        terminator: &dyn ProcessTreeTerminator,
        grace: Duration,
    ) -> BackendResult<()> {
        let pid = self.pid;

        if self.exit_status.is_none()
            && let Ok(Some(status)) = self.child.try_wait()
        {
            self.exit_status = Some(status);
        }

        if self.exit_status.is_none() {
            if let Err(e) = terminator.request_stop(pid) {
                warn!("Failed to request stop of PID {pid}: {e}");
            }

            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Backend PID {pid} exited with {status}");
                    self.exit_status = Some(status);
                }
                Ok(Err(e)) => {
                    warn!("Failed to wait for PID {pid}: {e}, killing");
                    self.force_kill(terminator).await?;
                }
                Err(_) => {
                    warn!(
                        "Backend PID {pid} did not exit within {}s, killing process tree",
                        grace.as_secs()
                    );
                    self.force_kill(terminator).await?;
                }
            }
        }

        // Descendants may outlive the root
        if let Err(e) = terminator.kill_tree(pid) {
            debug!("Process tree sweep for PID {pid}: {e}");
        }

        for task in self.output_tasks.drain(..) {
            task.abort();
        }

        Ok(())
    }

    async fn force_kill(&mut self, terminator: &dyn ProcessTreeTerminator) -> BackendResult<()> {
        let pid = self.pid;

        if let Err(e) = terminator.kill_tree(pid) {
            warn!("Tree kill of PID {pid} failed: {e}, killing root only");
            self.child
                .kill()
                .await
                .map_err(|e| BackendError::TerminationFailed {
                    pid,
                    message: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })?;
        }

        let status = self.child.wait().await?;
        info!("Backend PID {pid} killed ({status})");
        self.exit_status = Some(status);
        Ok(())
    }
}

#[track_caller]
fn launch_failed(plan: &LaunchPlan, source: std::io::Error) -> BackendError {
    BackendError::LaunchFailed {
        command: plan.display_command(),
        source,
        location: ErrorLocation::from(Location::caller()),
    }
}

/// Forward each output line to the log. Reads raw bytes so non-UTF-8
/// output never stalls the pipe.
fn capture_output<R>(reader: R, pid: u32, stream: OutputStream) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    match stream {
                        OutputStream::Stdout => info!(target: "backend", pid, "{line}"),
                        OutputStream::Stderr => warn!(target: "backend", pid, "{line}"),
                    }
                }
                Err(e) => {
                    debug!("Stopped reading {stream:?} of PID {pid}: {e}");
                    break;
                }
            }
        }
    })
}
