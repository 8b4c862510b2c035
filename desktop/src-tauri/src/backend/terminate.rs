//! Process-tree termination, one implementation per platform family.

use std::sync::Arc;

/// Stops a backend process together with everything it spawned.
pub trait ProcessTreeTerminator: Send + Sync {
    /// Ask the tree rooted at `pid` to exit.
    fn request_stop(&self, pid: u32) -> std::io::Result<()>;

    /// Forcefully kill `pid` and all of its descendants.
    fn kill_tree(&self, pid: u32) -> std::io::Result<()>;

    /// Whether `pid` still refers to a live (or unreaped) process.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Terminator for the current platform, chosen once at startup.
pub fn platform_terminator() -> Arc<dyn ProcessTreeTerminator> {
    #[cfg(unix)]
    {
        Arc::new(ProcessGroupTerminator)
    }

    #[cfg(windows)]
    {
        Arc::new(TaskkillTerminator)
    }
}

/// Signals the whole process group. The backend is started with `setsid`,
/// so its group id equals its pid and every descendant inherits it.
#[cfg(unix)]
pub struct ProcessGroupTerminator;

#[cfg(unix)]
impl ProcessGroupTerminator {
    fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> std::io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from(e)),
        }
    }
}

#[cfg(unix)]
impl ProcessTreeTerminator for ProcessGroupTerminator {
    fn request_stop(&self, pid: u32) -> std::io::Result<()> {
        Self::signal_group(pid, nix::sys::signal::Signal::SIGTERM)
    }

    fn kill_tree(&self, pid: u32) -> std::io::Result<()> {
        Self::signal_group(pid, nix::sys::signal::Signal::SIGKILL)
    }

    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 only checks existence; EPERM still means the pid exists
        matches!(kill(Pid::from_raw(pid as i32), None), Ok(()) | Err(Errno::EPERM))
    }
}

/// Windows has no group-wide terminate signal that reaches console-less
/// children, so both stop paths use `taskkill /T /F`.
#[cfg(windows)]
pub struct TaskkillTerminator;

#[cfg(windows)]
impl ProcessTreeTerminator for TaskkillTerminator {
    fn request_stop(&self, pid: u32) -> std::io::Result<()> {
        self.kill_tree(pid)
    }

    fn kill_tree(&self, pid: u32) -> std::io::Result<()> {
        use std::os::windows::process::CommandExt;

        const CREATE_NO_WINDOW: u32 = 0x0800_0000;

        let output = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .creation_flags(CREATE_NO_WINDOW)
            .output()?;

        if output.status.success() || !self.is_alive(pid) {
            Ok(())
        } else {
            Err(std::io::Error::other(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
        use windows_sys::Win32::System::Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }

            let mut exit_code: u32 = 0;
            let result = GetExitCodeProcess(handle, &mut exit_code);
            CloseHandle(handle);

            result != 0 && exit_code == STILL_ACTIVE as u32
        }
    }
}
