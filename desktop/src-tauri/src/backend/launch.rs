//! Backend launch command resolution.

use crate::backend::{BackendError, BackendResult, BackendSettings};

use std::panic::Location;
use std::path::{Path, PathBuf};

use error_location::ErrorLocation;
use tracing::info;

/// Directories the backend expects under its working directory.
const WORK_DIRS: [&str; 4] = ["data", "logs", "output", "cache"];

#[cfg(windows)]
const EMBEDDED_INTERPRETER: [&str; 2] = ["python", "python.exe"];
#[cfg(not(windows))]
const EMBEDDED_INTERPRETER: [&str; 3] = ["python", "bin", "python3"];

#[cfg(windows)]
const SYSTEM_INTERPRETER: &str = "python";
#[cfg(not(windows))]
const SYSTEM_INTERPRETER: &str = "python3";

/// Everything needed to start one backend process.
///
/// Relaunches after a crash reuse the same plan unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub command: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Builds the launch plan once the port is known.
pub type PlanFactory = Box<dyn Fn(u16) -> LaunchPlan + Send + Sync>;

impl LaunchPlan {
    pub fn new<I, S>(command: impl Into<String>, args: I, workdir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            workdir: workdir.into(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Streamlit launch line for the extraction app.
    ///
    /// The backend's own browser launch, CORS and XSRF checks are disabled:
    /// the only client is the embedded window on the same loopback origin.
    pub fn streamlit(settings: &BackendSettings, app_root: &Path, port: u16) -> Self {
        let interpreter = resolve_interpreter(settings, app_root);
        let port = port.to_string();

        let mut args = vec![
            "-m",
            settings.module.as_str(),
            "run",
            settings.entry_point.as_str(),
            "--server.port",
            port.as_str(),
            "--server.address",
            settings.host.as_str(),
            "--server.headless",
            "true",
            "--server.enableCORS",
            "false",
            "--server.enableXsrfProtection",
            "false",
            "--browser.gatherUsageStats",
            "false",
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
        args.extend(settings.extra_args.iter().cloned());

        Self::new(interpreter, args, app_root)
            .with_env("PYTHONUNBUFFERED", "1")
            .with_env("PYTHONIOENCODING", "utf-8")
            .with_env("STREAMLIT_SERVER_HEADLESS", "true")
    }

    /// Command line for logs and error messages.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pick the interpreter: explicit override, then the embedded runtime
/// shipped next to the app, then whatever is on PATH.
pub fn resolve_interpreter(settings: &BackendSettings, app_root: &Path) -> String {
    if let Some(ref interpreter) = settings.interpreter {
        return interpreter.clone();
    }

    let embedded = EMBEDDED_INTERPRETER
        .iter()
        .fold(app_root.to_path_buf(), |path, part| path.join(part));
    if embedded.is_file() {
        info!("Using embedded interpreter: {}", embedded.display());
        return embedded.to_string_lossy().into_owned();
    }

    SYSTEM_INTERPRETER.into()
}

/// The backend's working directory: configured root, else the directory
/// holding the executable (portable layout), else the current directory.
pub fn resolve_app_root(settings: &BackendSettings) -> PathBuf {
    if let Some(ref root) = settings.app_root {
        return root.clone();
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Create the working directories the backend writes into.
pub fn prepare_app_root(app_root: &Path) -> BackendResult<()> {
    for dir in WORK_DIRS {
        let path = app_root.join(dir);
        std::fs::create_dir_all(&path).map_err(|e| BackendError::DirCreation {
            path,
            source: e,
            location: ErrorLocation::from(Location::caller()),
        })?;
    }
    Ok(())
}
