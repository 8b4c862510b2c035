use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to create directory at {path}: {source} {location}")]
    DirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Configuration invalid: {message} {location}")]
    ConfigInvalid {
        message: String,
        location: ErrorLocation,
    },

    #[error("Failed to launch backend `{command}`: {source} {location}")]
    LaunchFailed {
        command: String,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("A backend process is already running (PID {pid}) {location}")]
    AlreadyRunning { pid: u32, location: ErrorLocation },

    #[error("Backend crashed {count} times, giving up {location}")]
    MaxRestartsExceeded { count: u32, location: ErrorLocation },

    #[error("Failed to terminate backend process tree (PID {pid}): {message} {location}")]
    TerminationFailed {
        pid: u32,
        message: String,
        location: ErrorLocation,
    },

    #[error("Window operation failed: {message} {location}")]
    Window {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("HTTP error: {source} {location}")]
    Http {
        #[source]
        source: reqwest::Error,
        location: ErrorLocation,
    },
}

impl BackendError {
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::LaunchFailed { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => {
                    "The Python interpreter could not be found. \
                       Make sure the bundled python folder is present next to the application, \
                       or install Python 3 and Streamlit and add them to PATH."
                }
                std::io::ErrorKind::PermissionDenied => {
                    "The Python interpreter could not be executed. \
                       Check file permissions or whether antivirus software blocked it."
                }
                _ => {
                    "The backend could not be started. \
                       Reinstall the application or check the logs for details."
                }
            },
            Self::MaxRestartsExceeded { .. } => {
                "The backend keeps crashing. \
                   Please report this issue with the diagnostic logs."
            }
            Self::AlreadyRunning { .. } => {
                "The backend is already running. Restart the application if it is unresponsive."
            }
            Self::ConfigInvalid { .. } => {
                "Configuration file has invalid settings. \
                   Check the logs for details or delete the config file to use defaults."
            }
            Self::DirCreation { .. } => {
                "Unable to create the application working directories. \
                   Check file permissions or available disk space."
            }
            Self::TerminationFailed { .. } => {
                "The backend did not shut down cleanly. \
                   Check your task manager for leftover python processes."
            }
            _ => "An unexpected error occurred. Please check the logs for details.",
        }
    }

    /// Text for the blocking error dialog.
    pub fn dialog_message(&self) -> String {
        format!("{self}\n\n{}", self.recovery_hint())
    }
}

impl From<std::io::Error> for BackendError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    #[track_caller]
    fn from(source: reqwest::Error) -> Self {
        Self::Http {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<tauri::Error> for BackendError {
    #[track_caller]
    fn from(source: tauri::Error) -> Self {
        Self::Window {
            message: source.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
