use serde::Serialize;

/// Snapshot of the shell reported to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellStatus {
    pub state: String,
    pub port: Option<u16>,
    pub backend_url: Option<String>,
    pub is_ready: bool,
    pub version: String,
}
