use crate::backend::config::{
    default_base_port, default_entry_point, default_host, default_module, default_port_attempts,
};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Interpreter override; discovered from the app root when absent
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Python module that serves the app
    #[serde(default = "default_module")]
    pub module: String,

    /// Entry script, relative to the app root
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Working directory override; the executable's directory when absent
    #[serde(default)]
    pub app_root: Option<PathBuf>,

    /// Loopback host the backend binds to and the window loads from
    #[serde(default = "default_host")]
    pub host: String,

    /// Preferred port
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Number of consecutive ports probed from `base_port`
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,

    /// Appended verbatim after the generated arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            interpreter: None,
            module: default_module(),
            entry_point: default_entry_point(),
            app_root: None,
            host: default_host(),
            base_port: default_base_port(),
            port_attempts: default_port_attempts(),
            extra_args: Vec::new(),
        }
    }
}
