use crate::backend::config::{default_window_height, default_window_title, default_window_width};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_window_title")]
    pub title: String,

    #[serde(default = "default_window_width")]
    pub width: f64,

    #[serde(default = "default_window_height")]
    pub height: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: default_window_title(),
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}
