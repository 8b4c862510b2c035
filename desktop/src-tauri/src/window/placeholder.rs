use crate::backend::{BackendError, BackendResult};

use std::panic::Location;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use error_location::ErrorLocation;
use tauri::Url;

/// Loading page shown until the backend answers.
pub const PLACEHOLDER_HTML: &str = include_str!("../../../dist/index.html");

/// Self-contained `data:` URL for [`PLACEHOLDER_HTML`], so the page never
/// depends on the backend or the asset protocol.
pub fn placeholder_url() -> BackendResult<Url> {
    let encoded = STANDARD.encode(PLACEHOLDER_HTML);
    Url::parse(&format!("data:text/html;base64,{encoded}")).map_err(|e| BackendError::Window {
        message: format!("Invalid placeholder URL: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
