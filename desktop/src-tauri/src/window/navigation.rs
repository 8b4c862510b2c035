use tauri::Url;

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Load in the app window.
    Allow,
    /// Hand to the system browser and keep the window where it is.
    OpenExternal,
    /// Drop silently.
    Block,
}

/// Where a navigation request from the webview may go.
///
/// Only the local placeholder and the backend origin load in-app. Web links
/// leave for the system browser. Everything else is refused, including
/// backend-looking URLs before a port has been chosen.
pub fn decide_navigation(url: &Url, backend: Option<&Url>) -> NavigationDecision {
    match url.scheme() {
        "data" | "about" | "tauri" => NavigationDecision::Allow,
        "http" | "https" if backend.is_some_and(|backend| same_origin(url, backend)) => {
            NavigationDecision::Allow
        }
        "http" | "https" | "mailto" => NavigationDecision::OpenExternal,
        _ => NavigationDecision::Block,
    }
}

fn same_origin(url: &Url, backend: &Url) -> bool {
    if url.scheme() != backend.scheme()
        || url.port_or_known_default() != backend.port_or_known_default()
    {
        return false;
    }

    // localhost and 127.0.0.1 are the same server
    match (url.host_str(), backend.host_str()) {
        (Some(host), Some(expected)) => {
            host == expected
                || (LOOPBACK_HOSTS.contains(&host) && LOOPBACK_HOSTS.contains(&expected))
        }
        _ => false,
    }
}
