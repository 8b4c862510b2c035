//! Port allocation and availability checking.

use tracing::{debug, warn};

const HOST: &str = "127.0.0.1";

pub struct PortManager;

impl PortManager {
    /// Find a free port at or after `base_port`.
    ///
    /// Probes `base_port`, `base_port + 1`, ... for at most `max_attempts`
    /// candidates and returns the first one that can be bound. When none is
    /// free the base port is returned as-is, so the backend's own bind may
    /// still fail downstream.
    pub fn allocate(base_port: u16, max_attempts: u16) -> u16 {
        for offset in 0..max_attempts {
            let Some(port) = base_port.checked_add(offset) else {
                break;
            };

            if Self::is_available(port) {
                if offset > 0 {
                    debug!("Port {base_port} busy, using {port}");
                }
                return port;
            }
        }

        warn!("No free port in {max_attempts} attempts from {base_port}, using it anyway");
        base_port
    }

    /// Check if a port is available for binding.
    ///
    /// The listener is dropped immediately, releasing the port.
    pub fn is_available(port: u16) -> bool {
        std::net::TcpListener::bind((HOST, port)).is_ok()
    }
}
