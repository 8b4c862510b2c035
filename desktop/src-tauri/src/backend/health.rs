//! Readiness polling against the backend's HTTP root.

use crate::backend::BackendResult;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Outcome of a single probe. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub reachable: bool,
    pub status_code: Option<u16>,
}

impl HealthCheckResult {
    /// Nothing is listening yet, or the request failed before a response.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            status_code: None,
        }
    }

    pub fn responded(status_code: u16) -> Self {
        Self {
            reachable: true,
            status_code: Some(status_code),
        }
    }

    /// Any 2xx response counts as ready.
    pub fn is_ready(&self) -> bool {
        self.reachable && matches!(self.status_code, Some(200..=299))
    }
}

/// A single readiness request against a URL.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn check(&self, url: &str) -> HealthCheckResult;
}

/// Plain HTTP GET probe.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(1)
            .no_proxy()
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn check(&self, url: &str) -> HealthCheckResult {
        match self.client.get(url).send().await {
            Ok(resp) => HealthCheckResult::responded(resp.status().as_u16()),
            // Connection refused is the normal state while the backend boots
            Err(_) => HealthCheckResult::unreachable(),
        }
    }
}

/// Polls a probe on a fixed interval until success or timeout.
///
/// Each probe gets at most one interval to answer; a slower probe is
/// abandoned in favour of the next tick so probes never overlap.
#[derive(Clone)]
pub struct ReadinessPoller {
    probe: Arc<dyn ReadinessProbe>,
    interval: Duration,
    timeout: Duration,
}

impl ReadinessPoller {
    pub fn new(probe: Arc<dyn ReadinessProbe>, interval: Duration, timeout: Duration) -> Self {
        Self {
            probe,
            interval,
            timeout,
        }
    }

    /// Returns `true` on the first 2xx response, `false` once `timeout` has
    /// elapsed without one. Performs at most `timeout / interval + 1` probes.
    pub async fn wait_until_ready(&self, url: &str) -> bool {
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts: u32 = 0;

        loop {
            ticker.tick().await;

            if attempts > 0 && start.elapsed() >= self.timeout {
                warn!(
                    "Backend not ready after {}s ({attempts} probes)",
                    self.timeout.as_secs()
                );
                return false;
            }
            attempts += 1;

            match tokio::time::timeout(self.interval, self.probe.check(url)).await {
                Ok(result) if result.is_ready() => {
                    info!(
                        "Backend ready at {url} after {attempts} probes ({} ms)",
                        start.elapsed().as_millis()
                    );
                    return true;
                }
                Ok(result) => {
                    debug!("Probe {attempts} not ready: {result:?}");
                }
                Err(_) => {
                    debug!("Probe {attempts} abandoned after {:?}", self.interval);
                }
            }
        }
    }
}
