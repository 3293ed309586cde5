//! Readiness polling for a freshly launched workbench.
//!
//! ```text
//!            probe fails / refused
//!          ┌──────────────────────┐
//!          ▼                      │
//!     ┌─────────┐  wait interval  │
//!     │ Unknown │─────────────────┘
//!     └─────────┘
//!          │ probe answers <OK>
//!          ▼
//!     ┌─────────┐
//!     │  Ready  │  (terminal)
//!     └─────────┘
//! ```
//!
//! The whole loop is bounded by [`HealthPolicy::timeout`]; a single probe
//! never outlives the remaining budget.

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, trace};

use crate::client::protocol::{Reply, PROBE_COMMAND};
use crate::client::transport::TcpTransport;
use crate::config::LaunchConfig;

/// Outcome of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// The engine has not answered a probe yet.
    Unknown,
    /// The engine answered the probe with the success token.
    Ready,
}

impl HealthState {
    /// Returns `true` for [`HealthState::Ready`].
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Timing of the readiness loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Overall bound on the check.
    pub timeout: Duration,
    /// Delay between two probes.
    pub interval: Duration,
    /// Pause after the first successful probe.
    pub settle: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(2),
            settle: Duration::from_secs(3),
        }
    }
}

impl From<&LaunchConfig> for HealthPolicy {
    fn from(config: &LaunchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.health_timeout_secs),
            interval: Duration::from_millis(config.poll_interval_ms),
            settle: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Polls the engine until it answers the probe or the policy times out.
///
/// Refused connections and unexpected replies are swallowed; they only mean
/// "not yet".
pub async fn wait_until_ready(transport: &TcpTransport, policy: &HealthPolicy) -> HealthState {
    let started = Instant::now();
    // `None` when the timeout reaches past what `Instant` can represent.
    let deadline = started.checked_add(policy.timeout);
    let remaining =
        || deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()));
    let mut attempt: u32 = 1;

    debug!(address = %transport.address(), "Testing the connection with the workbench");

    loop {
        if attempt > 1 {
            sleep(policy.interval.min(remaining())).await;
        }

        let budget = remaining();
        if budget.is_zero() {
            break;
        }

        if probe(transport, budget, attempt).await {
            sleep(policy.settle).await;
            debug!(
                elapsed_ms = started.elapsed().as_millis(),
                attempts = attempt,
                "Connection with the workbench established"
            );
            return HealthState::Ready;
        }

        attempt += 1;
    }

    error!(
        address = %transport.address(),
        attempts = attempt,
        "Cannot establish a connection with the workbench"
    );
    HealthState::Unknown
}

async fn probe(transport: &TcpTransport, budget: Duration, attempt: u32) -> bool {
    match timeout(budget, transport.exchange(PROBE_COMMAND)).await {
        Ok(Ok(reply)) => {
            let ready = Reply::classify(&reply).is_ok();
            trace!(attempt, ready, reply = %reply, "Probe answered");
            ready
        }
        Ok(Err(e)) => {
            trace!(attempt, error = %e, "Probe failed");
            false
        }
        Err(_) => {
            trace!(attempt, "Probe ran out of time");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_launch_config() {
        let config = LaunchConfig::default();
        let policy = HealthPolicy::from(&config);
        assert_eq!(policy.timeout, Duration::from_secs(180));
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.settle, Duration::from_secs(3));
    }

    #[test]
    fn ready_is_ready() {
        assert!(HealthState::Ready.is_ready());
        assert!(!HealthState::Unknown.is_ready());
    }

    #[tokio::test]
    async fn zero_timeout_never_probes() {
        let policy = HealthPolicy {
            timeout: Duration::ZERO,
            interval: Duration::from_millis(10),
            settle: Duration::ZERO,
        };
        let transport = TcpTransport::new("127.0.0.1", 9);
        assert_eq!(wait_until_ready(&transport, &policy).await, HealthState::Unknown);
    }

    #[tokio::test]
    async fn unbounded_timeout_still_polls() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"<OK>").await.unwrap();
        });

        let config = LaunchConfig {
            health_timeout_secs: u64::MAX,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            ..LaunchConfig::default()
        };
        let transport = TcpTransport::new("127.0.0.1", port);
        let state = wait_until_ready(&transport, &HealthPolicy::from(&config)).await;
        assert_eq!(state, HealthState::Ready);
    }
}
