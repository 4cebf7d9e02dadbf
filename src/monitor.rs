//! Connection Health Monitor - polled liveness detection.
//!
//! The transport does not reliably surface disconnection as an event, so the
//! client infers liveness by periodically issuing a cheap status query
//! against the daemon. One daemon-internal authentication error is known to
//! show up during normal operation; it is allowlisted and never treated as a
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::bus::BusProxy;

/// Error-body marker for the benign daemon-internal authentication failure.
/// Matched as a substring; the daemon does not expose a structured code for
/// it.
pub const BENIGN_PROBE_ERROR: &str = "AuthorizationFailedException";

/// Outcome of one liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// Probe succeeded.
    Healthy,
    /// Probe failed with the allowlisted daemon error; not a disconnect.
    Benign(String),
    /// Probe failed; the session is gone.
    Failed(String),
}

/// Whether an error body matches the benign allowlist.
pub fn is_benign(body: &str) -> bool {
    body.contains(BENIGN_PROBE_ERROR)
}

/// Periodic liveness probe against the daemon proxy.
pub struct HealthMonitor {
    interval: Interval,
    proxy: Arc<dyn BusProxy>,
}

impl HealthMonitor {
    /// Create a monitor probing every `check_interval_ms` milliseconds. The
    /// first probe fires one full period after creation, not immediately.
    pub fn new(check_interval_ms: u64, proxy: Arc<dyn BusProxy>) -> Self {
        let period = Duration::from_millis(check_interval_ms);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, proxy }
    }

    /// Wait for the next probe instant, run the probe, classify the outcome.
    pub async fn tick(&mut self) -> Liveness {
        self.interval.tick().await;
        match self.proxy.get_registration_status().await {
            Ok(()) => Liveness::Healthy,
            Err(e) => {
                let body = e.to_string();
                if is_benign(&body) {
                    Liveness::Benign(body)
                } else {
                    Liveness::Failed(body)
                }
            }
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("period", &self.interval.period())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;

    #[test]
    fn test_is_benign_substring_match() {
        assert!(is_benign(
            "org.asamk.Signal.Error.Failure: AuthorizationFailedException: invalid quote"
        ));
        assert!(!is_benign("org.freedesktop.DBus.Error.NoReply"));
        assert!(!is_benign(""));
    }

    #[tokio::test]
    async fn test_tick_healthy() {
        let bus = MockBus::new();
        let mut monitor = HealthMonitor::new(5, bus.proxy());
        assert_eq!(monitor.tick().await, Liveness::Healthy);
        assert_eq!(bus.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_classifies_benign() {
        let bus = MockBus::new();
        bus.fail_next_probe(format!("daemon said: {}", BENIGN_PROBE_ERROR));
        let mut monitor = HealthMonitor::new(5, bus.proxy());
        assert!(matches!(monitor.tick().await, Liveness::Benign(_)));
        // The monitor itself keeps ticking after a benign failure.
        assert_eq!(monitor.tick().await, Liveness::Healthy);
    }

    #[tokio::test]
    async fn test_tick_classifies_failure() {
        let bus = MockBus::new();
        bus.fail_next_probe("org.freedesktop.DBus.Error.ServiceUnknown");
        let mut monitor = HealthMonitor::new(5, bus.proxy());
        let liveness = monitor.tick().await;
        assert!(matches!(liveness, Liveness::Failed(body) if body.contains("ServiceUnknown")));
    }

    #[tokio::test]
    async fn test_first_probe_waits_one_period() {
        let bus = MockBus::new();
        let mut monitor = HealthMonitor::new(30, bus.proxy());
        let start = std::time::Instant::now();
        monitor.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
