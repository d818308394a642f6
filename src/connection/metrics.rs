//! Counters describing connection recovery activity

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Live counters shared by the manager and the publish gate
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    reconnect_episodes: AtomicU64,
    failed_attempts: AtomicU64,
    successful_recoveries: AtomicU64,
    exhausted_episodes: AtomicU64,
    publish_retries: AtomicU64,
    active_reconnections: AtomicUsize,
    peak_active_reconnections: AtomicUsize,
}

/// Point-in-time copy of [`ConnectionMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Reconnection episodes started
    pub reconnect_episodes: u64,
    /// Connect attempts that failed inside an episode
    pub failed_attempts: u64,
    /// Episodes that ended Connected
    pub successful_recoveries: u64,
    /// Episodes that ran out of attempts
    pub exhausted_episodes: u64,
    /// Publishes retried after a transport failure
    pub publish_retries: u64,
    /// Reconnection loops running right now
    pub active_reconnections: usize,
    /// Most reconnection loops ever observed running at once
    pub peak_active_reconnections: usize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a reconnection loop as running until the guard is dropped
    pub fn enter_reconnection(self: &Arc<Self>) -> ReconnectionGuard {
        self.reconnect_episodes.fetch_add(1, Ordering::Relaxed);
        let active = self.active_reconnections.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_active_reconnections
            .fetch_max(active, Ordering::AcqRel);
        ReconnectionGuard {
            metrics: self.clone(),
        }
    }

    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery(&self) {
        self.successful_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted_episodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_retry(&self) {
        self.publish_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reconnect_episodes: self.reconnect_episodes.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            successful_recoveries: self.successful_recoveries.load(Ordering::Relaxed),
            exhausted_episodes: self.exhausted_episodes.load(Ordering::Relaxed),
            publish_retries: self.publish_retries.load(Ordering::Relaxed),
            active_reconnections: self.active_reconnections.load(Ordering::Acquire),
            peak_active_reconnections: self.peak_active_reconnections.load(Ordering::Acquire),
        }
    }
}

/// Decrements the active reconnection count on drop
#[derive(Debug)]
pub struct ReconnectionGuard {
    metrics: Arc<ConnectionMetrics>,
}

impl Drop for ReconnectionGuard {
    fn drop(&mut self) {
        self.metrics
            .active_reconnections
            .fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_active_and_peak() {
        let metrics = Arc::new(ConnectionMetrics::new());

        let first = metrics.enter_reconnection();
        let second = metrics.enter_reconnection();
        assert_eq!(metrics.snapshot().active_reconnections, 2);

        drop(first);
        drop(second);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_reconnections, 0);
        assert_eq!(snapshot.peak_active_reconnections, 2);
        assert_eq!(snapshot.reconnect_episodes, 2);
    }

    #[test]
    fn test_counters() {
        let metrics = ConnectionMetrics::new();
        metrics.record_failed_attempt();
        metrics.record_failed_attempt();
        metrics.record_recovery();
        metrics.record_exhausted();
        metrics.record_publish_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed_attempts, 2);
        assert_eq!(snapshot.successful_recoveries, 1);
        assert_eq!(snapshot.exhausted_episodes, 1);
        assert_eq!(snapshot.publish_retries, 1);
        assert_eq!(snapshot.reconnect_episodes, 0);
    }
}
