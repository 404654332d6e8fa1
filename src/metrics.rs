use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counters, relaxed atomics throughout. Snapshot served at
/// `/metrics`.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    connections_total: AtomicU64,
    connections_current: AtomicU64,
    frames_dropped: AtomicU64,
    broadcasts: AtomicU64,
    rooms_created: AtomicU64,
    games_started: AtomicU64,
    games_completed: AtomicU64,
    reconnections: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_current: u64,
    pub frames_dropped: u64,
    pub broadcasts: u64,
    pub rooms_created: u64,
    pub games_started: u64,
    pub games_completed: u64,
    pub reconnections: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_connections(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_current.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        // Saturating: unregister is idempotent
        let _ = self
            .connections_current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
    }

    pub fn increment_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcasts(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_completed(&self) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnections(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_current: self.connections_current.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            games_started: self.games_started.load(Ordering::Relaxed),
            games_completed: self.games_completed.load(Ordering::Relaxed),
            reconnections: self.reconnections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_connections();
        metrics.increment_rooms_created();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_current, 1);
        assert_eq!(snapshot.rooms_created, 1);
    }

    #[test]
    fn current_connections_never_underflow() {
        let metrics = ServerMetrics::new();
        metrics.decrement_connections();
        assert_eq!(metrics.snapshot().connections_current, 0);
    }
}
