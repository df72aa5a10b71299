/// Delivery accounting for the hub
///
/// Per-connection counters live next to the connection's queue; hub totals
/// are folded in once per broadcast. Both serialize for the status endpoint.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of offering one envelope to every interested connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full, envelope discarded
    Dropped,
    /// ack / pong / error written by the connection task
    ControlReply,
}

#[derive(Debug, Default)]
pub struct DeliveryCounters {
    queued: AtomicU64,
    dropped: AtomicU64,
    control_replies: AtomicU64,
}

impl DeliveryCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Queued => &self.queued,
            Delivery::Dropped => &self.dropped,
            Delivery::ControlReply => &self.control_replies,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            control_replies: self.control_replies.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySnapshot {
    pub queued: u64,
    pub dropped: u64,
    pub control_replies: u64,
}

#[derive(Debug, Default)]
pub struct HubMetrics {
    opened: AtomicU64,
    closed: AtomicU64,
    broadcasts: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_open(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, outcome: &BroadcastOutcome) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(outcome.dropped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        let opened = self.opened.load(Ordering::Relaxed);
        let closed = self.closed.load(Ordering::Relaxed);
        HubMetricsSnapshot {
            total_connections: opened,
            active_connections: opened.saturating_sub(closed),
            total_broadcasts: self.broadcasts.load(Ordering::Relaxed),
            total_messages_sent: self.delivered.load(Ordering::Relaxed),
            total_messages_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_broadcasts: u64,
    pub total_messages_sent: u64,
    pub total_messages_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_counters() {
        let counters = DeliveryCounters::new();
        counters.record(Delivery::Queued);
        counters.record(Delivery::Queued);
        counters.record(Delivery::Dropped);
        counters.record(Delivery::ControlReply);

        assert_eq!(
            counters.snapshot(),
            DeliverySnapshot {
                queued: 2,
                dropped: 1,
                control_replies: 1,
            }
        );
    }

    #[test]
    fn test_hub_totals() {
        let metrics = HubMetrics::new();
        metrics.record_open();
        metrics.record_open();
        metrics.record_close();
        metrics.record_broadcast(&BroadcastOutcome { delivered: 1, dropped: 0 });
        metrics.record_broadcast(&BroadcastOutcome { delivered: 0, dropped: 1 });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.total_broadcasts, 2);
        assert_eq!(snapshot.total_messages_sent, 1);
        assert_eq!(snapshot.total_messages_dropped, 1);
    }
}
