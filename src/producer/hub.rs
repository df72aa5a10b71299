/// Connection hub: fan-out of envelopes to WebSocket clients
///
/// Each connection owns a bounded queue. `broadcast` serializes an envelope
/// once and offers it to every interested connection without waiting; a
/// full queue drops the envelope for that connection only, so one slow
/// client never stalls the producer. A connection with no subscriptions
/// receives every topic.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::metrics::{BroadcastOutcome, Delivery, DeliveryCounters, DeliverySnapshot, HubMetrics};
use crate::logger::{self, LogTag};
use crate::stream::Envelope;

pub type ConnectionId = u64;

/// Pre-serialized envelope shared by all receivers of a broadcast
pub type Frame = Arc<str>;

struct ConnectionEntry {
    sender: mpsc::Sender<Frame>,
    topics: HashSet<String>,
    counters: Arc<DeliveryCounters>,
}

impl ConnectionEntry {
    fn wants(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.contains(topic)
    }
}

pub struct WsHub {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    next_conn_id: AtomicU64,
    metrics: Arc<HubMetrics>,
    buffer_size: usize,
}

impl WsHub {
    pub fn new(buffer_size: usize) -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            metrics: HubMetrics::new(),
            buffer_size: buffer_size.max(1),
        })
    }

    pub async fn register_connection(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.buffer_size);

        let active = {
            let mut connections = self.connections.write().await;
            connections.insert(
                conn_id,
                ConnectionEntry {
                    sender: tx,
                    topics: HashSet::new(),
                    counters: DeliveryCounters::new(),
                },
            );
            connections.len()
        };
        self.metrics.record_open();

        logger::debug(
            LogTag::Hub,
            &format!("Connection {} registered (active={})", conn_id, active),
        );

        (conn_id, rx)
    }

    pub async fn unregister_connection(&self, conn_id: ConnectionId) {
        let (removed, active) = {
            let mut connections = self.connections.write().await;
            let removed = connections.remove(&conn_id).is_some();
            (removed, connections.len())
        };

        if removed {
            self.metrics.record_close();
            logger::debug(
                LogTag::Hub,
                &format!("Connection {} unregistered (active={})", conn_id, active),
            );
        }
    }

    /// Add `topic` to the connection's filter; false for unknown connections
    pub async fn subscribe(&self, conn_id: ConnectionId, topic: &str) -> bool {
        match self.connections.write().await.get_mut(&conn_id) {
            Some(entry) => {
                entry.topics.insert(topic.to_string());
                true
            }
            None => false,
        }
    }

    /// Remove `topic` from the connection's filter; an emptied filter means "everything" again
    pub async fn unsubscribe(&self, conn_id: ConnectionId, topic: &str) -> bool {
        match self.connections.write().await.get_mut(&conn_id) {
            Some(entry) => entry.topics.remove(topic),
            None => false,
        }
    }

    pub async fn topics_for(&self, conn_id: ConnectionId) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut topics: Vec<String> = connections
            .get(&conn_id)
            .map(|entry| entry.topics.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();

        let connections = self.connections.read().await;
        if connections.is_empty() {
            return outcome;
        }

        let frame: Frame = match envelope.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                logger::error(
                    LogTag::Hub,
                    &format!("Failed to serialize '{}' envelope: {}", envelope.topic, e),
                );
                return outcome;
            }
        };

        for (conn_id, entry) in connections.iter() {
            if !entry.wants(&envelope.topic) {
                continue;
            }

            match entry.sender.try_send(frame.clone()) {
                Ok(()) => {
                    outcome.delivered += 1;
                    entry.counters.record(Delivery::Queued);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    outcome.dropped += 1;
                    entry.counters.record(Delivery::Dropped);
                    logger::debug(
                        LogTag::Hub,
                        &format!(
                            "Dropped '{}' for connection {} (queue full)",
                            envelope.topic, conn_id
                        ),
                    );
                }
                // Receiver gone; the connection task unregisters itself
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    outcome.dropped += 1;
                }
            }
        }

        self.metrics.record_broadcast(&outcome);

        if outcome.delivered > 0 || outcome.dropped > 0 {
            logger::verbose(
                LogTag::Hub,
                &format!(
                    "Broadcast '{}' (delivered={}, dropped={})",
                    envelope.topic, outcome.delivered, outcome.dropped
                ),
            );
        }

        outcome
    }

    pub(crate) async fn delivery_counters(&self, conn_id: ConnectionId) -> Option<Arc<DeliveryCounters>> {
        self.connections
            .read()
            .await
            .get(&conn_id)
            .map(|entry| entry.counters.clone())
    }

    pub async fn connection_snapshots(&self) -> Vec<(ConnectionId, DeliverySnapshot)> {
        let connections = self.connections.read().await;
        let mut snapshots: Vec<_> = connections
            .iter()
            .map(|(id, entry)| (*id, entry.counters.snapshot()))
            .collect();
        snapshots.sort_by_key(|(id, _)| *id);
        snapshots
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        self.metrics.clone()
    }

    pub async fn active_connections(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_hub_registration() {
        let hub = WsHub::new(10);

        let (conn_id1, _rx1) = hub.register_connection().await;
        let (conn_id2, _rx2) = hub.register_connection().await;

        assert_eq!(hub.active_connections().await, 2);
        assert_ne!(conn_id1, conn_id2);

        hub.unregister_connection(conn_id1).await;
        hub.unregister_connection(conn_id1).await;
        assert_eq!(hub.active_connections().await, 1);

        let snapshot = hub.metrics().snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
    }

    #[tokio::test]
    async fn test_broadcast_respects_topic_filters() {
        let hub = WsHub::new(10);
        let (everything, mut rx_all) = hub.register_connection().await;
        let (filtered, mut rx_events) = hub.register_connection().await;
        assert!(hub.subscribe(filtered, "events").await);
        assert!(!hub.subscribe(999, "events").await);

        let outcome = hub
            .broadcast(&Envelope::new("metrics", json!({"cpu": 42.0})))
            .await;
        assert_eq!(outcome, BroadcastOutcome { delivered: 1, dropped: 0 });

        hub.broadcast(&Envelope::new("events", json!({"events": []}))).await;

        let first = rx_all.recv().await.unwrap();
        assert_eq!(Envelope::decode(&first).unwrap().topic, "metrics");
        let second = rx_all.recv().await.unwrap();
        assert_eq!(Envelope::decode(&second).unwrap().topic, "events");

        let only = rx_events.recv().await.unwrap();
        assert_eq!(Envelope::decode(&only).unwrap().topic, "events");
        assert!(rx_events.try_recv().is_err());

        assert_eq!(hub.topics_for(filtered).await, vec!["events".to_string()]);
        assert!(hub.unsubscribe(filtered, "events").await);
        assert!(hub.topics_for(filtered).await.is_empty());
        assert!(hub.topics_for(everything).await.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_for_that_connection_only() {
        let hub = WsHub::new(1);
        let (slow, _rx_slow) = hub.register_connection().await;
        let (_fast, mut rx_fast) = hub.register_connection().await;

        let envelope = Envelope::new("metrics", json!({}));
        let first = hub.broadcast(&envelope).await;
        assert_eq!(first.delivered, 2);

        rx_fast.recv().await.unwrap();
        let second = hub.broadcast(&envelope).await;
        assert_eq!(second, BroadcastOutcome { delivered: 1, dropped: 1 });

        let slow_metrics = hub.delivery_counters(slow).await.unwrap().snapshot();
        assert_eq!(slow_metrics.queued, 1);
        assert_eq!(slow_metrics.dropped, 1);
        assert_eq!(hub.metrics().snapshot().total_messages_dropped, 1);
        assert_eq!(hub.metrics().snapshot().total_messages_sent, 3);
        assert_eq!(hub.metrics().snapshot().total_broadcasts, 2);
        assert_eq!(hub.connection_snapshots().await.len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_without_connections_is_noop() {
        let hub = WsHub::new(4);
        let outcome = hub.broadcast(&Envelope::new("alerts", json!([]))).await;
        assert_eq!(outcome, BroadcastOutcome::default());
        assert_eq!(hub.metrics().snapshot().total_broadcasts, 0);
    }
}
