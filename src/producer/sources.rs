/// Periodic collection loops
///
/// The metrics loop probes the cluster, broadcasts `metrics`, derives
/// alerts from the reading plus the current events and broadcasts `alerts`
/// when there are any. The events loop broadcasts `events` on its own,
/// slower cadence. Both fire first after one full period.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::alerts::{derive_alerts, AlertThresholds};
use super::collector::ClusterProbe;
use super::hub::WsHub;
use super::state::SnapshotStore;
use crate::logger::{self, LogTag};
use crate::stream::{Envelope, Topic};
use crate::types::{timestamp_now, Alert, EventsPayload, KubernetesEvent, MetricsPayload};

pub struct Collector {
    probe: Arc<dyn ClusterProbe>,
    hub: Arc<WsHub>,
    snapshots: Arc<SnapshotStore>,
    thresholds: AlertThresholds,
}

impl Collector {
    pub fn new(
        probe: Arc<dyn ClusterProbe>,
        hub: Arc<WsHub>,
        snapshots: Arc<SnapshotStore>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            probe,
            hub,
            snapshots,
            thresholds,
        }
    }

    async fn publish<T: serde::Serialize>(&self, topic: Topic, payload: &T) {
        match Envelope::from_payload(topic, payload) {
            Ok(envelope) => {
                self.hub.broadcast(&envelope).await;
            }
            Err(e) => logger::error(
                LogTag::Producer,
                &format!("Failed to encode '{}' payload: {}", topic, e),
            ),
        }
    }

    /// One metrics round; returns the alerts it raised
    pub async fn metrics_round(&self) -> Vec<Alert> {
        let payload = MetricsPayload {
            timestamp: timestamp_now(),
            metrics: self.probe.collect_metrics().await,
        };
        self.publish(Topic::Metrics, &payload).await;
        self.snapshots.store_metrics(payload.clone());

        let events = self.probe.collect_events().await;
        let alerts = derive_alerts(&payload.metrics, &events, &self.thresholds);
        self.snapshots.store_alerts(alerts.clone());

        if !alerts.is_empty() {
            logger::info(
                LogTag::Producer,
                &format!("Raised {} alert(s) (cpu={:.1}%, memory={:.1}%)", alerts.len(), payload.metrics.cpu, payload.metrics.memory),
            );
            self.publish(Topic::Alerts, &alerts).await;
        }

        alerts
    }

    pub async fn events_round(&self) -> Vec<KubernetesEvent> {
        let payload = EventsPayload {
            timestamp: timestamp_now(),
            events: self.probe.collect_events().await,
        };
        self.publish(Topic::Events, &payload).await;
        self.snapshots.store_events(payload.events.clone());

        logger::verbose(
            LogTag::Producer,
            &format!("Events round published {} event(s)", payload.events.len()),
        );

        payload.events
    }
}

async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut round: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let period = period.max(Duration::from_millis(10));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    logger::debug(
        LogTag::Producer,
        &format!("{} loop started (every {:?})", name, period),
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => {
                if shutdown.has_changed().is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => round().await,
        }
    }

    logger::debug(LogTag::Producer, &format!("{} loop stopped", name));
}

/// Spawn both loops; they stop when `shutdown` turns true or its sender drops
pub fn spawn_sources(
    collector: Arc<Collector>,
    metrics_period: Duration,
    events_period: Duration,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let metrics_collector = collector.clone();
    let metrics_task = tokio::spawn(run_periodic(
        "Metrics",
        metrics_period,
        shutdown.clone(),
        move || {
            let collector = metrics_collector.clone();
            async move {
                collector.metrics_round().await;
            }
        },
    ));

    let events_task = tokio::spawn(run_periodic(
        "Events",
        events_period,
        shutdown,
        move || {
            let collector = collector.clone();
            async move {
                collector.events_round().await;
            }
        },
    ));

    vec![metrics_task, events_task]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterMetrics, EventSource, InvolvedObject};
    use async_trait::async_trait;

    struct FixedProbe {
        metrics: ClusterMetrics,
        events: Vec<KubernetesEvent>,
    }

    #[async_trait]
    impl ClusterProbe for FixedProbe {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn collect_metrics(&self) -> ClusterMetrics {
            self.metrics
        }

        async fn collect_events(&self) -> Vec<KubernetesEvent> {
            self.events.clone()
        }
    }

    fn node_event() -> KubernetesEvent {
        KubernetesEvent {
            event_type: "Warning".to_string(),
            reason: "NodeNotReady".to_string(),
            message: "Node node-2 status is now: NodeNotReady".to_string(),
            source: EventSource {
                component: "kubelet".to_string(),
                host: "localhost".to_string(),
            },
            involved_object: InvolvedObject {
                kind: "Node".to_string(),
                name: "node-2".to_string(),
                namespace: None,
            },
            last_timestamp: "2024-05-01T08:00:00.000Z".to_string(),
        }
    }

    fn collector(cpu: f64, events: Vec<KubernetesEvent>) -> (Arc<Collector>, Arc<WsHub>, Arc<SnapshotStore>) {
        let hub = WsHub::new(16);
        let snapshots = SnapshotStore::new();
        let probe = Arc::new(FixedProbe {
            metrics: ClusterMetrics {
                cpu,
                memory: 40.0,
                pods: 12.0,
                nodes: 3.0,
                ..ClusterMetrics::default()
            },
            events,
        });
        let collector = Arc::new(Collector::new(
            probe,
            hub.clone(),
            snapshots.clone(),
            AlertThresholds::default(),
        ));
        (collector, hub, snapshots)
    }

    #[tokio::test]
    async fn test_metrics_round_broadcasts_metrics_then_alerts() {
        let (collector, hub, snapshots) = collector(91.0, vec![node_event()]);
        let (_conn, mut rx) = hub.register_connection().await;

        let alerts = collector.metrics_round().await;
        assert_eq!(alerts.len(), 2);

        let metrics = Envelope::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(metrics.topic, "metrics");
        let payload: MetricsPayload = metrics.payload_as().unwrap();
        assert_eq!(payload.metrics.cpu, 91.0);
        assert_eq!(payload.metrics.nodes, 3.0);

        let alerts_frame = Envelope::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(alerts_frame.topic, "alerts");
        let broadcast: Vec<Alert> = alerts_frame.payload_as().unwrap();
        assert_eq!(broadcast, alerts);

        assert_eq!(snapshots.metrics().unwrap().metrics.cpu, 91.0);
        assert_eq!(snapshots.alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_quiet_round_sends_no_alerts() {
        let (collector, hub, snapshots) = collector(20.0, Vec::new());
        let (_conn, mut rx) = hub.register_connection().await;

        assert!(collector.metrics_round().await.is_empty());
        let first = Envelope::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first.topic, "metrics");
        assert!(rx.try_recv().is_err());
        assert!(snapshots.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_events_round() {
        let (collector, hub, snapshots) = collector(20.0, vec![node_event()]);
        let (_conn, mut rx) = hub.register_connection().await;

        let events = collector.events_round().await;
        assert_eq!(events.len(), 1);

        let frame = Envelope::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame.topic, "events");
        let payload: EventsPayload = frame.payload_as().unwrap();
        assert_eq!(payload.events[0].reason, "NodeNotReady");
        assert_eq!(snapshots.events().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_loops_tick_after_period_and_stop_on_shutdown() {
        let (collector, hub, _snapshots) = collector(20.0, Vec::new());
        let (_conn, mut rx) = hub.register_connection().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let started = std::time::Instant::now();
        let handles = spawn_sources(
            collector,
            Duration::from_millis(100),
            Duration::from_secs(3600),
            shutdown_rx,
        );

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(Envelope::decode(&first).unwrap().topic, "metrics");

        shutdown_tx.send_replace(true);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
