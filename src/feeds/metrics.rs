/// Cluster metrics feed
///
/// Subscribes to `metrics`, `events` and `alerts`, keeps a bounded sample
/// window per metric kind plus the latest event and alert lists.
use chrono::{DateTime, Local, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;

use super::samples::{Sample, SampleWindow, Trend};
use super::source::ClusterSource;
use crate::errors::ClientError;
use crate::logger::{self, LogTag};
use crate::stream::{ConnectionState, Subscription, Topic};
use crate::types::{number_or_zero, Alert, ClusterMetrics, KubernetesEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Cpu,
    Memory,
    Network,
    Pods,
    Nodes,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Network,
        MetricKind::Pods,
        MetricKind::Nodes,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Network => "network",
            MetricKind::Pods => "pods",
            MetricKind::Nodes => "nodes",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }

    fn reading(&self, metrics: &ClusterMetrics) -> f64 {
        match self {
            MetricKind::Cpu => metrics.cpu,
            MetricKind::Memory => metrics.memory,
            MetricKind::Network => metrics.network,
            MetricKind::Pods => metrics.pods,
            MetricKind::Nodes => metrics.nodes,
        }
    }
}

/// Chart label for a sample taken at `at` (local wall clock)
fn sample_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Deserialize)]
struct EventsUpdate {
    #[serde(default)]
    events: Vec<KubernetesEvent>,
}

#[derive(Debug)]
struct MetricsState {
    windows: [SampleWindow; 5],
    events: Vec<KubernetesEvent>,
    alerts: Vec<Alert>,
    last_update: Option<DateTime<Utc>>,
}

impl MetricsState {
    fn new(window: usize) -> Self {
        Self {
            windows: std::array::from_fn(|_| SampleWindow::new(window)),
            events: Vec::new(),
            alerts: Vec::new(),
            last_update: None,
        }
    }

    /// `{timestamp, metrics: {cpu, memory, ...}}`: one sample per known kind present
    fn apply_metrics(&mut self, payload: &serde_json::Value) {
        let Some(readings) = payload.get("metrics").and_then(|m| m.as_object()) else {
            logger::warning(LogTag::Feeds, "Metrics update without a metrics object, ignored");
            return;
        };

        let at = payload
            .get("timestamp")
            .and_then(|t| t.as_str())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let time = sample_time(at);

        for (key, value) in readings {
            if let Some(kind) = MetricKind::from_key(key) {
                self.windows[kind.index()].push(Sample {
                    time: time.clone(),
                    value: number_or_zero(value),
                    label: kind.key().to_string(),
                });
            }
        }
        self.last_update = Some(at);
    }

    fn apply_events(&mut self, payload: &serde_json::Value) {
        match EventsUpdate::deserialize(payload) {
            Ok(update) => self.events = update.events,
            Err(e) => logger::warning(
                LogTag::Feeds,
                &format!("Events update has unexpected shape, keeping previous list: {}", e),
            ),
        }
    }

    fn apply_alerts(&mut self, payload: &serde_json::Value) {
        match Vec::<Alert>::deserialize(payload) {
            Ok(alerts) => self.alerts = alerts,
            Err(e) => logger::warning(
                LogTag::Feeds,
                &format!("Alerts update has unexpected shape, keeping previous list: {}", e),
            ),
        }
    }

    fn reset_from_snapshot(&mut self, metrics: &ClusterMetrics) {
        let time = sample_time(Utc::now());
        for kind in MetricKind::ALL {
            self.windows[kind.index()].reset_to(Sample {
                time: time.clone(),
                value: kind.reading(metrics),
                label: kind.key().to_string(),
            });
        }
    }
}

// =============================================================================
// FEED
// =============================================================================

pub struct MetricsFeed {
    source: Arc<dyn ClusterSource>,
    state: Arc<RwLock<MetricsState>>,
    subscriptions: Vec<Subscription>,
}

impl MetricsFeed {
    pub fn new(source: Arc<dyn ClusterSource>, window: usize) -> Self {
        let state = Arc::new(RwLock::new(MetricsState::new(window)));

        let metrics_state = state.clone();
        let events_state = state.clone();
        let alerts_state = state.clone();
        let subscriptions = vec![
            source.subscribe(
                Topic::Metrics.code(),
                Arc::new(move |payload: &serde_json::Value| metrics_state.write().apply_metrics(payload)),
            ),
            source.subscribe(
                Topic::Events.code(),
                Arc::new(move |payload: &serde_json::Value| events_state.write().apply_events(payload)),
            ),
            source.subscribe(
                Topic::Alerts.code(),
                Arc::new(move |payload: &serde_json::Value| alerts_state.write().apply_alerts(payload)),
            ),
        ];

        logger::debug(
            LogTag::Feeds,
            &format!("Metrics feed attached to {} source", source.name()),
        );

        Self {
            source,
            state,
            subscriptions,
        }
    }

    /// Seed from the snapshot endpoints: one sample per kind, then the event backlog
    pub async fn bootstrap(&self) -> Result<(), ClientError> {
        let snapshot = self.source.fetch_metrics().await.map_err(|e| {
            logger::error(LogTag::Feeds, &format!("Error fetching initial metrics: {}", e));
            e
        })?;
        self.state.write().reset_from_snapshot(&snapshot);

        let events = self.source.fetch_events().await.map_err(|e| {
            logger::error(LogTag::Feeds, &format!("Error fetching initial events: {}", e));
            e
        })?;
        self.state.write().events = events;
        Ok(())
    }

    pub fn samples(&self, kind: MetricKind) -> Vec<Sample> {
        self.state.read().windows[kind.index()].to_vec()
    }

    pub fn latest(&self, kind: MetricKind) -> Option<Sample> {
        self.state.read().windows[kind.index()].latest().cloned()
    }

    pub fn trend(&self, kind: MetricKind) -> Trend {
        self.state.read().windows[kind.index()].trend()
    }

    pub fn events(&self) -> Vec<KubernetesEvent> {
        self.state.read().events.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.read().alerts.clone()
    }

    /// Remove one alert locally; returns whether it was present
    pub fn dismiss_alert(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.alerts.len();
        state.alerts.retain(|a| a.id != id);
        state.alerts.len() != before
    }

    pub fn dismiss_all_alerts(&self) {
        self.state.write().alerts.clear();
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_update
    }

    pub fn is_connected(&self) -> bool {
        self.source.status() == ConnectionState::Connected
    }
}

impl Drop for MetricsFeed {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::demo::DemoSource;
    use serde_json::json;

    fn feed() -> (Arc<DemoSource>, MetricsFeed) {
        let source = Arc::new(DemoSource::new());
        let feed = MetricsFeed::new(source.clone(), 24);
        (source, feed)
    }

    #[test]
    fn test_metrics_update_appends_known_kinds() {
        let (source, feed) = feed();

        source.publish(
            "metrics",
            &json!({
                "timestamp": "2024-03-01T10:15:30.000Z",
                "metrics": {"cpu": 42.0, "memory": "oops", "pods": 12, "gpu": 99}
            }),
        );

        assert_eq!(feed.latest(MetricKind::Cpu).map(|s| s.value), Some(42.0));
        assert_eq!(feed.latest(MetricKind::Memory).map(|s| s.value), Some(0.0));
        assert_eq!(feed.latest(MetricKind::Pods).map(|s| s.label), Some("pods".to_string()));
        assert!(feed.samples(MetricKind::Network).is_empty());

        let expected_at = DateTime::parse_from_rfc3339("2024-03-01T10:15:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(feed.last_update(), Some(expected_at));
        assert_eq!(
            feed.latest(MetricKind::Cpu).unwrap().time,
            sample_time(expected_at)
        );
    }

    #[test]
    fn test_window_bounded_and_trend() {
        let (source, feed) = feed();

        for i in 0..30 {
            source.publish("metrics", &json!({"metrics": {"cpu": 100.0 + i as f64}}));
        }
        assert_eq!(feed.samples(MetricKind::Cpu).len(), 24);
        assert_eq!(feed.samples(MetricKind::Cpu)[0].value, 106.0);
        assert_eq!(feed.trend(MetricKind::Cpu), Trend::Stable);

        source.publish("metrics", &json!({"metrics": {"cpu": 100.0}}));
        source.publish("metrics", &json!({"metrics": {"cpu": 106.0}}));
        assert_eq!(feed.trend(MetricKind::Cpu), Trend::Up);

        source.publish("metrics", &json!({"metrics": {"cpu": 94.0}}));
        assert_eq!(feed.trend(MetricKind::Cpu), Trend::Down);

        assert_eq!(feed.trend(MetricKind::Nodes), Trend::Stable);
    }

    #[test]
    fn test_events_and_alerts_replace_or_keep() {
        let (source, feed) = feed();

        source.publish(
            "events",
            &json!({"events": [{
                "type": "Warning", "reason": "BackOff", "message": "restarting",
                "source": {"component": "kubelet", "host": "node-1"},
                "involvedObject": {"kind": "Pod", "name": "api"},
                "lastTimestamp": "2024-01-01T00:00:00Z"
            }]}),
        );
        assert_eq!(feed.events().len(), 1);

        source.publish("events", &json!({"events": "not a list"}));
        assert_eq!(feed.events().len(), 1);

        source.publish("events", &json!({"timestamp": "2024-01-01T00:00:10Z"}));
        assert!(feed.events().is_empty());

        source.publish(
            "alerts",
            &json!([
                {"id": "cpu-high-1", "type": "warning", "title": "High CPU Usage", "message": "x", "timestamp": "t"},
                {"id": "node-event-1-0", "type": "error", "title": "Node Issue Detected", "message": "y", "timestamp": "t"}
            ]),
        );
        assert_eq!(feed.alerts().len(), 2);

        source.publish("alerts", &json!({"alerts": []}));
        assert_eq!(feed.alerts().len(), 2);

        assert!(feed.dismiss_alert("cpu-high-1"));
        assert!(!feed.dismiss_alert("cpu-high-1"));
        assert_eq!(feed.alerts()[0].id, "node-event-1-0");

        feed.dismiss_all_alerts();
        assert!(feed.alerts().is_empty());
    }

    #[test]
    fn test_malformed_metrics_update_ignored() {
        let (source, feed) = feed();
        source.publish("metrics", &json!({"cpu": 42}));
        source.publish("metrics", &json!(null));
        assert!(feed.samples(MetricKind::Cpu).is_empty());
        assert_eq!(feed.last_update(), None);
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_one_sample_per_kind() {
        let (source, feed) = feed();
        source.publish("metrics", &json!({"metrics": {"cpu": 1.0}}));
        source.publish("metrics", &json!({"metrics": {"cpu": 2.0}}));

        feed.bootstrap().await.unwrap();

        for kind in MetricKind::ALL {
            assert_eq!(feed.samples(kind).len(), 1, "{:?}", kind);
        }
        assert_eq!(feed.latest(MetricKind::Nodes).map(|s| s.value), Some(3.0));
        assert_eq!(feed.events().len(), 2);
        assert!(feed.is_connected());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (source, feed) = feed();
        drop(feed);
        assert_eq!(source.publish("metrics", &json!({"metrics": {"cpu": 1.0}})), 0);
    }
}
