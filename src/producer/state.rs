/// Shared producer state
///
/// The collection loops write the latest readings here; the snapshot
/// endpoints read them. Route handlers get an `Arc<AppState>`.
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

use super::collector::ClusterProbe;
use super::health::HealthConfig;
use super::hub::WsHub;
use crate::types::{Alert, KubernetesEvent, MetricsPayload};

/// Latest collected values
#[derive(Default)]
pub struct SnapshotStore {
    metrics: RwLock<Option<MetricsPayload>>,
    events: RwLock<Option<Vec<KubernetesEvent>>>,
    alerts: RwLock<Vec<Alert>>,
}

impl SnapshotStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn store_metrics(&self, payload: MetricsPayload) {
        *self.metrics.write() = Some(payload);
    }

    pub fn store_events(&self, events: Vec<KubernetesEvent>) {
        *self.events.write() = Some(events);
    }

    /// Replaces the alert list; an empty round clears it
    pub fn store_alerts(&self, alerts: Vec<Alert>) {
        *self.alerts.write() = alerts;
    }

    pub fn metrics(&self) -> Option<MetricsPayload> {
        self.metrics.read().clone()
    }

    pub fn events(&self) -> Option<Vec<KubernetesEvent>> {
        self.events.read().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<WsHub>,

    /// Used for on-demand snapshots before the first collection round
    pub probe: Arc<dyn ClusterProbe>,

    pub snapshots: Arc<SnapshotStore>,

    pub health: HealthConfig,

    /// Flipped to true when the server stops; connection tasks close on it
    pub shutdown: watch::Receiver<bool>,

    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        hub: Arc<WsHub>,
        probe: Arc<dyn ClusterProbe>,
        snapshots: Arc<SnapshotStore>,
        health: HealthConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            hub,
            probe,
            snapshots,
            health,
            shutdown,
            startup_time: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.startup_time).num_seconds().max(0) as u64
    }
}
