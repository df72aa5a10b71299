/// Backend metrics producer
///
/// Probes the cluster on a schedule, derives alerts and fans envelopes out
/// to WebSocket clients. Alert derivation and the probes are always built
/// (the demo source reuses them); the server half needs the `web` feature.
pub mod alerts;
pub mod collector;

#[cfg(feature = "web")]
pub mod connection;
#[cfg(feature = "web")]
pub mod health;
#[cfg(feature = "web")]
pub mod hub;
#[cfg(feature = "web")]
pub mod metrics;
#[cfg(feature = "web")]
pub mod server;
#[cfg(feature = "web")]
pub mod sources;
#[cfg(feature = "web")]
pub mod state;

pub use alerts::{derive_alerts, AlertThresholds};
pub use collector::{ClusterProbe, DemoProbe, KubectlProbe};

#[cfg(feature = "web")]
pub use hub::{ConnectionId, WsHub};
#[cfg(feature = "web")]
pub use metrics::BroadcastOutcome;
#[cfg(feature = "web")]
pub use server::ProducerServer;

use std::sync::Arc;

use crate::config::ProducerConfig;

/// Probe selected by the demo switch
pub fn probe_for(config: &ProducerConfig, demo: bool) -> Arc<dyn ClusterProbe> {
    if demo {
        Arc::new(DemoProbe)
    } else {
        Arc::new(KubectlProbe::from_config(config))
    }
}
