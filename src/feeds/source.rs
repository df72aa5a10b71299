/// Data source abstraction for the feeds
///
/// A feed never checks whether it runs against a live backend or canned
/// fixtures; the composing code picks one `ClusterSource` up front.
use async_trait::async_trait;
use std::sync::Arc;

use super::demo::DemoSource;
use crate::config::Config;
use crate::errors::ClientError;
use crate::logger::{self, LogTag};
use crate::stream::{Callback, ConnectionState, MetricsClient, Subscription};
use crate::types::{ClusterMetrics, KubernetesEvent};

#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Short identifier for logs ("live", "demo")
    fn name(&self) -> &'static str;

    fn subscribe(&self, topic: &str, callback: Callback) -> Subscription;

    async fn fetch_metrics(&self) -> Result<ClusterMetrics, ClientError>;

    async fn fetch_events(&self) -> Result<Vec<KubernetesEvent>, ClientError>;

    /// Initial payload for `topic`, shaped like a streamed payload
    fn seed(&self, _topic: &str) -> Option<serde_json::Value> {
        None
    }

    fn status(&self) -> ConnectionState;
}

#[async_trait]
impl ClusterSource for MetricsClient {
    fn name(&self) -> &'static str {
        "live"
    }

    fn subscribe(&self, topic: &str, callback: Callback) -> Subscription {
        MetricsClient::subscribe(self, topic, callback)
    }

    async fn fetch_metrics(&self) -> Result<ClusterMetrics, ClientError> {
        MetricsClient::fetch_metrics(self).await
    }

    async fn fetch_events(&self) -> Result<Vec<KubernetesEvent>, ClientError> {
        MetricsClient::fetch_events(self).await
    }

    fn status(&self) -> ConnectionState {
        MetricsClient::status(self)
    }
}

/// Build the source selected by configuration
///
/// Demo mode yields fixture data and never touches the network. Otherwise a
/// live client is connected; this must run inside a Tokio runtime.
pub fn source_from_config(config: &Config) -> Result<Arc<dyn ClusterSource>, ClientError> {
    if config.feeds.demo_mode {
        logger::info(LogTag::Feeds, "Demo mode enabled, using fixture data source");
        return Ok(Arc::new(DemoSource::new()));
    }

    let client = MetricsClient::connect(config.stream.clone())?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_mode_selects_fixture_source() {
        let mut config = Config::default();
        config.feeds.demo_mode = true;

        let source = source_from_config(&config).unwrap();
        assert_eq!(source.name(), "demo");
        assert_eq!(source.status(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_live_mode_rejects_bad_url() {
        let mut config = Config::default();
        config.stream.api_url = "::not a url::".to_string();

        assert!(matches!(
            source_from_config(&config),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_live_source_forwards_to_client() {
        let mut config = Config::default();
        config.stream.api_url = "http://127.0.0.1:9".to_string();
        config.stream.max_reconnect_attempts = 0;

        let source = source_from_config(&config).unwrap();
        assert_eq!(source.name(), "live");
        assert!(source.seed("nodes").is_none());

        let sub = source.subscribe("metrics", Arc::new(|_: &serde_json::Value| {}));
        assert!(sub.is_active());
        sub.unsubscribe();
    }
}
