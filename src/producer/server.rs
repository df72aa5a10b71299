/// Producer HTTP/WebSocket server
///
/// Serves the streaming endpoint plus JSON snapshots, and owns the
/// collection loops. Everything stops on one shared shutdown signal.
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use super::alerts::AlertThresholds;
use super::collector::ClusterProbe;
use super::connection::handle_connection;
use super::health::HealthConfig;
use super::hub::WsHub;
use super::metrics::HubMetricsSnapshot;
use super::sources::{spawn_sources, Collector};
use super::state::{AppState, SnapshotStore};
use crate::config::ProducerConfig;
use crate::constants::{
    ALERTS_SNAPSHOT_PATH, EVENTS_SNAPSHOT_PATH, METRICS_SNAPSHOT_PATH, STATUS_PATH, STREAM_PATH,
};
use crate::errors::ProducerError;
use crate::logger::{self, LogTag};
use crate::types::timestamp_now;

// ============================================================================
// ROUTES
// ============================================================================

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(STREAM_PATH, get(ws_handler))
        .route(METRICS_SNAPSHOT_PATH, get(metrics_snapshot))
        .route(EVENTS_SNAPSHOT_PATH, get(events_snapshot))
        .route(ALERTS_SNAPSHOT_PATH, get(alerts_snapshot))
        .route(STATUS_PATH, get(status))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// GET /ws/metrics
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    logger::debug(LogTag::Api, "WebSocket upgrade requested");

    let hub = state.hub.clone();
    let health = state.health;
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, hub, health, shutdown))
}

/// GET /api/v1/metrics
///
/// Bare `ClusterMetrics` object. Before the first collection round the
/// probe is asked directly.
async fn metrics_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let metrics = match state.snapshots.metrics() {
        Some(payload) => payload.metrics,
        None => state.probe.collect_metrics().await,
    };
    logger::debug(LogTag::Api, "Served metrics snapshot");
    Json(metrics).into_response()
}

/// GET /api/v1/events
async fn events_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let events = match state.snapshots.events() {
        Some(events) => events,
        None => state.probe.collect_events().await,
    };
    logger::debug(
        LogTag::Api,
        &format!("Served events snapshot ({} events)", events.len()),
    );
    Json(events).into_response()
}

/// GET /api/v1/alerts
async fn alerts_snapshot(State(state): State<Arc<AppState>>) -> Response {
    Json(state.snapshots.alerts()).into_response()
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub probe: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub hub: HubMetricsSnapshot,
}

/// GET /api/v1/status
async fn status(State(state): State<Arc<AppState>>) -> Response {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        probe: state.probe.name().to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: timestamp_now(),
        hub: state.hub.metrics().snapshot(),
    })
    .into_response()
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
        .into_response()
}

// ============================================================================
// SERVER
// ============================================================================

pub struct ProducerServer {
    addr: SocketAddr,
    hub: Arc<WsHub>,
    snapshots: Arc<SnapshotStore>,
    shutdown: watch::Sender<bool>,
    server_task: JoinHandle<Result<(), ProducerError>>,
    source_tasks: Vec<JoinHandle<()>>,
}

fn bind_error(addr: &str, e: std::io::Error) -> ProducerError {
    if e.kind() == std::io::ErrorKind::AddrInUse {
        logger::error(
            LogTag::Producer,
            &format!("{} is already in use; pick another port with --port", addr),
        );
    }
    ProducerError::Bind {
        addr: addr.to_string(),
        source: e,
    }
}

impl ProducerServer {
    /// Bind, spawn the collection loops and start serving
    pub async fn start(
        config: ProducerConfig,
        probe: Arc<dyn ClusterProbe>,
    ) -> Result<Self, ProducerError> {
        let addr_text = format!("{}:{}", config.host, config.port);
        let bind_addr: SocketAddr = tokio::net::lookup_host(addr_text.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ProducerError::InvalidAddress {
                addr: addr_text.clone(),
            })?;

        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| bind_error(&addr_text, e))?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let hub = WsHub::new(config.client_buffer_size);
        let snapshots = SnapshotStore::new();

        let collector = Arc::new(Collector::new(
            probe.clone(),
            hub.clone(),
            snapshots.clone(),
            AlertThresholds::from_config(&config),
        ));
        let source_tasks = spawn_sources(
            collector,
            Duration::from_secs(config.metrics_interval_secs),
            Duration::from_secs(config.events_interval_secs),
            shutdown_rx.clone(),
        );

        let state = Arc::new(AppState::new(
            hub.clone(),
            probe.clone(),
            snapshots.clone(),
            HealthConfig::from_config(&config),
            shutdown_rx.clone(),
        ));
        let app = build_router(state);

        let mut serve_shutdown = shutdown_rx;
        let server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    while !*serve_shutdown.borrow() {
                        if serve_shutdown.changed().await.is_err() {
                            break;
                        }
                    }
                    logger::debug(LogTag::Producer, "Received shutdown signal, stopping server...");
                })
                .await
                .map_err(ProducerError::from)
        });

        logger::info(
            LogTag::Producer,
            &format!(
                "Producer listening on http://{} (probe={}, stream=ws://{}{})",
                addr,
                probe.name(),
                addr,
                STREAM_PATH
            ),
        );

        Ok(Self {
            addr,
            hub,
            snapshots,
            shutdown: shutdown_tx,
            server_task,
            source_tasks,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> &Arc<WsHub> {
        &self.hub
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Signal shutdown and wait for the loops and the server to finish
    pub async fn stop(self) -> Result<(), ProducerError> {
        self.shutdown.send_replace(true);

        for task in self.source_tasks {
            if let Err(e) = task.await {
                logger::warning(LogTag::Producer, &format!("Collection loop ended abnormally: {}", e));
            }
        }

        let result = match self.server_task.await {
            Ok(result) => result,
            Err(e) => Err(ProducerError::Serve(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))),
        };

        logger::info(LogTag::Producer, "Producer stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::stream::{ConnectionState, Envelope, MetricsClient};
    use crate::types::{ClusterMetrics, KubernetesEvent};
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::tungstenite::Message;

    struct FixedProbe;

    #[async_trait]
    impl ClusterProbe for FixedProbe {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn collect_metrics(&self) -> ClusterMetrics {
            ClusterMetrics {
                cpu: 42.0,
                memory: 55.0,
                network: 0.0,
                pods: 17.0,
                nodes: 3.0,
            }
        }

        async fn collect_events(&self) -> Vec<KubernetesEvent> {
            Vec::new()
        }
    }

    fn test_config() -> ProducerConfig {
        ProducerConfig {
            port: 0,
            metrics_interval_secs: 3600,
            events_interval_secs: 3600,
            ..ProducerConfig::default()
        }
    }

    async fn wait_until<F: Fn() -> bool>(check: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn wait_for_connections(hub: &WsHub, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.active_connections().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_client_receives_broadcasts_and_snapshots() {
        let server = ProducerServer::start(test_config(), Arc::new(FixedProbe)).await.unwrap();
        let api_url = format!("http://{}", server.local_addr());

        let client = MetricsClient::connect(StreamConfig {
            api_url: api_url.clone(),
            ..StreamConfig::default()
        })
        .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = client.subscribe(
            "metrics",
            Arc::new(move |payload: &serde_json::Value| {
                let _ = tx.send(payload.clone());
            }),
        );

        wait_until(|| client.status() == ConnectionState::Connected).await;
        wait_for_connections(server.hub(), 1).await;

        let outcome = server
            .hub()
            .broadcast(&Envelope::new("metrics", json!({"cpu": 42})))
            .await;
        assert_eq!(outcome.delivered, 1);

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, json!({"cpu": 42}));

        let metrics = client.fetch_metrics().await.unwrap();
        assert_eq!(metrics.cpu, 42.0);
        assert_eq!(metrics.pods, 17.0);
        assert!(client.fetch_events().await.unwrap().is_empty());

        let status: serde_json::Value = reqwest::get(format!("{}{}", api_url, STATUS_PATH))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "ok");
        assert_eq!(status["probe"], "fixed");
        assert_eq!(status["hub"]["active_connections"], 1);

        let alerts: serde_json::Value = reqwest::get(format!("{}{}", api_url, ALERTS_SNAPSHOT_PATH))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(alerts, json!([]));

        client.shutdown().await;
        wait_for_connections(server.hub(), 0).await;
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscription_filters_stream() {
        let server = ProducerServer::start(test_config(), Arc::new(FixedProbe)).await.unwrap();
        let url = format!("ws://{}{}", server.local_addr(), STREAM_PATH);

        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        socket
            .send(Message::Text(r#"{"type":"subscribe","topic":"events"}"#.to_string()))
            .await
            .unwrap();

        let ack = match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => Envelope::decode(&text).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        };
        assert_eq!(ack.topic, "ack");
        assert_eq!(ack.payload["topics"], json!(["events"]));

        server.hub().broadcast(&Envelope::new("metrics", json!({}))).await;
        server
            .hub()
            .broadcast(&Envelope::new("events", json!({"events": []})))
            .await;

        let next = match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => Envelope::decode(&text).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        };
        assert_eq!(next.topic, "events");

        server.stop().await.unwrap();

        // The connection task closes the socket on shutdown
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_route_and_bind_conflict() {
        let server = ProducerServer::start(test_config(), Arc::new(FixedProbe)).await.unwrap();
        let addr = server.local_addr();

        let response = reqwest::get(format!("http://{}/api/v1/nope", addr)).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let conflict = ProducerServer::start(
            ProducerConfig {
                port: addr.port(),
                ..test_config()
            },
            Arc::new(FixedProbe),
        )
        .await;
        assert!(matches!(conflict, Err(ProducerError::Bind { .. })));

        server.stop().await.unwrap();
    }
}
