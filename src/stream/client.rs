/// Metrics distribution client
///
/// Owns one WebSocket connection to the metrics backend and fans inbound
/// envelopes out to per-topic subscribers. A single spawned task owns the
/// socket, so dispatch for a connection happens in receipt order.
///
/// Connection lifecycle:
/// - `Connecting` → `Connected` on a successful handshake (attempt counter reset)
/// - any connect failure or socket close → `Reconnecting { attempt }` with a
///   linear delay, or `Failed` once the attempt ceiling is reached
/// - `disconnect()` / drop → `Closed` (terminal, pending timers cancelled)
/// - `retry()` restarts a `Failed` client with a fresh attempt counter
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::message::Envelope;
use super::reconnect::ReconnectPolicy;
use super::subscribers::{Callback, SubscriberRegistry, Subscription};
use crate::config::StreamConfig;
use crate::constants::{EVENTS_SNAPSHOT_PATH, METRICS_SNAPSHOT_PATH};
use crate::errors::ClientError;
use crate::logger::{self, LogTag};
use crate::types::{ClusterMetrics, KubernetesEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// CONNECTION STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            ConnectionState::Failed => write!(f, "failed"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Move to `next` unless the client is already closed
fn set_state(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    state.send_if_modified(|current| {
        if *current == ConnectionState::Closed || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

/// Derive the stream URL from the HTTP base URL (`http` → `ws`, `https` → `wss`)
pub fn stream_url(api_url: &str, stream_path: &str) -> Result<String, ClientError> {
    let trimmed = api_url.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;

    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::InvalidUrl {
                url: api_url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            });
        }
    };

    let rest = &trimmed[parsed.scheme().len()..];
    Ok(format!("{}{}{}", scheme, rest, stream_path))
}

// =============================================================================
// CLIENT
// =============================================================================

/// Everything the connection task needs, cloned per spawn
#[derive(Clone)]
struct ConnectionContext {
    ws_url: String,
    registry: Arc<SubscriberRegistry>,
    state: Arc<watch::Sender<ConnectionState>>,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
}

pub struct MetricsClient {
    api_base: String,
    http: reqwest::Client,
    context: ConnectionContext,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsClient {
    /// Build a client and open its connection in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: StreamConfig) -> Result<Self, ClientError> {
        let ws_url = stream_url(&config.api_url, &config.stream_path)?;
        let api_base = config.api_url.trim().trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| ClientError::Request {
                url: api_base.clone(),
                source,
            })?;

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let context = ConnectionContext {
            ws_url,
            registry: SubscriberRegistry::new(),
            state: Arc::new(state),
            policy: ReconnectPolicy::from_config(&config),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        };

        logger::info(
            LogTag::Stream,
            &format!("Starting metrics stream client for {}", context.ws_url),
        );

        let handle = tokio::spawn(run_connection(context.clone(), shutdown_rx));

        Ok(Self {
            api_base,
            http,
            context,
            shutdown,
            task: Mutex::new(Some(handle)),
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.context.ws_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_base
    }

    pub fn subscribe(&self, topic: &str, callback: Callback) -> Subscription {
        self.context.registry.subscribe(topic, callback)
    }

    /// Subscribe with the payload decoded into `T`; undecodable payloads are
    /// logged and skipped
    pub fn subscribe_as<T, F>(&self, topic: &str, callback: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.context.registry.subscribe_as(topic, callback)
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.context.registry
    }

    pub fn status(&self) -> ConnectionState {
        *self.context.state.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionState> {
        self.context.state.subscribe()
    }

    /// Restart a client that gave up; returns false unless it was `Failed`
    pub fn retry(&self) -> bool {
        let claimed = self.context.state.send_if_modified(|current| {
            if *current == ConnectionState::Failed {
                *current = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return false;
        }

        logger::info(LogTag::Stream, "Retrying metrics stream after failure");
        let handle = tokio::spawn(run_connection(
            self.context.clone(),
            self.shutdown.subscribe(),
        ));
        *self.task.lock() = Some(handle);
        true
    }

    /// Close the connection and stop reconnecting. Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.shutdown.send_replace(true);
        if self.status() != ConnectionState::Closed {
            logger::info(LogTag::Stream, "Metrics stream client disconnected");
        }
        set_state(&self.context.state, ConnectionState::Closed);
    }

    /// `disconnect()` and wait for the connection task to finish
    pub async fn shutdown(&self) {
        self.disconnect();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // =========================================================================
    // SNAPSHOT FETCHES
    // =========================================================================

    pub async fn fetch_metrics(&self) -> Result<ClusterMetrics, ClientError> {
        self.fetch_json(METRICS_SNAPSHOT_PATH).await
    }

    pub async fn fetch_events(&self) -> Result<Vec<KubernetesEvent>, ClientError> {
        self.fetch_json(EVENTS_SNAPSHOT_PATH).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.api_base, path);
        logger::debug(LogTag::Api, &format!("GET {}", url));

        let result = self.request_json(&url).await;
        if let Err(e) = &result {
            logger::error(LogTag::Api, &format!("Snapshot fetch failed: {}", e));
        }
        result
    }

    async fn request_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            return Err(ClientError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl Drop for MetricsClient {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

/// Resolves once shutdown is requested or the client is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn run_connection(ctx: ConnectionContext, mut shutdown: watch::Receiver<bool>) {
    let mut attempts_made: u32 = 0;

    loop {
        set_state(&ctx.state, ConnectionState::Connecting);
        logger::debug(LogTag::Stream, &format!("Connecting to {}", ctx.ws_url));

        let connect = tokio::time::timeout(ctx.connect_timeout, connect_async(ctx.ws_url.as_str()));
        let outcome = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            outcome = connect => outcome,
        };

        match outcome {
            Ok(Ok((stream, _response))) => {
                attempts_made = 0;
                set_state(&ctx.state, ConnectionState::Connected);
                logger::info(LogTag::Stream, &format!("Connected to {}", ctx.ws_url));

                if read_frames(stream, &ctx.registry, &mut shutdown).await {
                    break;
                }
            }
            Ok(Err(e)) => {
                logger::warning(
                    LogTag::Stream,
                    &format!("Connection to {} failed: {}", ctx.ws_url, e),
                );
            }
            Err(_) => {
                logger::warning(
                    LogTag::Stream,
                    &format!(
                        "Connection to {} timed out after {}s",
                        ctx.ws_url,
                        ctx.connect_timeout.as_secs()
                    ),
                );
            }
        }

        match ctx.policy.next_attempt(attempts_made) {
            Some((attempt, delay)) => {
                set_state(&ctx.state, ConnectionState::Reconnecting { attempt });
                logger::info(
                    LogTag::Stream,
                    &format!(
                        "Reconnecting in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        attempt,
                        ctx.policy.max_attempts
                    ),
                );

                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                attempts_made = attempt;
            }
            None => {
                set_state(&ctx.state, ConnectionState::Failed);
                logger::error(
                    LogTag::Stream,
                    &format!(
                        "Giving up on {} after {} reconnect attempts",
                        ctx.ws_url, ctx.policy.max_attempts
                    ),
                );
                return;
            }
        }
    }

    set_state(&ctx.state, ConnectionState::Closed);
    logger::debug(LogTag::Stream, "Connection task stopped");
}

/// Pump frames until the socket ends; returns true if shutdown was requested
async fn read_frames(
    mut stream: WsStream,
    registry: &SubscriberRegistry,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        tokio::select! {
            _ = wait_for_shutdown(shutdown) => {
                let _ = stream.close(None).await;
                return true;
            }
            frame = stream.next() => { match frame {
                Some(Ok(Message::Text(text))) => handle_frame(registry, &text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => handle_frame(registry, text),
                    Err(_) => logger::warning(
                        LogTag::Stream,
                        &format!("Discarding non-UTF-8 binary frame ({} bytes)", bytes.len()),
                    ),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", f.code, f.reason))
                        .unwrap_or_else(|| "no reason".to_string());
                    logger::warning(LogTag::Stream, &format!("Server closed stream: {}", reason));
                    return false;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    logger::warning(LogTag::Stream, &format!("Stream error: {}", e));
                    return false;
                }
                None => {
                    logger::warning(LogTag::Stream, "Stream ended");
                    return false;
                }
            }}
        }
    }
}

fn handle_frame(registry: &SubscriberRegistry, text: &str) {
    let envelope = match Envelope::decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            logger::warning(LogTag::Stream, &format!("Discarding malformed frame: {}", e));
            return;
        }
    };

    let delivered = registry.dispatch(&envelope.topic, &envelope.payload);
    if delivered == 0 {
        logger::debug(
            LogTag::Stream,
            &format!("No subscribers for '{}', dropped", envelope.topic),
        );
    }
}
