/// WebSocket connection task
///
/// One task per client: forwards hub frames, answers control messages
/// (`subscribe`, `unsubscribe`, `ping`) and enforces liveness deadlines.
/// Control replies are ordinary envelopes with the `ack`, `pong` or `error`
/// topic, written straight to the socket instead of through the hub queue.
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::health::{ConnectionHealth, HealthConfig, HealthVerdict};
use super::hub::{ConnectionId, WsHub};
use super::metrics::Delivery;
use crate::logger::{self, LogTag};
use crate::stream::Envelope;
use crate::types::timestamp_now;

pub const ACK_TOPIC: &str = "ack";
pub const PONG_TOPIC: &str = "pong";
pub const ERROR_TOPIC: &str = "error";

/// Client → server control messages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(alias = "eventType")]
        topic: String,
    },
    Unsubscribe {
        #[serde(alias = "eventType")]
        topic: String,
    },
    Ping {
        #[serde(default)]
        id: Option<String>,
    },
}

fn error_reply(message: String) -> Envelope {
    Envelope::new(ERROR_TOPIC, json!({ "message": message }))
}

/// Apply a control message and build the reply envelope
pub(crate) async fn control_reply(text: &str, hub: &WsHub, conn_id: ConnectionId) -> Envelope {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return error_reply(format!("Invalid control message: {}", e)),
    };

    match message {
        ClientMessage::Subscribe { topic } | ClientMessage::Unsubscribe { topic } if topic.trim().is_empty() => {
            error_reply("Topic must not be empty".to_string())
        }
        ClientMessage::Subscribe { topic } => {
            hub.subscribe(conn_id, &topic).await;
            logger::debug(
                LogTag::Hub,
                &format!("Connection {} subscribed to '{}'", conn_id, topic),
            );
            Envelope::new(
                ACK_TOPIC,
                json!({
                    "action": "subscribe",
                    "topic": topic,
                    "topics": hub.topics_for(conn_id).await,
                }),
            )
        }
        ClientMessage::Unsubscribe { topic } => {
            let removed = hub.unsubscribe(conn_id, &topic).await;
            logger::debug(
                LogTag::Hub,
                &format!("Connection {} unsubscribed from '{}' (removed={})", conn_id, topic, removed),
            );
            Envelope::new(
                ACK_TOPIC,
                json!({
                    "action": "unsubscribe",
                    "topic": topic,
                    "topics": hub.topics_for(conn_id).await,
                }),
            )
        }
        ClientMessage::Ping { id } => Envelope::new(
            PONG_TOPIC,
            json!({
                "id": id,
                "timestamp": timestamp_now(),
            }),
        ),
    }
}

async fn send_envelope(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    envelope: &Envelope,
) -> Result<(), String> {
    let json = envelope
        .to_json()
        .map_err(|e| format!("Serialization error: {}", e))?;
    ws_tx
        .send(Message::Text(json))
        .await
        .map_err(|e| format!("Send error: {}", e))
}

pub async fn handle_connection(
    socket: WebSocket,
    hub: Arc<WsHub>,
    health_config: HealthConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let (conn_id, mut hub_rx) = hub.register_connection().await;
    let (mut ws_tx, mut ws_rx) = socket.split();
    let counters = hub.delivery_counters(conn_id).await;

    let mut health = ConnectionHealth::new(health_config);
    let mut health_check = tokio::time::interval(health_config.check_interval());
    health_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    logger::debug(LogTag::Hub, &format!("Connection {} started", conn_id));

    if *shutdown.borrow() {
        let _ = ws_tx.send(Message::Close(None)).await;
        hub.unregister_connection(conn_id).await;
        return;
    }

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                logger::debug(LogTag::Hub, &format!("Connection {}: server shutting down", conn_id));
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }

            frame = hub_rx.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = ws_tx.send(Message::Text(frame.to_string())).await {
                    logger::warning(
                        LogTag::Hub,
                        &format!("Connection {}: failed to send message: {}", conn_id, e),
                    );
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        health.touch(Instant::now());
                        let reply = control_reply(&text, &hub, conn_id).await;
                        if reply.topic == ERROR_TOPIC {
                            logger::warning(
                                LogTag::Hub,
                                &format!("Connection {}: rejected control message: {}", conn_id, text),
                            );
                        }
                        if let Err(e) = send_envelope(&mut ws_tx, &reply).await {
                            logger::warning(LogTag::Hub, &format!("Connection {}: {}", conn_id, e));
                            break;
                        }
                        if let Some(counters) = &counters {
                            counters.record(Delivery::ControlReply);
                        }
                    }
                    Some(Ok(Message::Binary(_))) | Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        health.touch(Instant::now());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        logger::debug(LogTag::Hub, &format!("Connection {}: client closed", conn_id));
                        break;
                    }
                    Some(Err(e)) => {
                        logger::warning(
                            LogTag::Hub,
                            &format!("Connection {}: websocket error: {}", conn_id, e),
                        );
                        break;
                    }
                }
            }

            _ = health_check.tick() => {
                match health.evaluate(Instant::now()) {
                    HealthVerdict::Healthy => {}
                    HealthVerdict::SendPing => {
                        logger::verbose(LogTag::Hub, &format!("Connection {}: sending ping", conn_id));
                        if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                        health.ping_sent(Instant::now());
                    }
                    HealthVerdict::Idle(silent) => {
                        logger::warning(
                            LogTag::Hub,
                            &format!("Connection {}: idle timeout ({}s)", conn_id, silent.as_secs()),
                        );
                        break;
                    }
                    HealthVerdict::PongMissed => {
                        logger::warning(LogTag::Hub, &format!("Connection {}: pong timeout", conn_id));
                        break;
                    }
                }
            }
        }
    }

    hub.unregister_connection(conn_id).await;

    if let Some(counters) = counters {
        let snapshot = counters.snapshot();
        logger::debug(
            LogTag::Hub,
            &format!(
                "Connection {} closed (queued={}, dropped={}, control_replies={})",
                conn_id, snapshot.queued, snapshot.dropped, snapshot.control_replies
            ),
        );
    }
}
