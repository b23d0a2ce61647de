//! WebSocket handler: per-topic frame relay.
//!
//! DESIGN
//! ======
//! On upgrade the socket joins the hub as its own client, subscribed to the
//! topic named in the path, and enters a `select!` loop:
//! - binary frames from the socket are decoded and published to the topic
//! - frames from the topic are encoded and written to the socket
//!
//! Publishing includes the sender, exactly like the in-process hub, so
//! clients filter their own echoes. A frame whose `topic` disagrees with the
//! socket's topic is dropped.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → subscribe to the topic
//! 2. Relay until the socket closes or a write fails
//! 3. Drop the hub client, which removes the subscription

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use super::RelayState;
use crate::transport::Transport;
use crate::transport::hub::HubClient;

const TOPIC_PREFIX: &str = "board:";

pub async fn handle_ws(
    State(state): State<RelayState>,
    Path(topic): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if !topic.starts_with(TOPIC_PREFIX) || topic.len() == TOPIC_PREFIX.len() {
        return (StatusCode::BAD_REQUEST, "unknown topic").into_response();
    }
    ws.on_upgrade(move |socket| run_ws(socket, state, topic))
}

async fn run_ws(mut socket: WebSocket, state: RelayState, topic: String) {
    let client = state.hub.connect();
    let mut rx = match client.subscribe(&topic) {
        Ok(rx) => rx,
        Err(e) => {
            warn!(%topic, error = %e, "relay: subscribe failed");
            return;
        }
    };
    info!(%topic, "relay: socket joined");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => relay_frame(&client, &topic, &bytes),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = rx.recv() => {
                let bytes = frames::encode_frame(&frame);
                if let Err(e) = socket.send(Message::Binary(bytes.into())).await {
                    debug!(%topic, error = %e, "relay: socket write failed");
                    break;
                }
            }
        }
    }

    info!(%topic, "relay: socket left");
}

fn relay_frame(client: &HubClient, topic: &str, bytes: &[u8]) {
    match frames::decode_frame(bytes) {
        Ok(frame) if frame.topic == topic => {
            if let Err(e) = client.publish(topic, &frame) {
                debug!(%topic, error = %e, "relay: publish failed");
            }
        }
        Ok(frame) => debug!(%topic, frame_topic = %frame.topic, "relay: topic mismatch; frame dropped"),
        Err(e) => debug!(%topic, error = %e, "relay: undecodable frame dropped"),
    }
}
