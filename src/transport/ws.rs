//! Websocket client transport.
//!
//! Each subscribed topic gets its own connection to `{base}/ws/{topic}` on a
//! `vibeboard relay`, owned by a spawned task. Outbound frames queue on a
//! bounded channel the task drains into the socket; inbound binary messages
//! are decoded and pushed to the subscriber with `try_send`.
//!
//! Unsubscribing closes the outbound queue rather than killing the task, so
//! frames already published still reach the relay. [`WsTransport::drain`]
//! waits for those connections to finish.
//!
//! ERROR HANDLING
//! ==============
//! Connection and socket errors end the task and are logged. The inbound
//! receiver then reports closed and further publishes fail with
//! [`TransportError::Closed`]; there is no reconnect.

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use frames::Frame;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{Transport, TransportError};

struct Connection {
    outbound: mpsc::Sender<Frame>,
    task: JoinHandle<()>,
}

/// Relay-backed transport. Must be used from within a tokio runtime.
pub struct WsTransport {
    base_url: String,
    capacity: usize,
    connections: Mutex<HashMap<String, Connection>>,
    /// Unsubscribed connections still flushing their outbound queue.
    draining: Mutex<Vec<JoinHandle<()>>>,
}

impl WsTransport {
    /// `base_url` is the relay's websocket origin, e.g. `ws://127.0.0.1:3000`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, capacity: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            capacity: capacity.max(1),
            connections: Mutex::new(HashMap::new()),
            draining: Mutex::new(Vec::new()),
        }
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/ws/{topic}", self.base_url)
    }

    /// Wait up to `wait` for each unsubscribed connection to flush and
    /// close. Stragglers are abandoned.
    pub async fn drain(&self, wait: Duration) {
        let tasks = std::mem::take(&mut *self.draining.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if tokio::time::timeout(wait, task).await.is_err() {
                warn!("ws transport: connection still flushing after {wait:?}; abandoned");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for WsTransport {
    fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Frame>, TransportError> {
        let (inbound_tx, inbound_rx) = mpsc::channel(self.capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.capacity);
        let task = tokio::spawn(run_connection(self.topic_url(topic), topic.to_owned(), inbound_tx, outbound_rx));
        if let Some(previous) = self.lock().insert(topic.to_owned(), Connection { outbound: outbound_tx, task }) {
            previous.task.abort();
        }
        Ok(inbound_rx)
    }

    fn publish(&self, topic: &str, frame: &Frame) -> Result<(), TransportError> {
        let connections = self.lock();
        let Some(conn) = connections.get(topic) else {
            return Err(TransportError::NotSubscribed(topic.to_owned()));
        };
        conn.outbound.try_send(frame.clone()).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Full(topic.to_owned()),
            TrySendError::Closed(_) => TransportError::Closed(topic.to_owned()),
        })
    }

    fn unsubscribe(&self, topic: &str) {
        let Some(Connection { outbound, task }) = self.lock().remove(topic) else {
            return;
        };
        drop(outbound);
        self.draining.lock().unwrap_or_else(PoisonError::into_inner).push(task);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for (_, conn) in self.lock().drain() {
            conn.task.abort();
        }
        for task in self.draining.lock().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
    }
}

async fn run_connection(
    url: String,
    topic: String,
    inbound: mpsc::Sender<Frame>,
    mut outbound: mpsc::Receiver<Frame>,
) {
    let mut stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(%url, error = %e, "ws transport: connect failed");
            return;
        }
    };
    info!(%topic, "ws transport: connected");

    loop {
        tokio::select! {
            msg = stream.next() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => match frames::decode_frame(&bytes) {
                        Ok(frame) => match inbound.try_send(frame) {
                            Ok(()) | Err(TrySendError::Closed(_)) => {}
                            Err(TrySendError::Full(_)) => debug!(%topic, "ws transport: inbound full; frame dropped"),
                        },
                        Err(e) => debug!(%topic, error = %e, "ws transport: undecodable frame"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = stream.send(Message::Binary(frames::encode_frame(&frame).into())).await {
                    warn!(%topic, error = %e, "ws transport: send failed");
                    break;
                }
            }
        }
    }

    if let Err(e) = stream.close(None).await {
        debug!(%topic, error = %e, "ws transport: close failed");
    }
    info!(%topic, "ws transport: disconnected");
}
