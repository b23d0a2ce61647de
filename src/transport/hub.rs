//! In-process topic hub.
//!
//! Each [`HubClient`] is one participant. Publishing fans a frame out to
//! every receiver registered on the topic, the publisher's own included,
//! using `try_send` so a slow subscriber loses frames instead of stalling
//! the sender. Closed receivers are pruned as they are discovered.

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use frames::Frame;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::{Transport, TransportError};

type ClientId = u64;

#[derive(Default)]
struct Registry {
    next_client: ClientId,
    topics: HashMap<String, HashMap<ClientId, mpsc::Sender<Frame>>>,
}

/// Shared fan-out registry. Clones refer to the same hub.
#[derive(Clone)]
pub struct LocalHub {
    registry: Arc<Mutex<Registry>>,
    capacity: usize,
}

impl LocalHub {
    /// Hub whose subscribers each buffer up to `capacity` frames.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { registry: Arc::new(Mutex::new(Registry::default())), capacity: capacity.max(1) }
    }

    /// Register a new participant.
    #[must_use]
    pub fn connect(&self) -> HubClient {
        let client_id = {
            let mut registry = self.lock();
            registry.next_client += 1;
            registry.next_client
        };
        HubClient { hub: self.clone(), client_id }
    }

    /// Number of live receivers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, HashMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fan_out(&self, topic: &str, frame: &Frame) {
        let mut registry = self.lock();
        let Some(subscribers) = registry.topics.get_mut(topic) else {
            return;
        };
        subscribers.retain(|client_id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(%topic, client_id, event = %frame.event, "hub: subscriber queue full; dropping frame");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        if subscribers.is_empty() {
            registry.topics.remove(topic);
        }
    }

    fn remove(&self, topic: &str, client_id: ClientId) {
        let mut registry = self.lock();
        if let Some(subscribers) = registry.topics.get_mut(topic) {
            subscribers.remove(&client_id);
            if subscribers.is_empty() {
                registry.topics.remove(topic);
            }
        }
    }

    fn remove_client(&self, client_id: ClientId) {
        let mut registry = self.lock();
        registry.topics.retain(|_, subscribers| {
            subscribers.remove(&client_id);
            !subscribers.is_empty()
        });
    }
}

/// One participant's view of a [`LocalHub`]. Dropping it unsubscribes
/// from every topic.
pub struct HubClient {
    hub: LocalHub,
    client_id: ClientId,
}

impl Transport for HubClient {
    fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Frame>, TransportError> {
        let (tx, rx) = mpsc::channel(self.hub.capacity);
        self.hub.lock().topics.entry(topic.to_owned()).or_default().insert(self.client_id, tx);
        Ok(rx)
    }

    fn publish(&self, topic: &str, frame: &Frame) -> Result<(), TransportError> {
        self.hub.fan_out(topic, frame);
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) {
        self.hub.remove(topic, self.client_id);
    }
}

impl Drop for HubClient {
    fn drop(&mut self) {
        self.hub.remove_client(self.client_id);
    }
}
