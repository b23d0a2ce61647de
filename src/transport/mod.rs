//! Broadcast transports.
//!
//! DESIGN
//! ======
//! A transport moves [`Frame`]s between the subscribers of a topic and
//! promises nothing else: delivery is best effort to whoever is subscribed
//! right now, frames sent while a subscriber is away are gone, and there is
//! no ordering across senders. Publishing never blocks; a full queue drops
//! the frame.
//!
//! The trait is synchronous on purpose. Publishing is a non-blocking
//! enqueue, and subscribing hands back a receiver the session polls from its
//! own event loop.
//!
//! | Impl | Use |
//! |------|-----|
//! | [`hub::LocalHub`] | In-process fan-out; tests and the relay's socket registry |
//! | [`ws::WsTransport`] | One websocket per topic to a `vibeboard relay` |

pub mod hub;
pub mod ws;

use frames::Frame;
use tokio::sync::mpsc;

/// Transport-level failure. Callers on the sync path log and drop these.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not subscribed to {0}")]
    NotSubscribed(String),
    #[error("outbound queue full on {0}")]
    Full(String),
    #[error("transport closed for {0}")]
    Closed(String),
}

/// Publish/subscribe over named topics.
pub trait Transport: Send + Sync {
    /// Start receiving frames published on `topic`. Subscribing again to the
    /// same topic replaces the previous receiver.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot register the subscription.
    fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Frame>, TransportError>;

    /// Send a frame to every current subscriber of `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be handed off. Delivery to
    /// individual subscribers is never reported.
    fn publish(&self, topic: &str, frame: &Frame) -> Result<(), TransportError>;

    /// Stop receiving on `topic`. Unknown topics are ignored.
    fn unsubscribe(&self, topic: &str);
}
