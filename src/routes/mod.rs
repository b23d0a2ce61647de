//! Relay router.
//!
//! SYSTEM CONTEXT
//! ==============
//! `vibeboard relay` is the broadcast transport's server half: a websocket
//! endpoint per topic that fans every frame out to the sockets on that
//! topic. It keeps no board state and stores nothing.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::transport::hub::LocalHub;

/// Shared relay state. Clones share the same hub.
#[derive(Clone)]
pub struct RelayState {
    pub hub: LocalHub,
}

impl RelayState {
    #[must_use]
    pub fn new(config: &RelayConfig) -> Self {
        Self { hub: LocalHub::new(config.channel_capacity) }
    }
}

/// Relay routes: `GET /ws/{topic}` and `GET /healthz`.
pub fn app(state: RelayState) -> Router {
    Router::new()
        .route("/ws/{topic}", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
