//! Real-time sync engine for a shared whiteboard.
//!
//! A [`state::BoardSession`] is one actor's live view of one board: the
//! remote cursor roster, the element list, the viewport, and the drag
//! gesture. It talks to two collaborators, a broadcast [`transport`] for
//! peer events and an [`services::persistence::ElementStore`] for durable
//! elements, and is driven by a single event loop in [`services::runner`].
//!
//! The `vibeboard` binary wraps this library as a websocket relay
//! ([`routes`]) and a headless board client.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Environment-driven tuning (`SyncConfig`, `RelayConfig`) |
//! | [`clock`] | Clock trait, manual clock for tests, cancellable timers |
//! | [`event`] | Typed board events and their frame encoding |
//! | [`state`] | `BoardSession`: open, inbound dispatch, ticks, close |
//! | [`services`] | Identity, presence, replication, drag, persistence, runner |
//! | [`transport`] | Broadcast transports: in-process hub and websocket client |
//! | [`routes`] | Axum websocket relay |
//! | [`db`] | Postgres pool and migrations |

pub mod clock;
pub mod config;
pub mod db;
pub mod event;
pub mod routes;
pub mod services;
pub mod state;
pub mod transport;
