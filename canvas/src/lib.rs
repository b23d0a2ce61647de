//! Canvas model for the shared whiteboard.
//!
//! This crate is the network-free half of the sync engine. It owns the pure
//! pieces a board session is built from: the viewport transform between
//! screen and board space, the in-memory element document, and the drag
//! gesture state machine. Nothing here knows about topics, peers, or
//! persistence; the session layer in the root crate wires these into the
//! broadcast and storage collaborators.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`camera`] | Viewport (pan offset + scale) and coordinate conversions |
//! | [`doc`] | Element types, drafts, sparse patches, and the document store |
//! | [`input`] | Drag state machine with broadcast throttling |
//! | [`consts`] | Shared numeric constants (scale limits, element bounds, etc.) |

pub mod camera;
pub mod consts;
pub mod doc;
pub mod input;
