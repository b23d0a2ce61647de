//! Session services.
//!
//! Identity and persistence are free-standing; presence, replication and
//! drag add their operations to [`crate::state::BoardSession`]; the runner
//! drives a session from a single task.

pub mod drag;
pub mod identity;
pub mod persistence;
pub mod presence;
pub mod replication;
pub mod runner;
