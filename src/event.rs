//! Board events: the closed set of messages exchanged on a board topic.
//!
//! DESIGN
//! ======
//! Peers see four event types. Each is a variant of [`BoardEvent`] with a
//! typed payload, so dispatch is an exhaustive `match` rather than string
//! comparison spread across handlers. On the wire an event is a
//! [`frames::Frame`] whose `event` field names the type and whose `data` is
//! the camelCase JSON payload.
//!
//! Every payload names its originating actor. That is what the session's
//! self-echo filter compares against; the frame's `from` is informational.

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;

use canvas::doc::{ActorId, BoardId, Element, ElementId, ElementPatch};
use frames::Frame;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR CODES
// =============================================================================

/// Errors that surface to users carry a stable, grepable code.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Failure to turn a frame into a [`BoardEvent`] or back.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ErrorCode for EventError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEvent(_) => "E_UNKNOWN_EVENT",
            Self::Payload(_) => "E_BAD_PAYLOAD",
        }
    }
}

/// Broadcast topic for a board.
#[must_use]
pub fn topic_for(board_id: BoardId) -> String {
    format!("board:{board_id}")
}

// =============================================================================
// EVENT TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    CursorMove,
    ElementCreate,
    ElementUpdate,
    ElementDelete,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CursorMove => "cursor_move",
            Self::ElementCreate => "element_create",
            Self::ElementUpdate => "element_update",
            Self::ElementDelete => "element_delete",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cursor_move" => Some(Self::CursorMove),
            "element_create" => Some(Self::ElementCreate),
            "element_update" => Some(Self::ElementUpdate),
            "element_delete" => Some(Self::ElementDelete),
            _ => None,
        }
    }
}

/// A remote or local cursor, in board coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    pub actor_id: ActorId,
    pub x: f64,
    pub y: f64,
    pub display_name: String,
    pub color: String,
    /// Milliseconds on the clock of whoever last wrote this entry.
    pub last_seen: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    element: Element,
    actor_id: ActorId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePayload {
    element_id: ElementId,
    fields: ElementPatch,
    actor_id: ActorId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletePayload {
    element_id: ElementId,
    actor_id: ActorId,
}

/// One message on a board topic.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    CursorMove(CursorState),
    ElementCreate { element: Element, actor_id: ActorId },
    ElementUpdate { element_id: ElementId, fields: ElementPatch, actor_id: ActorId },
    ElementDelete { element_id: ElementId, actor_id: ActorId },
}

impl BoardEvent {
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::CursorMove(_) => EventType::CursorMove,
            Self::ElementCreate { .. } => EventType::ElementCreate,
            Self::ElementUpdate { .. } => EventType::ElementUpdate,
            Self::ElementDelete { .. } => EventType::ElementDelete,
        }
    }

    /// Actor that produced the event.
    #[must_use]
    pub fn origin(&self) -> &str {
        match self {
            Self::CursorMove(cursor) => &cursor.actor_id,
            Self::ElementCreate { actor_id, .. }
            | Self::ElementUpdate { actor_id, .. }
            | Self::ElementDelete { actor_id, .. } => actor_id,
        }
    }

    /// Wrap the event in a frame for `topic`, stamped with its origin.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Payload`] if the payload cannot be serialized.
    pub fn to_frame(&self, topic: &str) -> Result<Frame, EventError> {
        let data = match self {
            Self::CursorMove(cursor) => serde_json::to_value(cursor)?,
            Self::ElementCreate { element, actor_id } => {
                serde_json::to_value(CreatePayload { element: element.clone(), actor_id: actor_id.clone() })?
            }
            Self::ElementUpdate { element_id, fields, actor_id } => serde_json::to_value(UpdatePayload {
                element_id: *element_id,
                fields: fields.clone(),
                actor_id: actor_id.clone(),
            })?,
            Self::ElementDelete { element_id, actor_id } => {
                serde_json::to_value(DeletePayload { element_id: *element_id, actor_id: actor_id.clone() })?
            }
        };
        Ok(Frame::new(topic, self.event_type().as_str(), data).with_from(self.origin()))
    }

    /// Parse a frame's event name and payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownEvent`] for event names outside the
    /// closed set and [`EventError::Payload`] for payloads that don't match.
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        let Some(kind) = EventType::parse(&frame.event) else {
            return Err(EventError::UnknownEvent(frame.event.clone()));
        };
        let data = frame.data.clone();
        let event = match kind {
            EventType::CursorMove => Self::CursorMove(serde_json::from_value(data)?),
            EventType::ElementCreate => {
                let p: CreatePayload = serde_json::from_value(data)?;
                Self::ElementCreate { element: p.element, actor_id: p.actor_id }
            }
            EventType::ElementUpdate => {
                let p: UpdatePayload = serde_json::from_value(data)?;
                Self::ElementUpdate { element_id: p.element_id, fields: p.fields, actor_id: p.actor_id }
            }
            EventType::ElementDelete => {
                let p: DeletePayload = serde_json::from_value(data)?;
                Self::ElementDelete { element_id: p.element_id, actor_id: p.actor_id }
            }
        };
        Ok(event)
    }
}
