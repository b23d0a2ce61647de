//! Drag gesture state machine.
//!
//! A drag lives between pointer-down on an element and pointer-up (or the
//! pointer leaving the board). While it lives, every move produces a new
//! element position that the caller applies locally; only some of those
//! moves are flagged for broadcast, at most one per throttle window. Release
//! hands back the dragged id so the caller can issue the final commit.
//!
//! The machine is clock-agnostic: callers pass the current time in
//! milliseconds, which keeps it deterministic under a virtual clock.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::consts::DRAG_THROTTLE_MS;
use crate::doc::ElementId;

/// Where the gesture currently is.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// An element is attached to the pointer.
    Dragging {
        /// Element being moved.
        element_id: ElementId,
        /// Pointer minus element position at pick-up, in board units. Keeps
        /// the element from jumping so its corner sits under the pointer.
        pointer_offset: Point,
    },
}

/// Result of one pointer move during a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragStep {
    pub element_id: ElementId,
    /// New top-left position, to be applied locally right away.
    pub position: Point,
    /// Whether this step falls on a throttle tick and should be broadcast.
    pub broadcast: bool,
}

/// Drag state plus the broadcast throttle.
#[derive(Debug, Clone)]
pub struct DragMachine {
    state: DragState,
    throttle_ms: u64,
    last_broadcast_ms: Option<u64>,
    last_position: Option<Point>,
}

impl Default for DragMachine {
    fn default() -> Self {
        Self::new(DRAG_THROTTLE_MS)
    }
}

impl DragMachine {
    #[must_use]
    pub fn new(throttle_ms: u64) -> Self {
        Self { state: DragState::Idle, throttle_ms, last_broadcast_ms: None, last_position: None }
    }

    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Id of the element under the pointer, if a drag is active.
    #[must_use]
    pub fn dragging_element(&self) -> Option<ElementId> {
        match self.state {
            DragState::Dragging { element_id, .. } => Some(element_id),
            DragState::Idle => None,
        }
    }

    /// Last position produced by [`DragMachine::move_to`] in the current
    /// gesture, or `None` if the pointer has not moved since pick-up.
    #[must_use]
    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }

    /// Pointer-down on an element. Any gesture already in progress is
    /// replaced without a commit, and the throttle window restarts.
    pub fn pick_up(&mut self, element_id: ElementId, pointer: Point, element_position: Point) {
        self.state = DragState::Dragging { element_id, pointer_offset: pointer - element_position };
        self.last_broadcast_ms = None;
        self.last_position = None;
    }

    /// Pointer move in board coordinates. Returns `None` when idle.
    pub fn move_to(&mut self, pointer: Point, now_ms: u64) -> Option<DragStep> {
        let DragState::Dragging { element_id, pointer_offset } = self.state else {
            return None;
        };
        let position = pointer - pointer_offset;
        let broadcast = self.throttle_ms == 0
            || self.last_broadcast_ms.is_none_or(|last| now_ms.saturating_sub(last) > self.throttle_ms);
        if broadcast {
            self.last_broadcast_ms = Some(now_ms);
        }
        self.last_position = Some(position);
        Some(DragStep { element_id, position, broadcast })
    }

    /// Pointer-up or pointer-leave. Returns the id that must be committed, or
    /// `None` if no drag was active.
    pub fn release(&mut self) -> Option<ElementId> {
        let element_id = self.dragging_element();
        self.reset();
        element_id
    }

    /// Drop the gesture without reporting a commit. Used when the dragged
    /// element disappears underneath the pointer.
    pub fn reset(&mut self) {
        self.state = DragState::Idle;
        self.last_broadcast_ms = None;
        self.last_position = None;
    }
}
