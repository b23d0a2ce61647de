//! Drag service: pointer gestures on elements.
//!
//! Pointer input arrives in screen pixels and is mapped through the session
//! viewport before it reaches the [`canvas::input::DragMachine`]. Every move
//! repositions the element locally; throttled moves are also published as
//! position-only updates. Release (pointer-up or leaving the board) publishes
//! and persists the last position unconditionally, so peers and the store
//! end on the same value even when intermediate broadcasts were dropped.

#[cfg(test)]
#[path = "drag_test.rs"]
mod tests;

use canvas::camera::Point;
use canvas::doc::{ElementId, ElementPatch};
use tracing::debug;

use crate::event::BoardEvent;
use crate::state::BoardSession;

impl BoardSession {
    /// Topmost element containing the board point `logical`.
    #[must_use]
    pub fn element_at(&self, logical: Point) -> Option<ElementId> {
        self.elements
            .ordered()
            .filter(|e| {
                logical.x >= e.position.x
                    && logical.x <= e.position.x + e.size.w
                    && logical.y >= e.position.y
                    && logical.y <= e.position.y + e.size.h
            })
            .last()
            .map(|e| e.id)
    }

    /// Pointer-down at a screen point. Picks up the topmost element under
    /// it, if any, and returns its id.
    pub fn pointer_down(&mut self, screen: Point) -> Option<ElementId> {
        let hit = self.element_at(self.viewport.to_logical(screen))?;
        self.pointer_down_on(hit, screen).then_some(hit)
    }

    /// Pointer-down on a specific element. Returns `false` (and starts
    /// nothing) if the element is not on the board. A drag already in
    /// progress is replaced without committing.
    pub fn pointer_down_on(&mut self, id: ElementId, screen: Point) -> bool {
        if self.is_closed() {
            return false;
        }
        let Some(position) = self.elements.get(&id).map(|e| e.position) else {
            return false;
        };
        let pointer = self.viewport.to_logical(screen);
        self.drag.pick_up(id, pointer, position);
        debug!(%id, "drag: picked up");
        true
    }

    /// Pointer move: cursor presence plus, while dragging, element movement.
    pub fn pointer_move(&mut self, screen: Point) {
        if self.is_closed() {
            return;
        }
        self.move_cursor(screen);

        let pointer = self.viewport.to_logical(screen);
        let now = self.now_ms();
        let Some(step) = self.drag.move_to(pointer, now) else {
            return;
        };
        if !self.elements.set_position(&step.element_id, step.position) {
            self.drag.reset();
            return;
        }
        if step.broadcast {
            self.publish(&BoardEvent::ElementUpdate {
                element_id: step.element_id,
                fields: ElementPatch::position(step.position),
                actor_id: self.actor.id.clone(),
            });
        }
    }

    pub fn pointer_up(&mut self) {
        self.commit_drag();
    }

    /// Pointer left the board. Same as pointer-up; there is no revert.
    pub fn pointer_leave(&mut self) {
        self.commit_drag();
    }

    /// End the gesture and publish plus persist the final position.
    pub(crate) fn commit_drag(&mut self) {
        let Some(id) = self.drag.release() else {
            return;
        };
        let Some(position) = self.elements.get(&id).map(|e| e.position) else {
            return;
        };
        let fields = ElementPatch::position(position);
        self.publish(&BoardEvent::ElementUpdate { element_id: id, fields: fields.clone(), actor_id: self.actor.id.clone() });
        self.spawn_update(id, fields);
        debug!(%id, x = position.x, y = position.y, "drag: committed");
    }

    /// Abandon the drag without a commit if `id` is the dragged element.
    pub(crate) fn drop_drag_if(&mut self, id: ElementId) {
        if self.drag.dragging_element() == Some(id) {
            self.drag.reset();
            debug!(%id, "drag: element removed mid-drag");
        }
    }
}
