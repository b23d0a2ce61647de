//! Presence service: live cursors.
//!
//! DESIGN
//! ======
//! Cursor positions are ephemeral. The local cursor is published on every
//! pointer move (or at most once per `cursor_throttle_ms`, with a trailing
//! flush so the last position always goes out). Remote cursors land in a
//! [`Roster`] keyed by actor id, and a periodic sweep drops any that have
//! been silent longer than `cursor_eviction_ms`.
//!
//! `last_seen` on a received cursor is overwritten with the local clock, so
//! eviction never depends on a peer's clock.

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;

use std::collections::BTreeMap;

use canvas::camera::Point;
use canvas::doc::ActorId;
use tracing::debug;

use crate::clock::{TimerId, TimerKind};
use crate::event::{BoardEvent, CursorState};
use crate::state::BoardSession;

/// Remote cursors of one board, ordered by actor id.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    cursors: BTreeMap<ActorId, CursorState>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the cursor for `cursor.actor_id`.
    pub fn upsert(&mut self, cursor: CursorState) {
        self.cursors.insert(cursor.actor_id.clone(), cursor);
    }

    #[must_use]
    pub fn get(&self, actor_id: &str) -> Option<&CursorState> {
        self.cursors.get(actor_id)
    }

    pub fn remove(&mut self, actor_id: &str) -> Option<CursorState> {
        self.cursors.remove(actor_id)
    }

    /// Drop every cursor silent for more than `eviction_ms` as of `now_ms`.
    /// Returns the evicted actor ids.
    pub fn sweep(&mut self, now_ms: u64, eviction_ms: u64) -> Vec<ActorId> {
        let stale: Vec<ActorId> = self
            .cursors
            .values()
            .filter(|c| now_ms.saturating_sub(c.last_seen) > eviction_ms)
            .map(|c| c.actor_id.clone())
            .collect();
        for actor_id in &stale {
            self.cursors.remove(actor_id);
        }
        stale
    }

    pub fn ordered(&self) -> impl Iterator<Item = &CursorState> {
        self.cursors.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

/// Local cursor and its send throttle.
#[derive(Debug, Default)]
pub(crate) struct CursorOutbox {
    pub(crate) current: Option<CursorState>,
    last_sent_ms: Option<u64>,
    /// A move was suppressed since the last send.
    pending: bool,
    pub(crate) flush_timer: Option<TimerId>,
}

impl BoardSession {
    /// Local pointer move in screen pixels. Updates the local cursor and
    /// publishes it unless the send throttle holds it back.
    pub fn move_cursor(&mut self, screen: Point) {
        if self.is_closed() {
            return;
        }
        let logical = self.viewport.to_logical(screen);
        let now = self.now_ms();
        self.cursor.current = Some(CursorState {
            actor_id: self.actor.id.clone(),
            x: logical.x,
            y: logical.y,
            display_name: self.actor.display_name.clone(),
            color: self.actor.color.clone(),
            last_seen: now,
        });

        let throttle = self.config.cursor_throttle_ms;
        let elapsed = self.cursor.last_sent_ms.map(|last| now.saturating_sub(last));
        if throttle == 0 || elapsed.is_none_or(|e| e >= throttle) {
            if let Some(id) = self.cursor.flush_timer.take() {
                self.timers.cancel(id);
            }
            self.send_cursor(now);
            return;
        }

        self.cursor.pending = true;
        if self.cursor.flush_timer.is_none() {
            let wait = throttle - elapsed.unwrap_or(0);
            self.cursor.flush_timer = Some(self.timers.after(now, wait, TimerKind::CursorFlush));
        }
    }

    /// Trailing send of a throttled cursor.
    pub(crate) fn flush_cursor(&mut self, timer: TimerId) {
        if self.cursor.flush_timer != Some(timer) {
            return;
        }
        self.cursor.flush_timer = None;
        if self.cursor.pending {
            let now = self.now_ms();
            self.send_cursor(now);
        }
    }

    fn send_cursor(&mut self, now: u64) {
        let Some(cursor) = self.cursor.current.as_mut() else {
            return;
        };
        cursor.last_seen = now;
        let event = BoardEvent::CursorMove(cursor.clone());
        self.cursor.last_sent_ms = Some(now);
        self.cursor.pending = false;
        self.publish(&event);
    }

    /// Remote cursor arrived. Self-origin frames never reach this point.
    pub(crate) fn receive_cursor(&mut self, mut cursor: CursorState) {
        cursor.last_seen = self.now_ms();
        self.roster.upsert(cursor);
    }

    /// Evict silent remote cursors.
    pub(crate) fn sweep_presence(&mut self) {
        let now = self.now_ms();
        let evicted = self.roster.sweep(now, self.config.cursor_eviction_ms);
        if !evicted.is_empty() {
            debug!(board_id = %self.board_id, ?evicted, "presence: cursors evicted");
        }
    }
}
