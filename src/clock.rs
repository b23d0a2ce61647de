//! Time sources and the session timer queue.
//!
//! DESIGN
//! ======
//! Sessions never read the wall clock directly. They ask a [`Clock`], which
//! is the system clock in production and a [`ManualClock`] in tests, and
//! they schedule work on [`Timers`], a plain deadline queue the runner
//! drains. Nothing here sleeps; the runner turns `next_deadline` into a
//! `tokio::time::sleep`, tests just advance the manual clock and tick.

#[cfg(test)]
#[path = "clock_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond time source.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Wall clock, milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Virtual clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_ms)) }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// TIMERS
// =============================================================================

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Periodic cursor eviction sweep.
    PresenceSweep,
    /// Trailing send of a throttled cursor position.
    CursorFlush,
}

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: TimerId,
    deadline_ms: u64,
    kind: TimerKind,
}

/// One-shot deadline queue. Periodic work re-arms itself when it fires.
#[derive(Debug, Default)]
pub struct Timers {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire `delay_ms` after `now_ms`.
    pub fn after(&mut self, now_ms: u64, delay_ms: u64, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.push(Entry { id, deadline_ms: now_ms.saturating_add(delay_ms), kind });
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline_ms).min()
    }

    /// Remove and return every timer due at `now_ms`, earliest first.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<(TimerId, TimerKind)> {
        let (mut due, pending): (Vec<Entry>, Vec<Entry>) =
            self.entries.drain(..).partition(|e| e.deadline_ms <= now_ms);
        self.entries = pending;
        due.sort_by_key(|e| (e.deadline_ms, e.id));
        due.into_iter().map(|e| (e.id, e.kind)).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
