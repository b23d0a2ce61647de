//! Board session state.
//!
//! DESIGN
//! ======
//! `BoardSession` is one actor's live view of one board. It owns everything
//! the sync engine mutates: the remote cursor roster, the element store, the
//! viewport, the drag machine, and the timer queue. It is constructed by
//! [`BoardSession::open`] and driven from exactly one task, so none of that
//! state is shared or locked.
//!
//! Inputs arrive through four doors, all serialized by the owner:
//! - local gestures and edits (methods in `services::{presence, replication, drag}`)
//! - inbound frames ([`BoardSession::handle_frame`])
//! - persistence completions ([`BoardSession::apply_completion`])
//! - timer ticks ([`BoardSession::tick`])
//!
//! Self-echo suppression lives in `handle_frame` and nowhere else: every
//! inbound event is checked against the local actor before any handler sees
//! it.
//!
//! ERROR HANDLING
//! ==============
//! Only opening can fail outright. Mutation failures become [`Notice`]s;
//! transport failures are logged and otherwise ignored.

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

use std::collections::VecDeque;
use std::sync::Arc;

use canvas::camera::{Point, Viewport};
use canvas::doc::{BoardId, DocStore, DraftError, Element, ElementId};
use canvas::input::DragMachine;
use frames::Frame;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::clock::{Clock, TimerId, TimerKind, Timers};
use crate::config::SyncConfig;
use crate::event::{BoardEvent, CursorState, ErrorCode, topic_for};
use crate::services::identity::Actor;
use crate::services::persistence::{ElementStore, StoreError};
use crate::services::presence::{CursorOutbox, Roster};
use crate::services::replication::Completion;
use crate::transport::Transport;

// =============================================================================
// ERRORS AND NOTICES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to load board: {0}")]
    Load(#[source] StoreError),
    #[error("failed to save changes: {0}")]
    Persist(#[source] StoreError),
    #[error("element not found: {0}")]
    UnknownElement(ElementId),
    #[error("invalid element: {0}")]
    InvalidDraft(#[from] DraftError),
    #[error("board is full ({limit} elements)")]
    BoardFull { limit: usize },
    #[error("session closed")]
    Closed,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Load(_) => "E_BOARD_LOAD",
            Self::Persist(_) => "E_PERSIST",
            Self::UnknownElement(_) => "E_ELEMENT_NOT_FOUND",
            Self::InvalidDraft(_) => "E_INVALID_ELEMENT",
            Self::BoardFull { .. } => "E_BOARD_FULL",
            Self::Closed => "E_SESSION_CLOSED",
        }
    }
}

/// Transient, user-facing report of a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub code: &'static str,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { code: err.error_code(), message: err.to_string() }
    }
}

/// What [`BoardSession::handle_frame`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Applied,
    /// Originated from the local actor; already reflected locally.
    SelfEcho,
    /// Wrong topic, or the session is closed.
    Ignored,
    /// Unknown event type or unreadable payload.
    Malformed,
}

/// Read-only copy of session state for renderers and tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub board_id: BoardId,
    pub actor: Actor,
    pub elements: Vec<Element>,
    pub cursors: Vec<CursorState>,
    pub viewport: Viewport,
    pub dragging: Option<ElementId>,
}

/// External collaborators a session is opened against.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn ElementStore>,
    pub clock: Arc<dyn Clock>,
}

// =============================================================================
// SESSION
// =============================================================================

pub struct BoardSession {
    pub(crate) board_id: BoardId,
    pub(crate) actor: Actor,
    pub(crate) topic: String,
    pub(crate) config: SyncConfig,
    pub(crate) deps: SessionDeps,
    pub(crate) roster: Roster,
    pub(crate) cursor: CursorOutbox,
    pub(crate) elements: DocStore,
    pub(crate) viewport: Viewport,
    pub(crate) drag: DragMachine,
    pub(crate) timers: Timers,
    pub(crate) notices: VecDeque<Notice>,
    pub(crate) completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// Persistence calls spawned but not yet applied.
    pub(crate) in_flight: usize,
    /// Creates in flight; they count against board capacity.
    pub(crate) pending_creates: usize,
    inbound: Option<mpsc::Receiver<Frame>>,
    sweep_timer: Option<TimerId>,
    closed: bool,
}

impl BoardSession {
    /// Subscribe to the board topic, load the element snapshot, and start the
    /// eviction sweep.
    ///
    /// The subscription is taken before the fetch so nothing published
    /// while loading is missed; creates that race the snapshot are
    /// deduplicated by id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Load`] if the snapshot cannot be fetched. The
    /// subscription is released and no session is returned.
    pub async fn open(
        board_id: BoardId,
        actor: Actor,
        config: SyncConfig,
        deps: SessionDeps,
    ) -> Result<Self, SessionError> {
        let topic = topic_for(board_id);
        let inbound = match deps.transport.subscribe(&topic) {
            Ok(rx) => Some(rx),
            Err(e) => {
                debug!(%topic, error = %e, "session: subscribe failed; continuing without peers");
                None
            }
        };

        let snapshot = match deps.store.fetch_elements(board_id).await {
            Ok(elements) => elements,
            Err(e) => {
                error!(%board_id, error = %e, "session: board load failed");
                deps.transport.unsubscribe(&topic);
                return Err(SessionError::Load(e));
            }
        };
        let mut elements = DocStore::new();
        elements.load_snapshot(snapshot);

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let mut session = Self {
            board_id,
            actor,
            topic,
            config,
            deps,
            roster: Roster::new(),
            cursor: CursorOutbox::default(),
            elements,
            viewport: Viewport::default(),
            drag: DragMachine::new(config.drag_throttle_ms),
            timers: Timers::new(),
            notices: VecDeque::new(),
            completions_tx,
            completions_rx,
            in_flight: 0,
            pending_creates: 0,
            inbound,
            sweep_timer: None,
            closed: false,
        };
        session.arm_sweep();
        info!(%board_id, actor = %session.actor.id, elements = session.elements.len(), "session: board opened");
        Ok(session)
    }

    // --- accessors ---

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    #[must_use]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn elements(&self) -> &DocStore {
        &self.elements
    }

    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The local actor's own cursor, kept apart from the remote roster.
    #[must_use]
    pub fn local_cursor(&self) -> Option<&CursorState> {
        self.cursor.current.as_ref()
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn dragging_element(&self) -> Option<ElementId> {
        self.drag.dragging_element()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.deps.clock.now_ms()
    }

    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            board_id: self.board_id,
            actor: self.actor.clone(),
            elements: self.elements.ordered().cloned().collect(),
            cursors: self.roster.ordered().cloned().collect(),
            viewport: self.viewport,
            dragging: self.drag.dragging_element(),
        }
    }

    // --- viewport ---

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport.pan_by(dx, dy);
    }

    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        self.viewport.zoom_at(anchor, factor);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    // --- notices ---

    /// Drain pending notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub(crate) fn report(&mut self, err: &(impl ErrorCode + ?Sized)) {
        self.notices.push_back(Notice::from_error(err));
    }

    // --- outbound ---

    /// Best-effort publish on the board topic.
    pub(crate) fn publish(&self, event: &BoardEvent) {
        if self.closed {
            return;
        }
        let frame = match event.to_frame(&self.topic) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "session: event not encodable; dropped");
                return;
            }
        };
        if let Err(e) = self.deps.transport.publish(&self.topic, &frame) {
            debug!(topic = %self.topic, event = %frame.event, error = %e, "session: publish failed");
        }
    }

    // --- inbound ---

    /// Route one inbound frame. Frames from the local actor are dropped here
    /// before any handler runs.
    pub fn handle_frame(&mut self, frame: Frame) -> Inbound {
        if self.closed || frame.topic != self.topic {
            return Inbound::Ignored;
        }
        let event = match BoardEvent::from_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                debug!(code = e.error_code(), error = %e, event = %frame.event, "session: malformed frame");
                return Inbound::Malformed;
            }
        };
        if event.origin() == self.actor.id {
            return Inbound::SelfEcho;
        }
        match event {
            BoardEvent::CursorMove(cursor) => self.receive_cursor(cursor),
            BoardEvent::ElementCreate { element, .. } => self.receive_create(element),
            BoardEvent::ElementUpdate { element_id, fields, .. } => self.receive_update(element_id, &fields),
            BoardEvent::ElementDelete { element_id, .. } => self.receive_delete(element_id),
        }
        Inbound::Applied
    }

    /// Handle every frame already queued on the subscription without
    /// waiting. Returns how many were taken.
    pub fn drain_inbound(&mut self) -> usize {
        let mut frames = Vec::new();
        if let Some(rx) = self.inbound.as_mut() {
            while let Ok(frame) = rx.try_recv() {
                frames.push(frame);
            }
        }
        let count = frames.len();
        for frame in frames {
            self.handle_frame(frame);
        }
        count
    }

    /// Hand the subscription to an external event loop.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<Frame>> {
        self.inbound.take()
    }

    // --- persistence completions ---

    /// Wait for the next persistence result.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Apply every in-flight persistence result, waiting as needed.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            let Some(completion) = self.completions_rx.recv().await else {
                break;
            };
            self.apply_completion(completion);
        }
    }

    // --- timers ---

    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at the current clock time.
    pub fn tick(&mut self) {
        let now = self.now_ms();
        for (id, kind) in self.timers.pop_due(now) {
            match kind {
                TimerKind::PresenceSweep => {
                    if self.sweep_timer == Some(id) {
                        self.sweep_timer = None;
                    }
                    self.sweep_presence();
                    self.arm_sweep();
                }
                TimerKind::CursorFlush => self.flush_cursor(id),
            }
        }
    }

    fn arm_sweep(&mut self) {
        if self.closed || self.sweep_timer.is_some() {
            return;
        }
        let now = self.now_ms();
        self.sweep_timer = Some(self.timers.after(now, self.config.sweep_interval_ms, TimerKind::PresenceSweep));
    }

    // --- lifecycle ---

    /// Leave the board: commit any drag, stop timers, and unsubscribe.
    /// In-flight persistence calls finish in the background.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.commit_drag();
        self.closed = true;
        self.timers.clear();
        self.sweep_timer = None;
        self.cursor.flush_timer = None;
        self.inbound = None;
        self.deps.transport.unsubscribe(&self.topic);
        info!(board_id = %self.board_id, in_flight = self.in_flight, "session: board closed");
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
