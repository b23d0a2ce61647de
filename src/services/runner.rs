//! Session runner: one task that owns a [`BoardSession`].
//!
//! DESIGN
//! ======
//! The runner serializes every input a session has onto a single
//! `tokio::select!` loop:
//!
//! - commands from any number of [`SessionHandle`] clones
//! - inbound frames from the board subscription
//! - persistence completions
//! - the next timer deadline
//!
//! The session is never shared, so nothing in it is locked. When the last
//! handle is dropped, or [`SessionHandle::close`] is called, the session is
//! closed and handed back through the task's `JoinHandle`.

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;

use std::time::Duration;

use canvas::camera::Point;
use canvas::doc::{Element, ElementDraft, ElementId, ElementPatch};
use frames::Frame;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::{BoardSession, BoardSnapshot, Notice, SessionError};

enum Command {
    PointerMove(Point),
    PointerDown { screen: Point, reply: oneshot::Sender<Option<ElementId>> },
    PointerUp,
    PointerLeave,
    Create { draft: ElementDraft, reply: oneshot::Sender<Result<Element, SessionError>> },
    Update { id: ElementId, fields: ElementPatch, reply: oneshot::Sender<Result<(), SessionError>> },
    Delete { id: ElementId, reply: oneshot::Sender<Result<(), SessionError>> },
    PanBy { dx: f64, dy: f64 },
    ZoomAt { anchor: Point, factor: f64 },
    Resync,
    Snapshot(oneshot::Sender<BoardSnapshot>),
    TakeNotices(oneshot::Sender<Vec<Notice>>),
    Close(oneshot::Sender<()>),
}

/// Cloneable handle to a running session. Every method fails with
/// [`SessionError::Closed`] once the runner has stopped.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.tx.send(cmd).await.map_err(|_| SessionError::Closed)
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn pointer_move(&self, screen: Point) -> Result<(), SessionError> {
        self.send(Command::PointerMove(screen)).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn pointer_down(&self, screen: Point) -> Result<Option<ElementId>, SessionError> {
        self.call(|reply| Command::PointerDown { screen, reply }).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn pointer_up(&self) -> Result<(), SessionError> {
        self.send(Command::PointerUp).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn pointer_leave(&self) -> Result<(), SessionError> {
        self.send(Command::PointerLeave).await
    }

    /// Create an element and wait for its persisted form.
    ///
    /// # Errors
    ///
    /// Validation, capacity, and persistence failures from the session.
    pub async fn create_element(&self, draft: ElementDraft) -> Result<Element, SessionError> {
        self.call(|reply| Command::Create { draft, reply }).await?
    }

    /// # Errors
    ///
    /// See [`BoardSession::update_element`].
    pub async fn update_element(&self, id: ElementId, fields: ElementPatch) -> Result<(), SessionError> {
        self.call(|reply| Command::Update { id, fields, reply }).await?
    }

    /// # Errors
    ///
    /// See [`BoardSession::delete_element`].
    pub async fn delete_element(&self, id: ElementId) -> Result<(), SessionError> {
        self.call(|reply| Command::Delete { id, reply }).await?
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn pan_by(&self, dx: f64, dy: f64) -> Result<(), SessionError> {
        self.send(Command::PanBy { dx, dy }).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn zoom_at(&self, anchor: Point, factor: f64) -> Result<(), SessionError> {
        self.send(Command::ZoomAt { anchor, factor }).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn resync(&self) -> Result<(), SessionError> {
        self.send(Command::Resync).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn snapshot(&self) -> Result<BoardSnapshot, SessionError> {
        self.call(Command::Snapshot).await
    }

    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner has stopped.
    pub async fn take_notices(&self) -> Result<Vec<Notice>, SessionError> {
        self.call(Command::TakeNotices).await
    }

    /// Close the session and wait for the runner to acknowledge.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] if the runner had already stopped.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.call(Command::Close).await
    }
}

/// Move `session` onto its own task. The join handle yields the closed
/// session once the runner stops.
#[must_use]
pub fn spawn_session(session: BoardSession, capacity: usize) -> (SessionHandle, JoinHandle<BoardSession>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run(session, rx));
    (SessionHandle { tx }, task)
}

async fn run(mut session: BoardSession, mut commands: mpsc::Receiver<Command>) -> BoardSession {
    let mut inbound = session.take_inbound();
    info!(board_id = %session.board_id(), "runner: started");

    loop {
        let wait = session.next_deadline().map(|deadline| deadline.saturating_sub(session.now_ms()));

        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    session.close();
                    break;
                };
                if let Some(done) = apply_command(&mut session, cmd) {
                    let _ = done.send(());
                    break;
                }
            }
            frame = recv_inbound(&mut inbound) => match frame {
                Some(frame) => {
                    session.handle_frame(frame);
                }
                None => {
                    debug!(board_id = %session.board_id(), "runner: subscription ended");
                    inbound = None;
                }
            },
            Some(completion) = session.next_completion() => session.apply_completion(completion),
            () = sleep_for(wait) => session.tick(),
        }
    }

    info!(board_id = %session.board_id(), in_flight = session.in_flight(), "runner: stopped");
    session
}

/// Apply one command. Returns the acknowledgement slot when the command
/// closed the session.
fn apply_command(session: &mut BoardSession, cmd: Command) -> Option<oneshot::Sender<()>> {
    match cmd {
        Command::PointerMove(screen) => session.pointer_move(screen),
        Command::PointerDown { screen, reply } => {
            let _ = reply.send(session.pointer_down(screen));
        }
        Command::PointerUp => session.pointer_up(),
        Command::PointerLeave => session.pointer_leave(),
        Command::Create { draft, reply } => match session.check_create(&draft) {
            Ok(()) => session.spawn_create(draft, Some(reply)),
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        },
        Command::Update { id, fields, reply } => {
            let _ = reply.send(session.update_element(id, fields));
        }
        Command::Delete { id, reply } => {
            let _ = reply.send(session.delete_element(id));
        }
        Command::PanBy { dx, dy } => session.pan_by(dx, dy),
        Command::ZoomAt { anchor, factor } => session.zoom_at(anchor, factor),
        Command::Resync => session.resync(),
        Command::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        Command::TakeNotices(reply) => {
            let _ = reply.send(session.take_notices());
        }
        Command::Close(done) => {
            session.close();
            return Some(done);
        }
    }
    None
}

async fn recv_inbound(inbound: &mut Option<mpsc::Receiver<Frame>>) -> Option<Frame> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_for(wait_ms: Option<u64>) {
    match wait_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => std::future::pending().await,
    }
}
