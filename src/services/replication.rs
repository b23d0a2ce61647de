//! Replication service: element create, update, and delete across peers.
//!
//! DESIGN
//! ======
//! Creates persist first and apply on success, so an element only ever
//! appears with its durable id. Updates and deletes apply locally, publish,
//! and persist in the background; a failed write is reported but the local
//! view stands until the next [`BoardSession::resync`].
//!
//! Persistence runs on spawned tasks. Each task reports a [`Completion`]
//! through the session's channel, and the owner applies it on the session's
//! own loop, so element state is never touched from two places.
//!
//! Remote events merge by arrival order. There is no version check: the last
//! update applied wins locally, the last write persisted wins durably, and
//! the two can disagree until a resync.
//!
//! A resync replaces the whole element list with what the store returned.
//! A remote create that lands between the store read and the completion is
//! overwritten by the older list and stays hidden until the next resync.

#[cfg(test)]
#[path = "replication_test.rs"]
mod tests;

use canvas::consts::MAX_ELEMENTS_PER_BOARD;
use canvas::doc::{Element, ElementDraft, ElementId, ElementPatch};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::event::{BoardEvent, ErrorCode};
use crate::services::persistence::{NewElement, StoreError};
use crate::state::{BoardSession, SessionError};

/// Reply slot for a create; receives the persisted element or the failure.
pub type CreateReply = oneshot::Sender<Result<Element, SessionError>>;

/// Result of a background persistence call.
#[derive(Debug)]
pub enum Completion {
    Created { result: Result<Element, StoreError>, reply: Option<CreateReply> },
    Updated { id: ElementId, result: Result<Element, StoreError> },
    Deleted { id: ElementId, result: Result<(), StoreError> },
    Resynced { result: Result<Vec<Element>, StoreError> },
}

impl BoardSession {
    // =========================================================================
    // LOCAL MUTATIONS
    // =========================================================================

    /// Validate a create request without sending it.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after close, [`SessionError::InvalidDraft`]
    /// for a draft outside the element rules, and
    /// [`SessionError::BoardFull`] when the board (counting creates in
    /// flight) is at capacity.
    pub fn check_create(&self, draft: &ElementDraft) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        draft.validate()?;
        if self.elements.len() + self.pending_creates >= MAX_ELEMENTS_PER_BOARD {
            return Err(SessionError::BoardFull { limit: MAX_ELEMENTS_PER_BOARD });
        }
        Ok(())
    }

    /// Persist a new element. It is applied and broadcast once the store has
    /// assigned its id; the returned receiver resolves at that point.
    ///
    /// # Errors
    ///
    /// See [`BoardSession::check_create`]. Persistence failures arrive on
    /// the receiver instead.
    pub fn create_element(
        &mut self,
        draft: ElementDraft,
    ) -> Result<oneshot::Receiver<Result<Element, SessionError>>, SessionError> {
        self.check_create(&draft)?;
        let (tx, rx) = oneshot::channel();
        self.spawn_create(draft, Some(tx));
        Ok(rx)
    }

    /// Start the persistence call for an already-checked draft.
    pub fn spawn_create(&mut self, draft: ElementDraft, reply: Option<CreateReply>) {
        let data = NewElement {
            board_id: self.board_id,
            draft,
            owner_id: self.actor.id.clone(),
            owner_name: self.actor.display_name.clone(),
        };
        self.in_flight += 1;
        self.pending_creates += 1;
        let store = self.deps.store.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = store.create_element(data).await;
            let _ = tx.send(Completion::Created { result, reply });
        });
    }

    /// Apply a sparse update locally, publish it, and persist it.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownElement`] if the id is not on the board,
    /// [`SessionError::InvalidDraft`] if a present field breaks the element
    /// rules. Nothing is applied, published, or persisted in either case.
    pub fn update_element(&mut self, id: ElementId, fields: ElementPatch) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        fields.validate()?;
        if !self.elements.contains(&id) {
            return Err(SessionError::UnknownElement(id));
        }
        if fields.is_empty() {
            return Ok(());
        }
        self.elements.apply_patch(&id, &fields);
        self.publish(&BoardEvent::ElementUpdate { element_id: id, fields: fields.clone(), actor_id: self.actor.id.clone() });
        self.spawn_update(id, fields);
        Ok(())
    }

    /// Remove an element locally, publish the delete, and persist it.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownElement`] if the id is not on the board.
    pub fn delete_element(&mut self, id: ElementId) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if self.elements.remove(&id).is_none() {
            return Err(SessionError::UnknownElement(id));
        }
        self.drop_drag_if(id);
        self.publish(&BoardEvent::ElementDelete { element_id: id, actor_id: self.actor.id.clone() });

        self.in_flight += 1;
        let store = self.deps.store.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = store.delete_element(id).await;
            let _ = tx.send(Completion::Deleted { id, result });
        });
        Ok(())
    }

    /// Refetch the board and replace local elements with the stored list.
    pub fn resync(&mut self) {
        if self.is_closed() {
            return;
        }
        self.in_flight += 1;
        let store = self.deps.store.clone();
        let tx = self.completions_tx.clone();
        let board_id = self.board_id;
        tokio::spawn(async move {
            let result = store.fetch_elements(board_id).await;
            let _ = tx.send(Completion::Resynced { result });
        });
    }

    pub(crate) fn spawn_update(&mut self, id: ElementId, fields: ElementPatch) {
        self.in_flight += 1;
        let store = self.deps.store.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = store.update_element(id, &fields).await;
            let _ = tx.send(Completion::Updated { id, result });
        });
    }

    // =========================================================================
    // COMPLETIONS
    // =========================================================================

    /// Fold a finished persistence call into session state.
    pub fn apply_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Created { result, reply } => {
                self.pending_creates = self.pending_creates.saturating_sub(1);
                let outcome = match result {
                    Ok(element) => {
                        self.apply_created(&element);
                        Ok(element)
                    }
                    Err(e) => {
                        warn!(board_id = %self.board_id, code = e.error_code(), error = %e, "replication: create failed");
                        let err = SessionError::Persist(e);
                        self.report(&err);
                        Err(err)
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Completion::Updated { id, result } => match result {
                Ok(_) => debug!(%id, "replication: update persisted"),
                Err(e) => {
                    warn!(%id, code = e.error_code(), error = %e, "replication: update failed; keeping local state");
                    self.report(&SessionError::Persist(e));
                }
            },
            Completion::Deleted { id, result } => match result {
                Ok(()) => debug!(%id, "replication: delete persisted"),
                Err(e) => {
                    warn!(%id, code = e.error_code(), error = %e, "replication: delete failed; not restoring");
                    self.report(&SessionError::Persist(e));
                }
            },
            Completion::Resynced { result } => match result {
                Ok(elements) => {
                    if self.is_closed() {
                        return;
                    }
                    self.elements.load_snapshot(elements);
                    if let Some(id) = self.drag.dragging_element().filter(|id| !self.elements.contains(id)) {
                        self.drop_drag_if(id);
                    }
                    info!(board_id = %self.board_id, elements = self.elements.len(), "replication: resynced");
                }
                Err(e) => {
                    warn!(board_id = %self.board_id, error = %e, "replication: resync failed");
                    self.report(&SessionError::Load(e));
                }
            },
        }
    }

    fn apply_created(&mut self, element: &Element) {
        if self.is_closed() {
            return;
        }
        self.elements.insert(element.clone());
        self.publish(&BoardEvent::ElementCreate { element: element.clone(), actor_id: self.actor.id.clone() });
        debug!(id = %element.id, kind = element.kind.as_str(), "replication: element created");
    }

    // =========================================================================
    // REMOTE EVENTS
    // =========================================================================

    pub(crate) fn receive_create(&mut self, element: Element) {
        if element.board_id != self.board_id {
            debug!(id = %element.id, board_id = %element.board_id, "replication: create for another board ignored");
            return;
        }
        let id = element.id;
        if !self.elements.insert(element) {
            debug!(%id, "replication: duplicate create ignored");
        }
    }

    pub(crate) fn receive_update(&mut self, id: ElementId, fields: &ElementPatch) {
        if !self.elements.apply_patch(&id, fields) {
            debug!(%id, "replication: update for unknown element ignored");
        }
    }

    pub(crate) fn receive_delete(&mut self, id: ElementId) {
        if self.elements.remove(&id).is_some() {
            self.drop_drag_if(id);
        }
    }
}
