//! Document model: board elements, creation drafts, sparse patches, and the
//! in-memory store.
//!
//! Data flows into this layer from the persistence collaborator (the initial
//! snapshot), from peers (create/update/delete events), and from local edits.
//! The store keeps elements in creation order so the renderer can draw them
//! back to front without a separate z-index.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::Point;
use crate::consts::{
    BLOCK_SIZE, DEFAULT_POSTIT_COLOR, MAX_CONTENT_CHARS, MAX_ELEMENT_HEIGHT, MAX_ELEMENT_WIDTH, MIN_ELEMENT_HEIGHT,
    MIN_ELEMENT_WIDTH, POSTIT_SIZE,
};

/// Unique identifier for an element, assigned by the persistence layer.
pub type ElementId = Uuid;

/// Identifier of a board.
pub type BoardId = Uuid;

/// Stable actor identifier: an account id or a generated anonymous id.
pub type ActorId = String;

/// The kind of a board element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Sticky note with a fill color.
    Postit,
    /// Free-standing text block.
    Text,
    /// Uploaded image referenced by `image_ref`.
    Image,
}

impl ElementKind {
    /// Storage / wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postit => "postit",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Parse a storage / wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "postit" => Some(Self::Postit),
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Width and height of an element in board units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Size {
    #[must_use]
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }
}

/// A board element as held locally and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub board_id: BoardId,
    pub kind: ElementKind,
    /// Top-left corner in board coordinates.
    pub position: Point,
    pub size: Size,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Public URL or storage key of the image body (images only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub owner_id: ActorId,
    pub owner_name: String,
}

// =============================================================================
// DRAFTS
// =============================================================================

/// Reasons a creation request is rejected before it reaches persistence.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DraftError {
    #[error("content exceeds {max} characters")]
    ContentTooLong { max: usize },
    #[error("size {w}x{h} outside allowed bounds")]
    SizeOutOfBounds { w: f64, h: f64 },
    #[error("image elements require an image reference")]
    MissingImageRef,
}

/// Everything needed to create an element except its id and owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDraft {
    pub kind: ElementKind,
    pub position: Point,
    pub size: Size,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl ElementDraft {
    /// Draft with the default size, content and color for `kind`.
    #[must_use]
    pub fn new(kind: ElementKind, position: Point) -> Self {
        let ((w, h), content, color) = match kind {
            ElementKind::Postit => (POSTIT_SIZE, "New note", Some(DEFAULT_POSTIT_COLOR.to_owned())),
            ElementKind::Text => (BLOCK_SIZE, "New text", None),
            ElementKind::Image => (BLOCK_SIZE, "Image", None),
        };
        Self { kind, position, size: Size::new(w, h), content: content.to_owned(), color, image_ref: None }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Check content length, size bounds, and kind-specific requirements.
    ///
    /// # Errors
    ///
    /// Returns the first rule the draft violates.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(DraftError::ContentTooLong { max: MAX_CONTENT_CHARS });
        }
        if !size_in_bounds(self.size) {
            return Err(DraftError::SizeOutOfBounds { w: self.size.w, h: self.size.h });
        }
        if self.kind == ElementKind::Image && self.image_ref.as_deref().is_none_or(str::is_empty) {
            return Err(DraftError::MissingImageRef);
        }
        Ok(())
    }

    /// Attach the persisted id and ownership, producing a full element.
    #[must_use]
    pub fn into_element(self, id: ElementId, board_id: BoardId, owner_id: ActorId, owner_name: String) -> Element {
        Element {
            id,
            board_id,
            kind: self.kind,
            position: self.position,
            size: self.size,
            content: self.content,
            color: self.color,
            image_ref: self.image_ref,
            owner_id,
            owner_name,
        }
    }
}

fn size_in_bounds(size: Size) -> bool {
    (MIN_ELEMENT_WIDTH..=MAX_ELEMENT_WIDTH).contains(&size.w)
        && (MIN_ELEMENT_HEIGHT..=MAX_ELEMENT_HEIGHT).contains(&size.h)
}

// =============================================================================
// PATCHES
// =============================================================================

/// Sparse update for an element. Only present fields are applied, and each
/// present field overwrites the old value wholesale.
///
/// An absent field and a `None` field mean the same thing, so a patch can
/// recolor an element or swap its image but cannot clear either back to
/// unset. The Postgres update mirrors this with `COALESCE`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl ElementPatch {
    /// Position-only patch, as emitted during a drag.
    #[must_use]
    pub fn position(position: Point) -> Self {
        Self { position: Some(position), ..Self::default() }
    }

    /// Whether the patch carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.size.is_none()
            && self.content.is_none()
            && self.color.is_none()
            && self.image_ref.is_none()
    }

    /// Check the present fields against the same bounds a draft obeys.
    ///
    /// # Errors
    ///
    /// Returns the first rule a present field violates.
    pub fn validate(&self) -> Result<(), DraftError> {
        if let Some(content) = &self.content {
            if content.chars().count() > MAX_CONTENT_CHARS {
                return Err(DraftError::ContentTooLong { max: MAX_CONTENT_CHARS });
            }
        }
        if let Some(size) = self.size {
            if !size_in_bounds(size) {
                return Err(DraftError::SizeOutOfBounds { w: size.w, h: size.h });
            }
        }
        Ok(())
    }

    /// Overwrite each present field on `element`.
    pub fn apply_to(&self, element: &mut Element) {
        if let Some(position) = self.position {
            element.position = position;
        }
        if let Some(size) = self.size {
            element.size = size;
        }
        if let Some(content) = &self.content {
            element.content.clone_from(content);
        }
        if let Some(color) = &self.color {
            element.color = Some(color.clone());
        }
        if let Some(image_ref) = &self.image_ref {
            element.image_ref = Some(image_ref.clone());
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// In-memory store of a board's elements, kept in creation order.
#[derive(Debug, Default)]
pub struct DocStore {
    elements: HashMap<ElementId, Element>,
    order: Vec<ElementId>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element unless one with the same id is already present.
    /// Returns `false` (and leaves the store untouched) for a duplicate.
    pub fn insert(&mut self, element: Element) -> bool {
        if self.elements.contains_key(&element.id) {
            return false;
        }
        self.order.push(element.id);
        self.elements.insert(element.id, element);
        true
    }

    /// Remove an element by id, returning it if it was present.
    pub fn remove(&mut self, id: &ElementId) -> Option<Element> {
        let removed = self.elements.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Return a reference to an element by id.
    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id)
    }

    /// Apply a sparse patch to an existing element. Returns `false` if the
    /// element doesn't exist; unknown ids never create anything.
    pub fn apply_patch(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        let Some(element) = self.elements.get_mut(id) else {
            return false;
        };
        patch.apply_to(element);
        true
    }

    /// Move an element. Returns `false` if the element doesn't exist.
    pub fn set_position(&mut self, id: &ElementId, position: Point) -> bool {
        let Some(element) = self.elements.get_mut(id) else {
            return false;
        };
        element.position = position;
        true
    }

    /// Replace all elements with a full snapshot, keeping the snapshot's order.
    /// Later duplicates of an id are dropped.
    pub fn load_snapshot(&mut self, elements: Vec<Element>) {
        self.elements.clear();
        self.order.clear();
        for element in elements {
            self.insert(element);
        }
    }

    /// All elements in creation order.
    pub fn ordered(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Number of elements currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the store contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
